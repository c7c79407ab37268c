//! Import synchronization - pulls external financial activity into the ledger.
//!
//! - `adapters`: the source/sink contracts, the normalized transaction shape,
//!   and the concrete HTTP clients behind them.
//! - `importer`: the per-source import cycle (fetch, dedup, commit, advance
//!   the watermark).
//! - `workers`: supervision of one concurrent import worker per source.

/// Source and sink adapter contracts plus concrete providers
pub mod adapters;
/// Per-source import cycles
pub mod importer;
/// Worker lifecycle and supervision
pub mod workers;
