//! Core business logic - framework-agnostic ledger operations.
//!
//! Everything that touches wallet balances lives here. The transaction
//! module owns the apply/reverse pipeline; wallet and category modules cover
//! account management; dedup and import_log back the import workers.

/// Category operations and system-category seeding
pub mod category;
/// Duplicate detection for imported transactions
pub mod dedup;
/// Import records and per-source watermarks
pub mod import_log;
/// Transaction lifecycle: validate, apply, reverse, audit
pub mod transaction;
/// Wallet operations and balance adjustment
pub mod wallet;
