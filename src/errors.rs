//! Unified error types and result handling.
//!
//! A single error enum covers configuration, persistence, adapter, and ledger
//! validation failures. The import workers use the classification helpers to
//! decide between retrying, skipping a transaction, and stopping entirely.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Source '{name}' error: {message}")]
    SourceApi { name: String, message: String },

    #[error("Sink error: {message}")]
    Sink { message: String },

    #[error("Wallet not found: {wallet}")]
    WalletNotFound { wallet: String },

    #[error("Category not found: {category}")]
    CategoryNotFound { category: String },

    #[error("Transaction not found: {id}")]
    TransactionNotFound { id: i64 },

    #[error("Invalid amount: {amount}")]
    InvalidAmount { amount: Decimal },

    #[error("Transaction date {date} is in the future")]
    FutureDate { date: DateTime<Utc> },

    #[error("Insufficient funds: balance is {current}, required {required}")]
    InsufficientFunds { current: Decimal, required: Decimal },

    #[error("Category '{category}' is '{category_kind}' but the transaction is '{transaction_kind}'")]
    CategoryKindMismatch {
        category: String,
        category_kind: String,
        transaction_kind: String,
    },

    #[error("A transfer requires a destination wallet")]
    MissingDestinationWallet,

    #[error("A transfer cannot use the same wallet on both sides")]
    SameWalletTransfer,

    #[error("Transfer between {from_currency} and {to_currency} requires an exchange rate")]
    MissingExchangeRate {
        from_currency: String,
        to_currency: String,
    },

    #[error("Category '{name}' is a system category and cannot be deleted")]
    SystemCategory { name: String },

    #[error("{entity} is still referenced by {count} transaction(s)")]
    StillReferenced { entity: String, count: u64 },

    #[error("Unknown provider: {name}")]
    UnknownProvider { name: String },

    #[error("Worker '{name}' is already running")]
    WorkerAlreadyRunning { name: String },

    #[error("Worker '{name}' is not running")]
    WorkerNotRunning { name: String },

    #[error("Unknown worker: {name}")]
    UnknownWorker { name: String },

    #[error("Ledger consistency violation: {message}")]
    Consistency { message: String },
}

impl Error {
    /// True for ledger rule violations: the offending transaction is marked
    /// failed and skipped, no balances are mutated, and the cycle continues.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::WalletNotFound { .. }
                | Error::CategoryNotFound { .. }
                | Error::InvalidAmount { .. }
                | Error::FutureDate { .. }
                | Error::InsufficientFunds { .. }
                | Error::CategoryKindMismatch { .. }
                | Error::MissingDestinationWallet
                | Error::SameWalletTransfer
                | Error::MissingExchangeRate { .. }
        )
    }

    /// True for network-shaped failures worth retrying with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Http(_) | Error::SourceApi { .. } | Error::Sink { .. }
        )
    }

    /// True for invariant violations that must stop the owning worker.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Consistency { .. })
    }
}

// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
