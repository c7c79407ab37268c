//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod category;
pub mod import_record;
pub mod sync_state;
pub mod transaction;
pub mod transaction_history;
pub mod wallet;

// Re-export specific types to avoid conflicts
pub use category::{Column as CategoryColumn, Entity as Category, Model as CategoryModel};
pub use import_record::{
    Column as ImportRecordColumn, Entity as ImportRecord, Model as ImportRecordModel,
};
pub use sync_state::{Column as SyncStateColumn, Entity as SyncState, Model as SyncStateModel};
pub use transaction::{
    Column as TransactionColumn, Entity as Transaction, Model as TransactionModel,
};
pub use transaction_history::{
    Column as TransactionHistoryColumn, Entity as TransactionHistory,
    Model as TransactionHistoryModel,
};
pub use wallet::{Column as WalletColumn, Entity as Wallet, Model as WalletModel};
