//! Transaction entity - Represents all ledger transactions in the system.
//!
//! Each transaction has a source `wallet_id`, a `category_id`, an unsigned
//! amount whose direction is implied by `kind`, and a lifecycle `status`.
//! Transfers additionally carry `dest_wallet_id` and, for cross-currency
//! moves, an `exchange_rate`.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Transaction database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    /// Unique identifier for the transaction
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Transaction amount; always positive, direction comes from `kind`
    pub amount: Decimal,
    /// Human-readable description of the transaction
    pub description: String,
    /// When the transaction occurred (never in the future)
    pub date: DateTimeUtc,
    /// Direction of the transaction: income, expense, or transfer
    pub kind: TransactionKind,
    /// Lifecycle status: pending until applied, then completed or failed
    pub status: TransactionStatus,
    /// ID of the source wallet
    pub wallet_id: i64,
    /// ID of the category; the category's kind must match `kind`
    pub category_id: i64,
    /// Destination wallet, present only for transfers
    pub dest_wallet_id: Option<i64>,
    /// Exchange rate applied to the destination leg of a cross-currency
    /// transfer; non-positive values are treated as absent (rate 1.0)
    pub exchange_rate: Option<Decimal>,
    /// Optional comma-separated tags
    pub tags: Option<String>,
    /// When the record was created
    pub created_at: DateTimeUtc,
    /// When the record was last modified
    pub updated_at: DateTimeUtc,
}

/// Direction of a transaction. Categories use the same vocabulary, and a
/// transaction may only reference a category of the same kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Money entering a wallet
    #[sea_orm(string_value = "income")]
    Income,
    /// Money leaving a wallet
    #[sea_orm(string_value = "expense")]
    Expense,
    /// Money moving between two wallets
    #[sea_orm(string_value = "transfer")]
    Transfer,
}

impl TransactionKind {
    /// Lowercase name form, matching the stored string value.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Income => "income",
            TransactionKind::Expense => "expense",
            TransactionKind::Transfer => "transfer",
        }
    }
}

/// Lifecycle status of a transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Created but not yet applied to any balance
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Applied; its effect is reflected in wallet balances
    #[sea_orm(string_value = "completed")]
    Completed,
    /// Rejected by validation or apply; balances untouched
    #[sea_orm(string_value = "failed")]
    Failed,
}

/// Defines relationships between Transaction and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each transaction debits or credits one source wallet
    #[sea_orm(
        belongs_to = "super::wallet::Entity",
        from = "Column::WalletId",
        to = "super::wallet::Column::Id"
    )]
    Wallet,
    /// Each transaction belongs to one category
    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id"
    )]
    Category,
}

impl Related<super::wallet::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Wallet.def()
    }
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
