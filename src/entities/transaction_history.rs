//! Transaction history entity - Append-only audit trail of balance effects.
//!
//! One row is written for every create/update/delete that touches wallet
//! balances, capturing the old and new balance of each wallet involved plus
//! serialized before/after snapshots of the transaction itself. Rows are
//! never updated or deleted.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Audit entry database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transaction_history")]
pub struct Model {
    /// Unique identifier for the audit entry
    #[sea_orm(primary_key)]
    pub id: i64,
    /// The transaction this entry records a mutation of
    pub transaction_id: i64,
    /// Which lifecycle mutation produced this entry
    pub action: HistoryAction,
    /// When the mutation happened
    pub timestamp: DateTimeUtc,
    /// Source wallet touched by the mutation
    pub wallet_id: i64,
    /// Source wallet balance before the mutation
    pub old_balance: Decimal,
    /// Source wallet balance after the mutation
    pub new_balance: Decimal,
    /// Destination wallet, for transfers
    pub dest_wallet_id: Option<i64>,
    /// Destination balance before the mutation
    pub old_dest_balance: Option<Decimal>,
    /// Destination balance after the mutation
    pub new_dest_balance: Option<Decimal>,
    /// Serialized transaction state before the mutation
    pub before_snapshot: Option<Json>,
    /// Serialized transaction state after the mutation
    pub after_snapshot: Option<Json>,
}

/// Lifecycle mutation recorded by an audit entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum HistoryAction {
    /// A new transaction was applied
    #[sea_orm(string_value = "created")]
    Created,
    /// An existing transaction was reversed and re-applied
    #[sea_orm(string_value = "updated")]
    Updated,
    /// A transaction was reversed and removed
    #[sea_orm(string_value = "deleted")]
    Deleted,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
