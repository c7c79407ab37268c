//! Category entity - Groups transactions by purpose and direction.
//!
//! A category's `kind` constrains the transactions that may reference it:
//! a transaction and its category must share the same kind. System
//! categories are seeded at startup and cannot be deleted.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::transaction::TransactionKind;

/// Category database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "categories")]
pub struct Model {
    /// Unique identifier for the category
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name, unique per category
    pub name: String,
    /// Direction of transactions this category groups
    pub kind: TransactionKind,
    /// Seeded at startup; protected from deletion
    pub is_system: bool,
}

/// Defines relationships between Category and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Transactions referencing this category
    #[sea_orm(has_many = "super::transaction::Entity")]
    Transaction,
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transaction.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
