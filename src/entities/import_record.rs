//! Import record entity - The dedup ledger of externally imported activity.
//!
//! Keyed by the external transaction id; written exactly once per id (first
//! writer wins) and never updated.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::transaction::TransactionKind;

/// Import record database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "import_records")]
pub struct Model {
    /// External transaction id as assigned by the source
    #[sea_orm(primary_key, auto_increment = false)]
    pub external_id: String,
    /// Tag of the source the record was imported from
    pub source: String,
    /// Currency code reported by the source
    pub currency: String,
    /// Amount reported by the source
    pub amount: Decimal,
    /// Direction the source activity was normalized into
    pub kind: TransactionKind,
    /// Description reported by the source
    pub description: String,
    /// Date of the underlying activity
    pub date: DateTimeUtc,
    /// When the record was committed locally
    pub imported_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
