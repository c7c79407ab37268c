//! Sync state entity - Per-source import watermark.
//!
//! `last_import` is the timestamp below which the source's activity is
//! assumed fully imported. It only ever advances; a missing row means the
//! source has never completed an import.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Watermark database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sync_state")]
pub struct Model {
    /// Source identifier
    #[sea_orm(primary_key, auto_increment = false)]
    pub source: String,
    /// Maximum date among transactions committed for this source
    pub last_import: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
