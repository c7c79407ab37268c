//! Import records and per-source watermarks.
//!
//! The import ledger remembers which external transaction ids have been
//! committed (exactly once each, first writer wins) and how far each source
//! has been imported. Watermarks only ever advance.

use crate::{
    entities::{ImportRecord, SyncState, import_record, sync_state, transaction::TransactionKind},
    errors::Result,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::OnConflict;
use sea_orm::{Set, prelude::*};

/// Metadata persisted for a committed external transaction.
#[derive(Debug, Clone)]
pub struct ImportedEntry {
    /// External id assigned by the source
    pub external_id: String,
    /// Source tag the entry was imported from
    pub source: String,
    /// Currency code reported by the source
    pub currency: String,
    /// Amount reported by the source
    pub amount: Decimal,
    /// Normalized direction
    pub kind: TransactionKind,
    /// Description reported by the source
    pub description: String,
    /// Date of the underlying activity
    pub date: DateTimeUtc,
}

/// Whether an external id has already been committed.
pub async fn is_imported<C: ConnectionTrait>(conn: &C, external_id: &str) -> Result<bool> {
    Ok(ImportRecord::find_by_id(external_id.to_string())
        .one(conn)
        .await?
        .is_some())
}

/// Records a committed external transaction.
///
/// First writer wins: if the id is already present the insert is a no-op and
/// the existing record is never updated.
pub async fn mark_imported<C: ConnectionTrait>(conn: &C, entry: ImportedEntry) -> Result<()> {
    let record = import_record::ActiveModel {
        external_id: Set(entry.external_id),
        source: Set(entry.source),
        currency: Set(entry.currency),
        amount: Set(entry.amount),
        kind: Set(entry.kind),
        description: Set(entry.description),
        date: Set(entry.date),
        imported_at: Set(Utc::now()),
    };

    ImportRecord::insert(record)
        .on_conflict(
            OnConflict::column(import_record::Column::ExternalId)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(conn)
        .await?;

    Ok(())
}

/// Reads the watermark for a source; `None` means nothing has ever been
/// imported and the source's full history is eligible.
pub async fn get_watermark<C: ConnectionTrait>(
    conn: &C,
    source: &str,
) -> Result<Option<DateTimeUtc>> {
    Ok(SyncState::find_by_id(source.to_string())
        .one(conn)
        .await?
        .map(|state| state.last_import))
}

/// Advances the watermark for a source. Monotonic: a time at or below the
/// stored watermark leaves it untouched.
pub async fn set_watermark<C: ConnectionTrait>(
    conn: &C,
    source: &str,
    time: DateTimeUtc,
) -> Result<()> {
    match SyncState::find_by_id(source.to_string()).one(conn).await? {
        Some(existing) if existing.last_import >= time => Ok(()),
        Some(existing) => {
            let mut active: sync_state::ActiveModel = existing.into();
            active.last_import = Set(time);
            active.update(conn).await?;
            Ok(())
        }
        None => {
            sync_state::ActiveModel {
                source: Set(source.to_string()),
                last_import: Set(time),
            }
            .insert(conn)
            .await?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn entry(external_id: &str) -> ImportedEntry {
        ImportedEntry {
            external_id: external_id.to_string(),
            source: "test".to_string(),
            currency: "USD".to_string(),
            amount: dec!(10),
            kind: TransactionKind::Income,
            description: "entry".to_string(),
            date: Utc::now() - Duration::hours(1),
        }
    }

    #[tokio::test]
    async fn test_mark_imported_first_writer_wins() -> Result<()> {
        let db = setup_test_db().await?;

        assert!(!is_imported(&db, "ext-1").await?);
        mark_imported(&db, entry("ext-1")).await?;
        assert!(is_imported(&db, "ext-1").await?);

        // Second write with the same id is a silent no-op
        let mut second = entry("ext-1");
        second.description = "changed".to_string();
        mark_imported(&db, second).await?;

        let stored = ImportRecord::find_by_id("ext-1".to_string())
            .one(&db)
            .await?
            .unwrap();
        assert_eq!(stored.description, "entry");

        Ok(())
    }

    #[tokio::test]
    async fn test_watermark_starts_absent() -> Result<()> {
        let db = setup_test_db().await?;
        assert!(get_watermark(&db, "btc").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_watermark_never_regresses() -> Result<()> {
        let db = setup_test_db().await?;
        let t1 = Utc::now() - Duration::days(2);
        let t2 = Utc::now() - Duration::days(1);

        set_watermark(&db, "btc", t2).await?;
        assert_eq!(get_watermark(&db, "btc").await?, Some(t2));

        // Older time is ignored
        set_watermark(&db, "btc", t1).await?;
        assert_eq!(get_watermark(&db, "btc").await?, Some(t2));

        // Newer time advances
        let t3 = Utc::now();
        set_watermark(&db, "btc", t3).await?;
        assert_eq!(get_watermark(&db, "btc").await?, Some(t3));

        Ok(())
    }

    #[tokio::test]
    async fn test_watermarks_are_per_source() -> Result<()> {
        let db = setup_test_db().await?;
        let t = Utc::now();

        set_watermark(&db, "btc", t).await?;
        assert!(get_watermark(&db, "checking").await?.is_none());

        Ok(())
    }
}
