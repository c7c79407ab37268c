//! Per-source import cycles.
//!
//! An [`Importer`] owns everything one configured source needs: the source
//! adapter, the optional sink, the local wallet/category mapping, and the
//! shared import settings. Each cycle reads the source watermark, fetches
//! new activity with a cancellable retry, walks the batch in ascending date
//! order, and commits each genuinely new entry inside one database
//! transaction together with its duplicate re-check and import record.
//! Committed entries are mirrored to the sink on a best-effort basis, and
//! the watermark advances to the maximum committed date only when at least
//! one entry was newly committed.

use crate::{
    config::sources::{ImportSettings, SourceConfig},
    core::{
        category, dedup,
        import_log::{self, ImportedEntry},
        transaction, wallet,
    },
    entities::transaction::TransactionKind,
    errors::{Error, Result},
    sync::adapters::{NormalizedTransaction, SinkAdapter, SourceAdapter},
};
use chrono::{DateTime, Duration as DateDuration, Utc};
use sea_orm::{DatabaseConnection, TransactionTrait};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Sink adapter plus the account committed entries are mirrored into.
#[derive(Clone)]
pub struct SinkTarget {
    /// The sink adapter
    pub adapter: Arc<dyn SinkAdapter>,
    /// Account identifier on the sink side
    pub account: String,
}

/// Outcome counters for one import cycle.
#[derive(Debug, Default, Clone)]
pub struct CycleReport {
    /// Entries newly committed to the ledger
    pub imported: usize,
    /// Entries skipped by the duplicate guard
    pub duplicates: usize,
    /// Entries rejected by ledger validation
    pub failed: usize,
    /// Per-entry and per-step errors collected along the way
    pub errors: Vec<String>,
}

/// Imports one configured source into the local ledger.
pub struct Importer {
    db: DatabaseConnection,
    source: Arc<dyn SourceAdapter>,
    sink: Option<SinkTarget>,
    config: SourceConfig,
    settings: ImportSettings,
}

impl Importer {
    pub fn new(
        db: DatabaseConnection,
        source: Arc<dyn SourceAdapter>,
        sink: Option<SinkTarget>,
        config: SourceConfig,
        settings: ImportSettings,
    ) -> Self {
        Self {
            db,
            source,
            sink,
            config,
            settings,
        }
    }

    /// The configured source name; doubles as the watermark key and the
    /// worker name.
    pub fn source_name(&self) -> &str {
        &self.config.name
    }

    /// Configured polling interval.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.config.interval_secs)
    }

    /// Runs one import cycle.
    ///
    /// Returns the cycle counters, or an error when the cycle as a whole had
    /// to be abandoned (mapping problems, fetch failure after retries, or a
    /// consistency violation). Individual entry failures never abort the
    /// cycle; they are counted in the report instead.
    pub async fn run_cycle(&self, shutdown: &mut watch::Receiver<bool>) -> Result<CycleReport> {
        let mut report = CycleReport::default();

        // Resolve the local mapping; without it nothing can be booked
        let target_wallet = wallet::get_wallet_by_name(&self.db, &self.config.wallet)
            .await?
            .ok_or_else(|| Error::Config {
                message: format!(
                    "source '{}': wallet '{}' does not exist",
                    self.config.name, self.config.wallet
                ),
            })?;
        let income_category =
            self.resolve_category(&self.config.income_category, TransactionKind::Income).await?;
        let expense_category =
            self.resolve_category(&self.config.expense_category, TransactionKind::Expense).await?;

        // Effective lower bound: explicit start date, else watermark, else all
        let watermark = import_log::get_watermark(&self.db, &self.config.name).await?;
        let since = self.config.start_date.or(watermark);
        debug!(source = %self.config.name, since = ?since, "Starting import cycle");

        let mut fetched = self.fetch_with_retry(since, shutdown).await?;
        if fetched.is_empty() {
            debug!(source = %self.config.name, "No new activity");
            return Ok(report);
        }

        // Ascending date order so the watermark never skips past an earlier,
        // still-unprocessed entry
        fetched.sort_by_key(|tx| tx.date);

        let sink_currency = match &self.sink {
            Some(sink) => match sink.adapter.get_currency_id(&sink.account).await {
                Ok(id) => Some(id),
                Err(e) => {
                    warn!(source = %self.config.name, error = %e, "Sink currency lookup failed; mirroring disabled for this cycle");
                    report.errors.push(format!("sink currency lookup: {e}"));
                    None
                }
            },
            None => None,
        };

        let window = DateDuration::hours(self.settings.dedup_window_hours);
        let mut max_committed: Option<DateTime<Utc>> = None;

        for item in &fetched {
            if *shutdown.borrow() {
                info!(source = %self.config.name, "Cancellation requested; abandoning the rest of the batch");
                break;
            }

            let category_id = match item.kind {
                TransactionKind::Income => income_category.id,
                TransactionKind::Expense => expense_category.id,
                TransactionKind::Transfer => {
                    report.failed += 1;
                    report.errors.push(format!(
                        "{}: sources cannot deliver transfers",
                        item.external_id
                    ));
                    continue;
                }
            };

            let candidate = dedup::Candidate {
                external_id: item.external_id.clone(),
                wallet_id: target_wallet.id,
                category_id,
                kind: item.kind,
                amount: item.amount,
                date: item.date,
                dest_wallet_id: None,
            };

            match self.commit_candidate(&candidate, item, window).await {
                Ok(true) => {
                    report.imported += 1;
                    max_committed =
                        Some(max_committed.map_or(item.date, |seen| seen.max(item.date)));

                    if let (Some(sink), Some(currency)) = (&self.sink, &sink_currency) {
                        if let Err(e) = sink
                            .adapter
                            .create_transaction(&sink.account, currency, item)
                            .await
                        {
                            warn!(source = %self.config.name, external_id = %item.external_id, error = %e, "Failed to mirror entry to sink");
                            report.errors.push(format!("sink {}: {e}", item.external_id));
                        }
                    }
                }
                Ok(false) => report.duplicates += 1,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) if e.is_validation() => {
                    warn!(source = %self.config.name, external_id = %item.external_id, error = %e, "Entry rejected by ledger validation");
                    report.failed += 1;
                    report.errors.push(format!("{}: {e}", item.external_id));
                }
                Err(e) => {
                    warn!(source = %self.config.name, external_id = %item.external_id, error = %e, "Entry could not be committed");
                    report.errors.push(format!("{}: {e}", item.external_id));
                }
            }
        }

        if report.imported > 0 {
            if let Some(max_committed) = max_committed {
                import_log::set_watermark(&self.db, &self.config.name, max_committed).await?;
                info!(
                    source = %self.config.name,
                    imported = report.imported,
                    duplicates = report.duplicates,
                    failed = report.failed,
                    watermark = %max_committed,
                    "Import cycle committed new activity"
                );
            }
        }

        Ok(report)
    }

    async fn resolve_category(
        &self,
        name: &str,
        expected: TransactionKind,
    ) -> Result<crate::entities::category::Model> {
        let found = category::get_category_by_name(&self.db, name)
            .await?
            .ok_or_else(|| Error::Config {
                message: format!(
                    "source '{}': category '{}' does not exist",
                    self.config.name, name
                ),
            })?;

        if found.kind != expected {
            return Err(Error::Config {
                message: format!(
                    "source '{}': category '{}' is '{}', expected '{}'",
                    self.config.name,
                    name,
                    found.kind.as_str(),
                    expected.as_str()
                ),
            });
        }

        Ok(found)
    }

    /// Fetches the batch, retrying transient failures with a linearly
    /// increasing delay. Cancellation aborts the wait immediately.
    async fn fetch_with_retry(
        &self,
        since: Option<DateTime<Utc>>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<Vec<NormalizedTransaction>> {
        let attempts = self.settings.retry_attempts.max(1);

        for attempt in 1..=attempts {
            match self
                .source
                .fetch_transactions(&self.config.account, self.config.limit, since, None)
                .await
            {
                Ok(batch) => return Ok(batch),
                Err(e) if e.is_transient() && attempt < attempts => {
                    let delay =
                        Duration::from_secs(self.settings.retry_backoff_secs * u64::from(attempt));
                    warn!(
                        source = %self.config.name,
                        attempt,
                        delay_secs = delay.as_secs(),
                        error = %e,
                        "Fetch failed; retrying"
                    );
                    tokio::select! {
                        () = tokio::time::sleep(delay) => {}
                        _ = shutdown.changed() => {
                            if *shutdown.borrow() {
                                return Err(e);
                            }
                        }
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Err(Error::SourceApi {
            name: self.config.name.clone(),
            message: "fetch attempts exhausted".to_string(),
        })
    }

    /// Commits one candidate inside a single database transaction: the
    /// duplicate guard, the ledger create pipeline, and the import record
    /// either all land or none do.
    ///
    /// Returns `Ok(true)` when the entry was newly committed and `Ok(false)`
    /// for duplicates. A validation rejection keeps the failed record (for
    /// attribution) but writes no import record, so the entry is never
    /// retried blindly: the semantic duplicate check suppresses identical
    /// re-deliveries on later cycles.
    async fn commit_candidate(
        &self,
        candidate: &dedup::Candidate,
        item: &NormalizedTransaction,
        window: DateDuration,
    ) -> Result<bool> {
        let txn = self.db.begin().await?;

        if dedup::is_duplicate(&txn, candidate, window).await? {
            debug!(external_id = %candidate.external_id, "Skipping duplicate");
            txn.rollback().await?;
            return Ok(false);
        }

        let new = transaction::NewTransaction {
            amount: candidate.amount,
            description: item.description.clone(),
            date: candidate.date,
            kind: candidate.kind,
            wallet_id: candidate.wallet_id,
            category_id: candidate.category_id,
            dest_wallet_id: None,
            exchange_rate: None,
            tags: None,
        };

        match transaction::create_transaction(&txn, new).await {
            Ok(_) => {
                import_log::mark_imported(
                    &txn,
                    ImportedEntry {
                        external_id: item.external_id.clone(),
                        source: self.config.name.clone(),
                        currency: item.currency.clone(),
                        amount: item.amount,
                        kind: item.kind,
                        description: item.description.clone(),
                        date: item.date,
                    },
                )
                .await?;
                txn.commit().await?;
                Ok(true)
            }
            Err(e) if e.is_validation() => {
                // The create pipeline left a failed record in this scope;
                // keep it, but record no import
                txn.commit().await?;
                Err(e)
            }
            Err(e) => {
                txn.rollback().await?;
                Err(e)
            }
        }
    }
}
