//! Shared test utilities for FinSync.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.
#![allow(clippy::expect_used)]

use crate::{
    config::sources::{ImportSettings, SourceConfig},
    core::{category, transaction, wallet},
    entities,
    entities::{transaction::TransactionKind, wallet::WalletKind},
    errors::{Error, Result},
    sync::adapters::{NormalizedTransaction, SinkAdapter, SourceAdapter},
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use std::sync::atomic::{AtomicU32, Ordering};

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// The three seeded system categories, one per transaction kind.
pub struct TestCategories {
    /// "General Income"
    pub income: entities::category::Model,
    /// "General Expenses"
    pub expense: entities::category::Model,
    /// "Transfers"
    pub transfer: entities::category::Model,
}

/// Seeds the system categories and returns them for direct use in tests.
pub async fn seed_test_categories(db: &DatabaseConnection) -> Result<TestCategories> {
    category::seed_system_categories(db).await?;

    Ok(TestCategories {
        income: category::get_category_by_name(db, "General Income")
            .await?
            .expect("seeded"),
        expense: category::get_category_by_name(db, "General Expenses")
            .await?
            .expect("seeded"),
        transfer: category::get_category_by_name(db, "Transfers")
            .await?
            .expect("seeded"),
    })
}

/// Creates a test wallet with a zero balance.
///
/// # Defaults
/// * `kind`: bank
pub async fn create_test_wallet(
    db: &DatabaseConnection,
    name: &str,
    currency: &str,
) -> Result<entities::wallet::Model> {
    wallet::create_wallet(db, name.to_string(), currency.to_string(), WalletKind::Bank).await
}

/// Builds an income input with sensible defaults (dated one hour ago).
pub fn income_tx(wallet_id: i64, category_id: i64, amount: Decimal) -> transaction::NewTransaction {
    transaction::NewTransaction {
        amount,
        description: "Test income".to_string(),
        date: Utc::now() - Duration::hours(1),
        kind: TransactionKind::Income,
        wallet_id,
        category_id,
        dest_wallet_id: None,
        exchange_rate: None,
        tags: None,
    }
}

/// Builds an expense input with sensible defaults (dated one hour ago).
pub fn expense_tx(
    wallet_id: i64,
    category_id: i64,
    amount: Decimal,
) -> transaction::NewTransaction {
    transaction::NewTransaction {
        amount,
        description: "Test expense".to_string(),
        date: Utc::now() - Duration::hours(1),
        kind: TransactionKind::Expense,
        wallet_id,
        category_id,
        dest_wallet_id: None,
        exchange_rate: None,
        tags: None,
    }
}

/// Builds a transfer input with sensible defaults (dated one hour ago).
pub fn transfer_tx(
    wallet_id: i64,
    dest_wallet_id: Option<i64>,
    category_id: i64,
    amount: Decimal,
    exchange_rate: Option<Decimal>,
) -> transaction::NewTransaction {
    transaction::NewTransaction {
        amount,
        description: "Test transfer".to_string(),
        date: Utc::now() - Duration::hours(1),
        kind: TransactionKind::Transfer,
        wallet_id,
        category_id,
        dest_wallet_id,
        exchange_rate,
        tags: None,
    }
}

/// Creates and applies an income transaction.
pub async fn deposit(
    db: &DatabaseConnection,
    wallet_id: i64,
    category_id: i64,
    amount: Decimal,
) -> Result<entities::transaction::Model> {
    transaction::create_transaction(db, income_tx(wallet_id, category_id, amount)).await
}

/// Creates and applies an expense transaction.
pub async fn spend(
    db: &DatabaseConnection,
    wallet_id: i64,
    category_id: i64,
    amount: Decimal,
) -> Result<entities::transaction::Model> {
    transaction::create_transaction(db, expense_tx(wallet_id, category_id, amount)).await
}

/// Sets up a complete test environment with seeded categories and a USD
/// wallet. Returns (db, wallet, categories) for common test scenarios.
pub async fn setup_with_wallet() -> Result<(
    DatabaseConnection,
    entities::wallet::Model,
    TestCategories,
)> {
    let db = setup_test_db().await?;
    let categories = seed_test_categories(&db).await?;
    let wallet = create_test_wallet(&db, "Test Wallet", "USD").await?;
    Ok((db, wallet, categories))
}

/// Builds a normalized source transaction dated `hours_ago` hours in the
/// past.
pub fn normalized(
    external_id: &str,
    amount: Decimal,
    kind: TransactionKind,
    hours_ago: i64,
) -> NormalizedTransaction {
    NormalizedTransaction {
        external_id: external_id.to_string(),
        currency: "USD".to_string(),
        amount,
        kind,
        description: format!("Imported {external_id}"),
        date: Utc::now() - Duration::hours(hours_ago),
    }
}

/// Source config pointed at the entities `setup_with_wallet` creates.
pub fn test_source_config(name: &str) -> SourceConfig {
    SourceConfig {
        name: name.to_string(),
        provider: "mock".to_string(),
        endpoint: String::new(),
        account: "acct".to_string(),
        token: None,
        wallet: "Test Wallet".to_string(),
        income_category: "General Income".to_string(),
        expense_category: "General Expenses".to_string(),
        interval_secs: 3600,
        limit: None,
        start_date: None,
    }
}

/// Import settings tuned for tests: no backoff delay, short timeouts.
pub fn test_import_settings() -> ImportSettings {
    ImportSettings {
        dedup_window_hours: 12,
        retry_attempts: 3,
        retry_backoff_secs: 0,
        http_timeout_secs: 5,
        stop_timeout_secs: 5,
    }
}

/// Source adapter fake with a programmable feed and failure budget.
#[derive(Debug)]
pub struct MockSource {
    feed: Mutex<Vec<NormalizedTransaction>>,
    fail_times: AtomicU32,
    /// Number of fetch calls observed
    pub calls: AtomicU32,
}

impl MockSource {
    pub fn new(feed: Vec<NormalizedTransaction>) -> Self {
        Self::failing(feed, 0)
    }

    /// Fails the first `fail_times` fetches with a transient error before
    /// serving the feed.
    pub fn failing(feed: Vec<NormalizedTransaction>, fail_times: u32) -> Self {
        Self {
            feed: Mutex::new(feed),
            fail_times: AtomicU32::new(fail_times),
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl SourceAdapter for MockSource {
    async fn fetch_transactions(
        &self,
        _account: &str,
        limit: Option<u32>,
        _from: Option<DateTime<Utc>>,
        _to: Option<DateTime<Utc>>,
    ) -> Result<Vec<NormalizedTransaction>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_times.load(Ordering::SeqCst) > 0 {
            self.fail_times.fetch_sub(1, Ordering::SeqCst);
            return Err(Error::SourceApi {
                name: "mock".to_string(),
                message: "connection reset".to_string(),
            });
        }

        let mut feed = self.feed.lock().clone();
        if let Some(limit) = limit {
            feed.truncate(limit as usize);
        }
        Ok(feed)
    }

    async fn get_balance(&self, _account: &str) -> Result<Decimal> {
        Ok(Decimal::ZERO)
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Sink adapter fake recording mirrored external ids.
#[derive(Debug)]
pub struct MockSink {
    /// External ids of mirrored entries, in arrival order
    pub created: Mutex<Vec<String>>,
    fail: bool,
}

impl MockSink {
    pub fn new() -> Self {
        Self {
            created: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    /// A sink whose writes always fail.
    pub fn failing() -> Self {
        Self {
            created: Mutex::new(Vec::new()),
            fail: true,
        }
    }
}

impl Default for MockSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SinkAdapter for MockSink {
    async fn get_currency_id(&self, _account: &str) -> Result<String> {
        Ok("1".to_string())
    }

    async fn create_transaction(
        &self,
        _account: &str,
        _currency_id: &str,
        tx: &NormalizedTransaction,
    ) -> Result<()> {
        if self.fail {
            return Err(Error::Sink {
                message: "sink unavailable".to_string(),
            });
        }
        self.created.lock().push(tx.external_id.clone());
        Ok(())
    }
}
