//! Source and sink adapter contracts and the provider factory.
//!
//! The import workers depend only on the [`SourceAdapter`] and
//! [`SinkAdapter`] traits; concrete providers are resolved from their config
//! tag exactly once at startup. Adapters own their authentication below the
//! HTTP layer - the importer only retries a fetch call as a whole.

use crate::config::sources::{SinkConfig, SourceConfig};
use crate::entities::transaction::TransactionKind;
use crate::errors::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

/// Esplora-compatible blockchain explorer source
pub mod esplora;
/// Firefly III finance tool sink
pub mod firefly;
/// GoCardless Bank Account Data source
pub mod gocardless;

/// The adapter-agnostic shape every source must map its activity into.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTransaction {
    /// External id assigned by the source
    pub external_id: String,
    /// Currency code reported by the source
    pub currency: String,
    /// Unsigned amount; direction is carried by `kind`
    pub amount: Decimal,
    /// Normalized direction hint (income or expense)
    pub kind: TransactionKind,
    /// Description reported by the source
    pub description: String,
    /// Date of the underlying activity
    pub date: DateTime<Utc>,
}

/// Read contract every external activity source implements.
#[async_trait]
pub trait SourceAdapter: Send + Sync + std::fmt::Debug {
    /// Fetch activity for an account, bounded by an optional record limit
    /// and date range. Order is not guaranteed; callers sort.
    async fn fetch_transactions(
        &self,
        account: &str,
        limit: Option<u32>,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<NormalizedTransaction>>;

    /// Current balance of the account as reported by the source.
    async fn get_balance(&self, account: &str) -> Result<Decimal>;

    /// Provider tag for logging.
    fn name(&self) -> &'static str;
}

/// Write contract of the external finance tool committed entries are
/// mirrored into.
#[async_trait]
pub trait SinkAdapter: Send + Sync + std::fmt::Debug {
    /// Currency id the sink uses for the given account.
    async fn get_currency_id(&self, account: &str) -> Result<String>;

    /// Mirror one committed transaction into the sink.
    async fn create_transaction(
        &self,
        account: &str,
        currency_id: &str,
        tx: &NormalizedTransaction,
    ) -> Result<()>;
}

/// Resolves a source provider tag to a concrete adapter.
pub fn build_source(
    config: &SourceConfig,
    http_timeout: Duration,
) -> Result<Arc<dyn SourceAdapter>> {
    match config.provider.as_str() {
        "esplora" => Ok(Arc::new(esplora::EsploraSource::new(
            config.endpoint.clone(),
            http_timeout,
        )?)),
        "gocardless" => {
            let token = config.token.clone().ok_or_else(|| Error::Config {
                message: format!("source '{}' requires a token", config.name),
            })?;
            Ok(Arc::new(gocardless::GoCardlessSource::new(
                config.endpoint.clone(),
                token,
                http_timeout,
            )?))
        }
        other => Err(Error::UnknownProvider {
            name: other.to_string(),
        }),
    }
}

/// Resolves a sink provider tag to a concrete adapter.
pub fn build_sink(config: &SinkConfig, http_timeout: Duration) -> Result<Arc<dyn SinkAdapter>> {
    match config.provider.as_str() {
        "firefly" => Ok(Arc::new(firefly::FireflySink::new(
            config.endpoint.clone(),
            config.token.clone(),
            http_timeout,
        )?)),
        other => Err(Error::UnknownProvider {
            name: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn source_config(provider: &str, token: Option<&str>) -> SourceConfig {
        SourceConfig {
            name: "test".to_string(),
            provider: provider.to_string(),
            endpoint: "http://localhost".to_string(),
            account: "acct".to_string(),
            token: token.map(ToString::to_string),
            wallet: "Wallet".to_string(),
            income_category: "General Income".to_string(),
            expense_category: "General Expenses".to_string(),
            interval_secs: 300,
            limit: None,
            start_date: None,
        }
    }

    #[test]
    fn test_build_source_resolves_known_providers() {
        let timeout = Duration::from_secs(5);

        let esplora = build_source(&source_config("esplora", None), timeout).unwrap();
        assert_eq!(esplora.name(), "esplora");

        let gocardless =
            build_source(&source_config("gocardless", Some("token")), timeout).unwrap();
        assert_eq!(gocardless.name(), "gocardless");
    }

    #[test]
    fn test_build_source_unknown_provider() {
        let result = build_source(&source_config("no-such", None), Duration::from_secs(5));
        assert!(matches!(
            result.unwrap_err(),
            Error::UnknownProvider { .. }
        ));
    }

    #[test]
    fn test_build_source_gocardless_requires_token() {
        let result = build_source(&source_config("gocardless", None), Duration::from_secs(5));
        assert!(matches!(result.unwrap_err(), Error::Config { .. }));
    }

    #[test]
    fn test_build_sink_unknown_provider() {
        let config = SinkConfig {
            provider: "no-such".to_string(),
            endpoint: "http://localhost".to_string(),
            token: "token".to_string(),
            account: "1".to_string(),
        };
        let result = build_sink(&config, Duration::from_secs(5));
        assert!(matches!(
            result.unwrap_err(),
            Error::UnknownProvider { .. }
        ));
    }
}
