//! Firefly III finance tool sink.
//!
//! Mirrors committed ledger entries into a Firefly III instance:
//! `POST /api/v1/transactions` to store an entry and
//! `GET /api/v1/accounts/{id}` to resolve the currency id Firefly expects
//! on stored transactions.

use super::{NormalizedTransaction, SinkAdapter};
use crate::entities::transaction::TransactionKind;
use crate::errors::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Firefly III API client
#[derive(Debug)]
pub struct FireflySink {
    client: Client,
    base_url: String,
    token: String,
}

#[derive(Debug, Serialize)]
struct StoreTransactionRequest<'a> {
    error_if_duplicate_hash: bool,
    transactions: Vec<TransactionSplit<'a>>,
}

#[derive(Debug, Serialize)]
struct TransactionSplit<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    date: String,
    amount: String,
    description: &'a str,
    currency_id: &'a str,
    external_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    destination_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    data: AccountData,
}

#[derive(Debug, Deserialize)]
struct AccountData {
    attributes: AccountAttributes,
}

#[derive(Debug, Deserialize)]
struct AccountAttributes {
    currency_id: String,
}

impl FireflySink {
    /// Creates a client against a Firefly III base URL (e.g.
    /// `https://firefly.example.com`).
    pub fn new(base_url: String, token: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url,
            token,
        })
    }
}

#[async_trait]
impl SinkAdapter for FireflySink {
    async fn get_currency_id(&self, account: &str) -> Result<String> {
        let url = format!("{}/api/v1/accounts/{}", self.base_url, account);

        let response: AccountResponse = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response.data.attributes.currency_id)
    }

    async fn create_transaction(
        &self,
        account: &str,
        currency_id: &str,
        tx: &NormalizedTransaction,
    ) -> Result<()> {
        // Firefly models direction through the account position: deposits
        // arrive at the account, withdrawals leave it
        let (kind, source_id, destination_id) = match tx.kind {
            TransactionKind::Income => ("deposit", None, Some(account)),
            TransactionKind::Expense => ("withdrawal", Some(account), None),
            TransactionKind::Transfer => ("transfer", Some(account), None),
        };

        let request = StoreTransactionRequest {
            error_if_duplicate_hash: false,
            transactions: vec![TransactionSplit {
                kind,
                date: tx.date.to_rfc3339(),
                amount: tx.amount.to_string(),
                description: &tx.description,
                currency_id,
                external_id: &tx.external_id,
                source_id,
                destination_id,
            }],
        };

        let url = format!("{}/api/v1/transactions", self.base_url);
        debug!(url = %url, external_id = %tx.external_id, "Mirroring transaction");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Sink {
                message: format!("storing transaction failed with {status}: {body}"),
            });
        }

        Ok(())
    }
}
