//! GoCardless Bank Account Data source (open banking).
//!
//! Speaks the hosted Bank Account Data API:
//! `GET /accounts/{id}/transactions/` for booked transactions and
//! `GET /accounts/{id}/balances/` for the current balance, both behind a
//! bearer token. Booked amounts arrive as signed decimal strings; negative
//! amounts normalize to expenses.

use super::{NormalizedTransaction, SourceAdapter};
use crate::entities::transaction::TransactionKind;
use crate::errors::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// GoCardless Bank Account Data client
#[derive(Debug)]
pub struct GoCardlessSource {
    client: Client,
    base_url: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct TransactionsResponse {
    transactions: BookedTransactions,
}

#[derive(Debug, Deserialize)]
struct BookedTransactions {
    #[serde(default)]
    booked: Vec<BookedTransaction>,
}

#[derive(Debug, Deserialize)]
struct BookedTransaction {
    #[serde(rename = "transactionId")]
    transaction_id: String,
    #[serde(rename = "bookingDate")]
    booking_date: String,
    #[serde(rename = "transactionAmount")]
    transaction_amount: TransactionAmount,
    #[serde(rename = "remittanceInformationUnstructured")]
    remittance: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TransactionAmount {
    amount: String,
    currency: String,
}

#[derive(Debug, Deserialize)]
struct BalancesResponse {
    #[serde(default)]
    balances: Vec<Balance>,
}

#[derive(Debug, Deserialize)]
struct Balance {
    #[serde(rename = "balanceAmount")]
    balance_amount: TransactionAmount,
}

impl GoCardlessSource {
    /// Creates a client against the Bank Account Data base URL (e.g.
    /// `https://bankaccountdata.gocardless.com/api/v2`).
    pub fn new(base_url: String, token: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    fn parse_amount(raw: &str) -> Result<Decimal> {
        raw.parse::<Decimal>().map_err(|e| Error::SourceApi {
            name: "gocardless".to_string(),
            message: format!("unparseable amount '{raw}': {e}"),
        })
    }

    /// Booking dates arrive as plain `YYYY-MM-DD`; they are pinned to
    /// midnight UTC.
    fn parse_booking_date(raw: &str) -> Result<DateTime<Utc>> {
        let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| Error::SourceApi {
            name: "gocardless".to_string(),
            message: format!("unparseable booking date '{raw}': {e}"),
        })?;
        let midnight = date.and_hms_opt(0, 0, 0).ok_or_else(|| Error::SourceApi {
            name: "gocardless".to_string(),
            message: format!("invalid booking date '{raw}'"),
        })?;
        Ok(midnight.and_utc())
    }
}

#[async_trait]
impl SourceAdapter for GoCardlessSource {
    async fn fetch_transactions(
        &self,
        account: &str,
        limit: Option<u32>,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<NormalizedTransaction>> {
        let url = format!("{}/accounts/{}/transactions/", self.base_url, account);
        debug!(url = %url, "Fetching booked transactions");

        let mut request = self.client.get(&url).bearer_auth(&self.token);
        if let Some(from) = from {
            request = request.query(&[("date_from", from.format("%Y-%m-%d").to_string())]);
        }
        if let Some(to) = to {
            request = request.query(&[("date_to", to.format("%Y-%m-%d").to_string())]);
        }

        let response: TransactionsResponse = request
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut result = Vec::new();
        for booked in &response.transactions.booked {
            let signed = Self::parse_amount(&booked.transaction_amount.amount)?;
            if signed == Decimal::ZERO {
                continue;
            }

            let date = Self::parse_booking_date(&booked.booking_date)?;
            // The API filters by whole days only; enforce the exact bound
            if from.is_some_and(|bound| date < bound) || to.is_some_and(|bound| date > bound) {
                continue;
            }

            let kind = if signed > Decimal::ZERO {
                TransactionKind::Income
            } else {
                TransactionKind::Expense
            };

            result.push(NormalizedTransaction {
                external_id: booked.transaction_id.clone(),
                currency: booked.transaction_amount.currency.clone(),
                amount: signed.abs(),
                kind,
                description: booked
                    .remittance
                    .clone()
                    .unwrap_or_else(|| "Bank transaction".to_string()),
                date,
            });
        }

        result.sort_by_key(|tx| tx.date);
        if let Some(limit) = limit {
            result.truncate(limit as usize);
        }

        debug!(count = result.len(), "Normalized booked transactions");
        Ok(result)
    }

    async fn get_balance(&self, account: &str) -> Result<Decimal> {
        let url = format!("{}/accounts/{}/balances/", self.base_url, account);

        let response: BalancesResponse = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let balance = response.balances.first().ok_or_else(|| Error::SourceApi {
            name: "gocardless".to_string(),
            message: format!("account {account} reports no balances"),
        })?;

        Self::parse_amount(&balance.balance_amount.amount)
    }

    fn name(&self) -> &'static str {
        "gocardless"
    }
}
