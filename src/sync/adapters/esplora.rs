//! Esplora-compatible blockchain explorer source.
//!
//! Speaks the REST API exposed by Blockstream-style Esplora instances:
//! `GET /address/{addr}` for balance totals and `GET /address/{addr}/txs`
//! for confirmed transaction history. Each on-chain transaction is reduced
//! to the net satoshi flow for the watched address and normalized into an
//! income or expense entry with the amount scaled to whole coins.

use super::{NormalizedTransaction, SourceAdapter};
use crate::entities::transaction::TransactionKind;
use crate::errors::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Esplora explorer client
#[derive(Debug)]
pub struct EsploraSource {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct AddressInfo {
    chain_stats: ChainStats,
}

#[derive(Debug, Deserialize)]
struct ChainStats {
    funded_txo_sum: i64,
    spent_txo_sum: i64,
}

#[derive(Debug, Deserialize)]
struct Tx {
    txid: String,
    status: TxStatus,
    #[serde(default)]
    vin: Vec<Vin>,
    #[serde(default)]
    vout: Vec<Vout>,
}

#[derive(Debug, Deserialize)]
struct TxStatus {
    confirmed: bool,
    block_time: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Vin {
    prevout: Option<Vout>,
}

#[derive(Debug, Deserialize)]
struct Vout {
    scriptpubkey_address: Option<String>,
    value: i64,
}

impl EsploraSource {
    /// Creates a client against an Esplora base URL (e.g.
    /// `https://blockstream.info/api`).
    pub fn new(base_url: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    /// Satoshis carry eight decimal places.
    fn sats_to_coin(sats: i64) -> Decimal {
        Decimal::new(sats, 8)
    }

    /// Net satoshi flow of a transaction for the watched address: outputs to
    /// the address minus inputs spent from it.
    fn net_flow(tx: &Tx, address: &str) -> i64 {
        let received: i64 = tx
            .vout
            .iter()
            .filter(|out| out.scriptpubkey_address.as_deref() == Some(address))
            .map(|out| out.value)
            .sum();
        let spent: i64 = tx
            .vin
            .iter()
            .filter_map(|input| input.prevout.as_ref())
            .filter(|prev| prev.scriptpubkey_address.as_deref() == Some(address))
            .map(|prev| prev.value)
            .sum();
        received - spent
    }
}

#[async_trait]
impl SourceAdapter for EsploraSource {
    async fn fetch_transactions(
        &self,
        account: &str,
        limit: Option<u32>,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<NormalizedTransaction>> {
        let url = format!("{}/address/{}/txs", self.base_url, account);
        debug!(url = %url, "Fetching address transactions");

        let txs: Vec<Tx> = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut result = Vec::new();
        for tx in &txs {
            // Unconfirmed activity has no stable date yet
            let Some(block_time) = tx.status.block_time.filter(|_| tx.status.confirmed) else {
                continue;
            };
            let Some(date) = DateTime::from_timestamp(block_time, 0) else {
                return Err(Error::SourceApi {
                    name: "esplora".to_string(),
                    message: format!("transaction {} has an invalid block time", tx.txid),
                });
            };

            // Keep entries at the bound itself; the duplicate guard filters
            // anything already committed
            if from.is_some_and(|bound| date < bound) || to.is_some_and(|bound| date > bound) {
                continue;
            }

            let net = Self::net_flow(tx, account);
            if net == 0 {
                continue;
            }

            let kind = if net > 0 {
                TransactionKind::Income
            } else {
                TransactionKind::Expense
            };

            result.push(NormalizedTransaction {
                external_id: tx.txid.clone(),
                currency: "BTC".to_string(),
                amount: Self::sats_to_coin(net.abs()),
                kind,
                description: format!("On-chain transaction {}", tx.txid),
                date,
            });
        }

        result.sort_by_key(|tx| tx.date);
        if let Some(limit) = limit {
            result.truncate(limit as usize);
        }

        debug!(count = result.len(), "Normalized address transactions");
        Ok(result)
    }

    async fn get_balance(&self, account: &str) -> Result<Decimal> {
        let url = format!("{}/address/{}", self.base_url, account);

        let info: AddressInfo = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(Self::sats_to_coin(
            info.chain_stats.funded_txo_sum - info.chain_stats.spent_txo_sum,
        ))
    }

    fn name(&self) -> &'static str {
        "esplora"
    }
}
