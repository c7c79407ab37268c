//! Duplicate detection for imported transactions.
//!
//! Two independent checks decide whether an externally fetched transaction
//! is a re-delivery: an exact external-id lookup against the import ledger,
//! and a semantic match against existing transactions with the same wallet,
//! kind, category, and amount inside a symmetric date window. The semantic
//! check defends against sources that re-assign ids to the same activity.
//!
//! Both checks are read-only. Import workers evaluate them inside the same
//! database transaction that commits the entry, so two concurrent cycles
//! cannot both book the same activity.

use crate::{
    core::import_log,
    entities::{Transaction, transaction, transaction::TransactionKind},
    errors::Result,
};
use chrono::Duration;
use rust_decimal::Decimal;
use sea_orm::prelude::*;

/// A candidate external transaction, already mapped onto local wallet and
/// category ids.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// External id assigned by the source
    pub external_id: String,
    /// Local wallet the candidate would be booked against
    pub wallet_id: i64,
    /// Local category the candidate would be booked under
    pub category_id: i64,
    /// Direction of the candidate
    pub kind: TransactionKind,
    /// Amount, always positive
    pub amount: Decimal,
    /// Date of the underlying activity
    pub date: DateTimeUtc,
    /// Destination wallet, for transfers
    pub dest_wallet_id: Option<i64>,
}

/// Decides whether a candidate is a re-delivery of something already
/// applied.
///
/// `window` is the half-width of the semantic date window: an existing
/// transaction with identical wallet, kind, category, and amount whose date
/// lies within ±`window` of the candidate's date counts as a duplicate.
/// For transfers the destination wallet must match as well.
pub async fn is_duplicate<C: ConnectionTrait>(
    conn: &C,
    candidate: &Candidate,
    window: Duration,
) -> Result<bool> {
    // Identity check: exact external-id match in the import ledger
    if import_log::is_imported(conn, &candidate.external_id).await? {
        return Ok(true);
    }

    // Semantic check: attribute equality within the date window
    let from = candidate.date - window;
    let to = candidate.date + window;

    let mut query = Transaction::find()
        .filter(transaction::Column::WalletId.eq(candidate.wallet_id))
        .filter(transaction::Column::Kind.eq(candidate.kind))
        .filter(transaction::Column::CategoryId.eq(candidate.category_id))
        .filter(transaction::Column::Amount.eq(candidate.amount))
        .filter(transaction::Column::Date.between(from, to));

    if candidate.kind == TransactionKind::Transfer {
        query = query.filter(transaction::Column::DestWalletId.eq(candidate.dest_wallet_id));
    }

    Ok(query.one(conn).await?.is_some())
}
