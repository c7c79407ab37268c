//! Transaction business logic - The ledger's apply/reverse pipeline.
//!
//! All transaction mutations run through this module, whether they originate
//! from an import worker or an operator. Each of the create/update/delete
//! pipelines executes inside a single database transaction: validation,
//! balance effects, the audit history entry, and the status change commit
//! together or not at all. Reversal is the exact algebraic inverse of apply
//! for the recorded kind, amount, and exchange rate, and never re-validates
//! balance sufficiency.

use crate::{
    core::wallet::{BalanceChange, adjust_balance},
    entities::{
        Category, Transaction, TransactionHistory, TransactionHistoryColumn, Wallet,
        transaction::{self, TransactionKind, TransactionStatus},
        transaction_history::{self, HistoryAction},
    },
    errors::{Error, Result},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{Condition, PaginatorTrait, QueryOrder, Set, TransactionTrait, prelude::*};

/// Input for creating a transaction.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    /// Amount, always positive; direction comes from `kind`
    pub amount: Decimal,
    /// Human-readable description
    pub description: String,
    /// When the transaction occurred
    pub date: DateTimeUtc,
    /// Direction of the transaction
    pub kind: TransactionKind,
    /// Source wallet
    pub wallet_id: i64,
    /// Category; must share the transaction's kind
    pub category_id: i64,
    /// Destination wallet, for transfers
    pub dest_wallet_id: Option<i64>,
    /// Exchange rate for cross-currency transfers
    pub exchange_rate: Option<Decimal>,
    /// Optional comma-separated tags
    pub tags: Option<String>,
}

/// Field changes for updating a transaction. `None` keeps the stored value;
/// the double-`Option` fields distinguish "keep" from "clear".
#[derive(Debug, Clone, Default)]
pub struct TransactionChanges {
    pub amount: Option<Decimal>,
    pub description: Option<String>,
    pub date: Option<DateTimeUtc>,
    pub kind: Option<TransactionKind>,
    pub wallet_id: Option<i64>,
    pub category_id: Option<i64>,
    pub dest_wallet_id: Option<Option<i64>>,
    pub exchange_rate: Option<Option<Decimal>>,
    pub tags: Option<Option<String>>,
}

/// Balance changes produced by one apply or reverse, feeding the audit
/// history.
#[derive(Debug, Clone)]
pub struct LedgerEffect {
    /// Source wallet change
    pub source: BalanceChange,
    /// Destination wallet change, for transfers
    pub dest: Option<BalanceChange>,
}

/// Retrieves a specific transaction by its unique ID.
pub async fn get_transaction_by_id<C: ConnectionTrait>(
    db: &C,
    transaction_id: i64,
) -> Result<Option<transaction::Model>> {
    Transaction::find_by_id(transaction_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Retrieves all transactions touching a wallet as source or destination,
/// newest first.
pub async fn get_transactions_for_wallet<C: ConnectionTrait>(
    db: &C,
    wallet_id: i64,
) -> Result<Vec<transaction::Model>> {
    Transaction::find()
        .filter(
            Condition::any()
                .add(transaction::Column::WalletId.eq(wallet_id))
                .add(transaction::Column::DestWalletId.eq(wallet_id)),
        )
        .order_by_desc(transaction::Column::Date)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Retrieves the audit history for a transaction, oldest first.
pub async fn get_history_for_transaction<C: ConnectionTrait>(
    db: &C,
    transaction_id: i64,
) -> Result<Vec<transaction_history::Model>> {
    TransactionHistory::find()
        .filter(TransactionHistoryColumn::TransactionId.eq(transaction_id))
        .order_by_asc(TransactionHistoryColumn::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Validates a candidate transaction against the ledger rules without
/// mutating anything.
///
/// Rules: positive amount; date not in the future; wallet and category must
/// exist and the category's kind must match; expenses and transfers need
/// sufficient source balance; transfers need a distinct destination wallet
/// and, across currencies, an exchange rate.
async fn validate<C: ConnectionTrait>(conn: &C, tx: &NewTransaction) -> Result<()> {
    if tx.amount <= Decimal::ZERO {
        return Err(Error::InvalidAmount { amount: tx.amount });
    }

    if tx.date > Utc::now() {
        return Err(Error::FutureDate { date: tx.date });
    }

    let wallet = Wallet::find_by_id(tx.wallet_id)
        .one(conn)
        .await?
        .ok_or_else(|| Error::WalletNotFound {
            wallet: tx.wallet_id.to_string(),
        })?;

    let category = Category::find_by_id(tx.category_id)
        .one(conn)
        .await?
        .ok_or_else(|| Error::CategoryNotFound {
            category: tx.category_id.to_string(),
        })?;

    if category.kind != tx.kind {
        return Err(Error::CategoryKindMismatch {
            category: category.name,
            category_kind: category.kind.as_str().to_string(),
            transaction_kind: tx.kind.as_str().to_string(),
        });
    }

    match tx.kind {
        TransactionKind::Income => {}
        TransactionKind::Expense => {
            if wallet.balance < tx.amount {
                return Err(Error::InsufficientFunds {
                    current: wallet.balance,
                    required: tx.amount,
                });
            }
        }
        TransactionKind::Transfer => {
            let dest_id = tx.dest_wallet_id.ok_or(Error::MissingDestinationWallet)?;
            if dest_id == tx.wallet_id {
                return Err(Error::SameWalletTransfer);
            }

            let dest = Wallet::find_by_id(dest_id)
                .one(conn)
                .await?
                .ok_or_else(|| Error::WalletNotFound {
                    wallet: dest_id.to_string(),
                })?;

            if wallet.balance < tx.amount {
                return Err(Error::InsufficientFunds {
                    current: wallet.balance,
                    required: tx.amount,
                });
            }

            if wallet.currency != dest.currency && tx.exchange_rate.is_none() {
                return Err(Error::MissingExchangeRate {
                    from_currency: wallet.currency,
                    to_currency: dest.currency,
                });
            }
        }
    }

    Ok(())
}

/// Exchange rate actually applied to a transfer's destination leg.
///
/// A supplied rate only counts when it is positive and the two wallets use
/// different currencies; anything else falls back to 1.0.
fn effective_rate(rate: Option<Decimal>, same_currency: bool) -> Decimal {
    match rate {
        Some(r) if r > Decimal::ZERO && !same_currency => r,
        _ => Decimal::ONE,
    }
}

/// Looks up the rate for a stored transfer from its wallets' currencies.
async fn stored_transfer_rate<C: ConnectionTrait>(
    conn: &C,
    tx: &transaction::Model,
    dest_id: i64,
) -> Result<Decimal> {
    let source = Wallet::find_by_id(tx.wallet_id)
        .one(conn)
        .await?
        .ok_or_else(|| Error::Consistency {
            message: format!("source wallet {} missing for transaction {}", tx.wallet_id, tx.id),
        })?;
    let dest = Wallet::find_by_id(dest_id)
        .one(conn)
        .await?
        .ok_or_else(|| Error::Consistency {
            message: format!("destination wallet {dest_id} missing for transaction {}", tx.id),
        })?;

    Ok(effective_rate(tx.exchange_rate, source.currency == dest.currency))
}

/// Applies a transaction's effect to the wallets it touches.
async fn apply_effect<C: ConnectionTrait>(
    conn: &C,
    tx: &transaction::Model,
) -> Result<LedgerEffect> {
    match tx.kind {
        TransactionKind::Income => Ok(LedgerEffect {
            source: adjust_balance(conn, tx.wallet_id, tx.amount).await?,
            dest: None,
        }),
        TransactionKind::Expense => Ok(LedgerEffect {
            source: adjust_balance(conn, tx.wallet_id, -tx.amount).await?,
            dest: None,
        }),
        TransactionKind::Transfer => {
            let dest_id = tx.dest_wallet_id.ok_or_else(|| Error::Consistency {
                message: format!("transfer {} has no destination wallet", tx.id),
            })?;
            let rate = stored_transfer_rate(conn, tx, dest_id).await?;

            let source = adjust_balance(conn, tx.wallet_id, -tx.amount).await?;
            let dest = adjust_balance(conn, dest_id, tx.amount * rate).await?;
            Ok(LedgerEffect {
                source,
                dest: Some(dest),
            })
        }
    }
}

/// Reverses a previously applied effect: the exact algebraic inverse of
/// [`apply_effect`] for the recorded kind, amount, and exchange rate.
///
/// Balance sufficiency is not re-checked; a committed effect must always be
/// reversible. Failures here are consistency violations.
async fn reverse_effect<C: ConnectionTrait>(
    conn: &C,
    tx: &transaction::Model,
) -> Result<LedgerEffect> {
    let consistency = |e: Error| Error::Consistency {
        message: format!("failed to reverse transaction {}: {e}", tx.id),
    };

    match tx.kind {
        TransactionKind::Income => Ok(LedgerEffect {
            source: adjust_balance(conn, tx.wallet_id, -tx.amount)
                .await
                .map_err(consistency)?,
            dest: None,
        }),
        TransactionKind::Expense => Ok(LedgerEffect {
            source: adjust_balance(conn, tx.wallet_id, tx.amount)
                .await
                .map_err(consistency)?,
            dest: None,
        }),
        TransactionKind::Transfer => {
            let dest_id = tx.dest_wallet_id.ok_or_else(|| Error::Consistency {
                message: format!("transfer {} has no destination wallet", tx.id),
            })?;
            let rate = stored_transfer_rate(conn, tx, dest_id).await?;

            let source = adjust_balance(conn, tx.wallet_id, tx.amount)
                .await
                .map_err(consistency)?;
            let dest = adjust_balance(conn, dest_id, -(tx.amount * rate))
                .await
                .map_err(consistency)?;
            Ok(LedgerEffect {
                source,
                dest: Some(dest),
            })
        }
    }
}

/// Whether the transaction's effect is currently reflected in balances.
///
/// Completed records are applied; pending ones never were. A failed record
/// is applied only if it completed at least once before a later update was
/// rejected (visible as history entries), in which case its stored fields
/// still describe the applied effect.
async fn effect_is_applied<C: ConnectionTrait>(
    conn: &C,
    tx: &transaction::Model,
) -> Result<bool> {
    match tx.status {
        TransactionStatus::Completed => Ok(true),
        TransactionStatus::Pending => Ok(false),
        TransactionStatus::Failed => {
            let entries = TransactionHistory::find()
                .filter(TransactionHistoryColumn::TransactionId.eq(tx.id))
                .count(conn)
                .await?;
            Ok(entries > 0)
        }
    }
}

/// Writes one append-only audit entry for a balance-changing mutation.
async fn write_history<C: ConnectionTrait>(
    conn: &C,
    transaction_id: i64,
    action: HistoryAction,
    effect: &LedgerEffect,
    before: Option<&transaction::Model>,
    after: Option<&transaction::Model>,
) -> Result<()> {
    let entry = transaction_history::ActiveModel {
        transaction_id: Set(transaction_id),
        action: Set(action),
        timestamp: Set(Utc::now()),
        wallet_id: Set(effect.source.wallet_id),
        old_balance: Set(effect.source.old_balance),
        new_balance: Set(effect.source.new_balance),
        dest_wallet_id: Set(effect.dest.as_ref().map(|d| d.wallet_id)),
        old_dest_balance: Set(effect.dest.as_ref().map(|d| d.old_balance)),
        new_dest_balance: Set(effect.dest.as_ref().map(|d| d.new_balance)),
        before_snapshot: Set(before.map(serde_json::to_value).transpose()?),
        after_snapshot: Set(after.map(serde_json::to_value).transpose()?),
        ..Default::default()
    };

    entry.insert(conn).await?;
    Ok(())
}

/// Inserts a transaction row with the given status.
async fn insert_record<C: ConnectionTrait>(
    conn: &C,
    new: &NewTransaction,
    status: TransactionStatus,
) -> Result<transaction::Model> {
    let now = Utc::now();
    let record = transaction::ActiveModel {
        amount: Set(new.amount),
        description: Set(new.description.clone()),
        date: Set(new.date),
        kind: Set(new.kind),
        status: Set(status),
        wallet_id: Set(new.wallet_id),
        category_id: Set(new.category_id),
        dest_wallet_id: Set(new.dest_wallet_id),
        exchange_rate: Set(new.exchange_rate),
        tags: Set(new.tags.clone()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    record.insert(conn).await.map_err(Into::into)
}

/// Marks a stored transaction as failed without touching anything else.
async fn mark_failed<C: ConnectionTrait>(conn: &C, transaction_id: i64) -> Result<()> {
    let Some(tx) = Transaction::find_by_id(transaction_id).one(conn).await? else {
        return Ok(());
    };

    let mut active: transaction::ActiveModel = tx.into();
    active.status = Set(TransactionStatus::Failed);
    active.updated_at = Set(Utc::now());
    active.update(conn).await?;
    Ok(())
}

/// Whether a rejected candidate can be persisted as a failed record.
///
/// Records referencing wallets or categories that do not exist cannot be
/// stored at all; every other rule violation keeps an attributable trace.
fn can_persist_failed(e: &Error) -> bool {
    e.is_validation()
        && !matches!(
            e,
            Error::WalletNotFound { .. } | Error::CategoryNotFound { .. }
        )
}

/// Creates a transaction and applies its balance effect.
///
/// Pipeline: validate → insert pending → apply → history("created") →
/// status=completed, all inside one database transaction. On a validation
/// failure nothing is applied; where possible the rejected input is still
/// persisted with status=failed so the outcome stays attributable.
pub async fn create_transaction<C>(db: &C, new: NewTransaction) -> Result<transaction::Model>
where
    C: ConnectionTrait + TransactionTrait,
{
    let txn = db.begin().await?;

    if let Err(e) = validate(&txn, &new).await {
        txn.rollback().await?;
        if can_persist_failed(&e) {
            insert_record(db, &new, TransactionStatus::Failed).await?;
        }
        return Err(e);
    }

    let pending = insert_record(&txn, &new, TransactionStatus::Pending).await?;
    let effect = apply_effect(&txn, &pending).await?;

    let mut active: transaction::ActiveModel = pending.into();
    active.status = Set(TransactionStatus::Completed);
    active.updated_at = Set(Utc::now());
    let completed = active.update(&txn).await?;

    write_history(
        &txn,
        completed.id,
        HistoryAction::Created,
        &effect,
        None,
        Some(&completed),
    )
    .await?;

    txn.commit().await?;
    Ok(completed)
}

/// Updates a transaction: re-validates, reverses the prior applied effect,
/// and applies the new one, atomically.
///
/// On a validation failure the scope rolls back (no balance mutation) and
/// the stored record is marked failed; its previously applied effect remains
/// in the balances and stays reversible through [`delete_transaction`].
pub async fn update_transaction<C>(
    db: &C,
    transaction_id: i64,
    changes: TransactionChanges,
) -> Result<transaction::Model>
where
    C: ConnectionTrait + TransactionTrait,
{
    let txn = db.begin().await?;

    let old = Transaction::find_by_id(transaction_id)
        .one(&txn)
        .await?
        .ok_or(Error::TransactionNotFound { id: transaction_id })?;

    let candidate = NewTransaction {
        amount: changes.amount.unwrap_or(old.amount),
        description: changes
            .description
            .clone()
            .unwrap_or_else(|| old.description.clone()),
        date: changes.date.unwrap_or(old.date),
        kind: changes.kind.unwrap_or(old.kind),
        wallet_id: changes.wallet_id.unwrap_or(old.wallet_id),
        category_id: changes.category_id.unwrap_or(old.category_id),
        dest_wallet_id: changes.dest_wallet_id.unwrap_or(old.dest_wallet_id),
        exchange_rate: changes.exchange_rate.unwrap_or(old.exchange_rate),
        tags: changes.tags.clone().unwrap_or_else(|| old.tags.clone()),
    };

    if let Err(e) = validate(&txn, &candidate).await {
        txn.rollback().await?;
        if e.is_validation() {
            mark_failed(db, transaction_id).await?;
        }
        return Err(e);
    }

    // Balances before any mutation, for the combined audit entry
    let source_before = wallet_balance(&txn, candidate.wallet_id).await?;
    let dest_before = match candidate.dest_wallet_id {
        Some(dest_id) if candidate.kind == TransactionKind::Transfer => {
            Some(wallet_balance(&txn, dest_id).await?)
        }
        _ => None,
    };

    if effect_is_applied(&txn, &old).await? {
        reverse_effect(&txn, &old).await?;
    }

    let mut active: transaction::ActiveModel = old.clone().into();
    active.amount = Set(candidate.amount);
    active.description = Set(candidate.description.clone());
    active.date = Set(candidate.date);
    active.kind = Set(candidate.kind);
    active.status = Set(TransactionStatus::Completed);
    active.wallet_id = Set(candidate.wallet_id);
    active.category_id = Set(candidate.category_id);
    active.dest_wallet_id = Set(candidate.dest_wallet_id);
    active.exchange_rate = Set(candidate.exchange_rate);
    active.tags = Set(candidate.tags.clone());
    active.updated_at = Set(Utc::now());
    let updated = active.update(&txn).await?;

    apply_effect(&txn, &updated).await?;

    let source_after = wallet_balance(&txn, updated.wallet_id).await?;
    let dest = match (updated.dest_wallet_id, dest_before) {
        (Some(dest_id), Some(old_balance)) => Some(BalanceChange {
            wallet_id: dest_id,
            old_balance,
            new_balance: wallet_balance(&txn, dest_id).await?,
        }),
        _ => None,
    };

    let effect = LedgerEffect {
        source: BalanceChange {
            wallet_id: updated.wallet_id,
            old_balance: source_before,
            new_balance: source_after,
        },
        dest,
    };

    write_history(
        &txn,
        updated.id,
        HistoryAction::Updated,
        &effect,
        Some(&old),
        Some(&updated),
    )
    .await?;

    txn.commit().await?;
    Ok(updated)
}

/// Deletes a transaction, reversing its applied effect first.
pub async fn delete_transaction<C>(db: &C, transaction_id: i64) -> Result<()>
where
    C: ConnectionTrait + TransactionTrait,
{
    let txn = db.begin().await?;

    let tx = Transaction::find_by_id(transaction_id)
        .one(&txn)
        .await?
        .ok_or(Error::TransactionNotFound { id: transaction_id })?;

    if effect_is_applied(&txn, &tx).await? {
        let effect = reverse_effect(&txn, &tx).await?;
        write_history(&txn, tx.id, HistoryAction::Deleted, &effect, Some(&tx), None).await?;
    }

    tx.delete(&txn).await?;
    txn.commit().await?;
    Ok(())
}

async fn wallet_balance<C: ConnectionTrait>(conn: &C, wallet_id: i64) -> Result<Decimal> {
    Wallet::find_by_id(wallet_id)
        .one(conn)
        .await?
        .map(|w| w.balance)
        .ok_or_else(|| Error::WalletNotFound {
            wallet: wallet_id.to_string(),
        })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::wallet::get_wallet_by_id;
    use crate::test_utils::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_income_applies_and_writes_history() -> Result<()> {
        let (db, wallet, categories) = setup_with_wallet().await?;
        deposit(&db, wallet.id, categories.income.id, dec!(100)).await?;

        let tx = deposit(&db, wallet.id, categories.income.id, dec!(50)).await?;
        assert_eq!(tx.status, TransactionStatus::Completed);

        let stored = get_wallet_by_id(&db, wallet.id).await?.unwrap();
        assert_eq!(stored.balance, dec!(150));

        let history = get_history_for_transaction(&db, tx.id).await?;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].action, HistoryAction::Created);
        assert_eq!(history[0].old_balance, dec!(100));
        assert_eq!(history[0].new_balance, dec!(150));
        assert!(history[0].before_snapshot.is_none());
        assert!(history[0].after_snapshot.is_some());

        Ok(())
    }

    #[tokio::test]
    async fn test_expense_insufficient_funds() -> Result<()> {
        let (db, wallet, categories) = setup_with_wallet().await?;
        deposit(&db, wallet.id, categories.income.id, dec!(50)).await?;

        let result = spend(&db, wallet.id, categories.expense.id, dec!(75)).await;
        assert!(matches!(
            result.unwrap_err(),
            Error::InsufficientFunds { .. }
        ));

        // Balance untouched, but the rejected record is persisted as failed
        let stored = get_wallet_by_id(&db, wallet.id).await?.unwrap();
        assert_eq!(stored.balance, dec!(50));

        let failed = Transaction::find()
            .filter(transaction::Column::Status.eq(TransactionStatus::Failed))
            .all(&db)
            .await?;
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].amount, dec!(75));
        assert!(get_history_for_transaction(&db, failed[0].id).await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_validation_rejections() -> Result<()> {
        let (db, wallet, categories) = setup_with_wallet().await?;
        deposit(&db, wallet.id, categories.income.id, dec!(100)).await?;

        // Non-positive amount
        let mut tx = income_tx(wallet.id, categories.income.id, dec!(0));
        let result = create_transaction(&db, tx).await;
        assert!(matches!(result.unwrap_err(), Error::InvalidAmount { .. }));

        // Future date
        tx = income_tx(wallet.id, categories.income.id, dec!(10));
        tx.date = Utc::now() + Duration::hours(2);
        let result = create_transaction(&db, tx).await;
        assert!(matches!(result.unwrap_err(), Error::FutureDate { .. }));

        // Category kind mismatch: expense category on an income transaction
        tx = income_tx(wallet.id, categories.expense.id, dec!(10));
        let result = create_transaction(&db, tx).await;
        assert!(matches!(
            result.unwrap_err(),
            Error::CategoryKindMismatch { .. }
        ));

        // Unknown wallet
        tx = income_tx(999, categories.income.id, dec!(10));
        let result = create_transaction(&db, tx).await;
        assert!(matches!(result.unwrap_err(), Error::WalletNotFound { .. }));

        Ok(())
    }

    #[tokio::test]
    async fn test_transfer_rejections() -> Result<()> {
        let (db, wallet, categories) = setup_with_wallet().await?;
        let eur = create_test_wallet(&db, "EUR Account", "EUR").await?;
        deposit(&db, wallet.id, categories.income.id, dec!(200)).await?;

        // Missing destination
        let mut tx = transfer_tx(wallet.id, None, categories.transfer.id, dec!(50), None);
        let result = create_transaction(&db, tx).await;
        assert!(matches!(
            result.unwrap_err(),
            Error::MissingDestinationWallet
        ));

        // Same wallet on both sides
        tx = transfer_tx(
            wallet.id,
            Some(wallet.id),
            categories.transfer.id,
            dec!(50),
            None,
        );
        let result = create_transaction(&db, tx).await;
        assert!(matches!(result.unwrap_err(), Error::SameWalletTransfer));

        // Cross-currency with no rate
        tx = transfer_tx(
            wallet.id,
            Some(eur.id),
            categories.transfer.id,
            dec!(50),
            None,
        );
        let result = create_transaction(&db, tx).await;
        assert!(matches!(
            result.unwrap_err(),
            Error::MissingExchangeRate { .. }
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_transfer_cross_currency_rate() -> Result<()> {
        let (db, usd, categories) = setup_with_wallet().await?;
        let eur = create_test_wallet(&db, "EUR Account", "EUR").await?;
        deposit(&db, usd.id, categories.income.id, dec!(200)).await?;

        let tx = create_transaction(
            &db,
            transfer_tx(
                usd.id,
                Some(eur.id),
                categories.transfer.id,
                dec!(100),
                Some(dec!(0.9)),
            ),
        )
        .await?;

        assert_eq!(
            get_wallet_by_id(&db, usd.id).await?.unwrap().balance,
            dec!(100)
        );
        assert_eq!(
            get_wallet_by_id(&db, eur.id).await?.unwrap().balance,
            dec!(90.0)
        );

        let history = get_history_for_transaction(&db, tx.id).await?;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].dest_wallet_id, Some(eur.id));
        assert_eq!(history[0].old_dest_balance, Some(Decimal::ZERO));
        assert_eq!(history[0].new_dest_balance, Some(dec!(90.0)));

        Ok(())
    }

    #[tokio::test]
    async fn test_transfer_same_currency_ignores_rate() -> Result<()> {
        let (db, usd, categories) = setup_with_wallet().await?;
        let other = create_test_wallet(&db, "Savings", "USD").await?;
        deposit(&db, usd.id, categories.income.id, dec!(200)).await?;

        create_transaction(
            &db,
            transfer_tx(
                usd.id,
                Some(other.id),
                categories.transfer.id,
                dec!(100),
                Some(dec!(0.9)),
            ),
        )
        .await?;

        assert_eq!(
            get_wallet_by_id(&db, other.id).await?.unwrap().balance,
            dec!(100)
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_transfer_non_positive_rate_falls_back_to_one() -> Result<()> {
        let (db, usd, categories) = setup_with_wallet().await?;
        let eur = create_test_wallet(&db, "EUR Account", "EUR").await?;
        deposit(&db, usd.id, categories.income.id, dec!(200)).await?;

        create_transaction(
            &db,
            transfer_tx(
                usd.id,
                Some(eur.id),
                categories.transfer.id,
                dec!(100),
                Some(dec!(-2)),
            ),
        )
        .await?;

        assert_eq!(
            get_wallet_by_id(&db, eur.id).await?.unwrap().balance,
            dec!(100)
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_delete_restores_balances_exactly() -> Result<()> {
        let (db, usd, categories) = setup_with_wallet().await?;
        let eur = create_test_wallet(&db, "EUR Account", "EUR").await?;
        deposit(&db, usd.id, categories.income.id, dec!(123.45)).await?;

        let before_usd = get_wallet_by_id(&db, usd.id).await?.unwrap().balance;
        let before_eur = get_wallet_by_id(&db, eur.id).await?.unwrap().balance;

        let tx = create_transaction(
            &db,
            transfer_tx(
                usd.id,
                Some(eur.id),
                categories.transfer.id,
                dec!(41.15),
                Some(dec!(0.93)),
            ),
        )
        .await?;

        delete_transaction(&db, tx.id).await?;

        assert_eq!(
            get_wallet_by_id(&db, usd.id).await?.unwrap().balance,
            before_usd
        );
        assert_eq!(
            get_wallet_by_id(&db, eur.id).await?.unwrap().balance,
            before_eur
        );
        assert!(get_transaction_by_id(&db, tx.id).await?.is_none());

        // The audit trail survives the deletion
        let history = get_history_for_transaction(&db, tx.id).await?;
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].action, HistoryAction::Deleted);

        Ok(())
    }

    #[tokio::test]
    async fn test_update_reverses_and_reapplies() -> Result<()> {
        let (db, wallet, categories) = setup_with_wallet().await?;
        let tx = deposit(&db, wallet.id, categories.income.id, dec!(100)).await?;

        let updated = update_transaction(
            &db,
            tx.id,
            TransactionChanges {
                amount: Some(dec!(60)),
                ..Default::default()
            },
        )
        .await?;

        assert_eq!(updated.amount, dec!(60));
        assert_eq!(updated.status, TransactionStatus::Completed);
        assert_eq!(
            get_wallet_by_id(&db, wallet.id).await?.unwrap().balance,
            dec!(60)
        );

        let history = get_history_for_transaction(&db, tx.id).await?;
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].action, HistoryAction::Updated);
        assert_eq!(history[1].old_balance, dec!(100));
        assert_eq!(history[1].new_balance, dec!(60));
        assert!(history[1].before_snapshot.is_some());

        Ok(())
    }

    #[tokio::test]
    async fn test_update_validation_failure_marks_failed_without_balance_change() -> Result<()> {
        let (db, wallet, categories) = setup_with_wallet().await?;
        let tx = deposit(&db, wallet.id, categories.income.id, dec!(100)).await?;

        let result = update_transaction(
            &db,
            tx.id,
            TransactionChanges {
                date: Some(Utc::now() + Duration::hours(1)),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(result.unwrap_err(), Error::FutureDate { .. }));

        // Balance keeps the originally applied effect; the record is failed
        assert_eq!(
            get_wallet_by_id(&db, wallet.id).await?.unwrap().balance,
            dec!(100)
        );
        let stored = get_transaction_by_id(&db, tx.id).await?.unwrap();
        assert_eq!(stored.status, TransactionStatus::Failed);

        // The applied effect is still reversible through deletion
        delete_transaction(&db, tx.id).await?;
        assert_eq!(
            get_wallet_by_id(&db, wallet.id).await?.unwrap().balance,
            Decimal::ZERO
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_delete_failed_create_leaves_balances_alone() -> Result<()> {
        let (db, wallet, categories) = setup_with_wallet().await?;
        deposit(&db, wallet.id, categories.income.id, dec!(50)).await?;

        let result = spend(&db, wallet.id, categories.expense.id, dec!(75)).await;
        assert!(result.is_err());

        let failed = Transaction::find()
            .filter(transaction::Column::Status.eq(TransactionStatus::Failed))
            .one(&db)
            .await?
            .unwrap();

        delete_transaction(&db, failed.id).await?;
        assert_eq!(
            get_wallet_by_id(&db, wallet.id).await?.unwrap().balance,
            dec!(50)
        );
        assert!(get_history_for_transaction(&db, failed.id).await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_balance_invariant_replays_from_history() -> Result<()> {
        let (db, usd, categories) = setup_with_wallet().await?;
        let eur = create_test_wallet(&db, "EUR Account", "EUR").await?;

        deposit(&db, usd.id, categories.income.id, dec!(500)).await?;
        let spent = spend(&db, usd.id, categories.expense.id, dec!(120.75)).await?;
        create_transaction(
            &db,
            transfer_tx(
                usd.id,
                Some(eur.id),
                categories.transfer.id,
                dec!(100),
                Some(dec!(0.9)),
            ),
        )
        .await?;
        update_transaction(
            &db,
            spent.id,
            TransactionChanges {
                amount: Some(dec!(99.25)),
                ..Default::default()
            },
        )
        .await?;

        // Replay every history entry in order; each old balance must chain
        // from the previous new balance, and the final values must match the
        // stored wallets.
        let entries = TransactionHistory::find()
            .order_by_asc(TransactionHistoryColumn::Id)
            .all(&db)
            .await?;
        let mut replayed: HashMap<i64, Decimal> = HashMap::new();

        for entry in &entries {
            let expected = replayed.entry(entry.wallet_id).or_insert(Decimal::ZERO);
            assert_eq!(*expected, entry.old_balance);
            *expected = entry.new_balance;

            if let (Some(dest_id), Some(old), Some(new)) = (
                entry.dest_wallet_id,
                entry.old_dest_balance,
                entry.new_dest_balance,
            ) {
                let expected = replayed.entry(dest_id).or_insert(Decimal::ZERO);
                assert_eq!(*expected, old);
                *expected = new;
            }
        }

        assert_eq!(
            replayed[&usd.id],
            get_wallet_by_id(&db, usd.id).await?.unwrap().balance
        );
        assert_eq!(
            replayed[&eur.id],
            get_wallet_by_id(&db, eur.id).await?.unwrap().balance
        );

        Ok(())
    }
}
