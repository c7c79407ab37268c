//! Wallet business logic - Handles all wallet-related operations.
//!
//! Provides functions for creating, retrieving, and deleting wallets, plus
//! the balance-adjustment helper the transaction pipeline uses. Balances are
//! never written outside [`adjust_balance`], which keeps the running total
//! equal to the sum of applied transaction effects.

use crate::{
    entities::{Transaction, TransactionColumn, Wallet, wallet, wallet::WalletKind},
    errors::{Error, Result},
};
use rust_decimal::Decimal;
use sea_orm::{Condition, PaginatorTrait, QueryOrder, Set, prelude::*};

/// Old and new balance of one wallet after an adjustment, used for the
/// audit history.
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceChange {
    /// The adjusted wallet
    pub wallet_id: i64,
    /// Balance before the adjustment
    pub old_balance: Decimal,
    /// Balance after the adjustment
    pub new_balance: Decimal,
}

/// Retrieves all wallets, ordered alphabetically by name.
pub async fn get_all_wallets<C: ConnectionTrait>(db: &C) -> Result<Vec<wallet::Model>> {
    Wallet::find()
        .order_by_asc(wallet::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Finds a wallet by its unique ID.
pub async fn get_wallet_by_id<C: ConnectionTrait>(
    db: &C,
    wallet_id: i64,
) -> Result<Option<wallet::Model>> {
    Wallet::find_by_id(wallet_id).one(db).await.map_err(Into::into)
}

/// Finds a wallet by name, used when config files reference wallets by their
/// display name.
pub async fn get_wallet_by_name<C: ConnectionTrait>(
    db: &C,
    name: &str,
) -> Result<Option<wallet::Model>> {
    Wallet::find()
        .filter(wallet::Column::Name.eq(name))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Creates a new wallet with a zero balance, performing input validation.
///
/// The name and currency must be non-empty; whitespace is trimmed and the
/// currency is normalized to upper case.
pub async fn create_wallet<C: ConnectionTrait>(
    db: &C,
    name: String,
    currency: String,
    kind: WalletKind,
) -> Result<wallet::Model> {
    if name.trim().is_empty() {
        return Err(Error::Config {
            message: "Wallet name cannot be empty".to_string(),
        });
    }

    if currency.trim().is_empty() {
        return Err(Error::Config {
            message: "Wallet currency cannot be empty".to_string(),
        });
    }

    let wallet = wallet::ActiveModel {
        name: Set(name.trim().to_string()),
        currency: Set(currency.trim().to_uppercase()),
        balance: Set(Decimal::ZERO),
        kind: Set(kind),
        ..Default::default()
    };

    let result = wallet.insert(db).await?;
    Ok(result)
}

/// Adjusts a wallet balance by a signed delta and returns the old and new
/// balance for the audit history.
///
/// Callers are expected to run this inside the same database transaction as
/// the rest of the ledger pipeline so the read-adjust-write sequence is
/// atomic with respect to concurrent import cycles.
pub async fn adjust_balance<C: ConnectionTrait>(
    db: &C,
    wallet_id: i64,
    delta: Decimal,
) -> Result<BalanceChange> {
    let wallet = Wallet::find_by_id(wallet_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::WalletNotFound {
            wallet: wallet_id.to_string(),
        })?;

    let old_balance = wallet.balance;
    let new_balance = old_balance + delta;

    let mut active: wallet::ActiveModel = wallet.into();
    active.balance = Set(new_balance);
    active.update(db).await?;

    Ok(BalanceChange {
        wallet_id,
        old_balance,
        new_balance,
    })
}

/// Deletes a wallet, refusing while any transaction still references it as
/// source or destination.
pub async fn delete_wallet<C: ConnectionTrait>(db: &C, wallet_id: i64) -> Result<()> {
    let wallet = Wallet::find_by_id(wallet_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::WalletNotFound {
            wallet: wallet_id.to_string(),
        })?;

    let referencing = Transaction::find()
        .filter(
            Condition::any()
                .add(TransactionColumn::WalletId.eq(wallet_id))
                .add(TransactionColumn::DestWalletId.eq(wallet_id)),
        )
        .count(db)
        .await?;

    if referencing > 0 {
        return Err(Error::StillReferenced {
            entity: format!("Wallet '{}'", wallet.name),
            count: referencing,
        });
    }

    wallet.delete(db).await?;
    Ok(())
}
