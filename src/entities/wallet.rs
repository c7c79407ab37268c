//! Wallet entity - A balance-carrying account tracked by the ledger.
//!
//! The `balance` column is the authoritative running total and is only ever
//! mutated through the ledger apply/reverse pipeline in
//! [`crate::core::transaction`].
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Wallet database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "wallets")]
pub struct Model {
    /// Unique identifier for the wallet
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name, unique per wallet
    pub name: String,
    /// ISO-4217-like currency code (e.g. "USD", "BTC")
    pub currency: String,
    /// Authoritative running balance
    pub balance: Decimal,
    /// What backs the wallet: a bank account, a crypto address, or cash
    pub kind: WalletKind,
}

/// What kind of account a wallet represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum WalletKind {
    /// Traditional bank account
    #[sea_orm(string_value = "bank")]
    Bank,
    /// Cryptocurrency address or exchange account
    #[sea_orm(string_value = "crypto")]
    Crypto,
    /// Physical cash
    #[sea_orm(string_value = "cash")]
    Cash,
}

/// Defines relationships between Wallet and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Transactions whose source wallet is this wallet
    #[sea_orm(has_many = "super::transaction::Entity")]
    Transaction,
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transaction.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
