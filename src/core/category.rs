//! Category business logic - Handles category operations and seeding.
//!
//! System categories are seeded once at startup and protected from deletion.
//! Any category that transactions still reference is likewise protected.

use crate::{
    entities::{Category, Transaction, TransactionColumn, category, transaction::TransactionKind},
    errors::{Error, Result},
};
use sea_orm::{PaginatorTrait, QueryOrder, Set, prelude::*};
use tracing::info;

/// Categories guaranteed to exist after startup, one per transaction kind.
pub const SYSTEM_CATEGORIES: [(&str, TransactionKind); 3] = [
    ("General Income", TransactionKind::Income),
    ("General Expenses", TransactionKind::Expense),
    ("Transfers", TransactionKind::Transfer),
];

/// Retrieves all categories, ordered alphabetically by name.
pub async fn get_all_categories<C: ConnectionTrait>(db: &C) -> Result<Vec<category::Model>> {
    Category::find()
        .order_by_asc(category::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Finds a category by its unique ID.
pub async fn get_category_by_id<C: ConnectionTrait>(
    db: &C,
    category_id: i64,
) -> Result<Option<category::Model>> {
    Category::find_by_id(category_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds a category by name.
pub async fn get_category_by_name<C: ConnectionTrait>(
    db: &C,
    name: &str,
) -> Result<Option<category::Model>> {
    Category::find()
        .filter(category::Column::Name.eq(name))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Creates a new user category of the given kind.
pub async fn create_category<C: ConnectionTrait>(
    db: &C,
    name: String,
    kind: TransactionKind,
) -> Result<category::Model> {
    if name.trim().is_empty() {
        return Err(Error::Config {
            message: "Category name cannot be empty".to_string(),
        });
    }

    let category = category::ActiveModel {
        name: Set(name.trim().to_string()),
        kind: Set(kind),
        is_system: Set(false),
        ..Default::default()
    };

    let result = category.insert(db).await?;
    Ok(result)
}

/// Seeds the system categories, skipping any that already exist.
///
/// Safe to call on every startup.
pub async fn seed_system_categories<C: ConnectionTrait>(db: &C) -> Result<()> {
    for (name, kind) in SYSTEM_CATEGORIES {
        if get_category_by_name(db, name).await?.is_some() {
            continue;
        }

        category::ActiveModel {
            name: Set(name.to_string()),
            kind: Set(kind),
            is_system: Set(true),
            ..Default::default()
        }
        .insert(db)
        .await?;
        info!(category = name, "Seeded system category");
    }

    Ok(())
}

/// Deletes a category.
///
/// Refused for system categories and for any category that transactions
/// still reference.
pub async fn delete_category<C: ConnectionTrait>(db: &C, category_id: i64) -> Result<()> {
    let category = Category::find_by_id(category_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::CategoryNotFound {
            category: category_id.to_string(),
        })?;

    if category.is_system {
        return Err(Error::SystemCategory {
            name: category.name,
        });
    }

    let referencing = Transaction::find()
        .filter(TransactionColumn::CategoryId.eq(category_id))
        .count(db)
        .await?;

    if referencing > 0 {
        return Err(Error::StillReferenced {
            entity: format!("Category '{}'", category.name),
            count: referencing,
        });
    }

    category.delete(db).await?;
    Ok(())
}
