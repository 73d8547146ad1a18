//! Coin ledger: grants, balance listing, and the purchase transaction.
//!
//! Balances never go negative. Every mutation is a single atomic SQL
//! statement (or one transaction for check+debit), never a read-modify-write
//! in application memory.

use serde::Serialize;
use uuid::Uuid;

use crate::db::Db;
use crate::error::ApiError;
use crate::models::{Order, Product};

#[derive(sqlx::FromRow, Serialize, Debug)]
pub struct StudentBalance {
    pub id: Uuid,
    pub full_name: String,
    pub coins: i64,
}

fn check_amount(amount: i64) -> Result<(), ApiError> {
    if amount < 0 {
        return Err(ApiError::validation("amount must be non-negative"));
    }
    Ok(())
}

/// Credits a student's balance as one atomic increment; returns the new
/// balance.
pub async fn grant(db: &Db, student_id: Uuid, amount: i64) -> Result<i64, ApiError> {
    check_amount(amount)?;
    let balance: Option<i64> = sqlx::query_scalar(
        "UPDATE users SET coins = coins + $1 \
         WHERE id = $2 AND role = 'student' RETURNING coins",
    )
    .bind(amount)
    .bind(student_id)
    .fetch_optional(db)
    .await?;
    balance.ok_or_else(|| ApiError::not_found("student not found"))
}

pub async fn balances(db: &Db) -> Result<Vec<StudentBalance>, ApiError> {
    Ok(sqlx::query_as(
        "SELECT id, full_name, coins FROM users WHERE role = 'student' ORDER BY full_name",
    )
    .fetch_all(db)
    .await?)
}

/// Debits the buyer and records the order in one transaction. The account
/// row stays locked from the sufficiency check through the debit, so two
/// concurrent purchases cannot spend the same balance twice; any failure
/// before commit rolls back the whole purchase.
pub async fn purchase(db: &Db, student_id: Uuid, product_id: Uuid) -> Result<Order, ApiError> {
    let mut tx = db.begin().await?;

    let product: Option<Product> = sqlx::query_as("SELECT * FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await?;
    let product = product.ok_or_else(|| ApiError::not_found("product not found"))?;

    let coins: i64 = sqlx::query_scalar("SELECT coins FROM users WHERE id = $1 FOR UPDATE")
        .bind(student_id)
        .fetch_one(&mut *tx)
        .await?;
    if coins < product.price {
        return Err(ApiError::validation("insufficient coins"));
    }

    sqlx::query("UPDATE users SET coins = coins - $1 WHERE id = $2")
        .bind(product.price)
        .bind(student_id)
        .execute(&mut *tx)
        .await?;

    let order: Order = sqlx::query_as(
        "INSERT INTO orders (id, product_id, student_id) VALUES ($1, $2, $3) \
         RETURNING id, product_id, student_id, ordered_at",
    )
    .bind(Uuid::new_v4())
    .bind(product.id)
    .bind(student_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_amounts_are_rejected() {
        assert!(matches!(check_amount(-1), Err(ApiError::Validation(_))));
        assert!(matches!(check_amount(i64::MIN), Err(ApiError::Validation(_))));
    }

    #[test]
    fn zero_and_positive_amounts_pass() {
        assert!(check_amount(0).is_ok());
        assert!(check_amount(1).is_ok());
        assert!(check_amount(i64::MAX).is_ok());
    }
}
