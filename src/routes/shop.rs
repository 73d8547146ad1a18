//! Coin grants, balance listing, product catalog, and orders.
//!
//! These paths mix roles per method, so the guards live in the handlers
//! (via the authenticated context) instead of a sub-router layer.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::coins::{self, StudentBalance};
use crate::db::Db;
use crate::error::ApiError;
use crate::models::*;

pub fn router() -> Router<Db> {
    Router::new()
        .route("/coin_add", post(grant_coins))
        .route("/coins", get(coin_balances))
        .route("/products", get(list_products).post(create_product))
        .route("/orders", get(list_orders).post(create_order))
}

const STAFF: &[Role] = &[Role::Director, Role::Teacher];

async fn grant_coins(
    State(db): State<Db>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<GrantCoinsReq>,
) -> Result<Json<serde_json::Value>, ApiError> {
    user.require(STAFF)?;
    let balance = coins::grant(&db, req.student_id, req.amount).await?;
    Ok(Json(serde_json::json!({
        "message": format!("{} coins added", req.amount),
        "balance": balance,
    })))
}

async fn coin_balances(
    State(db): State<Db>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<StudentBalance>>, ApiError> {
    user.require(STAFF)?;
    Ok(Json(coins::balances(&db).await?))
}

async fn create_product(
    State(db): State<Db>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateProductReq>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    user.require(&[Role::Director])?;
    if req.price < 0 {
        return Err(ApiError::validation("price must be non-negative"));
    }
    let product = sqlx::query_as(
        "INSERT INTO products (id, name, description, price, added_by) \
         VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(&req.name)
    .bind(req.description.unwrap_or_default())
    .bind(req.price)
    .bind(user.id)
    .fetch_one(&db)
    .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

async fn list_products(State(db): State<Db>) -> Result<Json<Vec<Product>>, ApiError> {
    let products = sqlx::query_as("SELECT * FROM products ORDER BY created_at DESC")
        .fetch_all(&db)
        .await?;
    Ok(Json(products))
}

async fn create_order(
    State(db): State<Db>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateOrderReq>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    user.require(&[Role::Student])?;
    let order = coins::purchase(&db, user.id, req.product_id).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// Staff see every order; students see their own.
async fn list_orders(
    State(db): State<Db>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Order>>, ApiError> {
    let orders = match user.role {
        Role::Director | Role::Teacher => {
            sqlx::query_as("SELECT * FROM orders ORDER BY ordered_at DESC")
                .fetch_all(&db)
                .await?
        }
        Role::Student => {
            sqlx::query_as("SELECT * FROM orders WHERE student_id = $1 ORDER BY ordered_at DESC")
                .bind(user.id)
                .fetch_all(&db)
                .await?
        }
    };
    Ok(Json(orders))
}
