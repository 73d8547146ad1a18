//! Login, session tokens, and the role-gating middleware chain.
//!
//! `authenticate` resolves the bearer token and stores an [`AuthUser`] in
//! request extensions; `require_role` gates a sub-router on a role slice.
//! Handlers never touch ambient session state, only the explicit context.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use axum::Json;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::Authorization;
use axum_extra::TypedHeader;
use std::env;
use uuid::Uuid;

use crate::db::Db;
use crate::error::ApiError;
use crate::models::{LoginReq, LoginResp, Role, User};

/// Authenticated request context passed to every gated handler.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub full_name: String,
    pub role: Role,
}

impl AuthUser {
    pub fn require(&self, allowed: &[Role]) -> Result<(), ApiError> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(ApiError::forbidden("insufficient role"))
        }
    }
}

pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("password hashing failed: {e}")))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

pub async fn login(
    State(db): State<Db>,
    Json(req): Json<LoginReq>,
) -> Result<Json<LoginResp>, ApiError> {
    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE phone = $1 AND is_active")
        .bind(&req.phone)
        .fetch_optional(&db)
        .await?;
    let user = user
        .filter(|u| verify_password(&req.password, &u.password_hash))
        .ok_or_else(|| ApiError::unauthorized("invalid phone number or password"))?;

    let token = Uuid::new_v4();
    sqlx::query("INSERT INTO sessions (token, user_id) VALUES ($1, $2)")
        .bind(token)
        .bind(user.id)
        .execute(&db)
        .await?;

    Ok(Json(LoginResp {
        message: "login successful".into(),
        redirect: user.role.dashboard_path().into(),
        user_id: user.id,
        role: user.role,
        token,
    }))
}

/// Resolves the bearer token to an account and stashes the context for
/// downstream guards and handlers.
pub async fn authenticate(
    State(db): State<Db>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let TypedHeader(Authorization(bearer)) =
        bearer.ok_or_else(|| ApiError::unauthorized("missing bearer token"))?;
    let token: Uuid = bearer
        .token()
        .parse()
        .map_err(|_| ApiError::unauthorized("invalid session token"))?;

    let user: Option<(Uuid, String, Role)> = sqlx::query_as(
        "SELECT u.id, u.full_name, u.role FROM sessions s \
         JOIN users u ON u.id = s.user_id \
         WHERE s.token = $1 AND u.is_active",
    )
    .bind(token)
    .fetch_optional(&db)
    .await?;
    let (id, full_name, role) =
        user.ok_or_else(|| ApiError::unauthorized("invalid session token"))?;

    req.extensions_mut().insert(AuthUser {
        id,
        full_name,
        role,
    });
    Ok(next.run(req).await)
}

/// Role gate layered in front of a sub-router; `authenticate` runs first.
pub async fn require_role(
    req: Request,
    next: Next,
    allowed: &'static [Role],
) -> Result<Response, ApiError> {
    let user = req
        .extensions()
        .get::<AuthUser>()
        .ok_or_else(|| ApiError::unauthorized("missing session"))?;
    user.require(allowed)?;
    Ok(next.run(req).await)
}

/// Creates the initial director account from ADMIN_PHONE/ADMIN_PASSWORD
/// when the instance has none. No-op if the vars are unset.
pub async fn bootstrap_director(db: &Db) -> anyhow::Result<()> {
    let (Ok(phone), Ok(password)) = (env::var("ADMIN_PHONE"), env::var("ADMIN_PASSWORD")) else {
        return Ok(());
    };
    let directors: i64 = sqlx::query_scalar("SELECT count(*) FROM users WHERE role = 'director'")
        .fetch_one(db)
        .await?;
    if directors > 0 {
        return Ok(());
    }
    let hash = hash_password(&password).map_err(|e| anyhow::anyhow!(e.to_string()))?;
    sqlx::query(
        "INSERT INTO users (id, phone, full_name, password_hash, role, is_staff) \
         VALUES ($1, $2, $3, $4, 'director', TRUE)",
    )
    .bind(Uuid::new_v4())
    .bind(&phone)
    .bind("Administrator")
    .bind(hash)
    .execute(db)
    .await?;
    tracing::info!(%phone, "bootstrap director account created");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_verifies_and_rejects() {
        let hash = hash_password("s3cret").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("s3cret", &hash));
        assert!(!verify_password("wrong", &hash));
        assert!(!verify_password("s3cret", "not a phc string"));
    }

    #[test]
    fn role_guard_checks_membership() {
        let user = AuthUser {
            id: Uuid::new_v4(),
            full_name: "T".into(),
            role: Role::Teacher,
        };
        assert!(user.require(&[Role::Director, Role::Teacher]).is_ok());
        assert!(matches!(
            user.require(&[Role::Student]),
            Err(ApiError::Forbidden(_))
        ));
    }
}
