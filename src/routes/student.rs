//! Student surface: enrolled courses and their curriculum.

use axum::extract::{Path, Request, State};
use axum::middleware::{self, Next};
use axum::routing::get;
use axum::{Extension, Json, Router};
use uuid::Uuid;

use crate::auth::{self, AuthUser};
use crate::db::Db;
use crate::error::ApiError;
use crate::models::*;

pub fn router() -> Router<Db> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/course/:course_id/modules", get(course_modules))
        .route("/module/:module_id/topics", get(module_topics))
        .route_layer(middleware::from_fn(|req: Request, next: Next| {
            auth::require_role(req, next, &[Role::Student])
        }))
}

/// Courses the student is enrolled in through their groups.
async fn dashboard(
    State(db): State<Db>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Course>>, ApiError> {
    let courses = sqlx::query_as(
        "SELECT DISTINCT c.* FROM courses c \
         JOIN groups g ON g.course_id = c.id \
         JOIN group_students gs ON gs.group_id = g.id \
         WHERE gs.student_id = $1 ORDER BY c.name",
    )
    .bind(user.id)
    .fetch_all(&db)
    .await?;
    Ok(Json(courses))
}

async fn course_modules(
    State(db): State<Db>,
    Path(course_id): Path<Uuid>,
) -> Result<Json<Vec<Module>>, ApiError> {
    let modules = sqlx::query_as("SELECT * FROM modules WHERE course_id = $1 ORDER BY name")
        .bind(course_id)
        .fetch_all(&db)
        .await?;
    Ok(Json(modules))
}

/// Active topics of a module, visible only when the module's course is one
/// the student is enrolled in through any of their groups.
async fn module_topics(
    State(db): State<Db>,
    Extension(user): Extension<AuthUser>,
    Path(module_id): Path<Uuid>,
) -> Result<Json<Vec<Topic>>, ApiError> {
    let topics = sqlx::query_as(
        "SELECT t.* FROM topics t \
         JOIN modules m ON m.id = t.module_id \
         WHERE t.module_id = $1 AND t.status = 'active' AND EXISTS ( \
             SELECT 1 FROM group_students gs \
             JOIN groups g ON g.id = gs.group_id \
             WHERE gs.student_id = $2 AND g.course_id = m.course_id) \
         ORDER BY t.name",
    )
    .bind(module_id)
    .bind(user.id)
    .fetch_all(&db)
    .await?;
    Ok(Json(topics))
}
