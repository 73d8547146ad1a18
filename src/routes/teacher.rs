//! Teacher surface: own-group dashboard, attendance, topic status.
//!
//! Every group-scoped operation resolves the group by (id, teacher) so a
//! teacher can never touch another teacher's group; out-of-scope ids read
//! as not found.

use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde::Serialize;
use uuid::Uuid;

use crate::attendance::{self, AttendanceSheet};
use crate::auth::{self, AuthUser};
use crate::calendar::format_date;
use crate::db::Db;
use crate::error::ApiError;
use crate::models::*;

pub fn router() -> Router<Db> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route(
            "/group/:group_id/attendance",
            get(attendance_sheet).post(record_attendance),
        )
        .route(
            "/group/:group_id/module/:module_id/topics",
            get(module_topics).post(set_topic_status),
        )
        .route_layer(middleware::from_fn(|req: Request, next: Next| {
            auth::require_role(req, next, &[Role::Teacher])
        }))
}

#[derive(Serialize)]
struct TeacherDashboard {
    full_name: String,
    group_count: usize,
    groups: Vec<GroupDetail>,
}

async fn dashboard(
    State(db): State<Db>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<TeacherDashboard>, ApiError> {
    let groups: Vec<Group> = sqlx::query_as("SELECT * FROM groups WHERE teacher_id = $1 ORDER BY name")
        .bind(user.id)
        .fetch_all(&db)
        .await?;
    let mut details = Vec::with_capacity(groups.len());
    for group in groups {
        details.push(super::director::group_detail(&db, group).await?);
    }
    Ok(Json(TeacherDashboard {
        full_name: user.full_name,
        group_count: details.len(),
        groups: details,
    }))
}

async fn owned_group(db: &Db, group_id: Uuid, teacher: &AuthUser) -> Result<Group, ApiError> {
    let group: Option<Group> = sqlx::query_as("SELECT * FROM groups WHERE id = $1 AND teacher_id = $2")
        .bind(group_id)
        .bind(teacher.id)
        .fetch_optional(db)
        .await?;
    group.ok_or_else(|| ApiError::not_found("group not found"))
}

async fn attendance_sheet(
    State(db): State<Db>,
    Extension(user): Extension<AuthUser>,
    Path(group_id): Path<Uuid>,
) -> Result<Json<AttendanceSheet>, ApiError> {
    let group = owned_group(&db, group_id, &user).await?;
    Ok(Json(attendance::sheet(&db, &group).await?))
}

async fn record_attendance(
    State(db): State<Db>,
    Extension(user): Extension<AuthUser>,
    Path(group_id): Path<Uuid>,
    Json(req): Json<RecordAttendanceReq>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let group = owned_group(&db, group_id, &user).await?;
    let outcome = attendance::record(&db, &group, &req).await?;
    let (code, message) = if outcome.created {
        (StatusCode::CREATED, "attendance recorded")
    } else {
        (StatusCode::OK, "attendance updated")
    };
    Ok((
        code,
        Json(serde_json::json!({
            "message": message,
            "student": outcome.student_name,
            "date": format_date(outcome.date),
            "status": outcome.status,
        })),
    ))
}

async fn course_module(db: &Db, module_id: Uuid, group: &Group) -> Result<Module, ApiError> {
    let module: Option<Module> = sqlx::query_as("SELECT * FROM modules WHERE id = $1 AND course_id = $2")
        .bind(module_id)
        .bind(group.course_id)
        .fetch_optional(db)
        .await?;
    module.ok_or_else(|| ApiError::not_found("module not found"))
}

async fn module_topics(
    State(db): State<Db>,
    Extension(user): Extension<AuthUser>,
    Path((group_id, module_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Vec<Topic>>, ApiError> {
    let group = owned_group(&db, group_id, &user).await?;
    let module = course_module(&db, module_id, &group).await?;
    let topics = sqlx::query_as("SELECT * FROM topics WHERE module_id = $1 ORDER BY name")
        .bind(module.id)
        .fetch_all(&db)
        .await?;
    Ok(Json(topics))
}

async fn set_topic_status(
    State(db): State<Db>,
    Extension(user): Extension<AuthUser>,
    Path((group_id, module_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<TopicStatusReq>,
) -> Result<Json<Topic>, ApiError> {
    let group = owned_group(&db, group_id, &user).await?;
    let module = course_module(&db, module_id, &group).await?;
    let topic: Option<Topic> = sqlx::query_as(
        "UPDATE topics SET status = $3 WHERE id = $1 AND module_id = $2 RETURNING *",
    )
    .bind(req.topic_id)
    .bind(module.id)
    .bind(req.status)
    .fetch_optional(&db)
    .await?;
    topic
        .map(Json)
        .ok_or_else(|| ApiError::not_found("topic not found"))
}
