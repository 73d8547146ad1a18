//! Director surface: dashboard counts plus curriculum and account CRUD.

use std::collections::HashSet;

use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use uuid::Uuid;

use crate::auth;
use crate::calendar;
use crate::db::Db;
use crate::error::ApiError;
use crate::models::*;

pub fn router() -> Router<Db> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/courses", get(list_courses).post(create_course))
        .route(
            "/courses/:id",
            get(get_course).put(update_course).delete(delete_course),
        )
        .route("/modules", get(list_modules).post(create_module))
        .route(
            "/modules/:id",
            get(get_module).put(update_module).delete(delete_module),
        )
        .route("/topics", get(list_topics).post(create_topic))
        .route(
            "/topics/:id",
            get(get_topic).put(update_topic).delete(delete_topic),
        )
        .route("/groups", get(list_groups).post(create_group))
        .route(
            "/groups/:id",
            get(get_group).put(update_group).delete(delete_group),
        )
        .route("/students", get(list_students).post(create_student))
        .route(
            "/students/:id",
            get(get_student).put(update_student).delete(delete_student),
        )
        .route("/teachers", get(list_teachers).post(create_teacher))
        .route(
            "/teachers/:id",
            get(get_teacher).put(update_teacher).delete(delete_teacher),
        )
        .route_layer(middleware::from_fn(|req: Request, next: Next| {
            auth::require_role(req, next, &[Role::Director])
        }))
}

#[derive(Serialize)]
struct DashboardCounts {
    teachers: i64,
    students: i64,
    courses: i64,
    modules: i64,
    topics: i64,
    groups: i64,
}

async fn dashboard(State(db): State<Db>) -> Result<Json<DashboardCounts>, ApiError> {
    let (teachers, students, courses, modules, topics, groups): (i64, i64, i64, i64, i64, i64) =
        sqlx::query_as(
            "SELECT (SELECT count(*) FROM users WHERE role = 'teacher'), \
                    (SELECT count(*) FROM users WHERE role = 'student'), \
                    (SELECT count(*) FROM courses), \
                    (SELECT count(*) FROM modules), \
                    (SELECT count(*) FROM topics), \
                    (SELECT count(*) FROM groups)",
        )
        .fetch_one(&db)
        .await?;
    Ok(Json(DashboardCounts {
        teachers,
        students,
        courses,
        modules,
        topics,
        groups,
    }))
}

// --- courses ---

async fn list_courses(State(db): State<Db>) -> Result<Json<Vec<Course>>, ApiError> {
    let courses = sqlx::query_as("SELECT * FROM courses ORDER BY name")
        .fetch_all(&db)
        .await?;
    Ok(Json(courses))
}

async fn create_course(
    State(db): State<Db>,
    Json(req): Json<CourseReq>,
) -> Result<(StatusCode, Json<Course>), ApiError> {
    let course = sqlx::query_as("INSERT INTO courses (id, name) VALUES ($1, $2) RETURNING *")
        .bind(Uuid::new_v4())
        .bind(&req.name)
        .fetch_one(&db)
        .await?;
    Ok((StatusCode::CREATED, Json(course)))
}

async fn get_course(State(db): State<Db>, Path(id): Path<Uuid>) -> Result<Json<Course>, ApiError> {
    let course: Option<Course> = sqlx::query_as("SELECT * FROM courses WHERE id = $1")
        .bind(id)
        .fetch_optional(&db)
        .await?;
    course
        .map(Json)
        .ok_or_else(|| ApiError::not_found("course not found"))
}

async fn update_course(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
    Json(req): Json<CourseReq>,
) -> Result<Json<Course>, ApiError> {
    let course: Option<Course> =
        sqlx::query_as("UPDATE courses SET name = $2 WHERE id = $1 RETURNING *")
            .bind(id)
            .bind(&req.name)
            .fetch_optional(&db)
            .await?;
    course
        .map(Json)
        .ok_or_else(|| ApiError::not_found("course not found"))
}

async fn delete_course(State(db): State<Db>, Path(id): Path<Uuid>) -> Result<StatusCode, ApiError> {
    let result = sqlx::query("DELETE FROM courses WHERE id = $1")
        .bind(id)
        .execute(&db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("course not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}

// --- modules ---

async fn list_modules(State(db): State<Db>) -> Result<Json<Vec<Module>>, ApiError> {
    let modules = sqlx::query_as("SELECT * FROM modules ORDER BY name")
        .fetch_all(&db)
        .await?;
    Ok(Json(modules))
}

async fn create_module(
    State(db): State<Db>,
    Json(req): Json<CreateModuleReq>,
) -> Result<(StatusCode, Json<Module>), ApiError> {
    if !exists(&db, "courses", req.course_id).await? {
        return Err(ApiError::not_found("course not found"));
    }
    let module = sqlx::query_as(
        "INSERT INTO modules (id, name, course_id) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(&req.name)
    .bind(req.course_id)
    .fetch_one(&db)
    .await?;
    Ok((StatusCode::CREATED, Json(module)))
}

async fn get_module(State(db): State<Db>, Path(id): Path<Uuid>) -> Result<Json<Module>, ApiError> {
    let module: Option<Module> = sqlx::query_as("SELECT * FROM modules WHERE id = $1")
        .bind(id)
        .fetch_optional(&db)
        .await?;
    module
        .map(Json)
        .ok_or_else(|| ApiError::not_found("module not found"))
}

async fn update_module(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateModuleReq>,
) -> Result<Json<Module>, ApiError> {
    if let Some(course_id) = req.course_id {
        if !exists(&db, "courses", course_id).await? {
            return Err(ApiError::not_found("course not found"));
        }
    }
    let module: Option<Module> = sqlx::query_as(
        "UPDATE modules SET name = COALESCE($2, name), course_id = COALESCE($3, course_id) \
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(req.name)
    .bind(req.course_id)
    .fetch_optional(&db)
    .await?;
    module
        .map(Json)
        .ok_or_else(|| ApiError::not_found("module not found"))
}

async fn delete_module(State(db): State<Db>, Path(id): Path<Uuid>) -> Result<StatusCode, ApiError> {
    let result = sqlx::query("DELETE FROM modules WHERE id = $1")
        .bind(id)
        .execute(&db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("module not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}

// --- topics ---

async fn list_topics(State(db): State<Db>) -> Result<Json<Vec<Topic>>, ApiError> {
    let topics = sqlx::query_as("SELECT * FROM topics ORDER BY name")
        .fetch_all(&db)
        .await?;
    Ok(Json(topics))
}

async fn create_topic(
    State(db): State<Db>,
    Json(req): Json<CreateTopicReq>,
) -> Result<(StatusCode, Json<Topic>), ApiError> {
    if !exists(&db, "modules", req.module_id).await? {
        return Err(ApiError::not_found("module not found"));
    }
    let topic = sqlx::query_as(
        "INSERT INTO topics (id, name, status, module_id) VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(&req.name)
    .bind(req.status.unwrap_or(TopicStatus::Inactive))
    .bind(req.module_id)
    .fetch_one(&db)
    .await?;
    Ok((StatusCode::CREATED, Json(topic)))
}

async fn get_topic(State(db): State<Db>, Path(id): Path<Uuid>) -> Result<Json<Topic>, ApiError> {
    let topic: Option<Topic> = sqlx::query_as("SELECT * FROM topics WHERE id = $1")
        .bind(id)
        .fetch_optional(&db)
        .await?;
    topic
        .map(Json)
        .ok_or_else(|| ApiError::not_found("topic not found"))
}

async fn update_topic(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTopicReq>,
) -> Result<Json<Topic>, ApiError> {
    if let Some(module_id) = req.module_id {
        if !exists(&db, "modules", module_id).await? {
            return Err(ApiError::not_found("module not found"));
        }
    }
    let topic: Option<Topic> = sqlx::query_as(
        "UPDATE topics SET name = COALESCE($2, name), status = COALESCE($3, status), \
         module_id = COALESCE($4, module_id) WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(req.name)
    .bind(req.status)
    .bind(req.module_id)
    .fetch_optional(&db)
    .await?;
    topic
        .map(Json)
        .ok_or_else(|| ApiError::not_found("topic not found"))
}

async fn delete_topic(State(db): State<Db>, Path(id): Path<Uuid>) -> Result<StatusCode, ApiError> {
    let result = sqlx::query("DELETE FROM topics WHERE id = $1")
        .bind(id)
        .execute(&db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("topic not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}

// --- groups ---

async fn list_groups(State(db): State<Db>) -> Result<Json<Vec<GroupDetail>>, ApiError> {
    let groups: Vec<Group> = sqlx::query_as("SELECT * FROM groups ORDER BY name")
        .fetch_all(&db)
        .await?;
    let mut out = Vec::with_capacity(groups.len());
    for group in groups {
        out.push(group_detail(&db, group).await?);
    }
    Ok(Json(out))
}

async fn create_group(
    State(db): State<Db>,
    Json(req): Json<CreateGroupReq>,
) -> Result<(StatusCode, Json<GroupDetail>), ApiError> {
    if req.start_date > req.end_date {
        return Err(ApiError::validation("start_date must not be after end_date"));
    }
    calendar::parse_day_names(&req.days)?;
    if !exists(&db, "courses", req.course_id).await? {
        return Err(ApiError::not_found("course not found"));
    }
    if !has_role(&db, req.teacher_id, Role::Teacher).await? {
        return Err(ApiError::not_found("teacher not found"));
    }
    let students = check_students(&db, &req.students).await?;
    let days: HashSet<String> = req.days.iter().map(|d| d.to_ascii_lowercase()).collect();

    let mut tx = db.begin().await?;
    let group: Group = sqlx::query_as(
        "INSERT INTO groups (id, name, course_id, teacher_id, start_date, end_date) \
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(&req.name)
    .bind(req.course_id)
    .bind(req.teacher_id)
    .bind(req.start_date)
    .bind(req.end_date)
    .fetch_one(&mut *tx)
    .await?;
    for day in &days {
        sqlx::query("INSERT INTO group_days (group_id, day) VALUES ($1, $2)")
            .bind(group.id)
            .bind(day)
            .execute(&mut *tx)
            .await?;
    }
    for student_id in &students {
        sqlx::query("INSERT INTO group_students (group_id, student_id) VALUES ($1, $2)")
            .bind(group.id)
            .bind(student_id)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    let detail = group_detail(&db, group).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

async fn get_group(State(db): State<Db>, Path(id): Path<Uuid>) -> Result<Json<GroupDetail>, ApiError> {
    let group: Option<Group> = sqlx::query_as("SELECT * FROM groups WHERE id = $1")
        .bind(id)
        .fetch_optional(&db)
        .await?;
    let group = group.ok_or_else(|| ApiError::not_found("group not found"))?;
    Ok(Json(group_detail(&db, group).await?))
}

async fn update_group(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateGroupReq>,
) -> Result<Json<GroupDetail>, ApiError> {
    let current: Option<Group> = sqlx::query_as("SELECT * FROM groups WHERE id = $1")
        .bind(id)
        .fetch_optional(&db)
        .await?;
    let current = current.ok_or_else(|| ApiError::not_found("group not found"))?;

    let start = req.start_date.unwrap_or(current.start_date);
    let end = req.end_date.unwrap_or(current.end_date);
    if start > end {
        return Err(ApiError::validation("start_date must not be after end_date"));
    }
    if let Some(days) = &req.days {
        calendar::parse_day_names(days)?;
    }
    if let Some(course_id) = req.course_id {
        if !exists(&db, "courses", course_id).await? {
            return Err(ApiError::not_found("course not found"));
        }
    }
    if let Some(teacher_id) = req.teacher_id {
        if !has_role(&db, teacher_id, Role::Teacher).await? {
            return Err(ApiError::not_found("teacher not found"));
        }
    }
    let students = match &req.students {
        Some(ids) => Some(check_students(&db, ids).await?),
        None => None,
    };

    let mut tx = db.begin().await?;
    let group: Group = sqlx::query_as(
        "UPDATE groups SET name = COALESCE($2, name), course_id = COALESCE($3, course_id), \
         teacher_id = COALESCE($4, teacher_id), start_date = $5, end_date = $6 \
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(req.name)
    .bind(req.course_id)
    .bind(req.teacher_id)
    .bind(start)
    .bind(end)
    .fetch_one(&mut *tx)
    .await?;

    if let Some(days) = &req.days {
        sqlx::query("DELETE FROM group_days WHERE group_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let days: HashSet<String> = days.iter().map(|d| d.to_ascii_lowercase()).collect();
        for day in &days {
            sqlx::query("INSERT INTO group_days (group_id, day) VALUES ($1, $2)")
                .bind(id)
                .bind(day)
                .execute(&mut *tx)
                .await?;
        }
    }
    // membership replacement; attendance history for removed students stays
    if let Some(students) = &students {
        sqlx::query("DELETE FROM group_students WHERE group_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        for student_id in students {
            sqlx::query("INSERT INTO group_students (group_id, student_id) VALUES ($1, $2)")
                .bind(id)
                .bind(student_id)
                .execute(&mut *tx)
                .await?;
        }
    }
    tx.commit().await?;

    Ok(Json(group_detail(&db, group).await?))
}

async fn delete_group(State(db): State<Db>, Path(id): Path<Uuid>) -> Result<StatusCode, ApiError> {
    let result = sqlx::query("DELETE FROM groups WHERE id = $1")
        .bind(id)
        .execute(&db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("group not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}

// --- accounts ---

async fn list_students(State(db): State<Db>) -> Result<Json<Vec<User>>, ApiError> {
    list_accounts(&db, Role::Student).await.map(Json)
}

async fn create_student(
    State(db): State<Db>,
    Json(req): Json<CreateAccountReq>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let user = create_account(&db, Role::Student, req).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn get_student(State(db): State<Db>, Path(id): Path<Uuid>) -> Result<Json<User>, ApiError> {
    get_account(&db, Role::Student, id).await.map(Json)
}

async fn update_student(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateAccountReq>,
) -> Result<Json<User>, ApiError> {
    update_account(&db, Role::Student, id, req).await.map(Json)
}

async fn delete_student(State(db): State<Db>, Path(id): Path<Uuid>) -> Result<StatusCode, ApiError> {
    delete_account(&db, Role::Student, id).await
}

async fn list_teachers(State(db): State<Db>) -> Result<Json<Vec<User>>, ApiError> {
    list_accounts(&db, Role::Teacher).await.map(Json)
}

async fn create_teacher(
    State(db): State<Db>,
    Json(req): Json<CreateAccountReq>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let user = create_account(&db, Role::Teacher, req).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn get_teacher(State(db): State<Db>, Path(id): Path<Uuid>) -> Result<Json<User>, ApiError> {
    get_account(&db, Role::Teacher, id).await.map(Json)
}

async fn update_teacher(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateAccountReq>,
) -> Result<Json<User>, ApiError> {
    update_account(&db, Role::Teacher, id, req).await.map(Json)
}

async fn delete_teacher(State(db): State<Db>, Path(id): Path<Uuid>) -> Result<StatusCode, ApiError> {
    delete_account(&db, Role::Teacher, id).await
}

async fn list_accounts(db: &Db, role: Role) -> Result<Vec<User>, ApiError> {
    Ok(
        sqlx::query_as("SELECT * FROM users WHERE role = $1 ORDER BY full_name")
            .bind(role)
            .fetch_all(db)
            .await?,
    )
}

async fn create_account(db: &Db, role: Role, req: CreateAccountReq) -> Result<User, ApiError> {
    let hash = auth::hash_password(&req.password)?;
    sqlx::query_as(
        "INSERT INTO users (id, phone, full_name, password_hash, role, age, gender) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(&req.phone)
    .bind(&req.full_name)
    .bind(hash)
    .bind(role)
    .bind(req.age)
    .bind(req.gender)
    .fetch_one(db)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(d) if d.is_unique_violation() => {
            ApiError::validation("phone already registered")
        }
        _ => ApiError::from(e),
    })
}

async fn get_account(db: &Db, role: Role, id: Uuid) -> Result<User, ApiError> {
    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1 AND role = $2")
        .bind(id)
        .bind(role)
        .fetch_optional(db)
        .await?;
    user.ok_or_else(|| ApiError::not_found("account not found"))
}

async fn update_account(
    db: &Db,
    role: Role,
    id: Uuid,
    req: UpdateAccountReq,
) -> Result<User, ApiError> {
    let password_hash = req
        .password
        .as_deref()
        .map(auth::hash_password)
        .transpose()?;
    let user: Option<User> = sqlx::query_as(
        "UPDATE users SET phone = COALESCE($3, phone), full_name = COALESCE($4, full_name), \
         password_hash = COALESCE($5, password_hash), age = COALESCE($6, age), \
         gender = COALESCE($7, gender), is_active = COALESCE($8, is_active) \
         WHERE id = $1 AND role = $2 RETURNING *",
    )
    .bind(id)
    .bind(role)
    .bind(req.phone)
    .bind(req.full_name)
    .bind(password_hash)
    .bind(req.age)
    .bind(req.gender)
    .bind(req.is_active)
    .fetch_optional(db)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(d) if d.is_unique_violation() => {
            ApiError::validation("phone already registered")
        }
        _ => ApiError::from(e),
    })?;
    user.ok_or_else(|| ApiError::not_found("account not found"))
}

async fn delete_account(db: &Db, role: Role, id: Uuid) -> Result<StatusCode, ApiError> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1 AND role = $2")
        .bind(id)
        .bind(role)
        .execute(db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("account not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}

// --- shared helpers ---

pub(super) async fn group_detail(db: &Db, group: Group) -> Result<GroupDetail, ApiError> {
    let days: Vec<String> =
        sqlx::query_scalar("SELECT day FROM group_days WHERE group_id = $1 ORDER BY day")
            .bind(group.id)
            .fetch_all(db)
            .await?;
    let students: Vec<Uuid> =
        sqlx::query_scalar("SELECT student_id FROM group_students WHERE group_id = $1")
            .bind(group.id)
            .fetch_all(db)
            .await?;
    Ok(GroupDetail {
        group,
        days,
        students,
    })
}

async fn exists(db: &Db, table: &str, id: Uuid) -> Result<bool, ApiError> {
    // table names come from call sites, never from input
    let sql = format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE id = $1)");
    Ok(sqlx::query_scalar(&sql).bind(id).fetch_one(db).await?)
}

async fn has_role(db: &Db, id: Uuid, role: Role) -> Result<bool, ApiError> {
    Ok(
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1 AND role = $2)")
            .bind(id)
            .bind(role)
            .fetch_one(db)
            .await?,
    )
}

/// Dedups the roster and confirms every id is a student account.
async fn check_students(db: &Db, ids: &[Uuid]) -> Result<Vec<Uuid>, ApiError> {
    let unique: Vec<Uuid> = ids
        .iter()
        .copied()
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let found: i64 = sqlx::query_scalar(
        "SELECT count(*) FROM users WHERE id = ANY($1) AND role = 'student'",
    )
    .bind(&unique)
    .fetch_one(db)
    .await?;
    if found != unique.len() as i64 {
        return Err(ApiError::not_found("student not found"));
    }
    Ok(unique)
}
