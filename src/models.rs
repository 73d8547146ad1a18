use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(sqlx::Type, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Director,
    Teacher,
    Student,
}

impl Role {
    /// Dashboard landing path handed back to the client after login.
    pub fn dashboard_path(self) -> &'static str {
        match self {
            Role::Director => "/director/dashboard",
            Role::Teacher => "/teacher/dashboard",
            Role::Student => "/student/dashboard",
        }
    }
}

#[derive(sqlx::Type, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "gender", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

#[derive(sqlx::Type, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "topic_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TopicStatus {
    Active,
    Inactive,
}

#[derive(sqlx::Type, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "attendance_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
}

impl AttendanceStatus {
    /// Case-insensitive normalization of the wire value.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "present" => Some(Self::Present),
            "absent" => Some(Self::Absent),
            _ => None,
        }
    }
}

#[derive(sqlx::FromRow, Serialize, Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub phone: String,
    pub full_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub age: Option<i32>,
    pub gender: Option<Gender>,
    pub is_active: bool,
    pub is_staff: bool,
    pub coins: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct Course {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct Module {
    pub id: Uuid,
    pub name: String,
    pub course_id: Uuid,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct Topic {
    pub id: Uuid,
    pub name: String,
    pub status: TopicStatus,
    pub module_id: Uuid,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub course_id: Uuid,
    pub teacher_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Group plus its weekly day pattern and roster.
#[derive(Serialize, Debug, Clone)]
pub struct GroupDetail {
    #[serde(flatten)]
    pub group: Group,
    pub days: Vec<String>,
    pub students: Vec<Uuid>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price: i64,
    pub added_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct Order {
    pub id: Uuid,
    pub product_id: Uuid,
    pub student_id: Uuid,
    pub ordered_at: DateTime<Utc>,
}

// --- request/response bodies ---

#[derive(Deserialize, Debug, Clone)]
pub struct LoginReq {
    pub phone: String,
    pub password: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct LoginResp {
    pub message: String,
    pub redirect: String,
    pub user_id: Uuid,
    pub role: Role,
    pub token: Uuid,
}

/// Account creation body; the role comes from the endpoint, not the payload.
#[derive(Deserialize, Debug, Clone)]
pub struct CreateAccountReq {
    pub phone: String,
    pub full_name: String,
    pub password: String,
    pub age: Option<i32>,
    pub gender: Option<Gender>,
}

/// Partial account update. Role and coins are deliberately absent: role is
/// immutable post-assignment, coins move only through the coin ledger.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct UpdateAccountReq {
    pub phone: Option<String>,
    pub full_name: Option<String>,
    pub password: Option<String>,
    pub age: Option<i32>,
    pub gender: Option<Gender>,
    pub is_active: Option<bool>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct CourseReq {
    pub name: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct CreateModuleReq {
    pub name: String,
    pub course_id: Uuid,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct UpdateModuleReq {
    pub name: Option<String>,
    pub course_id: Option<Uuid>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct CreateTopicReq {
    pub name: String,
    pub module_id: Uuid,
    pub status: Option<TopicStatus>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct UpdateTopicReq {
    pub name: Option<String>,
    pub module_id: Option<Uuid>,
    pub status: Option<TopicStatus>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct CreateGroupReq {
    pub name: String,
    pub course_id: Uuid,
    pub teacher_id: Uuid,
    pub days: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub students: Vec<Uuid>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct UpdateGroupReq {
    pub name: Option<String>,
    pub course_id: Option<Uuid>,
    pub teacher_id: Option<Uuid>,
    pub days: Option<Vec<String>>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub students: Option<Vec<Uuid>>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct RecordAttendanceReq {
    pub student_id: Uuid,
    /// dd.mm.yyyy
    pub date: String,
    /// "present" / "absent", any case
    pub status: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct TopicStatusReq {
    pub topic_id: Uuid,
    pub status: TopicStatus,
}

#[derive(Deserialize, Debug, Clone)]
pub struct GrantCoinsReq {
    pub student_id: Uuid,
    pub amount: i64,
}

#[derive(Deserialize, Debug, Clone)]
pub struct CreateProductReq {
    pub name: String,
    pub description: Option<String>,
    pub price: i64,
}

#[derive(Deserialize, Debug, Clone)]
pub struct CreateOrderReq {
    pub product_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attendance_status_parses_any_case() {
        assert_eq!(
            AttendanceStatus::parse("Present"),
            Some(AttendanceStatus::Present)
        );
        assert_eq!(
            AttendanceStatus::parse("ABSENT"),
            Some(AttendanceStatus::Absent)
        );
        assert_eq!(
            AttendanceStatus::parse("present"),
            Some(AttendanceStatus::Present)
        );
        assert_eq!(AttendanceStatus::parse("late"), None);
        assert_eq!(AttendanceStatus::parse(""), None);
    }

    #[test]
    fn attendance_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&AttendanceStatus::Present).unwrap(),
            "\"present\""
        );
        assert_eq!(
            serde_json::to_string(&AttendanceStatus::Absent).unwrap(),
            "\"absent\""
        );
    }

    #[test]
    fn role_round_trips_through_serde() {
        for (role, s) in [
            (Role::Director, "\"director\""),
            (Role::Teacher, "\"teacher\""),
            (Role::Student, "\"student\""),
        ] {
            assert_eq!(serde_json::to_string(&role).unwrap(), s);
            assert_eq!(serde_json::from_str::<Role>(s).unwrap(), role);
        }
    }
}
