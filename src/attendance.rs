//! Attendance recording and the per-group attendance sheet.
//!
//! A record is keyed by (group, student, date); the date must be a valid
//! lesson date for the group at write time. Validity is not re-checked if
//! the schedule later changes.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{Datelike, NaiveDate, Weekday};
use serde::Serialize;
use uuid::Uuid;

use crate::calendar::{self, format_date, lesson_dates, parse_date};
use crate::db::Db;
use crate::error::ApiError;
use crate::models::{AttendanceStatus, Group, RecordAttendanceReq};

#[derive(Debug)]
pub struct RecordOutcome {
    pub created: bool,
    pub student_name: String,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
}

/// Per-student, per-date matrix; `None` means not yet recorded, which is a
/// valid state distinct from absent.
#[derive(Serialize, Debug)]
pub struct AttendanceSheet {
    pub group_id: Uuid,
    pub group_name: String,
    pub dates: Vec<String>,
    pub attendance: BTreeMap<String, BTreeMap<String, Option<AttendanceStatus>>>,
}

async fn day_pattern(db: &Db, group_id: Uuid) -> Result<HashSet<Weekday>, ApiError> {
    let names: Vec<String> = sqlx::query_scalar("SELECT day FROM group_days WHERE group_id = $1")
        .bind(group_id)
        .fetch_all(db)
        .await?;
    calendar::parse_day_names(&names)
}

pub async fn record(
    db: &Db,
    group: &Group,
    req: &RecordAttendanceReq,
) -> Result<RecordOutcome, ApiError> {
    let date = parse_date(&req.date)?;

    let days = day_pattern(db, group.id).await?;
    if date < group.start_date || date > group.end_date || !days.contains(&date.weekday()) {
        return Err(ApiError::validation("date not valid for group schedule"));
    }

    let student_name: Option<String> = sqlx::query_scalar(
        "SELECT u.full_name FROM group_students gs \
         JOIN users u ON u.id = gs.student_id \
         WHERE gs.group_id = $1 AND gs.student_id = $2",
    )
    .bind(group.id)
    .bind(req.student_id)
    .fetch_optional(db)
    .await?;
    let student_name =
        student_name.ok_or_else(|| ApiError::not_found("student not found in group"))?;

    let status = AttendanceStatus::parse(&req.status)
        .ok_or_else(|| ApiError::validation("invalid status, use present or absent"))?;

    // single-statement upsert keyed by the unique triple; (xmax = 0) tells
    // inserted rows from updated ones without a second round trip
    let created: bool = sqlx::query_scalar(
        "INSERT INTO attendance (id, group_id, student_id, lesson_date, status) \
         VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT (group_id, student_id, lesson_date) \
         DO UPDATE SET status = EXCLUDED.status \
         RETURNING (xmax = 0)",
    )
    .bind(Uuid::new_v4())
    .bind(group.id)
    .bind(req.student_id)
    .bind(date)
    .bind(status)
    .fetch_one(db)
    .await?;

    Ok(RecordOutcome {
        created,
        student_name,
        date,
        status,
    })
}

pub async fn sheet(db: &Db, group: &Group) -> Result<AttendanceSheet, ApiError> {
    let days = day_pattern(db, group.id).await?;
    let dates = lesson_dates(group.start_date, group.end_date, &days);

    let students: Vec<(Uuid, String)> = sqlx::query_as(
        "SELECT u.id, u.full_name FROM group_students gs \
         JOIN users u ON u.id = gs.student_id \
         WHERE gs.group_id = $1 ORDER BY u.full_name",
    )
    .bind(group.id)
    .fetch_all(db)
    .await?;

    let records: Vec<(Uuid, NaiveDate, AttendanceStatus)> = sqlx::query_as(
        "SELECT student_id, lesson_date, status FROM attendance WHERE group_id = $1",
    )
    .bind(group.id)
    .fetch_all(db)
    .await?;

    Ok(build_sheet(group, &dates, &students, &records))
}

fn build_sheet(
    group: &Group,
    dates: &[NaiveDate],
    students: &[(Uuid, String)],
    records: &[(Uuid, NaiveDate, AttendanceStatus)],
) -> AttendanceSheet {
    let by_key: HashMap<(Uuid, NaiveDate), AttendanceStatus> = records
        .iter()
        .map(|(student, date, status)| ((*student, *date), *status))
        .collect();

    let mut attendance = BTreeMap::new();
    for (id, name) in students {
        let row = dates
            .iter()
            .map(|d| (format_date(*d), by_key.get(&(*id, *d)).copied()))
            .collect();
        attendance.insert(name.clone(), row);
    }

    AttendanceSheet {
        group_id: group.id,
        group_name: group.name.clone(),
        dates: dates.iter().map(|d| format_date(*d)).collect(),
        attendance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn group() -> Group {
        Group {
            id: Uuid::new_v4(),
            name: "Rust 101".into(),
            course_id: Uuid::new_v4(),
            teacher_id: Uuid::new_v4(),
            start_date: date(2024, 1, 1),
            end_date: date(2024, 1, 10),
        }
    }

    #[test]
    fn sheet_fills_unrecorded_cells_with_null() {
        let group = group();
        let anna = Uuid::new_v4();
        let bek = Uuid::new_v4();
        let dates = [date(2024, 1, 1), date(2024, 1, 3)];
        let students = [(anna, "Anna".to_string()), (bek, "Bek".to_string())];
        let records = [(anna, date(2024, 1, 1), AttendanceStatus::Present)];

        let sheet = build_sheet(&group, &dates, &students, &records);

        assert_eq!(sheet.dates, vec!["01.01.2024", "03.01.2024"]);
        let anna_row = &sheet.attendance["Anna"];
        assert_eq!(anna_row["01.01.2024"], Some(AttendanceStatus::Present));
        assert_eq!(anna_row["03.01.2024"], None);
        let bek_row = &sheet.attendance["Bek"];
        assert_eq!(bek_row["01.01.2024"], None);
        assert_eq!(bek_row["03.01.2024"], None);
    }

    #[test]
    fn sheet_ignores_records_off_the_lesson_grid() {
        // a record for a date that is no longer a lesson date (schedule
        // changed after the fact) simply doesn't show up in the matrix
        let group = group();
        let anna = Uuid::new_v4();
        let dates = [date(2024, 1, 1)];
        let students = [(anna, "Anna".to_string())];
        let records = [(anna, date(2024, 1, 2), AttendanceStatus::Absent)];

        let sheet = build_sheet(&group, &dates, &students, &records);
        assert_eq!(sheet.attendance["Anna"].len(), 1);
        assert_eq!(sheet.attendance["Anna"]["01.01.2024"], None);
    }

    #[test]
    fn sheet_serializes_null_for_missing_and_lowercase_status() {
        let group = group();
        let anna = Uuid::new_v4();
        let dates = [date(2024, 1, 1), date(2024, 1, 3)];
        let students = [(anna, "Anna".to_string())];
        let records = [(anna, date(2024, 1, 3), AttendanceStatus::Absent)];

        let sheet = build_sheet(&group, &dates, &students, &records);
        let json = serde_json::to_value(&sheet).unwrap();
        assert_eq!(json["attendance"]["Anna"]["01.01.2024"], serde_json::Value::Null);
        assert_eq!(json["attendance"]["Anna"]["03.01.2024"], "absent");
    }
}
