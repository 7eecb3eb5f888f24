// src/services/shift_service.rs
use crate::{
    error::{AppError, AppResult},
    models::{
        course::Course,
        shift::{NewShift, Shift, ShiftKind, ShiftRow},
    },
    services::course_service,
};
use chrono::{Datelike, NaiveDate, NaiveDateTime, TimeDelta};
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashMap;

/// SELECT list for `ShiftRow`: the shift plus its person's name fields.
pub const SHIFT_ROW_SELECT: &str = r#"
    SELECT s.id, s.associated_person_id, s.start, s.duration_secs, s.location, s.kind,
           u.username, u.first_name, u.last_name
    FROM shifts s
    JOIN users u ON u.id = s.associated_person_id
"#;

pub async fn find_shift(conn: &mut SqliteConnection, shift_id: i64) -> AppResult<Option<Shift>> {
    let shift = sqlx::query_as::<_, Shift>(
        "SELECT id, associated_person_id, start, duration_secs, location, kind FROM shifts WHERE id = ?1",
    )
    .bind(shift_id)
    .fetch_optional(conn)
    .await?;
    Ok(shift)
}

pub async fn get_shift(db_pool: &SqlitePool, shift_id: i64) -> AppResult<Shift> {
    let mut conn = db_pool.acquire().await?;
    find_shift(&mut conn, shift_id)
        .await?
        .ok_or(AppError::NotFound("Shift"))
}

pub async fn get_shift_row(db_pool: &SqlitePool, shift_id: i64) -> AppResult<ShiftRow> {
    sqlx::query_as::<_, ShiftRow>(&format!("{SHIFT_ROW_SELECT} WHERE s.id = ?1"))
        .bind(shift_id)
        .fetch_optional(db_pool)
        .await?
        .ok_or(AppError::NotFound("Shift"))
}

pub async fn insert_shift(conn: &mut SqliteConnection, shift: &NewShift) -> AppResult<i64> {
    let id = sqlx::query(
        r#"
        INSERT INTO shifts (associated_person_id, start, duration_secs, location, kind)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(shift.associated_person_id)
    .bind(shift.start)
    .bind(shift.duration_secs)
    .bind(&shift.location)
    .bind(shift.kind)
    .execute(conn)
    .await?
    .last_insert_rowid();
    Ok(id)
}

pub async fn create_shift(db_pool: &SqlitePool, shift: &NewShift) -> AppResult<i64> {
    let mut conn = db_pool.acquire().await?;
    let id = insert_shift(&mut conn, shift).await?;
    tracing::info!(
        "Shift {} created for user {} at {}",
        id,
        shift.associated_person_id,
        shift.start
    );
    Ok(id)
}

/// Writes every column of `shift` back to its row.
pub async fn save_shift(conn: &mut SqliteConnection, shift: &Shift) -> AppResult<()> {
    let rows_affected = sqlx::query(
        r#"
        UPDATE shifts
        SET associated_person_id = ?1, start = ?2, duration_secs = ?3, location = ?4, kind = ?5
        WHERE id = ?6
        "#,
    )
    .bind(shift.associated_person_id)
    .bind(shift.start)
    .bind(shift.duration_secs)
    .bind(&shift.location)
    .bind(shift.kind)
    .bind(shift.id)
    .execute(conn)
    .await?
    .rows_affected();

    if rows_affected == 0 {
        return Err(AppError::NotFound("Shift"));
    }
    Ok(())
}

pub async fn delete_shift(conn: &mut SqliteConnection, shift_id: i64) -> AppResult<u64> {
    let rows = sqlx::query("DELETE FROM shifts WHERE id = ?1")
        .bind(shift_id)
        .execute(conn)
        .await?
        .rows_affected();
    Ok(rows)
}

pub async fn shifts_for_user(db_pool: &SqlitePool, user_id: i64) -> AppResult<Vec<ShiftRow>> {
    let shifts = sqlx::query_as::<_, ShiftRow>(&format!(
        "{SHIFT_ROW_SELECT} WHERE s.associated_person_id = ?1 ORDER BY s.start ASC"
    ))
    .bind(user_id)
    .fetch_all(db_pool)
    .await?;
    Ok(shifts)
}

/// Shifts whose start falls on `date` (local calendar day).
pub async fn shifts_on_date(db_pool: &SqlitePool, date: NaiveDate) -> AppResult<Vec<ShiftRow>> {
    let shifts = sqlx::query_as::<_, ShiftRow>(&format!(
        "{SHIFT_ROW_SELECT} WHERE date(s.start) = ?1 ORDER BY s.start ASC, s.id ASC"
    ))
    .bind(date.format("%Y-%m-%d").to_string())
    .fetch_all(db_pool)
    .await?;
    Ok(shifts)
}

/// Shifts with `from <= start < to`.
pub async fn shifts_starting_between(
    db_pool: &SqlitePool,
    from: NaiveDateTime,
    to: NaiveDateTime,
) -> AppResult<Vec<ShiftRow>> {
    let shifts = sqlx::query_as::<_, ShiftRow>(&format!(
        "{SHIFT_ROW_SELECT} WHERE s.start >= ?1 AND s.start < ?2 ORDER BY s.start ASC"
    ))
    .bind(from)
    .bind(to)
    .fetch_all(db_pool)
    .await?;
    Ok(shifts)
}

// --- Weekly schedule grid ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleFilter {
    Si,
    Tutoring,
    All,
}

impl ScheduleFilter {
    pub fn parse(raw: &str) -> Option<ScheduleFilter> {
        if raw.eq_ignore_ascii_case("all") {
            return Some(ScheduleFilter::All);
        }
        match raw.parse::<ShiftKind>().ok()? {
            ShiftKind::Si => Some(ScheduleFilter::Si),
            ShiftKind::Tutoring => Some(ScheduleFilter::Tutoring),
        }
    }

    fn includes(&self, kind: ShiftKind) -> bool {
        match self {
            ScheduleFilter::All => true,
            ScheduleFilter::Si => kind == ShiftKind::Si,
            ScheduleFilter::Tutoring => kind == ShiftKind::Tutoring,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScheduleRow {
    pub course: Course,
    /// Seven columns, one per day starting at the grid's first day.
    pub days: Vec<Vec<ShiftRow>>,
}

/// One row per course, one column per day for the week starting at `first_day`.
/// SI shifts go under the person's SI course, tutoring shifts under every course they tutor.
pub async fn weekly_schedule(
    db_pool: &SqlitePool,
    filter: ScheduleFilter,
    first_day: NaiveDate,
) -> AppResult<Vec<ScheduleRow>> {
    let from = first_day.and_hms_opt(0, 0, 0).unwrap_or_default();
    let to = from
        .checked_add_signed(TimeDelta::days(7))
        .ok_or_else(|| AppError::BadRequest("Schedule week is out of range".to_string()))?;
    let shifts = shifts_starting_between(db_pool, from, to).await?;

    let si_course: HashMap<i64, i64> = sqlx::query_as::<_, (i64, i64)>(
        "SELECT id, si_course_id FROM users WHERE si_course_id IS NOT NULL",
    )
    .fetch_all(db_pool)
    .await?
    .into_iter()
    .collect();

    let mut tutored: HashMap<i64, Vec<i64>> = HashMap::new();
    for (user_id, course_id) in sqlx::query_as::<_, (i64, i64)>(
        "SELECT user_id, course_id FROM user_courses_tutored",
    )
    .fetch_all(db_pool)
    .await?
    {
        tutored.entry(user_id).or_default().push(course_id);
    }

    let mut rows: Vec<ScheduleRow> = course_service::list_courses(db_pool)
        .await?
        .into_iter()
        .map(|course| ScheduleRow {
            course,
            days: vec![Vec::new(); 7],
        })
        .collect();
    let position: HashMap<i64, usize> = rows
        .iter()
        .enumerate()
        .map(|(i, row)| (row.course.id, i))
        .collect();

    let first_weekday = first_day.weekday().num_days_from_monday() as i64;
    for shift in shifts {
        if !filter.includes(shift.kind) {
            continue;
        }
        let column = (shift.start.weekday().num_days_from_monday() as i64 - first_weekday)
            .rem_euclid(7) as usize;
        let courses: Vec<i64> = match shift.kind {
            ShiftKind::Si => si_course
                .get(&shift.associated_person_id)
                .copied()
                .into_iter()
                .collect(),
            ShiftKind::Tutoring => tutored
                .get(&shift.associated_person_id)
                .cloned()
                .unwrap_or_default(),
        };
        for course_id in courses {
            if let Some(&i) = position.get(&course_id) {
                rows[i].days[column].push(shift.clone());
            }
        }
    }

    Ok(rows)
}
