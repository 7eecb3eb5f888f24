// src/services/feed_service.rs
use crate::{
    error::{AppError, AppResult},
    forms::parse_iso8601,
    models::shift::{CalendarEvent, ShiftRow},
    services::{course_service, shift_service::SHIFT_ROW_SELECT, user_service},
};
use chrono::NaiveDateTime;
use serde::Deserialize;
use sqlx::SqlitePool;

pub const MISSING_RANGE_ERROR: &str = "Both start and end dates must be specified.";
pub const MALFORMED_RANGE_ERROR: &str = "Either start or end date is not in correct ISO8601 format.";

/// `?start=&end=` as sent by the calendar widget.
#[derive(Debug, Default, Deserialize)]
pub struct FeedQuery {
    pub start: Option<String>,
    pub end: Option<String>,
}

impl FeedQuery {
    /// Both bounds, inclusive.
    pub fn range(&self) -> AppResult<(NaiveDateTime, NaiveDateTime)> {
        let (Some(start), Some(end)) = (&self.start, &self.end) else {
            return Err(AppError::BadRequest(MISSING_RANGE_ERROR.to_string()));
        };
        match (parse_iso8601(start), parse_iso8601(end)) {
            (Some(start), Some(end)) => Ok((start, end)),
            _ => Err(AppError::BadRequest(MALFORMED_RANGE_ERROR.to_string())),
        }
    }
}

/// Shifts of one person starting inside the range.
pub async fn user_events(
    db_pool: &SqlitePool,
    user_id: i64,
    query: &FeedQuery,
) -> AppResult<Vec<CalendarEvent>> {
    let (start, end) = query.range()?;
    user_service::get_user(db_pool, user_id).await?;

    let shifts = sqlx::query_as::<_, ShiftRow>(&format!(
        "{SHIFT_ROW_SELECT} WHERE s.associated_person_id = ?1 AND s.start >= ?2 AND s.start <= ?3 ORDER BY s.start ASC"
    ))
    .bind(user_id)
    .bind(start)
    .bind(end)
    .fetch_all(db_pool)
    .await?;

    tracing::debug!("User feed {}: {} events between {} and {}", user_id, shifts.len(), start, end);
    Ok(shifts.iter().map(ShiftRow::to_event).collect())
}

/// Shifts of everyone leading SI for, or tutoring, the course.
/// Only the start is compared, so a shift running into the range from before it is left out.
pub async fn course_events(
    db_pool: &SqlitePool,
    course_id: i64,
    query: &FeedQuery,
) -> AppResult<Vec<CalendarEvent>> {
    let (start, end) = query.range()?;
    course_service::get_course(db_pool, course_id).await?;

    let shifts = sqlx::query_as::<_, ShiftRow>(&format!(
        r#"{SHIFT_ROW_SELECT}
        WHERE (u.si_course_id = ?1
               OR EXISTS (SELECT 1 FROM user_courses_tutored uct
                          WHERE uct.user_id = u.id AND uct.course_id = ?1))
          AND s.start >= ?2 AND s.start <= ?3
        ORDER BY s.start ASC"#
    ))
    .bind(course_id)
    .bind(start)
    .bind(end)
    .fetch_all(db_pool)
    .await?;

    tracing::debug!("Course feed {}: {} events", course_id, shifts.len());
    Ok(shifts.iter().map(ShiftRow::to_event).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::test_pool,
        models::{course::CourseData, shift::ShiftKind, user::NewUser},
        services::shift_service::tests::{at, make_shift, make_user},
    };

    fn query(start: Option<&str>, end: Option<&str>) -> FeedQuery {
        FeedQuery {
            start: start.map(String::from),
            end: end.map(String::from),
        }
    }

    #[test]
    fn range_reports_missing_and_malformed_bounds() {
        let missing = query(Some("2024-01-01"), None).range().unwrap_err();
        assert!(matches!(missing, AppError::BadRequest(ref m) if m == MISSING_RANGE_ERROR));

        let malformed = query(Some("2024-01-01"), Some("next tuesday")).range().unwrap_err();
        assert!(matches!(malformed, AppError::BadRequest(ref m) if m == MALFORMED_RANGE_ERROR));

        let (start, end) = query(Some("2024-01-01T00:00:00+05:00"), Some("2024-01-07"))
            .range()
            .unwrap();
        assert_eq!(start, at(2024, 1, 1, 0, 0));
        assert_eq!(end, at(2024, 1, 7, 0, 0));
    }

    #[tokio::test]
    async fn user_feed_returns_shifts_inside_the_range() {
        let pool = test_pool().await;
        let person = make_user(&pool, "tutor", "Tutors").await;
        let inside = make_shift(&pool, person, at(2024, 1, 3, 14, 0), ShiftKind::Tutoring).await;
        make_shift(&pool, person, at(2024, 1, 9, 14, 0), ShiftKind::Tutoring).await;

        let events = user_events(&pool, person, &query(Some("2024-01-01"), Some("2024-01-07")))
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, inside.to_string());
        assert_eq!(events[0].end, "2024-01-03T15:00:00");
    }

    #[tokio::test]
    async fn course_feed_covers_si_leaders_and_tutors() {
        let pool = test_pool().await;
        let course = course_service::create_course(
            &pool,
            &CourseData {
                department: "MATH".into(),
                number: 131,
                name: "Calculus I".into(),
            },
        )
        .await
        .unwrap();
        let tutor = user_service::create_user(
            &pool,
            &NewUser {
                username: "tutor".into(),
                password: "pw".into(),
                courses_tutored: vec![course],
                groups: vec!["Tutors".into()],
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let unrelated = make_user(&pool, "other", "Tutors").await;
        make_shift(&pool, tutor, at(2024, 1, 3, 14, 0), ShiftKind::Tutoring).await;
        make_shift(&pool, unrelated, at(2024, 1, 3, 14, 0), ShiftKind::Tutoring).await;

        let range = query(Some("2024-01-01"), Some("2024-01-07"));
        let events = course_events(&pool, course, &range).await.unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            course_events(&pool, course + 1, &range).await,
            Err(AppError::NotFound(_))
        ));
    }
}
