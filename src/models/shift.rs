// src/models/shift.rs
use super::{display_datetime, ISO_FORMAT};
use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
pub enum ShiftKind {
    #[sqlx(rename = "SI")]
    #[serde(rename = "SI")]
    Si,
    Tutoring,
}

impl ShiftKind {
    pub const ALL: [ShiftKind; 2] = [ShiftKind::Si, ShiftKind::Tutoring];

    pub fn as_str(&self) -> &'static str {
        match self {
            ShiftKind::Si => "SI",
            ShiftKind::Tutoring => "Tutoring",
        }
    }
}

impl fmt::Display for ShiftKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShiftKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            k if k.eq_ignore_ascii_case("SI") => Ok(ShiftKind::Si),
            k if k.eq_ignore_ascii_case("Tutoring") => Ok(ShiftKind::Tutoring),
            other => Err(format!("'{}' is not a valid shift kind (SI or Tutoring)", other)),
        }
    }
}

// Row of the `shifts` table
#[derive(Debug, Clone, FromRow, PartialEq, Eq)]
pub struct Shift {
    pub id: i64,
    pub associated_person_id: i64,
    pub start: NaiveDateTime,
    pub duration_secs: i64,
    pub location: String,
    pub kind: ShiftKind,
}

impl Shift {
    pub fn end(&self) -> NaiveDateTime {
        end_of(self.start, self.duration_secs)
    }
}

// Saturates instead of panicking on rows whose duration runs past the calendar
fn end_of(start: NaiveDateTime, duration_secs: i64) -> NaiveDateTime {
    TimeDelta::try_seconds(duration_secs)
        .and_then(|d| start.checked_add_signed(d))
        .unwrap_or(NaiveDateTime::MAX)
}

/// A shift joined with the name fields of its person, used for listings and feeds.
#[derive(Debug, Clone, FromRow)]
pub struct ShiftRow {
    pub id: i64,
    pub associated_person_id: i64,
    pub start: NaiveDateTime,
    pub duration_secs: i64,
    pub location: String,
    pub kind: ShiftKind,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

impl ShiftRow {
    pub fn person(&self) -> String {
        super::user::display_name(&self.username, &self.first_name, &self.last_name)
    }

    pub fn end(&self) -> NaiveDateTime {
        end_of(self.start, self.duration_secs)
    }

    /// "Jane Doe in GSMN 64 at 2024-01-03 14:00"
    pub fn title(&self) -> String {
        format!(
            "{} in {} at {}",
            self.person(),
            self.location,
            display_datetime(&self.start)
        )
    }

    pub fn to_event(&self) -> CalendarEvent {
        CalendarEvent {
            id: self.id.to_string(),
            start: self.start.format(ISO_FORMAT).to_string(),
            end: self.end().format(ISO_FORMAT).to_string(),
            title: self.title(),
            all_day: false,
            url: format!("/shifts/{}", self.id),
        }
    }
}

/// Validated data for a brand new shift.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewShift {
    pub associated_person_id: i64,
    pub start: NaiveDateTime,
    pub duration_secs: i64,
    pub location: String,
    pub kind: ShiftKind,
}

/// Event object understood by the calendar widget.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CalendarEvent {
    pub id: String,
    pub start: String,
    pub end: String,
    pub title: String,
    #[serde(rename = "allDay")]
    pub all_day: bool,
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row() -> ShiftRow {
        ShiftRow {
            id: 42,
            associated_person_id: 3,
            start: NaiveDate::from_ymd_opt(2024, 1, 3)
                .unwrap()
                .and_hms_opt(14, 0, 0)
                .unwrap(),
            duration_secs: 3600,
            location: "GSMN 64".into(),
            kind: ShiftKind::Tutoring,
            username: "jdoe".into(),
            first_name: "Jane".into(),
            last_name: "Doe".into(),
        }
    }

    #[test]
    fn kind_parses_case_insensitively() {
        assert_eq!("si".parse::<ShiftKind>().unwrap(), ShiftKind::Si);
        assert_eq!("Tutoring".parse::<ShiftKind>().unwrap(), ShiftKind::Tutoring);
        assert!("Lab".parse::<ShiftKind>().is_err());
    }

    #[test]
    fn event_end_is_start_plus_duration() {
        let event = row().to_event();
        assert_eq!(event.id, "42");
        assert_eq!(event.start, "2024-01-03T14:00:00");
        assert_eq!(event.end, "2024-01-03T15:00:00");
        assert_eq!(event.title, "Jane Doe in GSMN 64 at 2024-01-03 14:00");
        assert_eq!(event.url, "/shifts/42");
        assert!(!event.all_day);
    }

    #[test]
    fn oversized_duration_does_not_break_the_event() {
        let mut shift = row();
        shift.duration_secs = 10_000_000_000 * 3600;
        assert_eq!(shift.end(), NaiveDateTime::MAX);
        assert_eq!(shift.to_event().start, "2024-01-03T14:00:00");

        shift.duration_secs = i64::MAX;
        assert_eq!(shift.end(), NaiveDateTime::MAX);
    }

    #[test]
    fn event_serializes_with_calendar_field_names() {
        let json = serde_json::to_value(row().to_event()).unwrap();
        assert_eq!(json["allDay"], serde_json::Value::Bool(false));
        assert!(json.get("all_day").is_none());
    }
}
