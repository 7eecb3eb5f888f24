// src/forms.rs
//! Raw form payloads (everything arrives as text) and their validation.
//!
//! Each form has a `clean()` that either returns typed data or a `FormErrors`
//! listing every bad field, so the page can be rendered again with messages.

use crate::models::{
    change_request::ShiftFields,
    course::CourseData,
    hardware::{HardwareData, LoanData},
    shift::{NewShift, ShiftKind},
    user::{NewUser, ProfileData, ALL_GROUPS},
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;
use std::{collections::HashSet, fmt};

// --- Errors ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors {
    pub errors: Vec<FieldError>,
}

impl FormErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn single(field: &'static str, message: impl Into<String>) -> Self {
        let mut errors = FormErrors::default();
        errors.add(field, message);
        errors
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    /// One "field: message" line per error, for templates.
    pub fn messages(&self) -> Vec<String> {
        self.errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect()
    }

    fn finish<T>(self, value: impl FnOnce() -> T) -> Result<T, FormErrors> {
        if self.is_empty() {
            Ok(value())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for FormErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.messages().join("; "))
    }
}

// --- Field validators ---

pub const COURSE_NUMBER_FORMAT_ERROR: &str =
    "First 3 characters of course number should be a number";
pub const COURSE_NUMBER_RANGE_ERROR: &str = "Course number should be between 100 and 999";

/// Reads the leading digits of `raw` ("187" or "187H") and checks the 100..=999 range.
pub fn validate_course_number(raw: &str) -> Result<i64, String> {
    let digits: String = raw
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        return Err(COURSE_NUMBER_FORMAT_ERROR.to_string());
    }
    // Leading digits that overflow are certainly out of range
    let number: i64 = digits
        .parse()
        .map_err(|_| COURSE_NUMBER_RANGE_ERROR.to_string())?;
    if !(100..=999).contains(&number) {
        return Err(COURSE_NUMBER_RANGE_ERROR.to_string());
    }
    Ok(number)
}

/// Longest shift the forms accept.
pub const MAX_DURATION_SECS: i64 = 24 * 3600;

/// Parses "HH:MM:SS" or "HH:MM" into whole seconds. Must be positive and at most 24 hours.
pub fn parse_duration(raw: &str) -> Result<i64, String> {
    let error = || format!("'{}' is not a duration in HH:MM:SS format", raw.trim());
    let parts: Vec<&str> = raw.trim().split(':').collect();
    let numbers = parts
        .iter()
        .map(|p| p.trim().parse::<i64>().map_err(|_| error()))
        .collect::<Result<Vec<i64>, String>>()?;
    let (hours, minutes, seconds) = match numbers.as_slice() {
        [h, m] => (*h, *m, 0),
        [h, m, s] => (*h, *m, *s),
        _ => return Err(error()),
    };
    if hours < 0 || !(0..60).contains(&minutes) || !(0..60).contains(&seconds) {
        return Err(error());
    }
    let total = hours
        .checked_mul(3600)
        .and_then(|h| h.checked_add(minutes * 60 + seconds))
        .filter(|t| *t <= MAX_DURATION_SECS)
        .ok_or_else(|| "Duration must be at most 24:00:00".to_string())?;
    if total == 0 {
        return Err("Duration must be longer than zero".to_string());
    }
    Ok(total)
}

/// Inverse of `parse_duration`: 3600 -> "1:00:00".
pub fn format_duration(secs: i64) -> String {
    format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
];

/// Accepts the `datetime-local` input format and the space-separated variant.
pub fn parse_datetime(raw: &str) -> Result<NaiveDateTime, String> {
    let raw = raw.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .ok_or_else(|| format!("'{}' is not a date and time (YYYY-MM-DD HH:MM)", raw))
}

pub const LOAN_DATETIME_FORMAT: &str = "%d/%m/%Y %H:%M";

/// Loan forms use DD/MM/YYYY HH:MM; browsers' `datetime-local` values are accepted too.
pub fn parse_loan_datetime(raw: &str) -> Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(raw.trim(), LOAN_DATETIME_FORMAT)
        .or_else(|_| parse_datetime(raw))
        .map_err(|_| format!("'{}' is not in DD/MM/YYYY HH:MM format", raw.trim()))
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| format!("'{}' is not a date (YYYY-MM-DD)", raw.trim()))
}

/// ISO 8601 as sent by the calendar widget: a date, a date-time, or a date-time
/// with offset. Offsets are dropped; the wall-clock part is kept.
pub fn parse_iso8601(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M") {
        return Some(dt);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN))
}

fn required(
    errors: &mut FormErrors,
    field: &'static str,
    raw: &str,
    max_len: usize,
) -> String {
    let value = raw.trim();
    if value.is_empty() {
        errors.add(field, "This field is required.");
    } else if value.chars().count() > max_len {
        errors.add(
            field,
            format!("Ensure this value has at most {} characters.", max_len),
        );
    }
    value.to_string()
}

fn optional_text(
    errors: &mut FormErrors,
    field: &'static str,
    raw: &str,
    max_len: usize,
) -> Option<String> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }
    if value.chars().count() > max_len {
        errors.add(
            field,
            format!("Ensure this value has at most {} characters.", max_len),
        );
    }
    Some(value.to_string())
}

/// Runs `parse` on a non-blank value; blank means "not provided".
fn optional<T>(
    errors: &mut FormErrors,
    field: &'static str,
    raw: &str,
    parse: impl FnOnce(&str) -> Result<T, String>,
) -> Option<T> {
    if raw.trim().is_empty() {
        return None;
    }
    match parse(raw) {
        Ok(v) => Some(v),
        Err(msg) => {
            errors.add(field, msg);
            None
        }
    }
}

fn required_parsed<T>(
    errors: &mut FormErrors,
    field: &'static str,
    raw: &str,
    parse: impl FnOnce(&str) -> Result<T, String>,
) -> Option<T> {
    if raw.trim().is_empty() {
        errors.add(field, "This field is required.");
        return None;
    }
    optional(errors, field, raw, parse)
}

fn parse_id(raw: &str) -> Result<i64, String> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| format!("'{}' is not a valid choice", raw.trim()))
}

fn parse_kind(raw: &str) -> Result<ShiftKind, String> {
    raw.parse::<ShiftKind>()
}

// --- Courses ---

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CourseForm {
    pub department: String,
    pub number: String,
    pub name: String,
}

impl CourseForm {
    pub fn clean(&self) -> Result<CourseData, FormErrors> {
        let mut errors = FormErrors::default();
        let department = required(&mut errors, "department", &self.department, 16);
        let number = match validate_course_number(&self.number) {
            Ok(n) => n,
            Err(msg) => {
                errors.add("number", msg);
                0
            }
        };
        let name = required(&mut errors, "name", &self.name, 64);
        errors.finish(|| CourseData {
            department,
            number,
            name,
        })
    }
}

// --- Users ---

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProfileForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

fn check_email(errors: &mut FormErrors, raw: &str) -> String {
    let email = raw.trim().to_string();
    if !email.is_empty() {
        let valid = email
            .split_once('@')
            .map(|(user, host)| !user.is_empty() && host.contains('.'))
            .unwrap_or(false);
        if !valid {
            errors.add("email", "Enter a valid email address.");
        }
    }
    email
}

impl ProfileForm {
    pub fn clean(&self) -> Result<ProfileData, FormErrors> {
        let mut errors = FormErrors::default();
        let first_name = optional_text(&mut errors, "first_name", &self.first_name, 150);
        let last_name = optional_text(&mut errors, "last_name", &self.last_name, 150);
        let email = check_email(&mut errors, &self.email);
        errors.finish(|| ProfileData {
            first_name: first_name.unwrap_or_default(),
            last_name: last_name.unwrap_or_default(),
            email,
        })
    }
}

/// The create-user form has multi-selects (`courses_tutored`, `groups`), so it is
/// read from the raw list of key/value pairs instead of a flat struct.
#[derive(Debug, Clone, Default)]
pub struct CreateUserForm {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub si_course: String,
    pub courses_tutored: Vec<String>,
    pub groups: Vec<String>,
}

impl CreateUserForm {
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        let mut form = CreateUserForm::default();
        for (key, value) in pairs {
            match key.as_str() {
                "username" => form.username = value.clone(),
                "email" => form.email = value.clone(),
                "first_name" => form.first_name = value.clone(),
                "last_name" => form.last_name = value.clone(),
                "password" => form.password = value.clone(),
                "si_course" => form.si_course = value.clone(),
                "courses_tutored" => form.courses_tutored.push(value.clone()),
                "groups" => form.groups.push(value.clone()),
                _ => {}
            }
        }
        form
    }

    pub fn clean(&self) -> Result<NewUser, FormErrors> {
        let mut errors = FormErrors::default();
        let username = required(&mut errors, "username", &self.username, 150);
        let email = check_email(&mut errors, &self.email);
        if self.password.is_empty() {
            errors.add("password", "This field is required.");
        }
        let si_course_id = optional(&mut errors, "si_course", &self.si_course, parse_id);
        let mut courses_tutored = Vec::new();
        for raw in &self.courses_tutored {
            if let Some(id) = optional(&mut errors, "courses_tutored", raw, parse_id) {
                courses_tutored.push(id);
            }
        }
        let mut groups = Vec::new();
        for raw in &self.groups {
            match ALL_GROUPS.iter().find(|g| g.eq_ignore_ascii_case(raw.trim())) {
                Some(g) => groups.push(g.to_string()),
                None => errors.add("groups", format!("'{}' is not a valid group", raw)),
            }
        }
        errors.finish(|| NewUser {
            username,
            email,
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            password: self.password.clone(),
            is_superuser: false,
            si_course_id,
            courses_tutored,
            groups,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BulkUsersForm {
    pub user_data: String,
}

impl BulkUsersForm {
    /// One user per line: `username,email,first_name,last_name,primary_group,password`.
    /// Any bad line rejects the whole batch.
    pub fn clean(&self) -> Result<Vec<NewUser>, FormErrors> {
        let mut errors = FormErrors::default();
        let mut users = Vec::new();
        let mut seen = HashSet::new();

        for (index, line) in self.user_data.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let line_no = index + 1;
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            let &[username, email, first_name, last_name, group, password] = fields.as_slice() else {
                errors.add(
                    "user_data",
                    format!("Line {}: expected 6 comma-separated fields, got {}", line_no, fields.len()),
                );
                continue;
            };
            if username.is_empty() || password.is_empty() {
                errors.add(
                    "user_data",
                    format!("Line {}: username and password are required", line_no),
                );
                continue;
            }
            let Some(group) = ALL_GROUPS.iter().find(|g| g.eq_ignore_ascii_case(group)) else {
                errors.add(
                    "user_data",
                    format!("Line {}: unknown group '{}'", line_no, group),
                );
                continue;
            };
            if !seen.insert(username.to_string()) {
                errors.add(
                    "user_data",
                    format!("Line {}: username '{}' appears twice", line_no, username),
                );
                continue;
            }
            users.push(NewUser {
                username: username.to_string(),
                email: email.to_string(),
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                password: password.to_string(),
                groups: vec![group.to_string()],
                ..Default::default()
            });
        }

        if users.is_empty() && errors.is_empty() {
            errors.add("user_data", "This field is required.");
        }
        errors.finish(|| users)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PasswordChangeForm {
    pub old_password: String,
    pub new_password1: String,
    pub new_password2: String,
}

impl PasswordChangeForm {
    /// Only checks the new password pair; the old one is verified against the hash by the handler.
    pub fn clean(&self) -> Result<String, FormErrors> {
        let mut errors = FormErrors::default();
        if self.old_password.is_empty() {
            errors.add("old_password", "This field is required.");
        }
        if self.new_password1.chars().count() < 8 {
            errors.add("new_password1", "This password is too short. It must contain at least 8 characters.");
        }
        if self.new_password1 != self.new_password2 {
            errors.add("new_password2", "The two password fields didn't match.");
        }
        errors.finish(|| self.new_password1.clone())
    }
}

// --- Shifts and requests ---

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ShiftForm {
    pub associated_person: String,
    pub start: String,
    pub duration: String,
    pub location: String,
    pub kind: String,
}

impl ShiftForm {
    pub fn from_fields(fields: &ShiftFields) -> Self {
        ShiftForm {
            associated_person: fields
                .associated_person_id
                .map(|id| id.to_string())
                .unwrap_or_default(),
            start: fields
                .start
                .map(|s| s.format("%Y-%m-%dT%H:%M").to_string())
                .unwrap_or_default(),
            duration: fields.duration_secs.map(format_duration).unwrap_or_default(),
            location: fields.location.clone().unwrap_or_default(),
            kind: fields.kind.map(|k| k.to_string()).unwrap_or_default(),
        }
    }

    pub fn clean(&self) -> Result<NewShift, FormErrors> {
        let mut errors = FormErrors::default();
        let person = required_parsed(&mut errors, "associated_person", &self.associated_person, parse_id);
        let start = required_parsed(&mut errors, "start", &self.start, parse_datetime);
        let duration = required_parsed(&mut errors, "duration", &self.duration, parse_duration);
        let location = required(&mut errors, "location", &self.location, 32);
        let kind = required_parsed(&mut errors, "kind", &self.kind, parse_kind);
        match (person, start, duration, kind) {
            (Some(associated_person_id), Some(start), Some(duration_secs), Some(kind))
                if errors.is_empty() =>
            {
                Ok(NewShift {
                    associated_person_id,
                    start,
                    duration_secs,
                    location,
                    kind,
                })
            }
            _ => Err(errors),
        }
    }
}

/// Self-service form for tutors: only the time slot, the rest is fixed.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TutorShiftForm {
    pub start: String,
    pub duration: String,
}

impl TutorShiftForm {
    pub fn clean(&self) -> Result<(NaiveDateTime, i64), FormErrors> {
        let mut errors = FormErrors::default();
        let start = required_parsed(&mut errors, "start", &self.start, parse_datetime);
        let duration = required_parsed(&mut errors, "duration", &self.duration, parse_duration);
        match (start, duration) {
            (Some(s), Some(d)) => Ok((s, d)),
            _ => Err(errors),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChangeRequestForm {
    pub reason: String,
    pub new_associated_person: String,
    pub new_start: String,
    pub new_duration: String,
    pub new_location: String,
    pub new_kind: String,
}

impl ChangeRequestForm {
    pub fn from_fields(fields: &ShiftFields) -> Self {
        let shift = ShiftForm::from_fields(fields);
        ChangeRequestForm {
            reason: String::new(),
            new_associated_person: shift.associated_person,
            new_start: shift.start,
            new_duration: shift.duration,
            new_location: shift.location,
            new_kind: shift.kind,
        }
    }

    /// Blank fields mean "leave unchanged". With `new_shift` the request creates a
    /// shift, so start, duration and location become mandatory.
    pub fn clean(&self, new_shift: bool) -> Result<(String, ShiftFields), FormErrors> {
        let mut errors = FormErrors::default();
        let reason = required(&mut errors, "reason", &self.reason, 512);
        let fields = if new_shift {
            ShiftFields {
                associated_person_id: optional(&mut errors, "new_associated_person", &self.new_associated_person, parse_id),
                start: required_parsed(&mut errors, "new_start", &self.new_start, parse_datetime),
                duration_secs: required_parsed(&mut errors, "new_duration", &self.new_duration, parse_duration),
                location: Some(required(&mut errors, "new_location", &self.new_location, 32)),
                kind: optional(&mut errors, "new_kind", &self.new_kind, parse_kind),
            }
        } else {
            ShiftFields {
                associated_person_id: optional(&mut errors, "new_associated_person", &self.new_associated_person, parse_id),
                start: optional(&mut errors, "new_start", &self.new_start, parse_datetime),
                duration_secs: optional(&mut errors, "new_duration", &self.new_duration, parse_duration),
                location: optional_text(&mut errors, "new_location", &self.new_location, 32),
                kind: optional(&mut errors, "new_kind", &self.new_kind, parse_kind),
            }
        };
        errors.finish(|| (reason, fields))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DropRequestForm {
    pub reason: String,
}

impl DropRequestForm {
    pub fn clean(&self) -> Result<String, FormErrors> {
        let mut errors = FormErrors::default();
        let reason = required(&mut errors, "reason", &self.reason, 512);
        errors.finish(|| reason)
    }
}

// --- Bulk editing ---

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DropShiftsOnDateForm {
    pub date: String,
}

impl DropShiftsOnDateForm {
    pub fn clean(&self) -> Result<NaiveDate, FormErrors> {
        let mut errors = FormErrors::default();
        let date = required_parsed(&mut errors, "date", &self.date, parse_date);
        date.ok_or(errors)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SwapShiftDatesForm {
    pub first_date: String,
    pub second_date: String,
}

impl SwapShiftDatesForm {
    pub fn clean(&self) -> Result<(NaiveDate, NaiveDate), FormErrors> {
        let mut errors = FormErrors::default();
        let first = required_parsed(&mut errors, "first_date", &self.first_date, parse_date);
        let second = required_parsed(&mut errors, "second_date", &self.second_date, parse_date);
        match (first, second) {
            (Some(a), Some(b)) => Ok((a, b)),
            _ => Err(errors),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MoveShiftsForm {
    pub from_date: String,
    pub to_date: String,
}

impl MoveShiftsForm {
    pub fn clean(&self) -> Result<(NaiveDate, NaiveDate), FormErrors> {
        let mut errors = FormErrors::default();
        let from = required_parsed(&mut errors, "from_date", &self.from_date, parse_date);
        let to = required_parsed(&mut errors, "to_date", &self.to_date, parse_date);
        match (from, to) {
            (Some(a), Some(b)) if a == b => Err(FormErrors::single(
                "to_date",
                "Target date must differ from the source date.",
            )),
            (Some(a), Some(b)) => Ok((a, b)),
            _ => Err(errors),
        }
    }
}

// --- Hardware ---

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HardwareForm {
    pub name: String,
    // Unchecked checkboxes are simply absent from the body
    pub is_available: Option<String>,
}

impl HardwareForm {
    pub fn clean(&self) -> Result<HardwareData, FormErrors> {
        let mut errors = FormErrors::default();
        let name = required(&mut errors, "name", &self.name, 200);
        let is_available = self
            .is_available
            .as_deref()
            .map(|v| matches!(v, "on" | "true" | "1"))
            .unwrap_or(false);
        errors.finish(|| HardwareData { name, is_available })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoanForm {
    pub target: String,
    pub hardware_user: String,
    pub start_time: String,
    pub return_time: String,
}

impl LoanForm {
    pub fn clean(&self) -> Result<LoanData, FormErrors> {
        let mut errors = FormErrors::default();
        let hardware_id = required_parsed(&mut errors, "target", &self.target, parse_id);
        let borrower_id = required_parsed(&mut errors, "hardware_user", &self.hardware_user, parse_id);
        let start_time = required_parsed(&mut errors, "start_time", &self.start_time, parse_loan_datetime);
        let return_time = optional(&mut errors, "return_time", &self.return_time, parse_loan_datetime);
        match (hardware_id, borrower_id, start_time) {
            (Some(hardware_id), Some(borrower_id), Some(start_time)) if errors.is_empty() => {
                Ok(LoanData {
                    hardware_id,
                    borrower_id,
                    start_time,
                    return_time,
                })
            }
            _ => Err(errors),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn course_number_range_is_inclusive() {
        assert_eq!(validate_course_number("100"), Ok(100));
        assert_eq!(validate_course_number("999"), Ok(999));
        assert_eq!(validate_course_number("187H"), Ok(187));
        assert_eq!(validate_course_number("99"), Err(COURSE_NUMBER_RANGE_ERROR.to_string()));
        assert_eq!(validate_course_number("1000"), Err(COURSE_NUMBER_RANGE_ERROR.to_string()));
    }

    #[test]
    fn course_number_must_start_with_digits() {
        assert_eq!(validate_course_number("H187"), Err(COURSE_NUMBER_FORMAT_ERROR.to_string()));
        assert_eq!(validate_course_number(""), Err(COURSE_NUMBER_FORMAT_ERROR.to_string()));
        assert_eq!(validate_course_number("abc"), Err(COURSE_NUMBER_FORMAT_ERROR.to_string()));
    }

    #[test]
    fn course_form_reports_every_bad_field() {
        let form = CourseForm {
            department: "".into(),
            number: "99".into(),
            name: "x".repeat(65),
        };
        let errors = form.clean().unwrap_err();
        assert!(errors.has("department"));
        assert!(errors.has("number"));
        assert!(errors.has("name"));
    }

    #[test]
    fn durations_round_trip_through_text() {
        assert_eq!(parse_duration("1:00:00"), Ok(3600));
        assert_eq!(parse_duration("01:30"), Ok(5400));
        assert_eq!(format_duration(5400), "1:30:00");
        assert!(parse_duration("0:00:00").is_err());
        assert!(parse_duration("1:75:00").is_err());
        assert!(parse_duration("an hour").is_err());
    }

    #[test]
    fn duration_is_capped_at_one_day() {
        assert_eq!(parse_duration("24:00:00"), Ok(MAX_DURATION_SECS));
        assert!(parse_duration("24:00:01").is_err());
        assert!(parse_duration("10000000000:00:00").is_err());
        assert!(parse_duration(&format!("{}:00", i64::MAX)).is_err());
    }

    #[test]
    fn iso8601_accepts_dates_and_offsets() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(parse_iso8601("2024-01-01"), Some(expected));
        assert_eq!(parse_iso8601("2024-01-01T00:00:00"), Some(expected));
        assert_eq!(parse_iso8601("2024-01-01T00:00:00-05:00"), Some(expected));
        assert_eq!(parse_iso8601("yesterday"), None);
    }

    #[test]
    fn loan_times_use_day_first_format() {
        let parsed = parse_loan_datetime("03/02/2024 10:30").unwrap();
        assert_eq!(parsed.to_string(), "2024-02-03 10:30:00");
        assert!(parse_loan_datetime("2024-02-03T10:30").is_ok());
        assert!(parse_loan_datetime("Feb 3").is_err());
    }

    #[test]
    fn bulk_users_reject_the_whole_batch_on_one_bad_line() {
        let form = BulkUsersForm {
            user_data: "amy,amy@umass.edu,Amy,Adams,Tutors,pw1\nbob,bob@umass.edu,Bob\n".into(),
        };
        let errors = form.clean().unwrap_err();
        assert_eq!(errors.errors.len(), 1);
        assert!(errors.errors[0].message.starts_with("Line 2"));
    }

    #[test]
    fn bulk_users_parse_valid_lines() {
        let form = BulkUsersForm {
            user_data: "amy,amy@umass.edu,Amy,Adams,Tutors,pw1\n\n cat,cat@umass.edu,Cat,Cole,sis,pw2 \n".into(),
        };
        let users = form.clean().unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[1].username, "cat");
        assert_eq!(users[1].groups, vec!["SIs".to_string()]);
    }

    #[test]
    fn change_request_blank_fields_mean_unchanged() {
        let form = ChangeRequestForm {
            reason: "Exam week".into(),
            new_location: "ILC 110".into(),
            ..Default::default()
        };
        let (reason, fields) = form.clean(false).unwrap();
        assert_eq!(reason, "Exam week");
        assert_eq!(fields.location.as_deref(), Some("ILC 110"));
        assert_eq!(fields.start, None);
        assert_eq!(fields.duration_secs, None);
    }

    #[test]
    fn new_shift_requests_need_a_time_slot() {
        let form = ChangeRequestForm {
            reason: "Extra review session".into(),
            ..Default::default()
        };
        let errors = form.clean(true).unwrap_err();
        assert!(errors.has("new_start"));
        assert!(errors.has("new_duration"));
        assert!(errors.has("new_location"));
    }

    #[test]
    fn unchecked_hardware_box_means_unavailable() {
        let form = HardwareForm {
            name: "Projector #1".into(),
            is_available: None,
        };
        assert!(!form.clean().unwrap().is_available);
    }
}
