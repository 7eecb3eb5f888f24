// src/models/user.rs
use serde::Deserialize;
use sqlx::FromRow;

pub const OFFICE_STAFF: &str = "Office staff";
pub const SUPERVISORS: &str = "Supervisors";
pub const SIS: &str = "SIs";
pub const TUTORS: &str = "Tutors";

/// Groups whose members may approve requests and manage courses, users and hardware.
pub const PRIVILEGED_GROUPS: &[&str] = &[OFFICE_STAFF, SUPERVISORS];

pub const ALL_GROUPS: &[&str] = &[OFFICE_STAFF, SUPERVISORS, SIS, TUTORS];

// Row of the `users` table
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub is_superuser: bool,
    pub si_course_id: Option<i64>,
}

impl User {
    pub fn display_name(&self) -> String {
        display_name(&self.username, &self.first_name, &self.last_name)
    }
}

/// "First Last", or the username when either name is missing.
pub fn display_name(username: &str, first_name: &str, last_name: &str) -> String {
    if first_name.trim().is_empty() || last_name.trim().is_empty() {
        username.to_string()
    } else {
        format!("{} {}", first_name, last_name)
    }
}

/// The authenticated caller, loaded by `require_auth` and stored in the request extensions.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
    pub display_name: String,
    pub is_superuser: bool,
    pub groups: Vec<String>,
}

impl CurrentUser {
    pub fn in_any_group(&self, groups: &[&str]) -> bool {
        self.groups
            .iter()
            .any(|g| groups.iter().any(|wanted| g.eq_ignore_ascii_case(wanted)))
    }

    pub fn is_superuser_or_in_groups(&self, groups: &[&str]) -> bool {
        self.is_superuser || self.in_any_group(groups)
    }

    pub fn is_privileged(&self) -> bool {
        self.is_superuser_or_in_groups(PRIVILEGED_GROUPS)
    }

    pub fn is_self_or_privileged(&self, user_id: i64) -> bool {
        self.id == user_id || self.is_privileged()
    }
}

// Login form data
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub next: Option<String>,
}

/// Validated data for a new account.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub is_superuser: bool,
    pub si_course_id: Option<i64>,
    pub courses_tutored: Vec<i64>,
    pub groups: Vec<String>,
}

/// Validated data for the profile form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileData {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}
