// src/models/mod.rs
pub mod change_request;
pub mod course;
pub mod hardware;
pub mod shift;
pub mod user;

use chrono::NaiveDateTime;

/// Format used for every timestamp shown in pages and forms.
pub const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Format used by the JSON calendar feeds (ISO 8601 without offset).
pub const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub fn display_datetime(dt: &NaiveDateTime) -> String {
    dt.format(DISPLAY_FORMAT).to_string()
}

pub fn display_optional_datetime(dt: &Option<NaiveDateTime>) -> String {
    dt.as_ref().map(display_datetime).unwrap_or_default()
}
