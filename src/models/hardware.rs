// src/models/hardware.rs
use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, PartialEq, Eq)]
pub struct Hardware {
    pub id: i64,
    pub name: String,
    pub is_available: bool,
}

/// A loan joined with the hardware name and the borrower's names.
#[derive(Debug, Clone, FromRow)]
pub struct LoanRow {
    pub id: i64,
    pub hardware_id: i64,
    pub hardware_name: String,
    pub borrower_id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub start_time: NaiveDateTime,
    pub return_time: Option<NaiveDateTime>,
}

impl LoanRow {
    pub fn borrower(&self) -> String {
        super::user::display_name(&self.username, &self.first_name, &self.last_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareData {
    pub name: String,
    pub is_available: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoanData {
    pub hardware_id: i64,
    pub borrower_id: i64,
    pub start_time: NaiveDateTime,
    pub return_time: Option<NaiveDateTime>,
}
