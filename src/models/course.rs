// src/models/course.rs
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// Mirrors the `courses` table
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct Course {
    pub id: i64,
    pub department: String, // e.g. COMPSCI or MATH
    pub number: i64,        // 100..=999
    pub name: String,
}

impl Course {
    /// "COMPSCI 187"
    pub fn short_name(&self) -> String {
        format!("{} {}", self.department, self.number)
    }

    /// "COMPSCI 187: Programming with Data Structures"
    pub fn display(&self) -> String {
        format!("{} {}: {}", self.department, self.number, self.name)
    }
}

/// Validated data for creating or editing a course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseData {
    pub department: String,
    pub number: i64,
    pub name: String,
}
