// src/services/mod.rs
pub mod auth_service;
pub mod bulk_service;
pub mod change_request_service;
pub mod course_service;
pub mod feed_service;
pub mod hardware_service;
pub mod seed_service;
pub mod shift_service;
pub mod user_service;
