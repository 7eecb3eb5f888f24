// src/web/mod.rs
pub mod auth_handlers;
pub mod bulk_handlers;
pub mod context;
pub mod course_handlers;
pub mod feed_handlers;
pub mod flash;
pub mod hardware_handlers;
pub mod mw_auth;
pub mod mw_groups;
pub mod request_handlers;
pub mod routes;
pub mod shift_handlers;
pub mod user_handlers;

#[cfg(test)]
mod tests;
