// src/web/feed_handlers.rs
use crate::{
    error::AppResult,
    models::shift::CalendarEvent,
    services::feed_service::{self, FeedQuery},
    state::AppState,
};
use axum::{
    extract::{Path, Query, State},
    Json,
};

// GET /api/user_event_feed/{user_id}?start=&end=
pub async fn user_event_feed(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Query(query): Query<FeedQuery>,
) -> AppResult<Json<Vec<CalendarEvent>>> {
    let events = feed_service::user_events(&state.db_pool, user_id, &query).await?;
    Ok(Json(events))
}

// GET /api/course_event_feed/{course_id}?start=&end=
pub async fn course_event_feed(
    State(state): State<AppState>,
    Path(course_id): Path<i64>,
    Query(query): Query<FeedQuery>,
) -> AppResult<Json<Vec<CalendarEvent>>> {
    let events = feed_service::course_events(&state.db_pool, course_id, &query).await?;
    Ok(Json(events))
}
