// src/web/tests.rs
//! End-to-end checks through the full router: guards, sessions and handlers.

use crate::{
    db::test_pool,
    models::{
        change_request::RequestState,
        shift::ShiftKind,
        user::{OFFICE_STAFF, TUTORS},
    },
    services::{
        change_request_service,
        shift_service::{
            self,
            tests::{at, make_shift, make_user},
        },
    },
    state::AppState,
    web::routes::build_app,
};
use axum::{
    body::{to_bytes, Body},
    http::{
        header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE},
        Request, StatusCode,
    },
    response::Response,
    Router,
};
use sqlx::SqlitePool;
use tower::ServiceExt;
use tower_sessions::MemoryStore;

async fn app() -> (Router, SqlitePool) {
    let pool = test_pool().await;
    let app = build_app(AppState { db_pool: pool.clone() }, MemoryStore::default(), 24);
    (app, pool)
}

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

fn get(uri: &str, cookie: &str) -> Request<Body> {
    Request::get(uri).header(COOKIE, cookie).body(Body::empty()).unwrap()
}

fn post_form(uri: &str, cookie: &str, body: &str) -> Request<Body> {
    Request::post(uri)
        .header(COOKIE, cookie)
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Logs in (every test user has password "pw") and returns the session cookie pair.
async fn login(app: &Router, username: &str) -> String {
    let response = send(
        app,
        post_form("/accounts/login", "", &format!("username={}&password=pw", username)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let set_cookie = response.headers()[SET_COOKIE].to_str().unwrap();
    set_cookie.split(';').next().unwrap().to_string()
}

async fn shift_start(pool: &SqlitePool, shift_id: i64) -> chrono::NaiveDateTime {
    shift_service::get_shift(pool, shift_id).await.unwrap().start
}

fn drop_token(html: &str) -> String {
    html.split("name=\"token\" value=\"")
        .nth(1)
        .and_then(|rest| rest.split('"').next())
        .unwrap()
        .to_string()
}

async fn shift_count(pool: &SqlitePool) -> i64 {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM shifts")
        .fetch_one(pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn anonymous_users_are_sent_to_login_with_next() {
    let (app, _pool) = app().await;
    let response = send(&app, get("/users/Tutors", "")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers()[LOCATION],
        "/accounts/login?next=%2Fusers%2FTutors"
    );
}

#[tokio::test]
async fn wrong_method_is_rejected_before_authentication() {
    let (app, _pool) = app().await;
    let response = send(&app, post_form("/courses/", "", "")).await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert!(response.headers().contains_key("allow"));
}

#[tokio::test]
async fn bad_password_renders_the_login_form_again() {
    let (app, pool) = app().await;
    make_user(&pool, "tina", TUTORS).await;
    let response = send(&app, post_form("/accounts/login", "", "username=tina&password=nope")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Please enter a correct username and password."));
}

#[tokio::test]
async fn group_listing_needs_a_privileged_caller() {
    let (app, pool) = app().await;
    make_user(&pool, "tina", TUTORS).await;
    make_user(&pool, "olga", OFFICE_STAFF).await;

    let tutor = login(&app, "tina").await;
    let response = send(&app, get("/users/Tutors", &tutor)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let staff = login(&app, "olga").await;
    let response = send(&app, get("/users/Tutors", &staff)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("tina"));
}

#[tokio::test]
async fn personal_pages_are_limited_to_their_owner() {
    let (app, pool) = app().await;
    let tina = make_user(&pool, "tina", TUTORS).await;
    let tom = make_user(&pool, "tom", TUTORS).await;
    let cookie = login(&app, "tina").await;

    let own = send(&app, get(&format!("/users/{}/edit", tina), &cookie)).await;
    assert_eq!(own.status(), StatusCode::OK);
    let other = send(&app, get(&format!("/users/{}/edit", tom), &cookie)).await;
    assert_eq!(other.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn user_feed_returns_calendar_events() {
    let (app, pool) = app().await;
    let tina = make_user(&pool, "tina", TUTORS).await;
    let shift = make_shift(&pool, tina, at(2024, 1, 3, 14, 0), ShiftKind::Tutoring).await;
    let cookie = login(&app, "tina").await;

    let response = send(
        &app,
        get(
            &format!("/api/user_event_feed/{}?start=2024-01-01&end=2024-01-31T00:00:00-05:00", tina),
            &cookie,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let events: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(events.as_array().unwrap().len(), 1);
    assert_eq!(events[0]["id"], shift.to_string());
    assert_eq!(events[0]["start"], "2024-01-03T14:00:00");
    assert_eq!(events[0]["end"], "2024-01-03T15:00:00");
    assert_eq!(events[0]["allDay"], false);
    assert_eq!(events[0]["url"], format!("/shifts/{}", shift));

    let missing = send(&app, get(&format!("/api/user_event_feed/{}?start=2024-01-01", tina), &cookie)).await;
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
    let unknown = send(&app, get("/api/course_event_feed/999?start=2024-01-01&end=2024-01-31", &cookie)).await;
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn drop_on_date_deletes_exactly_the_stashed_shifts() {
    let (app, pool) = app().await;
    make_user(&pool, "olga", OFFICE_STAFF).await;
    let tina = make_user(&pool, "tina", TUTORS).await;
    make_shift(&pool, tina, at(2024, 3, 4, 9, 0), ShiftKind::Tutoring).await;
    make_shift(&pool, tina, at(2024, 3, 4, 13, 0), ShiftKind::Tutoring).await;
    make_shift(&pool, tina, at(2024, 3, 5, 9, 0), ShiftKind::Tutoring).await;
    let cookie = login(&app, "olga").await;

    let preview = send(&app, get("/scheduling/bulk/drop_on_date/confirm?date=2024-03-04", &cookie)).await;
    assert_eq!(preview.status(), StatusCode::OK);
    let token = drop_token(&body_text(preview).await);
    assert_eq!(shift_count(&pool).await, 3);

    let confirm = send(
        &app,
        post_form("/scheduling/bulk/drop_on_date/confirm", &cookie, &format!("token={}", token)),
    )
    .await;
    assert_eq!(confirm.status(), StatusCode::SEE_OTHER);
    assert_eq!(shift_count(&pool).await, 1);

    // The stash is consumed by the first confirmation
    let replay = send(
        &app,
        post_form("/scheduling/bulk/drop_on_date/confirm", &cookie, &format!("token={}", token)),
    )
    .await;
    assert_eq!(replay.status(), StatusCode::BAD_REQUEST);

    let page = send(&app, get("/scheduling/bulk/drop_on_date", &cookie)).await;
    assert!(body_text(page).await.contains("2 shifts dropped."));
}

#[tokio::test]
async fn bulk_user_creation_with_a_bad_line_creates_nobody() {
    let (app, pool) = app().await;
    make_user(&pool, "olga", OFFICE_STAFF).await;
    let cookie = login(&app, "olga").await;
    let before: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&pool)
        .await
        .unwrap();

    let body = "user_data=amy%2Camy%40umass.edu%2CAmy%2CAdams%2CTutors%2Cpw1%0Abob%2Cbob%40umass.edu%2CBob";
    let response = send(&app, post_form("/users/create/bulk", &cookie, body)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Line 2"));

    let after: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn approving_a_drop_request_removes_the_shift() {
    let (app, pool) = app().await;
    make_user(&pool, "olga", OFFICE_STAFF).await;
    let tina = make_user(&pool, "tina", TUTORS).await;
    let shift = make_shift(&pool, tina, at(2024, 3, 4, 9, 0), ShiftKind::Tutoring).await;

    let tutor = login(&app, "tina").await;
    let filed = send(
        &app,
        post_form(&format!("/shifts/{}/request_drop", shift), &tutor, "reason=Exam+conflict"),
    )
    .await;
    assert_eq!(filed.status(), StatusCode::SEE_OTHER);
    let requests = change_request_service::requests_for_shift(&pool, shift).await.unwrap();
    assert_eq!(requests.len(), 1);
    let request_id = requests[0].id;

    // Tutors cannot decide on requests
    let denied = send(
        &app,
        get(&format!("/scheduling/shift_change_requests/Tutoring/{}/a", request_id), &tutor),
    )
    .await;
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);

    let staff = login(&app, "olga").await;
    let approved = send(
        &app,
        get(&format!("/scheduling/shift_change_requests/Tutoring/{}/a", request_id), &staff),
    )
    .await;
    assert_eq!(approved.status(), StatusCode::SEE_OTHER);
    assert_eq!(shift_count(&pool).await, 0);

    let request = change_request_service::get_request(&pool, request_id).await.unwrap();
    assert_eq!(request.state, RequestState::Approved);
    assert_eq!(request.target_shift_id, None);

    // Terminal requests cannot be decided again
    let again = send(
        &app,
        get(&format!("/scheduling/shift_change_requests/Tutoring/{}/d", request_id), &staff),
    )
    .await;
    assert_eq!(again.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn empty_request_lists_render_a_page() {
    let (app, pool) = app().await;
    make_user(&pool, "olga", OFFICE_STAFF).await;
    let cookie = login(&app, "olga").await;

    let response = send(&app, get("/scheduling/shift_change_requests/SI/not_approved", &cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("No requests."));

    let bad_state = send(&app, get("/scheduling/shift_change_requests/SI/maybe", &cookie)).await;
    assert_eq!(bad_state.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn only_the_latest_drop_preview_can_be_confirmed() {
    let (app, pool) = app().await;
    make_user(&pool, "olga", OFFICE_STAFF).await;
    let tina = make_user(&pool, "tina", TUTORS).await;
    make_shift(&pool, tina, at(2024, 3, 4, 9, 0), ShiftKind::Tutoring).await;
    let cookie = login(&app, "olga").await;

    let uri = "/scheduling/bulk/drop_on_date/confirm?date=2024-03-04";
    let first = drop_token(&body_text(send(&app, get(uri, &cookie)).await).await);
    let second = drop_token(&body_text(send(&app, get(uri, &cookie)).await).await);
    assert_ne!(first, second);

    let stale = send(
        &app,
        post_form("/scheduling/bulk/drop_on_date/confirm", &cookie, &format!("token={}", first)),
    )
    .await;
    assert_eq!(stale.status(), StatusCode::BAD_REQUEST);
    assert_eq!(shift_count(&pool).await, 1);

    let latest = send(
        &app,
        post_form("/scheduling/bulk/drop_on_date/confirm", &cookie, &format!("token={}", second)),
    )
    .await;
    assert_eq!(latest.status(), StatusCode::SEE_OTHER);
    assert_eq!(shift_count(&pool).await, 0);
}

#[tokio::test]
async fn swap_previews_on_post_and_swaps_on_get() {
    let (app, pool) = app().await;
    make_user(&pool, "olga", OFFICE_STAFF).await;
    let tina = make_user(&pool, "tina", TUTORS).await;
    let monday = make_shift(&pool, tina, at(2024, 3, 4, 9, 0), ShiftKind::Tutoring).await;
    let next_monday = make_shift(&pool, tina, at(2024, 3, 11, 13, 0), ShiftKind::Tutoring).await;
    let cookie = login(&app, "olga").await;

    let preview = send(
        &app,
        post_form(
            "/scheduling/bulk/swap_shift_dates/confirm",
            &cookie,
            "first=2024-03-04&second=2024-03-11",
        ),
    )
    .await;
    assert_eq!(preview.status(), StatusCode::OK);
    assert_eq!(shift_start(&pool, monday).await, at(2024, 3, 4, 9, 0));
    assert_eq!(shift_start(&pool, next_monday).await, at(2024, 3, 11, 13, 0));

    let swapped = send(
        &app,
        get("/scheduling/bulk/swap_shift_dates/confirm?first=2024-03-04&second=2024-03-11", &cookie),
    )
    .await;
    assert_eq!(swapped.status(), StatusCode::SEE_OTHER);
    assert_eq!(shift_start(&pool, monday).await, at(2024, 3, 11, 9, 0));
    assert_eq!(shift_start(&pool, next_monday).await, at(2024, 3, 4, 13, 0));
}

#[tokio::test]
async fn move_previews_on_get_and_moves_on_post() {
    let (app, pool) = app().await;
    make_user(&pool, "olga", OFFICE_STAFF).await;
    let tina = make_user(&pool, "tina", TUTORS).await;
    let shift = make_shift(&pool, tina, at(2024, 3, 4, 9, 0), ShiftKind::Tutoring).await;
    let cookie = login(&app, "olga").await;

    let preview = send(
        &app,
        get("/scheduling/bulk/move_shifts_from_date/confirm?from=2024-03-04&to=2024-03-06", &cookie),
    )
    .await;
    assert_eq!(preview.status(), StatusCode::OK);
    assert_eq!(shift_start(&pool, shift).await, at(2024, 3, 4, 9, 0));

    let moved = send(
        &app,
        post_form(
            "/scheduling/bulk/move_shifts_from_date/confirm",
            &cookie,
            "from=2024-03-04&to=2024-03-06",
        ),
    )
    .await;
    assert_eq!(moved.status(), StatusCode::SEE_OTHER);
    assert_eq!(shift_start(&pool, shift).await, at(2024, 3, 6, 9, 0));
}

#[tokio::test]
async fn oversized_durations_are_rejected_and_never_break_the_feed() {
    let (app, pool) = app().await;
    let tina = make_user(&pool, "tina", TUTORS).await;
    let cookie = login(&app, "tina").await;

    let response = send(
        &app,
        post_form(
            "/shifts/new/tutoring",
            &cookie,
            "start=2024-01-03T14%3A00&duration=10000000000%3A00%3A00",
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("at most 24:00:00"));
    assert_eq!(shift_count(&pool).await, 0);

    // A row written before the cap existed still renders
    sqlx::query(
        "INSERT INTO shifts (associated_person_id, start, duration_secs, location, kind) VALUES (?1, ?2, ?3, 'LRC', 'Tutoring')",
    )
    .bind(tina)
    .bind(at(2024, 1, 3, 14, 0))
    .bind(i64::MAX)
    .execute(&pool)
    .await
    .unwrap();

    let feed = send(
        &app,
        get(&format!("/api/user_event_feed/{}?start=2024-01-01&end=2024-01-07", tina), &cookie),
    )
    .await;
    assert_eq!(feed.status(), StatusCode::OK);
    let profile = send(&app, get(&format!("/users/{}", tina), &cookie)).await;
    assert_eq!(profile.status(), StatusCode::OK);
}

#[tokio::test]
async fn schedule_offsets_past_the_calendar_are_bad_requests() {
    let (app, pool) = app().await;
    make_user(&pool, "olga", OFFICE_STAFF).await;
    let cookie = login(&app, "olga").await;

    let ok = send(&app, get("/scheduling/view_schedule/All/-7", &cookie)).await;
    assert_eq!(ok.status(), StatusCode::OK);
    let max = i64::MAX.to_string();
    for offset in ["100000000", "-100000000", max.as_str()] {
        let response = send(&app, get(&format!("/scheduling/view_schedule/All/{}", offset), &cookie)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "offset {}", offset);
    }
}
