// src/web/routes.rs
use crate::{
    state::AppState,
    web::{
        auth_handlers, bulk_handlers, course_handlers, feed_handlers, hardware_handlers, mw_auth,
        mw_groups::{self, PRIVILEGED, SIS_ONLY, TUTORS_ONLY},
        request_handlers, shift_handlers, user_handlers,
    },
};
use axum::{
    middleware,
    routing::get,
    Router,
};
use time::Duration;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, SessionManagerLayer, SessionStore};

const REQUESTS: &str = "/scheduling/shift_change_requests/{kind}/{key}";

pub fn create_router(app_state: AppState) -> Router {
    // --- Public ---
    let public_routes = Router::new()
        .route(
            "/accounts/login",
            get(auth_handlers::show_login_form).post(auth_handlers::handle_login),
        )
        .route("/accounts/logout", get(auth_handlers::handle_logout));

    // --- Privileged (office staff, supervisors, superusers) ---
    let privileged_routes = Router::new()
        .route(
            "/courses/add",
            get(course_handlers::show_add_course).post(course_handlers::handle_add_course),
        )
        .route(
            "/courses/{course_id}/edit",
            get(course_handlers::show_edit_course).post(course_handlers::handle_edit_course),
        )
        .route(
            "/users/create",
            get(user_handlers::show_create_user).post(user_handlers::handle_create_user),
        )
        .route(
            "/users/create/bulk",
            get(user_handlers::show_bulk_create).post(user_handlers::handle_bulk_create),
        )
        .route(
            "/shifts/new",
            get(shift_handlers::show_new_shift).post(shift_handlers::handle_new_shift),
        )
        .route(REQUESTS, get(request_handlers::list_by_state))
        .route(&format!("{REQUESTS}/a"), get(request_handlers::approve_request))
        .route(&format!("{REQUESTS}/d"), get(request_handlers::deny_request))
        .route(&format!("{REQUESTS}/p"), get(request_handlers::mark_request_pending))
        .route(
            &format!("{REQUESTS}/approval_form"),
            get(request_handlers::show_approval_form).post(request_handlers::handle_approval_form),
        )
        .route(
            "/scheduling/view_schedule/{kind}/{offset}",
            get(shift_handlers::view_schedule),
        )
        .route("/scheduling/bulk/drop_on_date", get(bulk_handlers::show_drop_on_date))
        .route(
            "/scheduling/bulk/drop_on_date/confirm",
            get(bulk_handlers::preview_drop_on_date).post(bulk_handlers::confirm_drop_on_date),
        )
        .route("/scheduling/bulk/swap_shift_dates", get(bulk_handlers::show_swap_shift_dates))
        .route(
            "/scheduling/bulk/swap_shift_dates/confirm",
            get(bulk_handlers::confirm_swap_shift_dates).post(bulk_handlers::preview_swap_shift_dates),
        )
        .route("/scheduling/bulk/move_shifts_from_date", get(bulk_handlers::show_move_shifts))
        .route(
            "/scheduling/bulk/move_shifts_from_date/confirm",
            get(bulk_handlers::preview_move_shifts).post(bulk_handlers::confirm_move_shifts),
        )
        .route("/show_hardware", get(hardware_handlers::show_hardware))
        .route("/show_loans", get(hardware_handlers::show_loans))
        .route(
            "/add_hardware",
            get(hardware_handlers::show_add_hardware).post(hardware_handlers::handle_add_hardware),
        )
        .route(
            "/add_loans",
            get(hardware_handlers::show_add_loan).post(hardware_handlers::handle_add_loan),
        )
        .route(
            "/edit_hardware/{id}",
            get(hardware_handlers::show_edit_hardware).post(hardware_handlers::handle_edit_hardware),
        )
        .route(
            "/edit_loans/{id}",
            get(hardware_handlers::show_edit_loan).post(hardware_handlers::handle_edit_loan),
        )
        .route_layer(middleware::from_fn_with_state(PRIVILEGED, mw_groups::require_groups));

    let tutor_routes = Router::new()
        .route(
            "/shifts/new/tutoring",
            get(shift_handlers::show_new_tutoring_shift).post(shift_handlers::handle_new_tutoring_shift),
        )
        .route_layer(middleware::from_fn_with_state(TUTORS_ONLY, mw_groups::require_groups));

    let si_routes = Router::new()
        .route(
            "/scheduling/request_shift",
            get(shift_handlers::show_request_shift).post(shift_handlers::handle_request_shift),
        )
        .route_layer(middleware::from_fn_with_state(SIS_ONLY, mw_groups::require_groups));

    // Pages of one user: that user or a privileged caller
    let personal_routes = Router::new()
        .route(
            "/users/{key}/edit",
            get(user_handlers::show_edit_profile).post(user_handlers::handle_edit_profile),
        )
        .route("/users/{key}/shift_change_requests", get(user_handlers::user_requests))
        .route_layer(middleware::from_fn(mw_groups::require_self_or_privileged));

    // --- Login required ---
    // require_auth wraps everything above, so it runs before any group check
    let authenticated_routes = Router::new()
        .route("/", get(user_handlers::index))
        .route(
            "/accounts/password_change",
            get(auth_handlers::show_password_change).post(auth_handlers::handle_password_change),
        )
        .route("/courses/", get(course_handlers::list_courses))
        .route("/courses/{course_id}", get(course_handlers::view_course))
        .route("/shifts/{shift_id}", get(shift_handlers::view_shift))
        .route(
            "/shifts/{shift_id}/request_change",
            get(shift_handlers::show_request_change).post(shift_handlers::handle_request_change),
        )
        .route(
            "/shifts/{shift_id}/request_drop",
            get(shift_handlers::show_request_drop).post(shift_handlers::handle_request_drop),
        )
        .route("/users/{key}", get(user_handlers::view_user_or_group))
        .route(&format!("{REQUESTS}/n"), get(request_handlers::view_request))
        .route("/api/user_event_feed/{user_id}", get(feed_handlers::user_event_feed))
        .route("/api/course_event_feed/{course_id}", get(feed_handlers::course_event_feed))
        .merge(privileged_routes)
        .merge(tutor_routes)
        .merge(si_routes)
        .merge(personal_routes)
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            mw_auth::require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(authenticated_routes)
        .with_state(app_state)
}

/// The router with request tracing and server-side sessions in front of it.
pub fn build_app<S>(app_state: AppState, session_store: S, session_expiry_hours: i64) -> Router
where
    S: SessionStore + Clone,
{
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(false)
        .with_http_only(true)
        .with_expiry(Expiry::OnInactivity(Duration::hours(session_expiry_hours)));

    create_router(app_state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(session_layer),
    )
}

