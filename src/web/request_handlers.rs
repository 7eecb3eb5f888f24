// src/web/request_handlers.rs
use crate::{
    error::{AppError, AppResult},
    forms::{format_duration, ChangeRequestForm},
    models::{
        change_request::{RequestAction, RequestState, ShiftChangeRequest, ShiftFields},
        display_optional_datetime,
        shift::ShiftKind,
        user::CurrentUser,
    },
    services::{change_request_service, shift_service, user_service},
    state::AppState,
    templates::{
        kind_choices, people_choices, render, request_views, ApprovalFormPage, Choice, FieldRow, RequestDetailPage,
        RequestListPage, RequestView,
    },
    web::{context::page_context, flash},
};
use axum::{
    extract::{Extension, Form, Path, State},
    response::{IntoResponse, Redirect, Response},
};
use sqlx::SqlitePool;
use tower_sessions::Session;

const REQUESTS_PATH: &str = "/scheduling/shift_change_requests";

fn parse_kind(raw: &str) -> AppResult<ShiftKind> {
    raw.parse::<ShiftKind>().map_err(AppError::BadRequest)
}

fn parse_request_id(raw: &str) -> AppResult<i64> {
    raw.parse::<i64>()
        .map_err(|_| AppError::BadRequest(format!("'{}' is not a request id", raw)))
}

fn request_url(kind: ShiftKind, request_id: i64) -> String {
    format!("{}/{}/{}", REQUESTS_PATH, kind.as_str(), request_id)
}

/// Loads the request and checks it is filed under the kind in the URL.
async fn request_of_kind(db_pool: &SqlitePool, kind: &str, key: &str) -> AppResult<ShiftChangeRequest> {
    let kind = parse_kind(kind)?;
    let request = change_request_service::get_request(db_pool, parse_request_id(key)?).await?;
    if request.kind != kind {
        return Err(AppError::NotFound("Shift change request"));
    }
    Ok(request)
}

async fn request_view(db_pool: &SqlitePool, request: &ShiftChangeRequest) -> AppResult<RequestView> {
    let row = change_request_service::get_request_row(db_pool, request.id).await?;
    Ok(RequestView::from(&row))
}

async fn person_name(db_pool: &SqlitePool, user_id: Option<i64>) -> AppResult<String> {
    Ok(match user_id {
        Some(id) => user_service::find_user_by_id(db_pool, id)
            .await?
            .map(|u| u.display_name())
            .unwrap_or_else(|| format!("#{}", id)),
        None => String::new(),
    })
}

async fn field_rows(db_pool: &SqlitePool, current: &ShiftFields, proposed: &ShiftFields) -> AppResult<Vec<FieldRow>> {
    let row = |label: &str, current: String, proposed: String| FieldRow {
        label: label.to_string(),
        current,
        proposed,
    };
    Ok(vec![
        row(
            "Person",
            person_name(db_pool, current.associated_person_id).await?,
            person_name(db_pool, proposed.associated_person_id).await?,
        ),
        row(
            "Start",
            display_optional_datetime(&current.start),
            display_optional_datetime(&proposed.start),
        ),
        row(
            "Duration",
            current.duration_secs.map(format_duration).unwrap_or_default(),
            proposed.duration_secs.map(format_duration).unwrap_or_default(),
        ),
        row(
            "Location",
            current.location.clone().unwrap_or_default(),
            proposed.location.clone().unwrap_or_default(),
        ),
        row(
            "Kind",
            current.kind.map(|k| k.to_string()).unwrap_or_default(),
            proposed.kind.map(|k| k.to_string()).unwrap_or_default(),
        ),
    ])
}

async fn target_fields(db_pool: &SqlitePool, request: &ShiftChangeRequest) -> AppResult<ShiftFields> {
    Ok(match request.target_shift_id {
        Some(shift_id) => ShiftFields::from_shift(&shift_service::get_shift(db_pool, shift_id).await?),
        None => ShiftFields::default(),
    })
}

// GET /scheduling/shift_change_requests/{kind}/{key}
pub async fn list_by_state(
    State(state): State<AppState>,
    session: Session,
    Extension(user): Extension<CurrentUser>,
    Path((kind, key)): Path<(String, String)>,
) -> AppResult<Response> {
    let shift_kind = parse_kind(&kind)?;
    let request_state = key.parse::<RequestState>().map_err(AppError::BadRequest)?;
    let requests = change_request_service::list_requests(&state.db_pool, shift_kind, request_state).await?;

    let states = RequestState::ALL
        .iter()
        .filter(|s| shift_kind == ShiftKind::Si || **s != RequestState::Pending)
        .map(|s| Choice::new(s.slug(), s.as_str(), request_state.slug()))
        .collect();
    let page = RequestListPage {
        ctx: page_context(&state.db_pool, &session, Some(&user)).await?,
        kind: shift_kind.as_str().to_string(),
        state: request_state.as_str().to_string(),
        states,
        requests: request_views(&requests),
    };
    Ok(render(&page)?.into_response())
}

// GET /scheduling/shift_change_requests/{kind}/{key}/n
pub async fn view_request(
    State(state): State<AppState>,
    session: Session,
    Extension(user): Extension<CurrentUser>,
    Path((kind, key)): Path<(String, String)>,
) -> AppResult<Response> {
    let request = request_of_kind(&state.db_pool, &kind, &key).await?;
    change_request_service::ensure_can_view(&state.db_pool, &user, &request).await?;

    let current = target_fields(&state.db_pool, &request).await?;
    let fields = field_rows(&state.db_pool, &current, &request.proposed_fields()).await?;
    let privileged = user.is_privileged();

    let page = RequestDetailPage {
        ctx: page_context(&state.db_pool, &session, Some(&user)).await?,
        request: request_view(&state.db_pool, &request).await?,
        fields,
        approved_by: person_name(&state.db_pool, request.approved_by_id).await?,
        approved_on: display_optional_datetime(&request.approved_on),
        can_decide: privileged && !request.state.is_terminal(),
        can_mark_pending: privileged && request.state.can_transition_to(RequestState::Pending, request.kind),
        base_url: request_url(request.kind, request.id),
    };
    Ok(render(&page)?.into_response())
}

// GET /scheduling/shift_change_requests/{kind}/{key}/a
pub async fn approve_request(
    State(state): State<AppState>,
    session: Session,
    Extension(user): Extension<CurrentUser>,
    Path((kind, key)): Path<(String, String)>,
) -> AppResult<Response> {
    let request = request_of_kind(&state.db_pool, &kind, &key).await?;
    let url = request_url(request.kind, request.id);
    match change_request_service::approve(&state.db_pool, request.id, user.id, None).await {
        Ok(action) => {
            flash::success(&session, format!("Request approved ({}).", action.label())).await?;
            Ok(Redirect::to(&format!("{}/n", url)).into_response())
        }
        // Incomplete proposals need the approver to fill in the gaps
        Err(AppError::Validation(errors)) => {
            flash::error(&session, format!("Cannot approve as proposed: {}", errors)).await?;
            Ok(Redirect::to(&format!("{}/approval_form", url)).into_response())
        }
        Err(e) => Err(e),
    }
}

// GET /scheduling/shift_change_requests/{kind}/{key}/d
pub async fn deny_request(
    State(state): State<AppState>,
    session: Session,
    Extension(user): Extension<CurrentUser>,
    Path((kind, key)): Path<(String, String)>,
) -> AppResult<Response> {
    let request = request_of_kind(&state.db_pool, &kind, &key).await?;
    change_request_service::deny(&state.db_pool, request.id, user.id).await?;
    flash::success(&session, "Request denied.").await?;
    Ok(Redirect::to(&format!("{}/n", request_url(request.kind, request.id))).into_response())
}

// GET /scheduling/shift_change_requests/{kind}/{key}/p
pub async fn mark_request_pending(
    State(state): State<AppState>,
    session: Session,
    Path((kind, key)): Path<(String, String)>,
) -> AppResult<Response> {
    let request = request_of_kind(&state.db_pool, &kind, &key).await?;
    change_request_service::mark_pending(&state.db_pool, request.id).await?;
    flash::push(&session, flash::Level::Info, "Request marked pending.").await?;
    Ok(Redirect::to(&format!("{}/n", request_url(request.kind, request.id))).into_response())
}

async fn approval_form_page(
    state: &AppState,
    session: &Session,
    user: &CurrentUser,
    request: &ShiftChangeRequest,
    form: ChangeRequestForm,
    errors: Vec<String>,
) -> AppResult<Response> {
    let users = user_service::find_all_users(&state.db_pool).await?;
    let page = ApprovalFormPage {
        ctx: page_context(&state.db_pool, session, Some(user)).await?,
        request: request_view(&state.db_pool, request).await?,
        action: format!("{}/approval_form", request_url(request.kind, request.id)),
        people: people_choices(&users, &form.new_associated_person),
        kinds: kind_choices(&form.new_kind),
        form,
        errors,
    };
    Ok(render(&page)?.into_response())
}

// GET /scheduling/shift_change_requests/{kind}/{key}/approval_form
pub async fn show_approval_form(
    State(state): State<AppState>,
    session: Session,
    Extension(user): Extension<CurrentUser>,
    Path((kind, key)): Path<(String, String)>,
) -> AppResult<Response> {
    let request = request_of_kind(&state.db_pool, &kind, &key).await?;
    if request.state.is_terminal() {
        return Err(AppError::InvalidTransition {
            from: request.state.to_string(),
            to: RequestState::Approved.to_string(),
        });
    }
    let merged = request
        .proposed_fields()
        .or(target_fields(&state.db_pool, &request).await?);
    let mut form = ChangeRequestForm::from_fields(&merged);
    form.reason = request.reason.clone();
    approval_form_page(&state, &session, &user, &request, form, Vec::new()).await
}

// POST /scheduling/shift_change_requests/{kind}/{key}/approval_form
pub async fn handle_approval_form(
    State(state): State<AppState>,
    session: Session,
    Extension(user): Extension<CurrentUser>,
    Path((kind, key)): Path<(String, String)>,
    Form(form): Form<ChangeRequestForm>,
) -> AppResult<Response> {
    let request = request_of_kind(&state.db_pool, &kind, &key).await?;
    let new_shift = request.action() == RequestAction::CreateShift;
    let fields = match form.clean(new_shift) {
        Ok((_, fields)) => fields,
        Err(errors) => {
            return approval_form_page(&state, &session, &user, &request, form, errors.messages()).await;
        }
    };
    match change_request_service::approve(&state.db_pool, request.id, user.id, Some(fields)).await {
        Ok(action) => {
            flash::success(&session, format!("Request approved ({}).", action.label())).await?;
            Ok(Redirect::to(&format!("{}/n", request_url(request.kind, request.id))).into_response())
        }
        Err(AppError::Validation(errors)) => {
            approval_form_page(&state, &session, &user, &request, form, errors.messages()).await
        }
        Err(e) => Err(e),
    }
}
