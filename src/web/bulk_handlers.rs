// src/web/bulk_handlers.rs
//! Date-based bulk editing: drop every shift on a day, swap two days, move a day.

use crate::{
    error::{AppError, AppResult},
    forms::{DropShiftsOnDateForm, MoveShiftsForm, SwapShiftDatesForm},
    models::user::CurrentUser,
    services::{bulk_service, shift_service},
    state::AppState,
    templates::{
        render, shift_views, BulkDateFormPage, DateField, DropOnDateConfirmPage, MoveShiftsConfirmPage,
        SwapDatesConfirmPage,
    },
    web::{context::page_context, flash},
};
use axum::{
    extract::{Extension, Form, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use uuid::Uuid;

const DROP_PATH: &str = "/scheduling/bulk/drop_on_date";
const SWAP_PATH: &str = "/scheduling/bulk/swap_shift_dates";
const MOVE_PATH: &str = "/scheduling/bulk/move_shifts_from_date";

/// Session key of the shift ids the latest drop confirmation page showed.
/// Each preview overwrites it, so only the newest token can be confirmed.
const DROP_STASH_KEY: &str = "drop_shifts";

#[derive(Debug, Serialize, Deserialize)]
struct DropStash {
    token: Uuid,
    shift_ids: Vec<i64>,
}

fn session_error(e: tower_sessions::session::Error) -> AppError {
    AppError::SessionError(format!("Drop-shifts stash: {}", e))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SwapDatesQuery {
    pub first: String,
    pub second: String,
}

impl From<SwapDatesQuery> for SwapShiftDatesForm {
    fn from(query: SwapDatesQuery) -> Self {
        SwapShiftDatesForm {
            first_date: query.first,
            second_date: query.second,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MoveShiftsQuery {
    pub from: String,
    pub to: String,
}

impl From<MoveShiftsQuery> for MoveShiftsForm {
    fn from(query: MoveShiftsQuery) -> Self {
        MoveShiftsForm {
            from_date: query.from,
            to_date: query.to,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DropConfirmForm {
    pub token: String,
}

#[allow(clippy::too_many_arguments)]
async fn date_form_page(
    state: &AppState,
    session: &Session,
    user: &CurrentUser,
    title: &str,
    action: String,
    method: &str,
    fields: Vec<DateField>,
    errors: Vec<String>,
) -> AppResult<Response> {
    let page = BulkDateFormPage {
        ctx: page_context(&state.db_pool, session, Some(user)).await?,
        title: title.to_string(),
        action,
        method: method.to_string(),
        fields,
        errors,
    };
    Ok(render(&page)?.into_response())
}

// --- Drop shifts on date ---

fn drop_fields(date: &str) -> Vec<DateField> {
    vec![DateField::new("date", "Date", date)]
}

// GET /scheduling/bulk/drop_on_date
pub async fn show_drop_on_date(
    State(state): State<AppState>,
    session: Session,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<Response> {
    date_form_page(
        &state,
        &session,
        &user,
        "Drop shifts on date",
        format!("{}/confirm", DROP_PATH),
        "get",
        drop_fields(""),
        Vec::new(),
    )
    .await
}

// GET /scheduling/bulk/drop_on_date/confirm?date=
pub async fn preview_drop_on_date(
    State(state): State<AppState>,
    session: Session,
    Extension(user): Extension<CurrentUser>,
    Query(form): Query<DropShiftsOnDateForm>,
) -> AppResult<Response> {
    let date = match form.clean() {
        Ok(date) => date,
        Err(errors) => {
            return date_form_page(
                &state,
                &session,
                &user,
                "Drop shifts on date",
                format!("{}/confirm", DROP_PATH),
                "get",
                drop_fields(&form.date),
                errors.messages(),
            )
            .await
        }
    };

    let shifts = shift_service::shifts_on_date(&state.db_pool, date).await?;
    let stash = DropStash {
        token: Uuid::new_v4(),
        shift_ids: shifts.iter().map(|s| s.id).collect(),
    };
    let token = stash.token;
    tracing::debug!("Stashed {} shifts on {} under token {}", stash.shift_ids.len(), date, token);
    session
        .insert(DROP_STASH_KEY, stash)
        .await
        .map_err(session_error)?;

    if shifts.is_empty() {
        flash::push(&session, flash::Level::Info, format!("No shifts start on {}.", date)).await?;
    }
    let page = DropOnDateConfirmPage {
        ctx: page_context(&state.db_pool, &session, Some(&user)).await?,
        date: date.to_string(),
        token: token.to_string(),
        shifts: shift_views(&shifts),
    };
    Ok(render(&page)?.into_response())
}

// POST /scheduling/bulk/drop_on_date/confirm
pub async fn confirm_drop_on_date(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<DropConfirmForm>,
) -> AppResult<Response> {
    let token = Uuid::parse_str(form.token.trim())
        .map_err(|_| AppError::BadRequest("Missing or malformed confirmation token.".to_string()))?;
    let stash = session
        .get::<DropStash>(DROP_STASH_KEY)
        .await
        .map_err(session_error)?
        .filter(|stash| stash.token == token)
        .ok_or_else(|| {
            AppError::BadRequest("This confirmation was already used or has expired.".to_string())
        })?;
    session
        .remove::<DropStash>(DROP_STASH_KEY)
        .await
        .map_err(session_error)?;

    let deleted = bulk_service::delete_shifts(&state.db_pool, &stash.shift_ids).await?;
    flash::success(&session, format!("{} shifts dropped.", deleted)).await?;
    Ok(Redirect::to(DROP_PATH).into_response())
}

// --- Swap shift dates ---

fn swap_fields(first: &str, second: &str) -> Vec<DateField> {
    vec![
        DateField::new("first", "First date", first),
        DateField::new("second", "Second date", second),
    ]
}

// GET /scheduling/bulk/swap_shift_dates
pub async fn show_swap_shift_dates(
    State(state): State<AppState>,
    session: Session,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<Response> {
    date_form_page(
        &state,
        &session,
        &user,
        "Swap shift dates",
        format!("{}/confirm", SWAP_PATH),
        "post",
        swap_fields("", ""),
        Vec::new(),
    )
    .await
}

// POST /scheduling/bulk/swap_shift_dates/confirm (preview only)
pub async fn preview_swap_shift_dates(
    State(state): State<AppState>,
    session: Session,
    Extension(user): Extension<CurrentUser>,
    Form(query): Form<SwapDatesQuery>,
) -> AppResult<Response> {
    let fields = swap_fields(&query.first, &query.second);
    let (first, second) = match SwapShiftDatesForm::from(query).clean() {
        Ok(dates) => dates,
        Err(errors) => {
            return date_form_page(
                &state,
                &session,
                &user,
                "Swap shift dates",
                format!("{}/confirm", SWAP_PATH),
                "post",
                fields,
                errors.messages(),
            )
            .await
        }
    };
    let first_shifts = shift_service::shifts_on_date(&state.db_pool, first).await?;
    let second_shifts = shift_service::shifts_on_date(&state.db_pool, second).await?;
    let page = SwapDatesConfirmPage {
        ctx: page_context(&state.db_pool, &session, Some(&user)).await?,
        first: first.to_string(),
        second: second.to_string(),
        first_shifts: shift_views(&first_shifts),
        second_shifts: shift_views(&second_shifts),
    };
    Ok(render(&page)?.into_response())
}

// GET /scheduling/bulk/swap_shift_dates/confirm?first=&second= (performs the swap)
pub async fn confirm_swap_shift_dates(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<SwapDatesQuery>,
) -> AppResult<Response> {
    let (first, second) = SwapShiftDatesForm::from(query)
        .clean()
        .map_err(|errors| AppError::BadRequest(errors.to_string()))?;
    let (moved_first, moved_second) = bulk_service::swap_shift_dates(&state.db_pool, first, second).await?;
    flash::success(
        &session,
        format!(
            "Swapped {} shifts from {} with {} shifts from {}.",
            moved_first, first, moved_second, second
        ),
    )
    .await?;
    Ok(Redirect::to(SWAP_PATH).into_response())
}

// --- Move shifts from date ---

fn move_fields(from: &str, to: &str) -> Vec<DateField> {
    vec![
        DateField::new("from", "From date", from),
        DateField::new("to", "To date", to),
    ]
}

// GET /scheduling/bulk/move_shifts_from_date
pub async fn show_move_shifts(
    State(state): State<AppState>,
    session: Session,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<Response> {
    date_form_page(
        &state,
        &session,
        &user,
        "Move shifts from date",
        format!("{}/confirm", MOVE_PATH),
        "get",
        move_fields("", ""),
        Vec::new(),
    )
    .await
}

// GET /scheduling/bulk/move_shifts_from_date/confirm?from=&to=
pub async fn preview_move_shifts(
    State(state): State<AppState>,
    session: Session,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<MoveShiftsQuery>,
) -> AppResult<Response> {
    let fields = move_fields(&query.from, &query.to);
    let (from, to) = match MoveShiftsForm::from(query).clean() {
        Ok(dates) => dates,
        Err(errors) => {
            return date_form_page(
                &state,
                &session,
                &user,
                "Move shifts from date",
                format!("{}/confirm", MOVE_PATH),
                "get",
                fields,
                errors.messages(),
            )
            .await
        }
    };
    let shifts = shift_service::shifts_on_date(&state.db_pool, from).await?;
    let page = MoveShiftsConfirmPage {
        ctx: page_context(&state.db_pool, &session, Some(&user)).await?,
        from: from.to_string(),
        to: to.to_string(),
        shifts: shift_views(&shifts),
    };
    Ok(render(&page)?.into_response())
}

// POST /scheduling/bulk/move_shifts_from_date/confirm
pub async fn confirm_move_shifts(
    State(state): State<AppState>,
    session: Session,
    Form(query): Form<MoveShiftsQuery>,
) -> AppResult<Response> {
    let (from, to) = MoveShiftsForm::from(query)
        .clean()
        .map_err(|errors| AppError::BadRequest(errors.to_string()))?;
    let moved = bulk_service::move_shifts(&state.db_pool, from, to).await?;
    flash::success(&session, format!("Moved {} shifts from {} to {}.", moved, from, to)).await?;
    Ok(Redirect::to(MOVE_PATH).into_response())
}
