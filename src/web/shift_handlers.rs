// src/web/shift_handlers.rs
use crate::{
    error::{AppError, AppResult},
    forms::{ChangeRequestForm, DropRequestForm, ShiftForm, TutorShiftForm},
    models::{
        change_request::ShiftFields,
        shift::{NewShift, ShiftKind},
        user::CurrentUser,
    },
    services::{
        change_request_service,
        shift_service::{self, ScheduleFilter},
        user_service,
    },
    state::AppState,
    templates::{
        kind_choices, people_choices, render, request_views, shift_views, ChangeRequestPage, Choice, DropRequestPage,
        ScheduleRowView, SchedulePage, ShiftDetailPage, ShiftFormPage, ShiftView, TutorShiftPage,
    },
    web::{context::page_context, flash},
};
use axum::{
    extract::{Extension, Form, Path, State},
    response::{IntoResponse, Redirect, Response},
};
use chrono::{Local, NaiveDate, TimeDelta};
use tower_sessions::Session;

/// Location of every self-scheduled tutoring shift.
const TUTORING_LOCATION: &str = "LRC";

// GET /shifts/{shift_id}
pub async fn view_shift(
    State(state): State<AppState>,
    session: Session,
    Extension(user): Extension<CurrentUser>,
    Path(shift_id): Path<i64>,
) -> AppResult<Response> {
    let shift = shift_service::get_shift_row(&state.db_pool, shift_id).await?;
    let requests = change_request_service::requests_for_shift(&state.db_pool, shift_id).await?;
    let page = ShiftDetailPage {
        ctx: page_context(&state.db_pool, &session, Some(&user)).await?,
        is_owner: shift.associated_person_id == user.id,
        shift: ShiftView::from(&shift),
        requests: request_views(&requests),
    };
    Ok(render(&page)?.into_response())
}

async fn shift_form_page(
    state: &AppState,
    session: &Session,
    user: &CurrentUser,
    form: ShiftForm,
    errors: Vec<String>,
) -> AppResult<Response> {
    let users = user_service::find_all_users(&state.db_pool).await?;
    let page = ShiftFormPage {
        ctx: page_context(&state.db_pool, session, Some(user)).await?,
        people: people_choices(&users, &form.associated_person),
        kinds: kind_choices(&form.kind),
        form,
        errors,
    };
    Ok(render(&page)?.into_response())
}

// GET /shifts/new
pub async fn show_new_shift(
    State(state): State<AppState>,
    session: Session,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<Response> {
    shift_form_page(&state, &session, &user, ShiftForm::default(), Vec::new()).await
}

// POST /shifts/new
pub async fn handle_new_shift(
    State(state): State<AppState>,
    session: Session,
    Extension(user): Extension<CurrentUser>,
    Form(form): Form<ShiftForm>,
) -> AppResult<Response> {
    match form.clean() {
        Ok(shift) => {
            let id = shift_service::create_shift(&state.db_pool, &shift).await?;
            flash::success(&session, "Shift created.").await?;
            Ok(Redirect::to(&format!("/shifts/{}", id)).into_response())
        }
        Err(errors) => shift_form_page(&state, &session, &user, form, errors.messages()).await,
    }
}

// GET /shifts/new/tutoring
pub async fn show_new_tutoring_shift(
    State(state): State<AppState>,
    session: Session,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<Response> {
    let page = TutorShiftPage {
        ctx: page_context(&state.db_pool, &session, Some(&user)).await?,
        form: TutorShiftForm::default(),
        errors: Vec::new(),
    };
    Ok(render(&page)?.into_response())
}

// POST /shifts/new/tutoring
pub async fn handle_new_tutoring_shift(
    State(state): State<AppState>,
    session: Session,
    Extension(user): Extension<CurrentUser>,
    Form(form): Form<TutorShiftForm>,
) -> AppResult<Response> {
    let (start, duration_secs) = match form.clean() {
        Ok(slot) => slot,
        Err(errors) => {
            let page = TutorShiftPage {
                ctx: page_context(&state.db_pool, &session, Some(&user)).await?,
                form,
                errors: errors.messages(),
            };
            return Ok(render(&page)?.into_response());
        }
    };
    let shift = NewShift {
        associated_person_id: user.id,
        start,
        duration_secs,
        location: TUTORING_LOCATION.to_string(),
        kind: ShiftKind::Tutoring,
    };
    let id = shift_service::create_shift(&state.db_pool, &shift).await?;
    flash::success(&session, "Tutoring shift added.").await?;
    Ok(Redirect::to(&format!("/shifts/{}", id)).into_response())
}

#[allow(clippy::too_many_arguments)]
async fn change_request_page(
    state: &AppState,
    session: &Session,
    user: &CurrentUser,
    title: &str,
    action: String,
    shift: String,
    form: ChangeRequestForm,
    errors: Vec<String>,
) -> AppResult<Response> {
    let users = user_service::find_all_users(&state.db_pool).await?;
    let page = ChangeRequestPage {
        ctx: page_context(&state.db_pool, session, Some(user)).await?,
        title: title.to_string(),
        action,
        shift,
        people: people_choices(&users, &form.new_associated_person),
        kinds: kind_choices(&form.new_kind),
        form,
        errors,
    };
    Ok(render(&page)?.into_response())
}

// Filing a request on a shift is reserved to its owner
async fn owned_shift(state: &AppState, user: &CurrentUser, shift_id: i64) -> AppResult<ShiftView> {
    let shift = shift_service::get_shift_row(&state.db_pool, shift_id).await?;
    if shift.associated_person_id != user.id {
        tracing::warn!("'{}' does not own shift {}", user.username, shift_id);
        return Err(AppError::PermissionDenied);
    }
    Ok(ShiftView::from(&shift))
}

// GET /scheduling/request_shift
pub async fn show_request_shift(
    State(state): State<AppState>,
    session: Session,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<Response> {
    let form = ChangeRequestForm {
        new_associated_person: user.id.to_string(),
        new_kind: ShiftKind::Si.to_string(),
        ..Default::default()
    };
    change_request_page(
        &state,
        &session,
        &user,
        "Request a new shift",
        "/scheduling/request_shift".to_string(),
        String::new(),
        form,
        Vec::new(),
    )
    .await
}

// POST /scheduling/request_shift
pub async fn handle_request_shift(
    State(state): State<AppState>,
    session: Session,
    Extension(user): Extension<CurrentUser>,
    Form(form): Form<ChangeRequestForm>,
) -> AppResult<Response> {
    let (reason, mut fields) = match form.clean(true) {
        Ok(cleaned) => cleaned,
        Err(errors) => {
            return change_request_page(
                &state,
                &session,
                &user,
                "Request a new shift",
                "/scheduling/request_shift".to_string(),
                String::new(),
                form,
                errors.messages(),
            )
            .await
        }
    };
    fields.kind.get_or_insert(ShiftKind::Si);
    change_request_service::submit_change_request(&state.db_pool, &user, None, &reason, fields, false).await?;
    flash::success(&session, "Your request was submitted.").await?;
    Ok(Redirect::to(&format!("/users/{}/shift_change_requests", user.id)).into_response())
}

// GET /shifts/{shift_id}/request_change
pub async fn show_request_change(
    State(state): State<AppState>,
    session: Session,
    Extension(user): Extension<CurrentUser>,
    Path(shift_id): Path<i64>,
) -> AppResult<Response> {
    let shift = owned_shift(&state, &user, shift_id).await?;
    change_request_page(
        &state,
        &session,
        &user,
        "Request a shift change",
        format!("/shifts/{}/request_change", shift_id),
        shift.title,
        ChangeRequestForm::from_fields(&ShiftFields::default()),
        Vec::new(),
    )
    .await
}

// POST /shifts/{shift_id}/request_change
pub async fn handle_request_change(
    State(state): State<AppState>,
    session: Session,
    Extension(user): Extension<CurrentUser>,
    Path(shift_id): Path<i64>,
    Form(form): Form<ChangeRequestForm>,
) -> AppResult<Response> {
    let shift = owned_shift(&state, &user, shift_id).await?;
    let (reason, fields) = match form.clean(false) {
        Ok(cleaned) => cleaned,
        Err(errors) => {
            return change_request_page(
                &state,
                &session,
                &user,
                "Request a shift change",
                format!("/shifts/{}/request_change", shift_id),
                shift.title,
                form,
                errors.messages(),
            )
            .await
        }
    };
    change_request_service::submit_change_request(&state.db_pool, &user, Some(shift_id), &reason, fields, false)
        .await?;
    flash::success(&session, "Your change request was submitted.").await?;
    Ok(Redirect::to(&format!("/shifts/{}", shift_id)).into_response())
}

// GET /shifts/{shift_id}/request_drop
pub async fn show_request_drop(
    State(state): State<AppState>,
    session: Session,
    Extension(user): Extension<CurrentUser>,
    Path(shift_id): Path<i64>,
) -> AppResult<Response> {
    let shift = owned_shift(&state, &user, shift_id).await?;
    let page = DropRequestPage {
        ctx: page_context(&state.db_pool, &session, Some(&user)).await?,
        action: format!("/shifts/{}/request_drop", shift_id),
        shift: shift.title,
        reason: String::new(),
        errors: Vec::new(),
    };
    Ok(render(&page)?.into_response())
}

// POST /shifts/{shift_id}/request_drop
pub async fn handle_request_drop(
    State(state): State<AppState>,
    session: Session,
    Extension(user): Extension<CurrentUser>,
    Path(shift_id): Path<i64>,
    Form(form): Form<DropRequestForm>,
) -> AppResult<Response> {
    let shift = owned_shift(&state, &user, shift_id).await?;
    let reason = match form.clean() {
        Ok(reason) => reason,
        Err(errors) => {
            let page = DropRequestPage {
                ctx: page_context(&state.db_pool, &session, Some(&user)).await?,
                action: format!("/shifts/{}/request_drop", shift_id),
                shift: shift.title,
                reason: form.reason,
                errors: errors.messages(),
            };
            return Ok(render(&page)?.into_response());
        }
    };
    change_request_service::submit_change_request(
        &state.db_pool,
        &user,
        Some(shift_id),
        &reason,
        ShiftFields::default(),
        true,
    )
    .await?;
    flash::success(&session, "Your drop request was submitted.").await?;
    Ok(Redirect::to(&format!("/shifts/{}", shift_id)).into_response())
}

/// First day of the week shown `offset` days from `today`; the whole week must fit the calendar.
fn schedule_start(today: NaiveDate, offset: i64) -> AppResult<NaiveDate> {
    TimeDelta::try_days(offset)
        .and_then(|delta| today.checked_add_signed(delta))
        .filter(|first| first.checked_add_signed(TimeDelta::days(7)).is_some())
        .ok_or_else(|| AppError::BadRequest(format!("Offset {} is out of range", offset)))
}

// GET /scheduling/view_schedule/{kind}/{offset}
pub async fn view_schedule(
    State(state): State<AppState>,
    session: Session,
    Extension(user): Extension<CurrentUser>,
    Path((kind, offset)): Path<(String, i64)>,
) -> AppResult<Response> {
    let filter = ScheduleFilter::parse(&kind)
        .ok_or_else(|| AppError::BadRequest(format!("'{}' is not SI, Tutoring or All", kind)))?;
    let first_day = schedule_start(Local::now().date_naive(), offset)?;
    let grid = shift_service::weekly_schedule(&state.db_pool, filter, first_day).await?;

    let weekdays = (0..7)
        .map(|i| (first_day + TimeDelta::days(i)).format("%a %m/%d").to_string())
        .collect();
    let rows = grid
        .iter()
        .map(|row| ScheduleRowView {
            course_id: row.course.id,
            course: row.course.short_name(),
            days: row.days.iter().map(|day| shift_views(day)).collect(),
        })
        .collect();
    let kinds = ["SI", "Tutoring", "All"]
        .iter()
        .map(|k| Choice::new(k, *k, &kind))
        .collect();

    let page = SchedulePage {
        ctx: page_context(&state.db_pool, &session, Some(&user)).await?,
        kind,
        kinds,
        prev_offset: offset.saturating_sub(7),
        next_offset: offset.saturating_add(7),
        weekdays,
        rows,
    };
    Ok(render(&page)?.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn schedule_start_moves_by_whole_days() {
        assert_eq!(schedule_start(day(2024, 3, 4), 7).unwrap(), day(2024, 3, 11));
        assert_eq!(schedule_start(day(2024, 3, 4), -4).unwrap(), day(2024, 2, 29));
    }

    #[test]
    fn schedule_start_rejects_offsets_past_the_calendar() {
        for offset in [100_000_000, -100_000_000, i64::MAX, i64::MIN] {
            let err = schedule_start(day(2024, 3, 4), offset).unwrap_err();
            assert!(matches!(err, AppError::BadRequest(_)), "offset {}", offset);
        }
        // The last representable week still needs seven days after its start
        let last = NaiveDate::MAX;
        assert!(schedule_start(last, 0).is_err());
    }
}
