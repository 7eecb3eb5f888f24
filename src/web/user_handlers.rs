// src/web/user_handlers.rs
use crate::{
    error::{AppError, AppResult},
    forms::{BulkUsersForm, CreateUserForm, ProfileForm},
    models::{
        shift::{CalendarEvent, ShiftRow},
        user::{CurrentUser, ProfileData, ALL_GROUPS, SIS, TUTORS},
    },
    services::{change_request_service, course_service, shift_service, user_service},
    state::AppState,
    templates::{
        course_choices, render, request_views, shift_views, user_views, BulkUsersPage, Choice, CourseView,
        CreateUserPage, IndexPage, ProfileFormPage, ProfilePage, UserListPage, UserRequestsPage, UserView,
    },
    web::{context::page_context, flash},
};
use axum::{
    extract::{Extension, Form, Path, State},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

// GET /
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<Response> {
    if user.in_any_group(&[TUTORS, SIS]) {
        return Ok(Redirect::to(&format!("/users/{}", user.id)).into_response());
    }
    let requests = change_request_service::pending_for_owner(&state.db_pool, user.id).await?;
    let page = IndexPage {
        ctx: page_context(&state.db_pool, &session, Some(&user)).await?,
        requests: request_views(&requests),
    };
    Ok(render(&page)?.into_response())
}

// Safe to drop into a <script> block
fn events_json(shifts: &[ShiftRow]) -> AppResult<String> {
    let events: Vec<CalendarEvent> = shifts.iter().map(ShiftRow::to_event).collect();
    let json = serde_json::to_string(&events).map_err(|e| {
        tracing::error!("Failed to serialize calendar events: {}", e);
        AppError::InternalServerError
    })?;
    Ok(json.replace("</", "<\\/"))
}

/// GET /users/{key}: a numeric key is a profile, anything else a group listing.
pub async fn view_user_or_group(
    State(state): State<AppState>,
    session: Session,
    Extension(user): Extension<CurrentUser>,
    Path(key): Path<String>,
) -> AppResult<Response> {
    match key.parse::<i64>() {
        Ok(user_id) => view_profile(&state, &session, &user, user_id).await,
        Err(_) => list_users(&state, &session, &user, &key).await,
    }
}

async fn view_profile(
    state: &AppState,
    session: &Session,
    user: &CurrentUser,
    user_id: i64,
) -> AppResult<Response> {
    let profile = user_service::get_user(&state.db_pool, user_id).await?;
    let groups = user_service::get_user_groups(&state.db_pool, user_id).await?;
    let si_course = match profile.si_course_id {
        Some(course_id) => course_service::get_course(&state.db_pool, course_id).await?.display(),
        None => String::new(),
    };
    let courses_tutored = user_service::courses_tutored(&state.db_pool, user_id).await?;
    let shifts = shift_service::shifts_for_user(&state.db_pool, user_id).await?;

    let page = ProfilePage {
        ctx: page_context(&state.db_pool, session, Some(user)).await?,
        profile: UserView::from(&profile),
        groups: groups.join(", "),
        si_course,
        courses_tutored: courses_tutored.iter().map(CourseView::from).collect(),
        can_edit: user.is_self_or_privileged(user_id),
        events_json: events_json(&shifts)?,
        shifts: shift_views(&shifts),
    };
    Ok(render(&page)?.into_response())
}

async fn list_users(
    state: &AppState,
    session: &Session,
    user: &CurrentUser,
    group: &str,
) -> AppResult<Response> {
    if !user.is_privileged() {
        tracing::warn!("'{}' tried to list group '{}'", user.username, group);
        return Err(AppError::PermissionDenied);
    }
    let users = user_service::list_users_in_group(&state.db_pool, group).await?;
    let group = ALL_GROUPS
        .iter()
        .find(|g| g.eq_ignore_ascii_case(group))
        .map(|g| g.to_string())
        .unwrap_or_else(|| group.to_string());
    let page = UserListPage {
        ctx: page_context(&state.db_pool, session, Some(user)).await?,
        group,
        users: user_views(&users),
    };
    Ok(render(&page)?.into_response())
}

// GET /users/{key}/edit
pub async fn show_edit_profile(
    State(state): State<AppState>,
    session: Session,
    Extension(user): Extension<CurrentUser>,
    Path(user_id): Path<i64>,
) -> AppResult<Response> {
    let profile = user_service::get_user(&state.db_pool, user_id).await?;
    let page = ProfileFormPage {
        ctx: page_context(&state.db_pool, &session, Some(&user)).await?,
        user_id,
        form: ProfileForm {
            first_name: profile.first_name,
            last_name: profile.last_name,
            email: profile.email,
        },
        errors: Vec::new(),
    };
    Ok(render(&page)?.into_response())
}

// POST /users/{key}/edit
pub async fn handle_edit_profile(
    State(state): State<AppState>,
    session: Session,
    Extension(user): Extension<CurrentUser>,
    Path(user_id): Path<i64>,
    Form(form): Form<ProfileForm>,
) -> AppResult<Response> {
    let profile: ProfileData = match form.clean() {
        Ok(profile) => profile,
        Err(errors) => {
            let page = ProfileFormPage {
                ctx: page_context(&state.db_pool, &session, Some(&user)).await?,
                user_id,
                form,
                errors: errors.messages(),
            };
            return Ok(render(&page)?.into_response());
        }
    };
    user_service::update_profile(&state.db_pool, user_id, &profile).await?;
    flash::success(&session, "Profile updated.").await?;
    Ok(Redirect::to(&format!("/users/{}", user_id)).into_response())
}

// GET /users/{key}/shift_change_requests
pub async fn user_requests(
    State(state): State<AppState>,
    session: Session,
    Extension(user): Extension<CurrentUser>,
    Path(user_id): Path<i64>,
) -> AppResult<Response> {
    let profile = user_service::get_user(&state.db_pool, user_id).await?;
    let requests = change_request_service::list_requests_for_user(&state.db_pool, user_id).await?;
    let page = UserRequestsPage {
        ctx: page_context(&state.db_pool, &session, Some(&user)).await?,
        profile: UserView::from(&profile),
        requests: request_views(&requests),
    };
    Ok(render(&page)?.into_response())
}

async fn create_user_page(
    state: &AppState,
    session: &Session,
    user: &CurrentUser,
    form: CreateUserForm,
    errors: Vec<String>,
) -> AppResult<Response> {
    let courses = course_service::list_courses(&state.db_pool).await?;
    let groups = ALL_GROUPS
        .iter()
        .map(|g| Choice {
            value: g.to_string(),
            label: g.to_string(),
            selected: form.groups.iter().any(|selected| selected == g),
        })
        .collect();
    let page = CreateUserPage {
        ctx: page_context(&state.db_pool, session, Some(user)).await?,
        si_courses: course_choices(&courses, std::slice::from_ref(&form.si_course)),
        tutored_courses: course_choices(&courses, &form.courses_tutored),
        groups,
        form,
        errors,
    };
    Ok(render(&page)?.into_response())
}

// GET /users/create
pub async fn show_create_user(
    State(state): State<AppState>,
    session: Session,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<Response> {
    create_user_page(&state, &session, &user, CreateUserForm::default(), Vec::new()).await
}

// POST /users/create (multi-selects arrive as repeated keys)
pub async fn handle_create_user(
    State(state): State<AppState>,
    session: Session,
    Extension(user): Extension<CurrentUser>,
    Form(pairs): Form<Vec<(String, String)>>,
) -> AppResult<Response> {
    let form = CreateUserForm::from_pairs(&pairs);
    let new_user = match form.clean() {
        Ok(new_user) => new_user,
        Err(errors) => return create_user_page(&state, &session, &user, form, errors.messages()).await,
    };
    match user_service::create_user(&state.db_pool, &new_user).await {
        Ok(id) => {
            flash::success(&session, format!("User '{}' created.", new_user.username)).await?;
            Ok(Redirect::to(&format!("/users/{}", id)).into_response())
        }
        Err(AppError::Validation(errors)) => {
            create_user_page(&state, &session, &user, form, errors.messages()).await
        }
        Err(e) => Err(e),
    }
}

// GET /users/create/bulk
pub async fn show_bulk_create(
    State(state): State<AppState>,
    session: Session,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<Response> {
    let page = BulkUsersPage {
        ctx: page_context(&state.db_pool, &session, Some(&user)).await?,
        user_data: String::new(),
        errors: Vec::new(),
    };
    Ok(render(&page)?.into_response())
}

// POST /users/create/bulk
pub async fn handle_bulk_create(
    State(state): State<AppState>,
    session: Session,
    Extension(user): Extension<CurrentUser>,
    Form(form): Form<BulkUsersForm>,
) -> AppResult<Response> {
    let created = match form.clean() {
        Ok(users) => user_service::create_users_in_bulk(&state.db_pool, &users).await,
        Err(errors) => Err(AppError::Validation(errors)),
    };
    match created {
        Ok(ids) => {
            flash::success(&session, format!("{} users created.", ids.len())).await?;
            Ok(Redirect::to("/users/create/bulk").into_response())
        }
        Err(AppError::Validation(errors)) => {
            tracing::warn!("Bulk user creation rejected: {}", errors);
            let page = BulkUsersPage {
                ctx: page_context(&state.db_pool, &session, Some(&user)).await?,
                user_data: form.user_data,
                errors: errors.messages(),
            };
            Ok(render(&page)?.into_response())
        }
        Err(e) => Err(e),
    }
}
