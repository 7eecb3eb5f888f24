// src/web/hardware_handlers.rs
use crate::{
    error::AppResult,
    forms::{HardwareForm, LoanForm},
    models::user::CurrentUser,
    services::{hardware_service, user_service},
    state::AppState,
    templates::{
        loan_form_from, loan_views, people_choices, render, Choice, HardwareFormPage, HardwareListPage,
        LoanFormPage, LoanListPage,
    },
    web::{context::page_context, flash},
};
use axum::{
    extract::{Extension, Form, Path, State},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

// GET /show_hardware
pub async fn show_hardware(
    State(state): State<AppState>,
    session: Session,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<Response> {
    let hardware = hardware_service::list_hardware(&state.db_pool).await?;
    let loans = hardware_service::outstanding_loans(&state.db_pool).await?;
    let page = HardwareListPage {
        ctx: page_context(&state.db_pool, &session, Some(&user)).await?,
        hardware,
        loans: loan_views(&loans),
    };
    Ok(render(&page)?.into_response())
}

// GET /show_loans
pub async fn show_loans(
    State(state): State<AppState>,
    session: Session,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<Response> {
    let loans = hardware_service::list_loans(&state.db_pool).await?;
    let page = LoanListPage {
        ctx: page_context(&state.db_pool, &session, Some(&user)).await?,
        loans: loan_views(&loans),
    };
    Ok(render(&page)?.into_response())
}

async fn hardware_form_page(
    state: &AppState,
    session: &Session,
    user: &CurrentUser,
    title: &str,
    action: String,
    form: &HardwareForm,
    errors: Vec<String>,
) -> AppResult<Response> {
    let page = HardwareFormPage {
        ctx: page_context(&state.db_pool, session, Some(user)).await?,
        title: title.to_string(),
        action,
        name: form.name.clone(),
        is_available: form.is_available.is_some(),
        errors,
    };
    Ok(render(&page)?.into_response())
}

// GET /add_hardware
pub async fn show_add_hardware(
    State(state): State<AppState>,
    session: Session,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<Response> {
    let form = HardwareForm {
        name: String::new(),
        is_available: Some("on".to_string()),
    };
    hardware_form_page(&state, &session, &user, "Add hardware", "/add_hardware".to_string(), &form, Vec::new())
        .await
}

// POST /add_hardware
pub async fn handle_add_hardware(
    State(state): State<AppState>,
    session: Session,
    Extension(user): Extension<CurrentUser>,
    Form(form): Form<HardwareForm>,
) -> AppResult<Response> {
    match form.clean() {
        Ok(data) => {
            hardware_service::create_hardware(&state.db_pool, &data).await?;
            flash::success(&session, format!("Hardware '{}' added.", data.name)).await?;
            Ok(Redirect::to("/show_hardware").into_response())
        }
        Err(errors) => {
            hardware_form_page(
                &state,
                &session,
                &user,
                "Add hardware",
                "/add_hardware".to_string(),
                &form,
                errors.messages(),
            )
            .await
        }
    }
}

// GET /edit_hardware/{id}
pub async fn show_edit_hardware(
    State(state): State<AppState>,
    session: Session,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    let hardware = hardware_service::get_hardware(&state.db_pool, id).await?;
    let form = HardwareForm {
        name: hardware.name,
        is_available: hardware.is_available.then(|| "on".to_string()),
    };
    hardware_form_page(
        &state,
        &session,
        &user,
        "Edit hardware",
        format!("/edit_hardware/{}", id),
        &form,
        Vec::new(),
    )
    .await
}

// POST /edit_hardware/{id}
pub async fn handle_edit_hardware(
    State(state): State<AppState>,
    session: Session,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Form(form): Form<HardwareForm>,
) -> AppResult<Response> {
    match form.clean() {
        Ok(data) => {
            hardware_service::update_hardware(&state.db_pool, id, &data).await?;
            flash::success(&session, "Hardware updated.").await?;
            Ok(Redirect::to("/show_hardware").into_response())
        }
        Err(errors) => {
            hardware_form_page(
                &state,
                &session,
                &user,
                "Edit hardware",
                format!("/edit_hardware/{}", id),
                &form,
                errors.messages(),
            )
            .await
        }
    }
}

async fn loan_form_page(
    state: &AppState,
    session: &Session,
    user: &CurrentUser,
    title: &str,
    action: String,
    form: LoanForm,
    errors: Vec<String>,
) -> AppResult<Response> {
    let items = hardware_service::list_hardware(&state.db_pool).await?;
    let users = user_service::find_all_users(&state.db_pool).await?;
    let page = LoanFormPage {
        ctx: page_context(&state.db_pool, session, Some(user)).await?,
        title: title.to_string(),
        action,
        hardware: items
            .iter()
            .map(|h| Choice::new(h.id, h.name.clone(), &form.target))
            .collect(),
        people: people_choices(&users, &form.hardware_user),
        form,
        errors,
    };
    Ok(render(&page)?.into_response())
}

// GET /add_loans
pub async fn show_add_loan(
    State(state): State<AppState>,
    session: Session,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<Response> {
    loan_form_page(&state, &session, &user, "Add loan", "/add_loans".to_string(), LoanForm::default(), Vec::new())
        .await
}

// POST /add_loans
pub async fn handle_add_loan(
    State(state): State<AppState>,
    session: Session,
    Extension(user): Extension<CurrentUser>,
    Form(form): Form<LoanForm>,
) -> AppResult<Response> {
    match form.clean() {
        Ok(data) => {
            hardware_service::create_loan(&state.db_pool, &data).await?;
            flash::success(&session, "Loan recorded.").await?;
            Ok(Redirect::to("/show_loans").into_response())
        }
        Err(errors) => {
            loan_form_page(&state, &session, &user, "Add loan", "/add_loans".to_string(), form, errors.messages())
                .await
        }
    }
}

// GET /edit_loans/{id}
pub async fn show_edit_loan(
    State(state): State<AppState>,
    session: Session,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    let loan = hardware_service::get_loan(&state.db_pool, id).await?;
    loan_form_page(
        &state,
        &session,
        &user,
        "Edit loan",
        format!("/edit_loans/{}", id),
        loan_form_from(&loan),
        Vec::new(),
    )
    .await
}

// POST /edit_loans/{id}
pub async fn handle_edit_loan(
    State(state): State<AppState>,
    session: Session,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Form(form): Form<LoanForm>,
) -> AppResult<Response> {
    match form.clean() {
        Ok(data) => {
            hardware_service::update_loan(&state.db_pool, id, &data).await?;
            flash::success(&session, "Loan updated.").await?;
            Ok(Redirect::to("/show_loans").into_response())
        }
        Err(errors) => {
            loan_form_page(
                &state,
                &session,
                &user,
                "Edit loan",
                format!("/edit_loans/{}", id),
                form,
                errors.messages(),
            )
            .await
        }
    }
}
