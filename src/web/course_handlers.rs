// src/web/course_handlers.rs
use crate::{
    error::AppResult,
    forms::CourseForm,
    models::user::CurrentUser,
    services::course_service,
    state::AppState,
    templates::{render, user_views, CourseDetailPage, CourseFormPage, CourseListPage, CourseView},
    web::{context::page_context, flash},
};
use axum::{
    extract::{Extension, Form, Path, State},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

// GET /courses/
pub async fn list_courses(
    State(state): State<AppState>,
    session: Session,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<Response> {
    let courses = course_service::list_courses(&state.db_pool).await?;
    let page = CourseListPage {
        ctx: page_context(&state.db_pool, &session, Some(&user)).await?,
        courses: courses.iter().map(CourseView::from).collect(),
    };
    Ok(render(&page)?.into_response())
}

// GET /courses/{course_id}
pub async fn view_course(
    State(state): State<AppState>,
    session: Session,
    Extension(user): Extension<CurrentUser>,
    Path(course_id): Path<i64>,
) -> AppResult<Response> {
    let course = course_service::get_course(&state.db_pool, course_id).await?;
    let tutors = course_service::tutors_for_course(&state.db_pool, course_id).await?;
    let sis = course_service::sis_for_course(&state.db_pool, course_id).await?;
    let page = CourseDetailPage {
        ctx: page_context(&state.db_pool, &session, Some(&user)).await?,
        course: CourseView::from(&course),
        tutors: user_views(&tutors),
        sis: user_views(&sis),
    };
    Ok(render(&page)?.into_response())
}

async fn course_form_page(
    state: &AppState,
    session: &Session,
    user: &CurrentUser,
    title: &str,
    action: String,
    form: CourseForm,
    errors: Vec<String>,
) -> AppResult<Response> {
    let page = CourseFormPage {
        ctx: page_context(&state.db_pool, session, Some(user)).await?,
        title: title.to_string(),
        action,
        form,
        errors,
    };
    Ok(render(&page)?.into_response())
}

// GET /courses/add
pub async fn show_add_course(
    State(state): State<AppState>,
    session: Session,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<Response> {
    course_form_page(
        &state,
        &session,
        &user,
        "Add course",
        "/courses/add".to_string(),
        CourseForm::default(),
        Vec::new(),
    )
    .await
}

// POST /courses/add
pub async fn handle_add_course(
    State(state): State<AppState>,
    session: Session,
    Extension(user): Extension<CurrentUser>,
    Form(form): Form<CourseForm>,
) -> AppResult<Response> {
    match form.clean() {
        Ok(data) => {
            let id = course_service::create_course(&state.db_pool, &data).await?;
            flash::success(&session, format!("Course {} {} added.", data.department, data.number)).await?;
            Ok(Redirect::to(&format!("/courses/{}", id)).into_response())
        }
        Err(errors) => {
            course_form_page(
                &state,
                &session,
                &user,
                "Add course",
                "/courses/add".to_string(),
                form,
                errors.messages(),
            )
            .await
        }
    }
}

// GET /courses/{course_id}/edit
pub async fn show_edit_course(
    State(state): State<AppState>,
    session: Session,
    Extension(user): Extension<CurrentUser>,
    Path(course_id): Path<i64>,
) -> AppResult<Response> {
    let course = course_service::get_course(&state.db_pool, course_id).await?;
    let form = CourseForm {
        department: course.department,
        number: course.number.to_string(),
        name: course.name,
    };
    course_form_page(
        &state,
        &session,
        &user,
        "Edit course",
        format!("/courses/{}/edit", course_id),
        form,
        Vec::new(),
    )
    .await
}

// POST /courses/{course_id}/edit
pub async fn handle_edit_course(
    State(state): State<AppState>,
    session: Session,
    Extension(user): Extension<CurrentUser>,
    Path(course_id): Path<i64>,
    Form(form): Form<CourseForm>,
) -> AppResult<Response> {
    match form.clean() {
        Ok(data) => {
            course_service::update_course(&state.db_pool, course_id, &data).await?;
            flash::success(&session, "Course updated.").await?;
            Ok(Redirect::to(&format!("/courses/{}", course_id)).into_response())
        }
        Err(errors) => {
            flash::error(&session, "Please correct the errors below.").await?;
            course_form_page(
                &state,
                &session,
                &user,
                "Edit course",
                format!("/courses/{}/edit", course_id),
                form,
                errors.messages(),
            )
            .await
        }
    }
}
