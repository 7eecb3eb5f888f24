// src/services/course_service.rs
use crate::{
    error::{AppError, AppResult},
    models::{
        course::{Course, CourseData},
        user::User,
    },
};
use sqlx::SqlitePool;

pub async fn list_courses(db_pool: &SqlitePool) -> AppResult<Vec<Course>> {
    let courses = sqlx::query_as::<_, Course>(
        "SELECT id, department, number, name FROM courses ORDER BY department ASC, number ASC",
    )
    .fetch_all(db_pool)
    .await?;
    Ok(courses)
}

pub async fn get_course(db_pool: &SqlitePool, course_id: i64) -> AppResult<Course> {
    sqlx::query_as::<_, Course>("SELECT id, department, number, name FROM courses WHERE id = ?1")
        .bind(course_id)
        .fetch_optional(db_pool)
        .await?
        .ok_or(AppError::NotFound("Course"))
}

pub async fn create_course(db_pool: &SqlitePool, data: &CourseData) -> AppResult<i64> {
    let id = sqlx::query("INSERT INTO courses (department, number, name) VALUES (?1, ?2, ?3)")
        .bind(&data.department)
        .bind(data.number)
        .bind(&data.name)
        .execute(db_pool)
        .await?
        .last_insert_rowid();
    tracing::info!("Course {} {} created with id {}", data.department, data.number, id);
    Ok(id)
}

pub async fn update_course(db_pool: &SqlitePool, course_id: i64, data: &CourseData) -> AppResult<()> {
    let rows_affected = sqlx::query(
        "UPDATE courses SET department = ?1, number = ?2, name = ?3 WHERE id = ?4",
    )
    .bind(&data.department)
    .bind(data.number)
    .bind(&data.name)
    .bind(course_id)
    .execute(db_pool)
    .await?
    .rows_affected();

    if rows_affected == 0 {
        return Err(AppError::NotFound("Course"));
    }
    tracing::info!("Course {} updated", course_id);
    Ok(())
}

/// Users who tutor the course.
pub async fn tutors_for_course(db_pool: &SqlitePool, course_id: i64) -> AppResult<Vec<User>> {
    let users = sqlx::query_as::<_, User>(
        r#"
        SELECT u.id, u.username, u.password_hash, u.first_name, u.last_name, u.email,
               u.is_superuser, u.si_course_id
        FROM users u
        JOIN user_courses_tutored uct ON uct.user_id = u.id
        WHERE uct.course_id = ?1
        ORDER BY u.last_name ASC, u.first_name ASC
        "#,
    )
    .bind(course_id)
    .fetch_all(db_pool)
    .await?;
    Ok(users)
}

/// Users leading SI sessions for the course.
pub async fn sis_for_course(db_pool: &SqlitePool, course_id: i64) -> AppResult<Vec<User>> {
    let users = sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, password_hash, first_name, last_name, email, is_superuser, si_course_id
        FROM users
        WHERE si_course_id = ?1
        ORDER BY last_name ASC, first_name ASC
        "#,
    )
    .bind(course_id)
    .fetch_all(db_pool)
    .await?;
    Ok(users)
}
