// src/services/hardware_service.rs
use crate::{
    error::{AppError, AppResult},
    models::hardware::{Hardware, HardwareData, LoanData, LoanRow},
};
use sqlx::SqlitePool;

const LOAN_ROW_SELECT: &str = r#"
    SELECT l.id, l.hardware_id, h.name AS hardware_name, l.borrower_id,
           u.username, u.first_name, u.last_name, l.start_time, l.return_time
    FROM loans l
    JOIN hardware h ON h.id = l.hardware_id
    JOIN users u ON u.id = l.borrower_id
"#;

pub async fn list_hardware(db_pool: &SqlitePool) -> AppResult<Vec<Hardware>> {
    let hardware = sqlx::query_as::<_, Hardware>(
        "SELECT id, name, is_available FROM hardware ORDER BY name ASC",
    )
    .fetch_all(db_pool)
    .await?;
    Ok(hardware)
}

pub async fn get_hardware(db_pool: &SqlitePool, hardware_id: i64) -> AppResult<Hardware> {
    sqlx::query_as::<_, Hardware>("SELECT id, name, is_available FROM hardware WHERE id = ?1")
        .bind(hardware_id)
        .fetch_optional(db_pool)
        .await?
        .ok_or(AppError::NotFound("Hardware"))
}

pub async fn create_hardware(db_pool: &SqlitePool, data: &HardwareData) -> AppResult<i64> {
    let id = sqlx::query("INSERT INTO hardware (name, is_available) VALUES (?1, ?2)")
        .bind(&data.name)
        .bind(data.is_available)
        .execute(db_pool)
        .await?
        .last_insert_rowid();
    tracing::info!("Hardware '{}' added with id {}", data.name, id);
    Ok(id)
}

pub async fn update_hardware(db_pool: &SqlitePool, hardware_id: i64, data: &HardwareData) -> AppResult<()> {
    let rows_affected = sqlx::query("UPDATE hardware SET name = ?1, is_available = ?2 WHERE id = ?3")
        .bind(&data.name)
        .bind(data.is_available)
        .bind(hardware_id)
        .execute(db_pool)
        .await?
        .rows_affected();
    if rows_affected == 0 {
        return Err(AppError::NotFound("Hardware"));
    }
    Ok(())
}

/// Every loan, soonest return first. Loans without a return time come last.
pub async fn list_loans(db_pool: &SqlitePool) -> AppResult<Vec<LoanRow>> {
    let loans = sqlx::query_as::<_, LoanRow>(&format!(
        "{LOAN_ROW_SELECT} ORDER BY l.return_time IS NULL, l.return_time ASC, l.id ASC"
    ))
    .fetch_all(db_pool)
    .await?;
    Ok(loans)
}

/// Loans not returned yet: no return time, or one still in the future.
pub async fn outstanding_loans(db_pool: &SqlitePool) -> AppResult<Vec<LoanRow>> {
    let loans = sqlx::query_as::<_, LoanRow>(&format!(
        "{LOAN_ROW_SELECT} WHERE l.return_time IS NULL OR l.return_time > ?1 ORDER BY h.name ASC"
    ))
    .bind(chrono::Local::now().naive_local())
    .fetch_all(db_pool)
    .await?;
    Ok(loans)
}

pub async fn get_loan(db_pool: &SqlitePool, loan_id: i64) -> AppResult<LoanRow> {
    sqlx::query_as::<_, LoanRow>(&format!("{LOAN_ROW_SELECT} WHERE l.id = ?1"))
        .bind(loan_id)
        .fetch_optional(db_pool)
        .await?
        .ok_or(AppError::NotFound("Loan"))
}

/// Records a loan. Availability of the item is not changed and overlaps are not checked.
pub async fn create_loan(db_pool: &SqlitePool, data: &LoanData) -> AppResult<i64> {
    let id = sqlx::query(
        "INSERT INTO loans (hardware_id, borrower_id, start_time, return_time) VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(data.hardware_id)
    .bind(data.borrower_id)
    .bind(data.start_time)
    .bind(data.return_time)
    .execute(db_pool)
    .await?
    .last_insert_rowid();
    tracing::info!(
        "Loan {} recorded: hardware {} to user {}",
        id,
        data.hardware_id,
        data.borrower_id
    );
    Ok(id)
}

pub async fn update_loan(db_pool: &SqlitePool, loan_id: i64, data: &LoanData) -> AppResult<()> {
    let rows_affected = sqlx::query(
        r#"
        UPDATE loans SET hardware_id = ?1, borrower_id = ?2, start_time = ?3, return_time = ?4
        WHERE id = ?5
        "#,
    )
    .bind(data.hardware_id)
    .bind(data.borrower_id)
    .bind(data.start_time)
    .bind(data.return_time)
    .bind(loan_id)
    .execute(db_pool)
    .await?
    .rows_affected();
    if rows_affected == 0 {
        return Err(AppError::NotFound("Loan"));
    }
    Ok(())
}
