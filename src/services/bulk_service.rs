// src/services/bulk_service.rs
use crate::error::AppResult;
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::{Sqlite, SqlitePool, Transaction};

// (id, start) of every shift starting on `date`
async fn starts_on_date(
    tx: &mut Transaction<'_, Sqlite>,
    date: NaiveDate,
) -> AppResult<Vec<(i64, NaiveDateTime)>> {
    let rows = sqlx::query_as::<_, (i64, NaiveDateTime)>(
        "SELECT id, start FROM shifts WHERE date(start) = ?1 ORDER BY id ASC",
    )
    .bind(date.format("%Y-%m-%d").to_string())
    .fetch_all(&mut **tx)
    .await?;
    Ok(rows)
}

// Moves each shift to `date`, keeping its time of day
async fn reschedule(
    tx: &mut Transaction<'_, Sqlite>,
    shifts: &[(i64, NaiveDateTime)],
    date: NaiveDate,
) -> AppResult<u64> {
    let mut moved = 0;
    for (id, start) in shifts {
        moved += sqlx::query("UPDATE shifts SET start = ?1 WHERE id = ?2")
            .bind(date.and_time(start.time()))
            .bind(id)
            .execute(&mut **tx)
            .await?
            .rows_affected();
    }
    Ok(moved)
}

/// Deletes the given shifts and returns how many rows went away.
/// Ids of shifts that no longer exist are skipped.
pub async fn delete_shifts(db_pool: &SqlitePool, shift_ids: &[i64]) -> AppResult<u64> {
    let mut tx = db_pool.begin().await?;
    let mut deleted = 0;
    for id in shift_ids {
        deleted += sqlx::query("DELETE FROM shifts WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
    }
    tx.commit().await?;

    if deleted as usize != shift_ids.len() {
        tracing::warn!(
            "Bulk drop: {} shifts requested, {} deleted (list was stale)",
            shift_ids.len(),
            deleted
        );
    }
    tracing::info!("🗑️ Bulk drop removed {} shifts", deleted);
    Ok(deleted)
}

/// Exchanges the shifts of two days. Both sets are read before anything moves,
/// so swapping the same pair twice restores the schedule.
pub async fn swap_shift_dates(
    db_pool: &SqlitePool,
    first: NaiveDate,
    second: NaiveDate,
) -> AppResult<(u64, u64)> {
    let mut tx = db_pool.begin().await?;
    let on_first = starts_on_date(&mut tx, first).await?;
    let on_second = starts_on_date(&mut tx, second).await?;

    let moved_forward = reschedule(&mut tx, &on_first, second).await?;
    let moved_back = reschedule(&mut tx, &on_second, first).await?;
    tx.commit().await?;

    tracing::info!(
        "🔁 Swapped {} shifts on {} with {} shifts on {}",
        moved_forward,
        first,
        moved_back,
        second
    );
    Ok((moved_forward, moved_back))
}

/// Moves every shift starting on `from` to `to`, keeping times of day.
pub async fn move_shifts(db_pool: &SqlitePool, from: NaiveDate, to: NaiveDate) -> AppResult<u64> {
    let mut tx = db_pool.begin().await?;
    let shifts = starts_on_date(&mut tx, from).await?;
    let moved = reschedule(&mut tx, &shifts, to).await?;
    tx.commit().await?;

    tracing::info!("➡️ Moved {} shifts from {} to {}", moved, from, to);
    Ok(moved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::test_pool,
        models::shift::ShiftKind,
        services::shift_service::{
            self,
            tests::{at, make_shift, make_user},
        },
    };

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[tokio::test]
    async fn swapping_keeps_times_and_is_self_inverse() {
        let pool = test_pool().await;
        let person = make_user(&pool, "tutor", "Tutors").await;
        let a = make_shift(&pool, person, at(2024, 3, 4, 9, 0), ShiftKind::Tutoring).await;
        let b = make_shift(&pool, person, at(2024, 3, 4, 15, 30), ShiftKind::Tutoring).await;
        let c = make_shift(&pool, person, at(2024, 3, 11, 11, 0), ShiftKind::Si).await;

        assert_eq!(swap_shift_dates(&pool, day(4), day(11)).await.unwrap(), (2, 1));
        let start = |id| {
            let pool = pool.clone();
            async move { shift_service::get_shift(&pool, id).await.unwrap().start }
        };
        assert_eq!(start(a).await, at(2024, 3, 11, 9, 0));
        assert_eq!(start(b).await, at(2024, 3, 11, 15, 30));
        assert_eq!(start(c).await, at(2024, 3, 4, 11, 0));

        swap_shift_dates(&pool, day(4), day(11)).await.unwrap();
        assert_eq!(start(a).await, at(2024, 3, 4, 9, 0));
        assert_eq!(start(b).await, at(2024, 3, 4, 15, 30));
        assert_eq!(start(c).await, at(2024, 3, 11, 11, 0));
    }

    #[tokio::test]
    async fn moving_leaves_other_days_alone() {
        let pool = test_pool().await;
        let person = make_user(&pool, "tutor", "Tutors").await;
        let moved = make_shift(&pool, person, at(2024, 3, 4, 9, 0), ShiftKind::Tutoring).await;
        let stays = make_shift(&pool, person, at(2024, 3, 5, 9, 0), ShiftKind::Tutoring).await;

        assert_eq!(move_shifts(&pool, day(4), day(6)).await.unwrap(), 1);
        assert_eq!(
            shift_service::get_shift(&pool, moved).await.unwrap().start,
            at(2024, 3, 6, 9, 0)
        );
        assert_eq!(
            shift_service::get_shift(&pool, stays).await.unwrap().start,
            at(2024, 3, 5, 9, 0)
        );
    }

    #[tokio::test]
    async fn deleting_counts_only_rows_that_existed() {
        let pool = test_pool().await;
        let person = make_user(&pool, "tutor", "Tutors").await;
        let a = make_shift(&pool, person, at(2024, 3, 4, 9, 0), ShiftKind::Tutoring).await;
        let b = make_shift(&pool, person, at(2024, 3, 4, 10, 0), ShiftKind::Tutoring).await;

        assert_eq!(delete_shifts(&pool, &[a, b, b + 100]).await.unwrap(), 2);
        assert!(shift_service::shifts_on_date(&pool, day(4)).await.unwrap().is_empty());
    }
}
