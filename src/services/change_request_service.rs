// src/services/change_request_service.rs
use crate::{
    error::{AppError, AppResult},
    forms::FormErrors,
    models::{
        change_request::{RequestAction, RequestRow, RequestState, ShiftChangeRequest, ShiftFields},
        shift::{NewShift, ShiftKind},
        user::CurrentUser,
    },
    services::shift_service,
};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};

const REQUEST_COLUMNS: &str = r#"
    id, kind, target_shift_id, reason, state, is_drop_request, creates_shift, requested_by_id, created_on,
    approved_by_id, approved_on, new_associated_person_id, new_start, new_duration_secs,
    new_location, new_kind
"#;

const REQUEST_ROW_SELECT: &str = r#"
    SELECT r.id, r.kind, r.target_shift_id, r.reason, r.state, r.is_drop_request, r.creates_shift,
           r.created_on,
           r.new_start, r.new_location, u.username AS requested_by,
           s.start AS shift_start, s.location AS shift_location
    FROM shift_change_requests r
    LEFT JOIN users u ON u.id = r.requested_by_id
    LEFT JOIN shifts s ON s.id = r.target_shift_id
"#;

/// Number of New requests per kind, shown to privileged users in the navigation bar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AlertCounts {
    pub si: i64,
    pub tutoring: i64,
}

impl AlertCounts {
    pub fn total(&self) -> i64 {
        self.si + self.tutoring
    }
}

async fn find_request(
    conn: &mut SqliteConnection,
    request_id: i64,
) -> AppResult<Option<ShiftChangeRequest>> {
    let request = sqlx::query_as::<_, ShiftChangeRequest>(&format!(
        "SELECT {REQUEST_COLUMNS} FROM shift_change_requests WHERE id = ?1"
    ))
    .bind(request_id)
    .fetch_optional(conn)
    .await?;
    Ok(request)
}

pub async fn get_request(db_pool: &SqlitePool, request_id: i64) -> AppResult<ShiftChangeRequest> {
    let mut conn = db_pool.acquire().await?;
    find_request(&mut conn, request_id)
        .await?
        .ok_or(AppError::NotFound("Shift change request"))
}

pub async fn get_request_row(db_pool: &SqlitePool, request_id: i64) -> AppResult<RequestRow> {
    sqlx::query_as::<_, RequestRow>(&format!("{REQUEST_ROW_SELECT} WHERE r.id = ?1"))
        .bind(request_id)
        .fetch_optional(db_pool)
        .await?
        .ok_or(AppError::NotFound("Shift change request"))
}

fn ensure_transition(request: &ShiftChangeRequest, to: RequestState) -> AppResult<()> {
    if request.state.can_transition_to(to, request.kind) {
        Ok(())
    } else {
        tracing::warn!(
            "Request {} cannot go from '{}' to '{}'",
            request.id,
            request.state,
            to
        );
        Err(AppError::InvalidTransition {
            from: request.state.to_string(),
            to: to.to_string(),
        })
    }
}

// Every field a brand new shift needs, or one error per missing field
fn new_shift_from(fields: &ShiftFields) -> AppResult<NewShift> {
    let mut errors = FormErrors::default();
    if fields.associated_person_id.is_none() {
        errors.add("new_associated_person", "A person is required for a new shift.");
    }
    if fields.start.is_none() {
        errors.add("new_start", "A start time is required for a new shift.");
    }
    if fields.duration_secs.is_none() {
        errors.add("new_duration", "A duration is required for a new shift.");
    }
    if fields.location.as_deref().is_none_or(str::is_empty) {
        errors.add("new_location", "A location is required for a new shift.");
    }
    if fields.kind.is_none() {
        errors.add("new_kind", "A kind is required for a new shift.");
    }

    match (
        fields.associated_person_id,
        fields.start,
        fields.duration_secs,
        &fields.location,
        fields.kind,
    ) {
        (Some(associated_person_id), Some(start), Some(duration_secs), Some(location), Some(kind))
            if errors.is_empty() =>
        {
            Ok(NewShift {
                associated_person_id,
                start,
                duration_secs,
                location: location.clone(),
                kind,
            })
        }
        _ => Err(AppError::Validation(errors)),
    }
}

/// Files a new request in state New.
///
/// With a target shift the caller must own it; the request kind defaults to the
/// shift's kind. Without one the request proposes a new shift for the caller
/// unless another person is named.
pub async fn submit_change_request(
    db_pool: &SqlitePool,
    caller: &CurrentUser,
    target_shift_id: Option<i64>,
    reason: &str,
    mut proposed: ShiftFields,
    is_drop_request: bool,
) -> AppResult<i64> {
    let kind = match target_shift_id {
        Some(shift_id) => {
            let shift = shift_service::get_shift(db_pool, shift_id).await?;
            if shift.associated_person_id != caller.id {
                tracing::warn!(
                    "User '{}' tried to file a request on shift {} they do not own",
                    caller.username,
                    shift_id
                );
                return Err(AppError::PermissionDenied);
            }
            proposed.kind.unwrap_or(shift.kind)
        }
        None => {
            if is_drop_request {
                return Err(AppError::BadRequest(
                    "A drop request needs a shift to drop.".to_string(),
                ));
            }
            proposed.associated_person_id.get_or_insert(caller.id);
            new_shift_from(&proposed)?.kind
        }
    };

    let id = sqlx::query(
        r#"
        INSERT INTO shift_change_requests
            (kind, target_shift_id, reason, state, is_drop_request, creates_shift, requested_by_id,
             new_associated_person_id, new_start, new_duration_secs, new_location, new_kind)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        "#,
    )
    .bind(kind)
    .bind(target_shift_id)
    .bind(reason)
    .bind(RequestState::New)
    .bind(is_drop_request)
    .bind(target_shift_id.is_none())
    .bind(caller.id)
    .bind(proposed.associated_person_id)
    .bind(proposed.start)
    .bind(proposed.duration_secs)
    .bind(&proposed.location)
    .bind(proposed.kind)
    .execute(db_pool)
    .await?
    .last_insert_rowid();

    tracing::info!(
        "📝 {} request {} filed by '{}' (target shift: {:?}, drop: {})",
        kind,
        id,
        caller.username,
        target_shift_id,
        is_drop_request
    );
    Ok(id)
}

/// Applies a request to the schedule and marks it Approved.
///
/// `final_fields` overrides the proposed values field by field. Two approvals of the
/// same request racing each other are not serialized.
pub async fn approve(
    db_pool: &SqlitePool,
    request_id: i64,
    approver_id: i64,
    final_fields: Option<ShiftFields>,
) -> AppResult<RequestAction> {
    let mut conn = db_pool.acquire().await?;
    let request = find_request(&mut conn, request_id)
        .await?
        .ok_or(AppError::NotFound("Shift change request"))?;
    ensure_transition(&request, RequestState::Approved)?;

    let fields = final_fields
        .unwrap_or_default()
        .or(request.proposed_fields());
    let action = request.action();

    let target_shift_id = match (action, request.target_shift_id) {
        (RequestAction::DropShift, Some(shift_id)) => {
            shift_service::delete_shift(&mut conn, shift_id).await?;
            tracing::info!("🗑️ Shift {} dropped by request {}", shift_id, request_id);
            None
        }
        // The shift is already gone
        (RequestAction::DropShift, None) => None,
        (RequestAction::EditShift, Some(shift_id)) => {
            let mut shift = shift_service::find_shift(&mut conn, shift_id)
                .await?
                .ok_or(AppError::NotFound("Shift"))?;
            fields.apply_to(&mut shift);
            shift_service::save_shift(&mut conn, &shift).await?;
            tracing::info!("✏️ Shift {} changed by request {}", shift_id, request_id);
            Some(shift_id)
        }
        // Its shift was deleted after the request was filed
        (RequestAction::EditShift, None) => {
            tracing::warn!("Request {} edits a shift that no longer exists", request_id);
            return Err(AppError::NotFound("Shift"));
        }
        (RequestAction::CreateShift, _) => {
            let new_shift = new_shift_from(&fields)?;
            let shift_id = shift_service::insert_shift(&mut conn, &new_shift).await?;
            tracing::info!("➕ Shift {} created by request {}", shift_id, request_id);
            Some(shift_id)
        }
    };

    sqlx::query(
        r#"
        UPDATE shift_change_requests
        SET state = ?1, target_shift_id = ?2, approved_by_id = ?3, approved_on = ?4
        WHERE id = ?5
        "#,
    )
    .bind(RequestState::Approved)
    .bind(target_shift_id)
    .bind(approver_id)
    .bind(chrono::Local::now().naive_local())
    .bind(request_id)
    .execute(&mut *conn)
    .await?;

    tracing::info!("✅ Request {} approved by user {}", request_id, approver_id);
    Ok(action)
}

/// Marks the request Not Approved. The shift is left as it is.
pub async fn deny(db_pool: &SqlitePool, request_id: i64, approver_id: i64) -> AppResult<()> {
    let request = get_request(db_pool, request_id).await?;
    ensure_transition(&request, RequestState::NotApproved)?;

    sqlx::query(
        "UPDATE shift_change_requests SET state = ?1, approved_by_id = ?2, approved_on = ?3 WHERE id = ?4",
    )
    .bind(RequestState::NotApproved)
    .bind(approver_id)
    .bind(chrono::Local::now().naive_local())
    .bind(request_id)
    .execute(db_pool)
    .await?;

    tracing::info!("❌ Request {} denied by user {}", request_id, approver_id);
    Ok(())
}

/// SI requests only, and only from New.
pub async fn mark_pending(db_pool: &SqlitePool, request_id: i64) -> AppResult<()> {
    let request = get_request(db_pool, request_id).await?;
    ensure_transition(&request, RequestState::Pending)?;

    sqlx::query("UPDATE shift_change_requests SET state = ?1 WHERE id = ?2")
        .bind(RequestState::Pending)
        .bind(request_id)
        .execute(db_pool)
        .await?;

    tracing::info!("⏳ Request {} marked pending", request_id);
    Ok(())
}

pub async fn list_requests(
    db_pool: &SqlitePool,
    kind: ShiftKind,
    state: RequestState,
) -> AppResult<Vec<RequestRow>> {
    let requests = sqlx::query_as::<_, RequestRow>(&format!(
        "{REQUEST_ROW_SELECT} WHERE r.kind = ?1 AND r.state = ?2 ORDER BY r.created_on ASC, r.id ASC"
    ))
    .bind(kind)
    .bind(state)
    .fetch_all(db_pool)
    .await?;
    tracing::debug!("{} {} requests in state '{}'", requests.len(), kind, state);
    Ok(requests)
}

/// Requests filed by the user, proposing the user, or targeting one of their shifts.
pub async fn list_requests_for_user(db_pool: &SqlitePool, user_id: i64) -> AppResult<Vec<RequestRow>> {
    let requests = sqlx::query_as::<_, RequestRow>(&format!(
        r#"{REQUEST_ROW_SELECT}
        WHERE r.requested_by_id = ?1 OR r.new_associated_person_id = ?1 OR s.associated_person_id = ?1
        ORDER BY r.created_on DESC, r.id DESC"#
    ))
    .bind(user_id)
    .fetch_all(db_pool)
    .await?;
    Ok(requests)
}

pub async fn requests_for_shift(db_pool: &SqlitePool, shift_id: i64) -> AppResult<Vec<RequestRow>> {
    let requests = sqlx::query_as::<_, RequestRow>(&format!(
        "{REQUEST_ROW_SELECT} WHERE r.target_shift_id = ?1 ORDER BY r.created_on DESC, r.id DESC"
    ))
    .bind(shift_id)
    .fetch_all(db_pool)
    .await?;
    Ok(requests)
}

/// New requests on shifts owned by the user.
pub async fn pending_for_owner(db_pool: &SqlitePool, user_id: i64) -> AppResult<Vec<RequestRow>> {
    let requests = sqlx::query_as::<_, RequestRow>(&format!(
        "{REQUEST_ROW_SELECT} WHERE s.associated_person_id = ?1 AND r.state = ?2 ORDER BY r.created_on ASC"
    ))
    .bind(user_id)
    .bind(RequestState::New)
    .fetch_all(db_pool)
    .await?;
    Ok(requests)
}

pub async fn alert_counts(db_pool: &SqlitePool) -> AppResult<AlertCounts> {
    let rows = sqlx::query_as::<_, (ShiftKind, i64)>(
        "SELECT kind, COUNT(*) FROM shift_change_requests WHERE state = ?1 GROUP BY kind",
    )
    .bind(RequestState::New)
    .fetch_all(db_pool)
    .await?;

    let mut counts = AlertCounts::default();
    for (kind, count) in rows {
        match kind {
            ShiftKind::Si => counts.si = count,
            ShiftKind::Tutoring => counts.tutoring = count,
        }
    }
    Ok(counts)
}

/// Privileged callers see every request; others only the ones concerning them.
pub async fn ensure_can_view(
    db_pool: &SqlitePool,
    caller: &CurrentUser,
    request: &ShiftChangeRequest,
) -> AppResult<()> {
    if caller.is_privileged()
        || request.requested_by_id == Some(caller.id)
        || request.new_associated_person_id == Some(caller.id)
    {
        return Ok(());
    }
    if let Some(shift_id) = request.target_shift_id {
        let mut conn = db_pool.acquire().await?;
        if let Some(shift) = shift_service::find_shift(&mut conn, shift_id).await? {
            if shift.associated_person_id == caller.id {
                return Ok(());
            }
        }
    }
    Err(AppError::PermissionDenied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::test_pool,
        services::shift_service::tests::{at, make_shift, make_user},
    };

    fn caller(id: i64, username: &str, groups: &[&str]) -> CurrentUser {
        CurrentUser {
            id,
            username: username.into(),
            display_name: username.into(),
            is_superuser: false,
            groups: groups.iter().map(|g| g.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn approving_an_edit_copies_only_the_proposed_fields() {
        let pool = test_pool().await;
        let tutor = make_user(&pool, "tutor", "Tutors").await;
        let boss = make_user(&pool, "boss", "Supervisors").await;
        let shift_id = make_shift(&pool, tutor, at(2024, 2, 1, 9, 0), ShiftKind::Tutoring).await;

        let proposed = ShiftFields {
            start: Some(at(2024, 2, 1, 13, 0)),
            location: Some("GSMN 64".into()),
            ..Default::default()
        };
        let request_id = submit_change_request(
            &pool,
            &caller(tutor, "tutor", &["Tutors"]),
            Some(shift_id),
            "Class moved",
            proposed,
            false,
        )
        .await
        .unwrap();

        let action = approve(&pool, request_id, boss, None).await.unwrap();
        assert_eq!(action, RequestAction::EditShift);

        let shift = shift_service::get_shift(&pool, shift_id).await.unwrap();
        assert_eq!(shift.start, at(2024, 2, 1, 13, 0));
        assert_eq!(shift.location, "GSMN 64");
        assert_eq!(shift.duration_secs, 3600);
        assert_eq!(shift.associated_person_id, tutor);

        let request = get_request(&pool, request_id).await.unwrap();
        assert_eq!(request.state, RequestState::Approved);
        assert_eq!(request.approved_by_id, Some(boss));
        assert!(request.approved_on.is_some());
    }

    #[tokio::test]
    async fn approving_a_drop_deletes_the_shift_and_clears_the_target() {
        let pool = test_pool().await;
        let tutor = make_user(&pool, "tutor", "Tutors").await;
        let boss = make_user(&pool, "boss", "Office staff").await;
        let shift_id = make_shift(&pool, tutor, at(2024, 2, 1, 9, 0), ShiftKind::Tutoring).await;

        let request_id = submit_change_request(
            &pool,
            &caller(tutor, "tutor", &["Tutors"]),
            Some(shift_id),
            "Sick",
            ShiftFields::default(),
            true,
        )
        .await
        .unwrap();

        assert_eq!(
            approve(&pool, request_id, boss, None).await.unwrap(),
            RequestAction::DropShift
        );
        assert!(matches!(
            shift_service::get_shift(&pool, shift_id).await,
            Err(AppError::NotFound(_))
        ));
        let request = get_request(&pool, request_id).await.unwrap();
        assert_eq!(request.target_shift_id, None);
        assert_eq!(request.action(), RequestAction::DropShift);
    }

    #[tokio::test]
    async fn an_edit_whose_shift_was_dropped_is_not_turned_into_a_new_shift() {
        let pool = test_pool().await;
        let tutor = make_user(&pool, "tutor", "Tutors").await;
        let boss = make_user(&pool, "boss", "Office staff").await;
        let shift_id = make_shift(&pool, tutor, at(2024, 2, 1, 9, 0), ShiftKind::Tutoring).await;
        let me = caller(tutor, "tutor", &["Tutors"]);

        let every_field = ShiftFields {
            associated_person_id: Some(tutor),
            start: Some(at(2024, 2, 1, 11, 0)),
            duration_secs: Some(3600),
            location: Some("ILC".into()),
            kind: Some(ShiftKind::Tutoring),
        };
        let edit_id = submit_change_request(&pool, &me, Some(shift_id), "Later", every_field, false)
            .await
            .unwrap();
        let drop_id = submit_change_request(&pool, &me, Some(shift_id), "Sick", ShiftFields::default(), true)
            .await
            .unwrap();
        approve(&pool, drop_id, boss, None).await.unwrap();

        let edit = get_request(&pool, edit_id).await.unwrap();
        assert_eq!(edit.target_shift_id, None);
        assert_eq!(edit.action(), RequestAction::EditShift);

        assert!(matches!(
            approve(&pool, edit_id, boss, None).await,
            Err(AppError::NotFound("Shift"))
        ));
        let shifts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM shifts")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(shifts, 0);
        assert_eq!(get_request(&pool, edit_id).await.unwrap().state, RequestState::New);
    }

    #[tokio::test]
    async fn denying_never_touches_the_shift() {
        let pool = test_pool().await;
        let tutor = make_user(&pool, "tutor", "Tutors").await;
        let boss = make_user(&pool, "boss", "Supervisors").await;
        let shift_id = make_shift(&pool, tutor, at(2024, 2, 1, 9, 0), ShiftKind::Tutoring).await;
        let before = shift_service::get_shift(&pool, shift_id).await.unwrap();

        let request_id = submit_change_request(
            &pool,
            &caller(tutor, "tutor", &["Tutors"]),
            Some(shift_id),
            "Swap rooms",
            ShiftFields {
                location: Some("ILC".into()),
                ..Default::default()
            },
            false,
        )
        .await
        .unwrap();
        deny(&pool, request_id, boss).await.unwrap();

        assert_eq!(shift_service::get_shift(&pool, shift_id).await.unwrap(), before);
        let request = get_request(&pool, request_id).await.unwrap();
        assert_eq!(request.state, RequestState::NotApproved);
        assert_eq!(request.approved_by_id, Some(boss));

        // Terminal states stay terminal
        assert!(matches!(
            approve(&pool, request_id, boss, None).await,
            Err(AppError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn new_shift_requests_need_every_field() {
        let pool = test_pool().await;
        let si = make_user(&pool, "leader", "SIs").await;
        let boss = make_user(&pool, "boss", "Supervisors").await;
        let me = caller(si, "leader", &["SIs"]);

        let incomplete = ShiftFields {
            start: Some(at(2024, 2, 5, 10, 0)),
            ..Default::default()
        };
        let err = submit_change_request(&pool, &me, None, "", incomplete, false)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(ref e) if e.has("new_location")));

        let complete = ShiftFields {
            start: Some(at(2024, 2, 5, 10, 0)),
            duration_secs: Some(5400),
            location: Some("LGRT 121".into()),
            kind: Some(ShiftKind::Si),
            ..Default::default()
        };
        let request_id = submit_change_request(&pool, &me, None, "Exam review", complete, false)
            .await
            .unwrap();
        let request = get_request(&pool, request_id).await.unwrap();
        assert_eq!(request.new_associated_person_id, Some(si));
        assert_eq!(request.kind, ShiftKind::Si);

        mark_pending(&pool, request_id).await.unwrap();
        assert_eq!(approve(&pool, request_id, boss, None).await.unwrap(), RequestAction::CreateShift);

        let created = get_request(&pool, request_id).await.unwrap().target_shift_id.unwrap();
        let shift = shift_service::get_shift(&pool, created).await.unwrap();
        assert_eq!(shift.associated_person_id, si);
        assert_eq!(shift.duration_secs, 5400);
    }

    #[tokio::test]
    async fn only_the_owner_can_file_requests_and_tutoring_skips_pending() {
        let pool = test_pool().await;
        let owner = make_user(&pool, "owner", "Tutors").await;
        let other = make_user(&pool, "other", "Tutors").await;
        let shift_id = make_shift(&pool, owner, at(2024, 2, 1, 9, 0), ShiftKind::Tutoring).await;

        let err = submit_change_request(
            &pool,
            &caller(other, "other", &["Tutors"]),
            Some(shift_id),
            "Mine now",
            ShiftFields::default(),
            true,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::PermissionDenied));

        let request_id = submit_change_request(
            &pool,
            &caller(owner, "owner", &["Tutors"]),
            Some(shift_id),
            "Conflict",
            ShiftFields::default(),
            true,
        )
        .await
        .unwrap();
        assert!(matches!(
            mark_pending(&pool, request_id).await,
            Err(AppError::InvalidTransition { .. })
        ));

        assert_eq!(
            alert_counts(&pool).await.unwrap(),
            AlertCounts { si: 0, tutoring: 1 }
        );
        assert_eq!(pending_for_owner(&pool, owner).await.unwrap().len(), 1);
        assert!(pending_for_owner(&pool, other).await.unwrap().is_empty());
        assert!(list_requests(&pool, ShiftKind::Si, RequestState::New)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn requests_are_visible_to_privileged_users_and_the_people_concerned() {
        let pool = test_pool().await;
        let owner = make_user(&pool, "owner", "Tutors").await;
        let stranger = make_user(&pool, "stranger", "Tutors").await;
        let shift_id = make_shift(&pool, owner, at(2024, 2, 1, 9, 0), ShiftKind::Tutoring).await;
        let owner_caller = caller(owner, "owner", &["Tutors"]);
        let request_id = submit_change_request(
            &pool,
            &owner_caller,
            Some(shift_id),
            "",
            ShiftFields::default(),
            true,
        )
        .await
        .unwrap();
        let request = get_request(&pool, request_id).await.unwrap();

        assert!(ensure_can_view(&pool, &owner_caller, &request).await.is_ok());
        assert!(ensure_can_view(&pool, &caller(stranger, "boss", &["Office staff"]), &request)
            .await
            .is_ok());
        assert!(matches!(
            ensure_can_view(&pool, &caller(stranger, "stranger", &["Tutors"]), &request).await,
            Err(AppError::PermissionDenied)
        ));
        assert_eq!(list_requests_for_user(&pool, owner).await.unwrap().len(), 1);
        assert!(list_requests_for_user(&pool, stranger).await.unwrap().is_empty());
    }
}
