// src/services/user_service.rs
use crate::{
    error::{AppError, AppResult},
    forms::FormErrors,
    models::{
        course::Course,
        user::{NewUser, ProfileData, User},
    },
    services::auth_service,
};
use sqlx::{Sqlite, SqlitePool, Transaction};

const USER_COLUMNS: &str =
    "id, username, password_hash, first_name, last_name, email, is_superuser, si_course_id";

pub async fn find_user_by_id(db_pool: &SqlitePool, user_id: i64) -> AppResult<Option<User>> {
    tracing::debug!("Looking up user by id: {}", user_id);
    let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))
        .bind(user_id)
        .fetch_optional(db_pool)
        .await?;
    Ok(user)
}

pub async fn find_user_by_username(db_pool: &SqlitePool, username: &str) -> AppResult<Option<User>> {
    tracing::debug!("Looking up user by username: {}", username);
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE username = ?1"
    ))
    .bind(username)
    .fetch_optional(db_pool)
    .await?;
    Ok(user)
}

/// Same as `find_user_by_id` but a missing row is a 404.
pub async fn get_user(db_pool: &SqlitePool, user_id: i64) -> AppResult<User> {
    find_user_by_id(db_pool, user_id)
        .await?
        .ok_or(AppError::NotFound("User"))
}

/// Names of the groups a user belongs to.
pub async fn get_user_groups(db_pool: &SqlitePool, user_id: i64) -> AppResult<Vec<String>> {
    let groups = sqlx::query_scalar::<_, String>(
        r#"
        SELECT g.name FROM groups g
        JOIN user_groups ug ON ug.group_id = g.id
        WHERE ug.user_id = ?1
        ORDER BY g.name ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(db_pool)
    .await?;
    tracing::debug!("Groups for user {}: {:?}", user_id, groups);
    Ok(groups)
}

/// Every user, for the person pickers in shift and loan forms.
pub async fn find_all_users(db_pool: &SqlitePool) -> AppResult<Vec<User>> {
    let users = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY last_name ASC, first_name ASC, username ASC"
    ))
    .fetch_all(db_pool)
    .await?;
    Ok(users)
}

/// Members of a group ordered by last name. An unknown or empty group gives an empty list.
pub async fn list_users_in_group(db_pool: &SqlitePool, group: &str) -> AppResult<Vec<User>> {
    let users = sqlx::query_as::<_, User>(
        r#"
        SELECT u.id, u.username, u.password_hash, u.first_name, u.last_name, u.email,
               u.is_superuser, u.si_course_id
        FROM users u
        JOIN user_groups ug ON ug.user_id = u.id
        JOIN groups g ON g.id = ug.group_id
        WHERE g.name = ?1 COLLATE NOCASE
        ORDER BY u.last_name ASC, u.first_name ASC
        "#,
    )
    .bind(group)
    .fetch_all(db_pool)
    .await?;
    tracing::debug!("Found {} users in group '{}'", users.len(), group);
    Ok(users)
}

pub async fn courses_tutored(db_pool: &SqlitePool, user_id: i64) -> AppResult<Vec<Course>> {
    let courses = sqlx::query_as::<_, Course>(
        r#"
        SELECT c.id, c.department, c.number, c.name FROM courses c
        JOIN user_courses_tutored uct ON uct.course_id = c.id
        WHERE uct.user_id = ?1
        ORDER BY c.department ASC, c.number ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(db_pool)
    .await?;
    Ok(courses)
}

// Inserts the user row plus its group and course links inside an open transaction
async fn insert_user(
    tx: &mut Transaction<'_, Sqlite>,
    user: &NewUser,
    password_hash: &str,
) -> AppResult<i64> {
    let inserted = sqlx::query(
        r#"
        INSERT INTO users (username, password_hash, first_name, last_name, email, is_superuser, si_course_id)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&user.username)
    .bind(password_hash)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.email)
    .bind(user.is_superuser)
    .bind(user.si_course_id)
    .execute(&mut **tx)
    .await;

    let user_id = match inserted {
        Ok(result) => result.last_insert_rowid(),
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            tracing::warn!("Username '{}' already exists.", user.username);
            return Err(AppError::Validation(FormErrors::single(
                "username",
                format!("A user with username '{}' already exists.", user.username),
            )));
        }
        Err(e) => return Err(e.into()),
    };

    for group in &user.groups {
        let group_id: Option<i64> =
            sqlx::query_scalar("SELECT id FROM groups WHERE name = ?1 COLLATE NOCASE")
                .bind(group)
                .fetch_optional(&mut **tx)
                .await?;
        let Some(group_id) = group_id else {
            return Err(AppError::Validation(FormErrors::single(
                "groups",
                format!("'{}' is not a valid group", group),
            )));
        };
        sqlx::query("INSERT OR IGNORE INTO user_groups (user_id, group_id) VALUES (?1, ?2)")
            .bind(user_id)
            .bind(group_id)
            .execute(&mut **tx)
            .await?;
    }

    for course_id in &user.courses_tutored {
        sqlx::query("INSERT OR IGNORE INTO user_courses_tutored (user_id, course_id) VALUES (?1, ?2)")
            .bind(user_id)
            .bind(course_id)
            .execute(&mut **tx)
            .await?;
    }

    Ok(user_id)
}

/// Creates one account with its groups and tutored courses. Returns the new id.
pub async fn create_user(db_pool: &SqlitePool, user: &NewUser) -> AppResult<i64> {
    tracing::info!("Creating user: {}", user.username);
    let password_hash = auth_service::hash_password(&user.password).await?;

    let mut tx = db_pool.begin().await?;
    let user_id = insert_user(&mut tx, user, &password_hash).await?;
    tx.commit().await?;

    tracing::info!("✅ User '{}' created with id {}.", user.username, user_id);
    Ok(user_id)
}

/// Creates every user or none of them.
pub async fn create_users_in_bulk(db_pool: &SqlitePool, users: &[NewUser]) -> AppResult<Vec<i64>> {
    tracing::info!("Creating {} users in bulk", users.len());

    // Hash first so the transaction stays short
    let mut hashes = Vec::with_capacity(users.len());
    for user in users {
        hashes.push(auth_service::hash_password(&user.password).await?);
    }

    let mut tx = db_pool.begin().await?;
    let mut ids = Vec::with_capacity(users.len());
    for (user, hash) in users.iter().zip(&hashes) {
        // Dropping `tx` on error rolls everything back
        ids.push(insert_user(&mut tx, user, hash).await?);
    }
    tx.commit().await?;

    tracing::info!("✅ {} users created in bulk.", ids.len());
    Ok(ids)
}

pub async fn update_profile(db_pool: &SqlitePool, user_id: i64, profile: &ProfileData) -> AppResult<()> {
    tracing::info!("Updating profile for user {}", user_id);
    let rows_affected = sqlx::query(
        "UPDATE users SET first_name = ?1, last_name = ?2, email = ?3 WHERE id = ?4",
    )
    .bind(&profile.first_name)
    .bind(&profile.last_name)
    .bind(&profile.email)
    .bind(user_id)
    .execute(db_pool)
    .await?
    .rows_affected();

    if rows_affected == 0 {
        tracing::warn!("Profile update failed: user {} not found.", user_id);
        return Err(AppError::NotFound("User"));
    }
    Ok(())
}

pub async fn update_user_password(
    db_pool: &SqlitePool,
    user_id: i64,
    new_raw_password: &str,
) -> AppResult<()> {
    tracing::info!("Changing password for user {}", user_id);
    let new_password_hash = auth_service::hash_password(new_raw_password).await?;

    let rows_affected = sqlx::query("UPDATE users SET password_hash = ?1 WHERE id = ?2")
        .bind(new_password_hash)
        .bind(user_id)
        .execute(db_pool)
        .await?
        .rows_affected();

    if rows_affected == 0 {
        tracing::warn!("Password change failed: user {} not found.", user_id);
        Err(AppError::NotFound("User"))
    } else {
        tracing::info!("✅ Password changed for user {}", user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    fn new_user(username: &str, group: &str) -> NewUser {
        NewUser {
            username: username.into(),
            first_name: username.to_uppercase(),
            last_name: format!("{}son", username),
            password: "pw".into(),
            groups: vec![group.into()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn duplicate_usernames_are_a_validation_error() {
        let pool = test_pool().await;
        create_user(&pool, &new_user("amy", "Tutors")).await.unwrap();
        let err = create_user(&pool, &new_user("amy", "SIs")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(ref e) if e.has("username")));
    }

    #[tokio::test]
    async fn bulk_creation_is_all_or_nothing() {
        let pool = test_pool().await;
        create_user(&pool, &new_user("taken", "Tutors")).await.unwrap();

        let batch = vec![new_user("fresh", "Tutors"), new_user("taken", "SIs")];
        assert!(create_users_in_bulk(&pool, &batch).await.is_err());
        assert!(find_user_by_username(&pool, "fresh").await.unwrap().is_none());

        let batch = vec![new_user("one", "Tutors"), new_user("two", "SIs")];
        let ids = create_users_in_bulk(&pool, &batch).await.unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(get_user_groups(&pool, ids[1]).await.unwrap(), vec!["SIs".to_string()]);
    }

    #[tokio::test]
    async fn group_listing_is_ordered_by_last_name_and_may_be_empty() {
        let pool = test_pool().await;
        create_user(&pool, &new_user("zed", "Tutors")).await.unwrap();
        create_user(&pool, &new_user("abe", "Tutors")).await.unwrap();
        create_user(&pool, &new_user("sal", "SIs")).await.unwrap();

        let tutors = list_users_in_group(&pool, "Tutors").await.unwrap();
        let names: Vec<_> = tutors.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, vec!["abe", "zed"]);
        assert!(list_users_in_group(&pool, "Supervisors").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn profile_and_password_updates_need_an_existing_user() {
        let pool = test_pool().await;
        let id = create_user(&pool, &new_user("amy", "Tutors")).await.unwrap();
        let profile = ProfileData {
            first_name: "Amy".into(),
            last_name: "Adams".into(),
            email: "amy@umass.edu".into(),
        };
        update_profile(&pool, id, &profile).await.unwrap();
        assert_eq!(get_user(&pool, id).await.unwrap().display_name(), "Amy Adams");

        assert!(matches!(
            update_profile(&pool, id + 1, &profile).await,
            Err(AppError::NotFound(_))
        ));
        update_user_password(&pool, id, "new-password").await.unwrap();
        assert!(auth_service::authenticate(&pool, "amy", "new-password").await.unwrap().is_some());
    }
}
