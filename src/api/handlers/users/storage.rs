use sqlx::PgPool;
use tracing::Instrument;
use uuid::Uuid;

use crate::api::handlers::{
    auth::{
        storage::{db_span, user_from_row, USER_COLUMNS},
        types::UserResponse,
        Role,
    },
    department::Department,
};

pub(super) async fn list_users(pool: &PgPool) -> Result<Vec<UserResponse>, sqlx::Error> {
    let query = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC");
    let rows = sqlx::query(&query)
        .fetch_all(pool)
        .instrument(db_span("SELECT", &query))
        .await?;
    rows.iter().map(user_from_row).collect()
}

/// Returns `false` when no user has this id. Owned rows cascade.
/// Delete the user only while they still hold `role`, the role the caller was
/// authorized against.
pub(super) async fn delete_user(
    pool: &PgPool,
    user_id: Uuid,
    role: Role,
) -> Result<bool, sqlx::Error> {
    let query = "DELETE FROM users WHERE id = $1 AND role = $2";
    let result = sqlx::query(query)
        .bind(user_id)
        .bind(role.as_str())
        .execute(pool)
        .instrument(db_span("DELETE", query))
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Set role and department together; a `None` department clears it.
pub(crate) async fn update_role(
    pool: &PgPool,
    user_id: Uuid,
    role: Role,
    department: Option<Department>,
) -> Result<Option<UserResponse>, sqlx::Error> {
    let query = format!(
        r"
        UPDATE users
        SET role = $2, department = $3, updated_at = NOW()
        WHERE id = $1
        RETURNING {USER_COLUMNS}
        "
    );
    let row = sqlx::query(&query)
        .bind(user_id)
        .bind(role.as_str())
        .bind(department.map(Department::as_str))
        .fetch_optional(pool)
        .instrument(db_span("UPDATE", &query))
        .await?;
    row.as_ref().map(user_from_row).transpose()
}

/// Mark a user verified and drop any pending code.
pub(crate) async fn mark_verified(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Option<UserResponse>, sqlx::Error> {
    let query = format!(
        r"
        UPDATE users
        SET verified = TRUE,
            otp_hash = NULL,
            otp_purpose = NULL,
            otp_expires_at = NULL,
            updated_at = NOW()
        WHERE id = $1
        RETURNING {USER_COLUMNS}
        "
    );
    let row = sqlx::query(&query)
        .bind(user_id)
        .fetch_optional(pool)
        .instrument(db_span("UPDATE", &query))
        .await?;
    row.as_ref().map(user_from_row).transpose()
}
