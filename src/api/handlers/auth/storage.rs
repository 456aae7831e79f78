//! Database helpers for user rows, OTP state and withdrawal.
//!
//! Every OTP consumption is a single conditional `UPDATE` matching the user, the
//! stored digest, its purpose and an unexpired deadline, and clearing the code
//! in the same statement. Two concurrent requests with the same code cannot both
//! succeed. Guesses are counted before the comparison runs.

use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::otp::OtpPurpose;
use super::policy::Role;
use super::types::UserResponse;
use crate::api::handlers::department::Department;

/// Columns selected wherever a `UserResponse` is built.
pub(crate) const USER_COLUMNS: &str = r#"
    id,
    full_name,
    email,
    reg_num,
    role,
    department,
    verified,
    withdrawn,
    to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at,
    to_char(updated_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS updated_at
"#;

pub(crate) fn db_span(operation: &'static str, statement: &str) -> tracing::Span {
    tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

/// Map a row selected with `USER_COLUMNS`.
///
/// # Errors
/// `sqlx::Error::Decode` when the stored role or department is outside the known set.
pub(crate) fn user_from_row(row: &PgRow) -> Result<UserResponse, sqlx::Error> {
    let role = row
        .try_get::<String, _>("role")?
        .parse::<Role>()
        .map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
    let department = row
        .try_get::<Option<String>, _>("department")?
        .map(|value| value.parse::<Department>())
        .transpose()
        .map_err(|err| sqlx::Error::Decode(Box::new(err)))?;

    Ok(UserResponse {
        id: row.try_get("id")?,
        full_name: row.try_get("full_name")?,
        email: row.try_get("email")?,
        reg_num: row.try_get("reg_num")?,
        role,
        department,
        verified: row.try_get("verified")?,
        withdrawn: row.try_get("withdrawn")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Everything login needs, including the password hash.
pub(super) struct Credentials {
    pub(super) user: UserResponse,
    pub(super) hashed_password: String,
}

/// Pending OTP for a user, with expiry evaluated by the database clock.
#[derive(Debug)]
pub(super) struct OtpState {
    pub(super) user_id: Uuid,
    pub(super) verified: bool,
    pub(super) purpose: Option<OtpPurpose>,
    pub(super) expired: bool,
    pub(super) attempts: i32,
}

pub(crate) struct NewUser<'a> {
    pub(crate) full_name: &'a str,
    pub(crate) email: &'a str,
    pub(crate) reg_num: &'a str,
    pub(crate) role: Role,
    pub(crate) hashed_password: &'a str,
    pub(crate) verified: bool,
    /// Digest of the verification code stored with the row, valid for `otp_ttl_seconds`.
    pub(crate) otp_hash: Option<&'a [u8]>,
    pub(crate) otp_ttl_seconds: i64,
}

pub(crate) async fn fetch_user_by_id(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Option<UserResponse>, sqlx::Error> {
    let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
    let row = sqlx::query(&query)
        .bind(user_id)
        .fetch_optional(pool)
        .instrument(db_span("SELECT", &query))
        .await?;
    row.as_ref().map(user_from_row).transpose()
}

pub(crate) async fn fetch_user_by_email(
    pool: &PgPool,
    email: &str,
) -> Result<Option<UserResponse>, sqlx::Error> {
    let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
    let row = sqlx::query(&query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(db_span("SELECT", &query))
        .await?;
    row.as_ref().map(user_from_row).transpose()
}

pub(super) async fn fetch_credentials(
    pool: &PgPool,
    email: &str,
) -> Result<Option<Credentials>, sqlx::Error> {
    let query = format!("SELECT {USER_COLUMNS}, hashed_password FROM users WHERE email = $1");
    let row = sqlx::query(&query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(db_span("SELECT", &query))
        .await?;
    row.map(|row| {
        Ok(Credentials {
            user: user_from_row(&row)?,
            hashed_password: row.try_get("hashed_password")?,
        })
    })
    .transpose()
}

/// Insert a user. Unique violations are left to the caller to translate.
pub(crate) async fn insert_user(
    pool: &PgPool,
    user: &NewUser<'_>,
) -> Result<UserResponse, sqlx::Error> {
    let query = format!(
        r"
        INSERT INTO users
            (full_name, email, reg_num, role, hashed_password, verified,
             otp_hash, otp_purpose, otp_expires_at)
        VALUES (
            $1, $2, $3, $4, $5, $6, $7,
            CASE WHEN $7::bytea IS NULL THEN NULL ELSE 'verification' END,
            CASE WHEN $7::bytea IS NULL THEN NULL ELSE NOW() + ($8 * INTERVAL '1 second') END
        )
        RETURNING {USER_COLUMNS}
        "
    );
    let row = sqlx::query(&query)
        .bind(user.full_name)
        .bind(user.email)
        .bind(user.reg_num)
        .bind(user.role.as_str())
        .bind(user.hashed_password)
        .bind(user.verified)
        .bind(user.otp_hash)
        .bind(user.otp_ttl_seconds)
        .fetch_one(pool)
        .instrument(db_span("INSERT", &query))
        .await?;
    user_from_row(&row)
}

pub(super) async fn fetch_otp_state(
    pool: &PgPool,
    email: &str,
) -> Result<Option<OtpState>, sqlx::Error> {
    let query = r"
        SELECT
            id,
            verified,
            otp_purpose,
            otp_attempts,
            COALESCE(otp_expires_at <= NOW(), TRUE) AS expired
        FROM users
        WHERE email = $1
    ";
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(db_span("SELECT", query))
        .await?;
    row.map(|row| {
        let purpose = row
            .try_get::<Option<String>, _>("otp_purpose")?
            .map(|value| value.parse::<OtpPurpose>())
            .transpose()
            .map_err(|err| sqlx::Error::Decode(err.into()))?;
        Ok(OtpState {
            user_id: row.try_get("id")?,
            verified: row.try_get("verified")?,
            purpose,
            expired: row.try_get("expired")?,
            attempts: row.try_get("otp_attempts")?,
        })
    })
    .transpose()
}

/// Replace the user's OTP with the digest of a fresh code, valid for `ttl_seconds`.
pub(super) async fn store_otp(
    pool: &PgPool,
    user_id: Uuid,
    purpose: OtpPurpose,
    otp_hash: &[u8],
    ttl_seconds: i64,
) -> Result<(), sqlx::Error> {
    let query = r"
        UPDATE users
        SET otp_hash = $2,
            otp_purpose = $3,
            otp_expires_at = NOW() + ($4 * INTERVAL '1 second'),
            otp_attempts = 0,
            updated_at = NOW()
        WHERE id = $1
    ";
    sqlx::query(query)
        .bind(user_id)
        .bind(otp_hash)
        .bind(purpose.as_str())
        .bind(ttl_seconds)
        .execute(pool)
        .instrument(db_span("UPDATE", query))
        .await?;
    Ok(())
}

/// Count one guess against the pending code.
///
/// Returns the guess number, or `None` when no code for `purpose` is pending or
/// all `max_attempts` guesses were already used.
pub(super) async fn reserve_otp_attempt(
    pool: &PgPool,
    user_id: Uuid,
    purpose: OtpPurpose,
    max_attempts: i32,
) -> Result<Option<i32>, sqlx::Error> {
    let query = r"
        UPDATE users
        SET otp_attempts = otp_attempts + 1
        WHERE id = $1
          AND otp_purpose = $2
          AND otp_hash IS NOT NULL
          AND otp_attempts < $3
        RETURNING otp_attempts
    ";
    let row = sqlx::query(query)
        .bind(user_id)
        .bind(purpose.as_str())
        .bind(max_attempts)
        .fetch_optional(pool)
        .instrument(db_span("UPDATE", query))
        .await?;
    row.map(|row| row.try_get("otp_attempts")).transpose()
}

/// Drop the pending code, whatever its purpose.
pub(super) async fn clear_otp(pool: &PgPool, user_id: Uuid) -> Result<(), sqlx::Error> {
    let query = r"
        UPDATE users
        SET otp_hash = NULL,
            otp_purpose = NULL,
            otp_expires_at = NULL,
            updated_at = NOW()
        WHERE id = $1
    ";
    sqlx::query(query)
        .bind(user_id)
        .execute(pool)
        .instrument(db_span("UPDATE", query))
        .await?;
    Ok(())
}

/// Mark the user verified if `otp_hash` is still the stored, unexpired verification code.
pub(super) async fn consume_verification_otp(
    pool: &PgPool,
    user_id: Uuid,
    otp_hash: &[u8],
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
          AND otp_hash = $2
          AND otp_purpose = 'verification'
          AND otp_expires_at > NOW()
        RETURNING {USER_COLUMNS}
        "
    );
    let row = sqlx::query(&query)
        .bind(user_id)
        .bind(otp_hash)
        .fetch_optional(pool)
        .instrument(db_span("UPDATE", &query))
        .await?;
    row.as_ref().map(user_from_row).transpose()
}

/// Replace the password if `otp_hash` is still the stored, unexpired reset code.
pub(super) async fn consume_reset_otp(
    pool: &PgPool,
    user_id: Uuid,
    otp_hash: &[u8],
    hashed_password: &str,
) -> Result<bool, sqlx::Error> {
    let query = r"
        UPDATE users
        SET hashed_password = $3,
            otp_hash = NULL,
            otp_purpose = NULL,
            otp_expires_at = NULL,
            updated_at = NOW()
        WHERE id = $1
          AND otp_hash = $2
          AND otp_purpose = 'reset'
          AND otp_expires_at > NOW()
    ";
    let result = sqlx::query(query)
        .bind(user_id)
        .bind(otp_hash)
        .bind(hashed_password)
        .execute(pool)
        .instrument(db_span("UPDATE", query))
        .await?;
    Ok(result.rows_affected() == 1)
}

/// Flag the user as withdrawn and withdraw every application they own.
///
/// Returns `None` when the user does not exist, otherwise the number of
/// applications newly withdrawn. Re-running is harmless.
pub(super) async fn withdraw_user(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Option<u64>, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let query = r"
        UPDATE users
        SET withdrawn = TRUE, updated_at = NOW()
        WHERE id = $1
        RETURNING id
    ";
    let row = sqlx::query(query)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .instrument(db_span("UPDATE", query))
        .await?;
    if row.is_none() {
        tx.rollback().await?;
        return Ok(None);
    }

    let query = r"
        UPDATE applications
        SET chickened_out = TRUE, updated_at = NOW()
        WHERE user_id = $1 AND chickened_out = FALSE
    ";
    let result = sqlx::query(query)
        .bind(user_id)
        .execute(&mut *tx)
        .instrument(db_span("UPDATE", query))
        .await?;

    tx.commit().await?;
    Ok(Some(result.rows_affected()))
}

/// Insert a verified super admin unless the email is already taken.
///
/// Returns `true` when a row was created.
pub(super) async fn insert_super_admin(
    pool: &PgPool,
    full_name: &str,
    email: &str,
    hashed_password: &str,
) -> Result<bool, sqlx::Error> {
    let query = r"
        INSERT INTO users (full_name, email, reg_num, role, hashed_password, verified)
        VALUES ($1, $2, '', 'super_admin', $3, TRUE)
        ON CONFLICT (email) DO NOTHING
        RETURNING id
    ";
    let row = sqlx::query(query)
        .bind(full_name)
        .bind(email)
        .bind(hashed_password)
        .fetch_optional(pool)
        .instrument(db_span("INSERT", query))
        .await?;
    Ok(row.is_some())
}
