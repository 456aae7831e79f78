//! Review queue queries.
//!
//! The queue is every submitted, non-withdrawn application of one department.
//! Review columns are joined for the calling reviewer only, so each application
//! appears once per page.

use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::types::{Review, ReviewQueueItem, ReviewStats};
use super::Page;
use crate::api::handlers::{
    applications::storage::{application_from_row, decode_department, APPLICATION_COLUMNS},
    auth::storage::db_span,
    department::Department,
    error::ApiError,
};

const REVIEW_COLUMNS: &str = r#"
    id,
    application_id,
    reviewer_id,
    department,
    shortlisted,
    comments,
    to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at,
    to_char(updated_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS updated_at
"#;

/// Selected alongside `APPLICATION_COLUMNS` for queue rows.
const QUEUE_COLUMNS: &str = r#"
    u.full_name AS applicant_name,
    u.email AS applicant_email,
    r.id AS review_id,
    r.shortlisted,
    r.comments AS review_comments,
    to_char(r.updated_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS reviewed_at
"#;

fn review_from_row(row: &PgRow) -> Result<Review, sqlx::Error> {
    Ok(Review {
        id: row.try_get("id")?,
        application_id: row.try_get("application_id")?,
        reviewer_id: row.try_get("reviewer_id")?,
        department: decode_department(row.try_get("department")?)?,
        shortlisted: row.try_get("shortlisted")?,
        comments: row.try_get("comments")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn queue_item_from_row(row: &PgRow) -> Result<ReviewQueueItem, sqlx::Error> {
    Ok(ReviewQueueItem {
        application: application_from_row(row)?,
        applicant_name: row.try_get("applicant_name")?,
        applicant_email: row.try_get("applicant_email")?,
        review_id: row.try_get("review_id")?,
        shortlisted: row.try_get("shortlisted")?,
        review_comments: row.try_get("review_comments")?,
        reviewed_at: row.try_get("reviewed_at")?,
    })
}

/// Department assigned to the reviewer, `None` when unset or the user is gone.
pub(super) async fn reviewer_department(
    pool: &PgPool,
    reviewer_id: Uuid,
) -> Result<Option<Department>, sqlx::Error> {
    let query = "SELECT department FROM users WHERE id = $1";
    let row = sqlx::query(query)
        .bind(reviewer_id)
        .fetch_optional(pool)
        .instrument(db_span("SELECT", query))
        .await?;
    let Some(row) = row else {
        return Ok(None);
    };
    row.try_get::<Option<String>, _>("department")?
        .as_deref()
        .map(decode_department)
        .transpose()
}

pub(super) async fn review_queue(
    pool: &PgPool,
    department: Department,
    reviewer_id: Uuid,
    page: Page,
) -> Result<(Vec<ReviewQueueItem>, i64), sqlx::Error> {
    let query = format!(
        r"
        SELECT {APPLICATION_COLUMNS}, {QUEUE_COLUMNS}
        FROM applications a
        JOIN users u ON u.id = a.user_id
        LEFT JOIN reviews r ON r.application_id = a.id AND r.reviewer_id = $2
        WHERE a.department = $1
          AND a.submitted = TRUE
          AND a.chickened_out = FALSE
        ORDER BY a.created_at DESC
        LIMIT $3 OFFSET $4
        "
    );
    let rows = sqlx::query(&query)
        .bind(department.as_str())
        .bind(reviewer_id)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(pool)
        .instrument(db_span("SELECT", &query))
        .await?;
    let items = rows
        .iter()
        .map(queue_item_from_row)
        .collect::<Result<Vec<_>, _>>()?;

    let count_query = r"
        SELECT COUNT(*) AS total
        FROM applications
        WHERE department = $1 AND submitted = TRUE AND chickened_out = FALSE
    ";
    let total: i64 = sqlx::query(count_query)
        .bind(department.as_str())
        .fetch_one(pool)
        .instrument(db_span("SELECT", count_query))
        .await?
        .try_get("total")?;

    Ok((items, total))
}

/// A submitted application with the caller's review, if any.
pub(super) async fn review_item(
    pool: &PgPool,
    application_id: Uuid,
    reviewer_id: Uuid,
) -> Result<Option<ReviewQueueItem>, sqlx::Error> {
    let query = format!(
        r"
        SELECT {APPLICATION_COLUMNS}, {QUEUE_COLUMNS}
        FROM applications a
        JOIN users u ON u.id = a.user_id
        LEFT JOIN reviews r ON r.application_id = a.id AND r.reviewer_id = $2
        WHERE a.id = $1 AND a.submitted = TRUE
        "
    );
    let row = sqlx::query(&query)
        .bind(application_id)
        .bind(reviewer_id)
        .fetch_optional(pool)
        .instrument(db_span("SELECT", &query))
        .await?;
    row.as_ref().map(queue_item_from_row).transpose()
}

/// Insert or update the reviewer's review of a reviewable application.
///
/// The target row is share-locked so a concurrent withdrawal cannot slip in
/// between the checks and the write.
pub(super) async fn upsert_review(
    pool: &PgPool,
    reviewer_id: Uuid,
    reviewer_department: Department,
    application_id: Uuid,
    shortlisted: bool,
    comments: Option<&str>,
) -> Result<Review, ApiError> {
    let mut tx = pool.begin().await?;

    let query = r"
        SELECT department, submitted, chickened_out
        FROM applications
        WHERE id = $1
        FOR SHARE
    ";
    let row = sqlx::query(query)
        .bind(application_id)
        .fetch_optional(&mut *tx)
        .instrument(db_span("SELECT", query))
        .await?
        .ok_or(ApiError::NotFound("Application not found"))?;
    let department = decode_department(row.try_get("department")?)?;
    super::check_reviewable(
        reviewer_department,
        department,
        row.try_get("submitted")?,
        row.try_get("chickened_out")?,
    )?;

    let query = format!(
        r"
        INSERT INTO reviews (application_id, reviewer_id, department, shortlisted, comments)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (application_id, reviewer_id)
        DO UPDATE SET
            shortlisted = EXCLUDED.shortlisted,
            comments = EXCLUDED.comments,
            updated_at = NOW()
        RETURNING {REVIEW_COLUMNS}
        "
    );
    let row = sqlx::query(&query)
        .bind(application_id)
        .bind(reviewer_id)
        .bind(department.as_str())
        .bind(shortlisted)
        .bind(comments)
        .fetch_one(&mut *tx)
        .instrument(db_span("INSERT", &query))
        .await?;
    let review = review_from_row(&row)?;

    tx.commit().await?;
    Ok(review)
}

/// Queue counts for the department, from the calling reviewer's point of view.
pub(super) async fn review_stats(
    pool: &PgPool,
    department: Department,
    reviewer_id: Uuid,
) -> Result<ReviewStats, sqlx::Error> {
    let query = r"
        SELECT
            COUNT(*) AS total_applications,
            COUNT(r.id) AS reviewed_count,
            COUNT(CASE WHEN r.shortlisted = TRUE THEN 1 END) AS shortlisted_count,
            COUNT(CASE WHEN r.shortlisted = FALSE THEN 1 END) AS rejected_count,
            COUNT(*) - COUNT(r.id) AS pending_count
        FROM applications a
        LEFT JOIN reviews r ON r.application_id = a.id AND r.reviewer_id = $2
        WHERE a.department = $1
          AND a.submitted = TRUE
          AND a.chickened_out = FALSE
    ";
    let row = sqlx::query(query)
        .bind(department.as_str())
        .bind(reviewer_id)
        .fetch_one(pool)
        .instrument(db_span("SELECT", query))
        .await?;

    Ok(ReviewStats {
        department,
        total_applications: row.try_get("total_applications")?,
        reviewed_count: row.try_get("reviewed_count")?,
        shortlisted_count: row.try_get("shortlisted_count")?,
        rejected_count: row.try_get("rejected_count")?,
        pending_count: row.try_get("pending_count")?,
    })
}
