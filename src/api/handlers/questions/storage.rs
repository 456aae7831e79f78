use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::types::Question;
use crate::api::handlers::{
    applications::storage::decode_department, auth::storage::db_span, department::Department,
};

const QUESTION_COLUMNS: &str = r#"
    id,
    department,
    title,
    body,
    to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
"#;

fn question_from_row(row: &PgRow) -> Result<Question, sqlx::Error> {
    Ok(Question {
        id: row.try_get("id")?,
        department: decode_department(row.try_get("department")?)?,
        title: row.try_get("title")?,
        body: row.try_get("body")?,
        created_at: row.try_get("created_at")?,
    })
}

pub(super) async fn list_by_department(
    pool: &PgPool,
    department: Department,
) -> Result<Vec<Question>, sqlx::Error> {
    let query = format!(
        r"
        SELECT {QUESTION_COLUMNS}
        FROM questions
        WHERE department = $1
        ORDER BY created_at ASC
        "
    );
    let rows = sqlx::query(&query)
        .bind(department.as_str())
        .fetch_all(pool)
        .instrument(db_span("SELECT", &query))
        .await?;
    rows.iter().map(question_from_row).collect()
}

pub(super) async fn list_all(pool: &PgPool) -> Result<Vec<Question>, sqlx::Error> {
    let query = format!(
        r"
        SELECT {QUESTION_COLUMNS}
        FROM questions
        ORDER BY department ASC, created_at ASC
        "
    );
    let rows = sqlx::query(&query)
        .fetch_all(pool)
        .instrument(db_span("SELECT", &query))
        .await?;
    rows.iter().map(question_from_row).collect()
}

pub(super) async fn fetch_question(
    pool: &PgPool,
    question_id: Uuid,
) -> Result<Option<Question>, sqlx::Error> {
    let query = format!("SELECT {QUESTION_COLUMNS} FROM questions WHERE id = $1");
    let row = sqlx::query(&query)
        .bind(question_id)
        .fetch_optional(pool)
        .instrument(db_span("SELECT", &query))
        .await?;
    row.as_ref().map(question_from_row).transpose()
}

pub(super) async fn insert_question(
    pool: &PgPool,
    department: Department,
    title: &str,
    body: &str,
) -> Result<Question, sqlx::Error> {
    let query = format!(
        r"
        INSERT INTO questions (department, title, body)
        VALUES ($1, $2, $3)
        RETURNING {QUESTION_COLUMNS}
        "
    );
    let row = sqlx::query(&query)
        .bind(department.as_str())
        .bind(title)
        .bind(body)
        .fetch_one(pool)
        .instrument(db_span("INSERT", &query))
        .await?;
    question_from_row(&row)
}

/// Returns `false` when no question has this id. Answers cascade.
pub(super) async fn delete_question(
    pool: &PgPool,
    question_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let query = "DELETE FROM questions WHERE id = $1";
    let result = sqlx::query(query)
        .bind(question_id)
        .execute(pool)
        .instrument(db_span("DELETE", query))
        .await?;
    Ok(result.rows_affected() > 0)
}
