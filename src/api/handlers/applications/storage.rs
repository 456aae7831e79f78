//! Persistence for applications and answers.
//!
//! Ownership is part of every mutating statement (`WHERE id = $1 AND user_id = $2`),
//! so a foreign id behaves exactly like a missing one. Answer writes lock the
//! parent application row (`FOR UPDATE`) for the length of their transaction, which
//! serializes them against a concurrent submit or withdrawal.

use sqlx::{postgres::PgRow, PgPool, Postgres, Row, Transaction};
use std::collections::HashMap;
use tracing::Instrument;
use uuid::Uuid;

use super::lifecycle::{
    check_answer_department, duplicate_department, ApplicationPolicy, ApplicationState,
};
use super::types::{
    Answer, AnswerInput, AnswerWithQuestion, Application, ApplicationWithApplicant,
};
use crate::api::handlers::{
    auth::storage::db_span,
    department::Department,
    error::{is_unique_violation, ApiError},
};

pub(crate) const APPLICATION_COLUMNS: &str = r#"
    a.id,
    a.user_id,
    a.department,
    a.submitted,
    a.chickened_out,
    to_char(a.created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at,
    to_char(a.updated_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS updated_at
"#;

const ANSWER_COLUMNS: &str = r#"
    ans.id,
    ans.application_id,
    ans.question_id,
    ans.body,
    to_char(ans.created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at,
    to_char(ans.updated_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS updated_at
"#;

pub(crate) fn decode_department(value: &str) -> Result<Department, sqlx::Error> {
    value
        .parse::<Department>()
        .map_err(|err| sqlx::Error::Decode(Box::new(err)))
}

pub(crate) fn application_from_row(row: &PgRow) -> Result<Application, sqlx::Error> {
    Ok(Application {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        department: decode_department(row.try_get("department")?)?,
        submitted: row.try_get("submitted")?,
        chickened_out: row.try_get("chickened_out")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub(crate) fn answer_from_row(row: &PgRow) -> Result<Answer, sqlx::Error> {
    Ok(Answer {
        id: row.try_get("id")?,
        application_id: row.try_get("application_id")?,
        question_id: row.try_get("question_id")?,
        body: row.try_get("body")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Map a row selected with `ANSWER_COLUMNS` plus the question's title, body and department.
pub(crate) fn answer_with_question_from_row(
    row: &PgRow,
) -> Result<AnswerWithQuestion, sqlx::Error> {
    Ok(AnswerWithQuestion {
        answer: answer_from_row(row)?,
        question_title: row.try_get("question_title")?,
        question_body: row.try_get("question_body")?,
        department: decode_department(row.try_get("question_department")?)?,
    })
}

/// Create a draft for the caller under the quota.
///
/// The caller's user row is locked for the transaction so concurrent creates
/// cannot both pass the quota check.
///
/// # Errors
/// `404` when the user no longer exists, `403` when withdrawn or over quota,
/// `409` when the caller already applied to `department`.
pub(super) async fn create_application(
    pool: &PgPool,
    user_id: Uuid,
    department: Department,
    policy: &ApplicationPolicy,
) -> Result<Application, ApiError> {
    let mut tx = pool.begin().await?;

    let query = "SELECT withdrawn FROM users WHERE id = $1 FOR UPDATE";
    let withdrawn: bool = sqlx::query(query)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .instrument(db_span("SELECT", query))
        .await?
        .ok_or(ApiError::NotFound("User not found"))?
        .try_get("withdrawn")?;
    if withdrawn {
        return Err(ApiError::Forbidden("Withdrawn users cannot create applications"));
    }

    let query = "SELECT COUNT(*) AS total FROM applications WHERE user_id = $1";
    let current: i64 = sqlx::query(query)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .instrument(db_span("SELECT", query))
        .await?
        .try_get("total")?;
    policy.check_quota(current)?;

    let query = format!(
        r"
        INSERT INTO applications AS a (user_id, department)
        VALUES ($1, $2)
        RETURNING {APPLICATION_COLUMNS}
        "
    );
    let row = sqlx::query(&query)
        .bind(user_id)
        .bind(department.as_str())
        .fetch_one(&mut *tx)
        .instrument(db_span("INSERT", &query))
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                duplicate_department(department)
            } else {
                ApiError::from(err)
            }
        })?;
    let application = application_from_row(&row)?;

    tx.commit().await?;
    Ok(application)
}

pub(super) async fn list_for_user(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<Application>, sqlx::Error> {
    let query = format!(
        r"
        SELECT {APPLICATION_COLUMNS}
        FROM applications a
        WHERE a.user_id = $1
        ORDER BY a.created_at DESC
        "
    );
    let rows = sqlx::query(&query)
        .bind(user_id)
        .fetch_all(pool)
        .instrument(db_span("SELECT", &query))
        .await?;
    rows.iter().map(application_from_row).collect()
}

pub(super) async fn list_all(pool: &PgPool) -> Result<Vec<ApplicationWithApplicant>, sqlx::Error> {
    let query = format!(
        r"
        SELECT {APPLICATION_COLUMNS}, u.full_name AS applicant_name, u.email AS applicant_email
        FROM applications a
        JOIN users u ON u.id = a.user_id
        ORDER BY a.created_at DESC
        "
    );
    let rows = sqlx::query(&query)
        .fetch_all(pool)
        .instrument(db_span("SELECT", &query))
        .await?;
    rows.iter()
        .map(|row| {
            Ok(ApplicationWithApplicant {
                application: application_from_row(row)?,
                applicant_name: row.try_get("applicant_name")?,
                applicant_email: row.try_get("applicant_email")?,
            })
        })
        .collect()
}

/// Lock the caller's application row and return its department and flags.
async fn lock_owned(
    tx: &mut Transaction<'_, Postgres>,
    application_id: Uuid,
    user_id: Uuid,
) -> Result<Option<(Department, ApplicationState)>, sqlx::Error> {
    let query = r"
        SELECT department, submitted, chickened_out
        FROM applications
        WHERE id = $1 AND user_id = $2
        FOR UPDATE
    ";
    let row = sqlx::query(query)
        .bind(application_id)
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .instrument(db_span("SELECT", query))
        .await?;
    row.map(|row| {
        Ok((
            decode_department(row.try_get("department")?)?,
            ApplicationState {
                submitted: row.try_get("submitted")?,
                chickened_out: row.try_get("chickened_out")?,
            },
        ))
    })
    .transpose()
}

async fn question_departments(
    tx: &mut Transaction<'_, Postgres>,
    question_ids: &[Uuid],
) -> Result<HashMap<Uuid, Department>, sqlx::Error> {
    let query = "SELECT id, department FROM questions WHERE id = ANY($1)";
    let rows = sqlx::query(query)
        .bind(question_ids)
        .fetch_all(&mut **tx)
        .instrument(db_span("SELECT", query))
        .await?;
    rows.iter()
        .map(|row| Ok((row.try_get("id")?, decode_department(row.try_get("department")?)?)))
        .collect()
}

/// Upsert a batch of answers on the caller's draft, all or nothing.
///
/// # Errors
/// `404` for a missing or foreign application, `403` once withdrawn, `409` once
/// submitted, `400` for a question outside the application's department. Nothing
/// is written when any answer is rejected.
pub(crate) async fn save_answers(
    pool: &PgPool,
    application_id: Uuid,
    user_id: Uuid,
    answers: &[AnswerInput],
) -> Result<Vec<Answer>, ApiError> {
    let mut tx = pool.begin().await?;

    let (department, state) = lock_owned(&mut tx, application_id, user_id)
        .await?
        .ok_or(ApiError::NotFound("Application not found"))?;
    state.ensure_editable()?;

    let question_ids: Vec<Uuid> = answers.iter().map(|answer| answer.question_id).collect();
    let departments = question_departments(&mut tx, &question_ids).await?;
    for answer in answers {
        check_answer_department(
            answer.question_id,
            department,
            departments.get(&answer.question_id).copied(),
        )?;
    }

    let query = format!(
        r"
        INSERT INTO answers AS ans (application_id, question_id, user_id, body)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (application_id, question_id)
        DO UPDATE SET body = EXCLUDED.body, updated_at = NOW()
        RETURNING {ANSWER_COLUMNS}
        "
    );
    let mut saved = Vec::with_capacity(answers.len());
    for answer in answers {
        let row = sqlx::query(&query)
            .bind(application_id)
            .bind(answer.question_id)
            .bind(user_id)
            .bind(answer.body.trim())
            .fetch_one(&mut *tx)
            .instrument(db_span("INSERT", &query))
            .await?;
        saved.push(answer_from_row(&row)?);
    }

    let query = "UPDATE applications SET updated_at = NOW() WHERE id = $1";
    sqlx::query(query)
        .bind(application_id)
        .execute(&mut *tx)
        .instrument(db_span("UPDATE", query))
        .await?;

    tx.commit().await?;
    Ok(saved)
}

/// Mark the caller's application submitted. Submitting twice is a no-op success.
///
/// # Errors
/// `404` for a missing or foreign application, `403` once withdrawn.
pub(super) async fn submit_application(
    pool: &PgPool,
    application_id: Uuid,
    user_id: Uuid,
) -> Result<Application, ApiError> {
    let query = format!(
        r"
        UPDATE applications AS a
        SET submitted = TRUE,
            updated_at = CASE WHEN a.submitted THEN a.updated_at ELSE NOW() END
        WHERE a.id = $1 AND a.user_id = $2 AND a.chickened_out = FALSE
        RETURNING {APPLICATION_COLUMNS}
        "
    );
    let row = sqlx::query(&query)
        .bind(application_id)
        .bind(user_id)
        .fetch_optional(pool)
        .instrument(db_span("UPDATE", &query))
        .await?;
    if let Some(row) = row {
        return Ok(application_from_row(&row)?);
    }

    match owned_state(pool, application_id, user_id).await? {
        Some(state) if state.chickened_out => {
            Err(ApiError::Forbidden("Application has been withdrawn"))
        }
        _ => Err(ApiError::NotFound("Application not found or access denied")),
    }
}

async fn owned_state(
    pool: &PgPool,
    application_id: Uuid,
    user_id: Uuid,
) -> Result<Option<ApplicationState>, sqlx::Error> {
    let query = r"
        SELECT submitted, chickened_out
        FROM applications
        WHERE id = $1 AND user_id = $2
    ";
    let row = sqlx::query(query)
        .bind(application_id)
        .bind(user_id)
        .fetch_optional(pool)
        .instrument(db_span("SELECT", query))
        .await?;
    row.map(|row| {
        Ok(ApplicationState {
            submitted: row.try_get("submitted")?,
            chickened_out: row.try_get("chickened_out")?,
        })
    })
    .transpose()
}

/// Delete the caller's draft; its answers go with it.
///
/// # Errors
/// `409` when the application is already submitted, `404` when it is missing or foreign.
pub(super) async fn delete_draft(
    pool: &PgPool,
    application_id: Uuid,
    user_id: Uuid,
) -> Result<(), ApiError> {
    let query = r"
        DELETE FROM applications
        WHERE id = $1 AND user_id = $2 AND submitted = FALSE
    ";
    let result = sqlx::query(query)
        .bind(application_id)
        .bind(user_id)
        .execute(pool)
        .instrument(db_span("DELETE", query))
        .await?;
    if result.rows_affected() > 0 {
        return Ok(());
    }

    match owned_state(pool, application_id, user_id).await? {
        Some(state) if state.submitted => Err(ApiError::Conflict(
            "Submitted applications cannot be deleted",
        )),
        _ => Err(ApiError::NotFound("Application not found or access denied")),
    }
}

/// Delete one of the caller's answers while its application is still an open draft.
///
/// # Errors
/// `404` for a missing or foreign answer, `403`/`409` when the application is frozen.
pub(crate) async fn delete_answer(
    pool: &PgPool,
    answer_id: Uuid,
    user_id: Uuid,
) -> Result<(), ApiError> {
    let mut tx = pool.begin().await?;

    let query = r"
        SELECT app.submitted, app.chickened_out
        FROM answers ans
        JOIN applications app ON app.id = ans.application_id
        WHERE ans.id = $1 AND ans.user_id = $2 AND app.user_id = $2
        FOR UPDATE OF app
    ";
    let row = sqlx::query(query)
        .bind(answer_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .instrument(db_span("SELECT", query))
        .await?
        .ok_or(ApiError::NotFound("Answer not found or access denied"))?;
    ApplicationState {
        submitted: row.try_get("submitted")?,
        chickened_out: row.try_get("chickened_out")?,
    }
    .ensure_editable()?;

    let query = "DELETE FROM answers WHERE id = $1 AND user_id = $2";
    sqlx::query(query)
        .bind(answer_id)
        .bind(user_id)
        .execute(&mut *tx)
        .instrument(db_span("DELETE", query))
        .await?;

    tx.commit().await?;
    Ok(())
}

/// Answers on the caller's own application, `None` when it is missing or foreign.
pub(crate) async fn answers_for_owned_application(
    pool: &PgPool,
    application_id: Uuid,
    user_id: Uuid,
) -> Result<Option<Vec<AnswerWithQuestion>>, sqlx::Error> {
    if owned_state(pool, application_id, user_id).await?.is_none() {
        return Ok(None);
    }
    answers_for_application(pool, application_id).await.map(Some)
}

pub(crate) async fn answers_for_application(
    pool: &PgPool,
    application_id: Uuid,
) -> Result<Vec<AnswerWithQuestion>, sqlx::Error> {
    let query = format!(
        r"
        SELECT {ANSWER_COLUMNS},
               q.title AS question_title,
               q.body AS question_body,
               q.department AS question_department
        FROM answers ans
        JOIN questions q ON q.id = ans.question_id
        WHERE ans.application_id = $1
        ORDER BY q.created_at, ans.created_at
        "
    );
    let rows = sqlx::query(&query)
        .bind(application_id)
        .fetch_all(pool)
        .instrument(db_span("SELECT", &query))
        .await?;
    rows.iter().map(answer_with_question_from_row).collect()
}

pub(crate) async fn answers_by_user(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<AnswerWithQuestion>, sqlx::Error> {
    let query = format!(
        r"
        SELECT {ANSWER_COLUMNS},
               q.title AS question_title,
               q.body AS question_body,
               q.department AS question_department
        FROM answers ans
        JOIN questions q ON q.id = ans.question_id
        WHERE ans.user_id = $1
        ORDER BY ans.created_at DESC
        "
    );
    let rows = sqlx::query(&query)
        .bind(user_id)
        .fetch_all(pool)
        .instrument(db_span("SELECT", &query))
        .await?;
    rows.iter().map(answer_with_question_from_row).collect()
}
