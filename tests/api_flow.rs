//! End-to-end flow against a real Postgres.
//!
//! Set `RECRUITMENT_TEST_DSN` to a disposable database to run these; without it
//! every test returns early. Migrations are applied on connect and every run uses
//! fresh email addresses, so the database can be reused between runs.

use anyhow::{anyhow, Context, Result};
use axum::{
    body::{to_bytes, Body},
    http::{header::AUTHORIZATION, header::CONTENT_TYPE, Method, Request, StatusCode},
    Router,
};
use recruitment::api::{
    app,
    email::{spawn_mail_worker, LogTransport, MailWorkerConfig},
    handlers::{
        applications::ApplicationPolicy,
        auth::{seed_super_admin, AuthConfig, AuthState, BootstrapAdmin},
    },
    AppState, Environment, HttpConfig, RateLimits,
};
use secrecy::SecretString;
use serde_json::{json, Value};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

const JWT_SECRET: &str = "integration-secret-0123456789abcdef";
const PASSWORD: &str = "correct-horse";

async fn test_pool() -> Result<Option<PgPool>> {
    let Ok(dsn) = std::env::var("RECRUITMENT_TEST_DSN") else {
        eprintln!("RECRUITMENT_TEST_DSN not set, skipping");
        return Ok(None);
    };
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&dsn)
        .await
        .context("Failed to connect to test database")?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(Some(pool))
}

struct TestApp {
    router: Router,
    pool: PgPool,
}

impl TestApp {
    async fn new() -> Result<Option<Self>> {
        let Some(pool) = test_pool().await? else {
            return Ok(None);
        };
        let (mailer, _worker) = spawn_mail_worker(LogTransport, MailWorkerConfig::new());
        let state = AppState {
            pool: pool.clone(),
            auth: Arc::new(AuthState::new(AuthConfig::new(SecretString::from(
                JWT_SECRET,
            )))),
            policy: ApplicationPolicy::new(),
            mailer,
        };
        let router = app(
            state,
            &HttpConfig::new(Environment::Testing),
            &RateLimits::unlimited(),
        )?;
        Ok(Some(Self { router, pool }))
    }

    async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body)?))?,
            None => builder.body(Body::empty())?,
        };

        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok((status, value))
    }

    async fn login(&self, email: &str) -> Result<String> {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/v1/auth/login",
                None,
                Some(json!({ "email": email, "password": PASSWORD })),
            )
            .await?;
        assert_eq!(status, StatusCode::OK, "login {email}: {body}");
        body["token"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("login response without token"))
    }

    async fn super_admin(&self) -> Result<String> {
        let email = unique_email("root");
        let admin = BootstrapAdmin::new(&email, SecretString::from(PASSWORD))?;
        assert!(seed_super_admin(&self.pool, &admin).await?);
        self.login(&email).await
    }

    async fn create_user(&self, admin_token: &str, role: &str) -> Result<(Uuid, String)> {
        let email = unique_email(role);
        let (status, body) = self
            .call(
                Method::POST,
                "/api/v1/users",
                Some(admin_token),
                Some(json!({
                    "full_name": format!("Test {role}"),
                    "email": email,
                    "reg_num": "RA2111003010001",
                    "password": PASSWORD,
                    "role": role,
                })),
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED, "create {role}: {body}");
        assert_eq!(body["user"]["verified"], true);
        let id = id_of(&body["user"])?;
        Ok((id, email))
    }
}

impl TestApp {
    async fn post(&self, uri: &str, body: Value) -> Result<(StatusCode, Value)> {
        self.call(Method::POST, uri, None, Some(body)).await
    }

    async fn register(&self, email: &str) -> Result<(StatusCode, Value)> {
        self.post(
            "/api/v1/auth/register",
            json!({
                "full_name": "Self Registered",
                "email": email,
                "reg_num": "RA2111003010002",
                "password": PASSWORD,
            }),
        )
        .await
    }

    /// Replace the pending code with a known one. Negative `ttl_seconds` makes it expired.
    async fn set_code(
        &self,
        email: &str,
        code: &str,
        purpose: &str,
        ttl_seconds: i64,
    ) -> Result<()> {
        let updated = sqlx::query(
            r"
            UPDATE users
            SET otp_hash = sha256(convert_to($2, 'UTF8')),
                otp_purpose = $3,
                otp_expires_at = NOW() + ($4 * INTERVAL '1 second'),
                otp_attempts = 0
            WHERE email = $1
            ",
        )
        .bind(email)
        .bind(code)
        .bind(purpose)
        .bind(ttl_seconds)
        .execute(&self.pool)
        .await?;
        assert_eq!(updated.rows_affected(), 1, "no user {email}");
        Ok(())
    }

    async fn pending_code(&self, email: &str) -> Result<Option<Vec<u8>>> {
        Ok(sqlx::query_scalar("SELECT otp_hash FROM users WHERE email = $1")
            .bind(email)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn answer_bodies(&self, application_id: Uuid, question_id: Uuid) -> Result<Vec<String>> {
        Ok(sqlx::query_scalar(
            "SELECT body FROM answers WHERE application_id = $1 AND question_id = $2",
        )
        .bind(application_id)
        .bind(question_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn create_question(&self, token: &str, department: &str) -> Result<Uuid> {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/v1/questions",
                Some(token),
                Some(json!({
                    "department": department,
                    "title": format!("{department} question"),
                    "body": "Tell us more.",
                })),
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        id_of(&body["question"])
    }
}

fn unique_email(prefix: &str) -> String {
    format!("{prefix}-{}@example.edu", Uuid::new_v4().simple())
}

fn id_of(value: &Value) -> Result<Uuid> {
    let raw = value["id"]
        .as_str()
        .ok_or_else(|| anyhow!("missing id in {value}"))?;
    Ok(raw.parse()?)
}

#[tokio::test]
async fn application_review_flow() -> Result<()> {
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };

    let root = app.super_admin().await?;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/v1/questions",
            Some(&root),
            Some(json!({
                "department": "technical",
                "title": "Favourite data structure",
                "body": "Explain why.",
            })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let question_id = id_of(&body["question"])?;

    let (evaluator_id, evaluator_email) = app.create_user(&root, "evaluator").await?;
    let (status, body) = app
        .call(
            Method::PUT,
            &format!("/api/v1/admin/users/{evaluator_id}/role"),
            Some(&root),
            Some(json!({ "role": "evaluator", "department": "technical" })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["user"]["department"], "technical");

    let (_, applicant_email) = app.create_user(&root, "applicant").await?;
    let applicant = app.login(&applicant_email).await?;
    let evaluator = app.login(&evaluator_email).await?;

    // Applicants cannot list every application.
    let (status, _) = app
        .call(Method::GET, "/api/v1/applications", Some(&applicant), None)
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .call(
            Method::POST,
            "/api/v1/applications",
            Some(&applicant),
            Some(json!({ "department": "technical" })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let application_id = id_of(&body["application"])?;
    assert_eq!(body["application"]["submitted"], false);

    let (status, _) = app
        .call(
            Method::POST,
            "/api/v1/applications",
            Some(&applicant),
            Some(json!({ "department": "technical" })),
        )
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let save_uri = format!("/api/v1/applications/{application_id}/save");
    let (status, body) = app
        .call(
            Method::PATCH,
            &save_uri,
            Some(&applicant),
            Some(json!({ "answers": [{ "question_id": question_id, "body": "A B-tree." }] })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["count"], 1);

    // Drafts are not reviewable yet.
    let (status, _) = app
        .call(
            Method::POST,
            "/api/v1/reviews",
            Some(&evaluator),
            Some(json!({ "application_id": application_id, "shortlisted": true })),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let submit_uri = format!("/api/v1/applications/{application_id}/submit");
    let (status, body) = app
        .call(Method::POST, &submit_uri, Some(&applicant), None)
        .await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["application"]["submitted"], true);

    let (status, _) = app
        .call(Method::POST, &submit_uri, Some(&applicant), None)
        .await?;
    assert_eq!(status, StatusCode::OK, "repeat submit is accepted");

    let (status, _) = app
        .call(
            Method::PATCH,
            &save_uri,
            Some(&applicant),
            Some(json!({ "answers": [{ "question_id": question_id, "body": "Changed." }] })),
        )
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .call(
            Method::DELETE,
            &format!("/api/v1/applications/{application_id}"),
            Some(&applicant),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app
        .call(
            Method::GET,
            "/api/v1/reviews/applications?limit=100",
            Some(&evaluator),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["department"], "technical");
    assert_eq!(body["pagination"]["limit"], 100);
    let queued = |body: &Value| {
        body["applications"]
            .as_array()
            .is_some_and(|items| {
                items
                    .iter()
                    .any(|item| item["id"] == json!(application_id.to_string()))
            })
    };
    assert!(queued(&body));

    let (status, body) = app
        .call(
            Method::GET,
            &format!("/api/v1/reviews/applications/{application_id}"),
            Some(&evaluator),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["answers"][0]["question_title"], "Favourite data structure");

    for shortlisted in [true, false] {
        let (status, body) = app
            .call(
                Method::POST,
                "/api/v1/reviews",
                Some(&evaluator),
                Some(json!({
                    "application_id": application_id,
                    "shortlisted": shortlisted,
                    "comments": "  Solid answer  ",
                })),
            )
            .await?;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["review"]["shortlisted"], shortlisted);
        assert_eq!(body["review"]["comments"], "Solid answer");
    }

    let (status, body) = app
        .call(Method::GET, "/api/v1/reviews/stats", Some(&evaluator), None)
        .await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["stats"]["reviewed_count"], 1);
    assert_eq!(body["stats"]["rejected_count"], 1);

    let (status, body) = app
        .call(Method::POST, "/api/v1/auth/chicken-out", Some(&applicant), None)
        .await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["applications_withdrawn"], 1);

    let (status, body) = app
        .call(
            Method::GET,
            "/api/v1/reviews/applications?limit=100",
            Some(&evaluator),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(!queued(&body), "withdrawn applications leave the queue");

    Ok(())
}

#[tokio::test]
async fn foreign_resources_look_missing() -> Result<()> {
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };

    let root = app.super_admin().await?;
    let (_, owner_email) = app.create_user(&root, "applicant").await?;
    let (_, other_email) = app.create_user(&root, "applicant").await?;
    let owner = app.login(&owner_email).await?;
    let other = app.login(&other_email).await?;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/v1/applications",
            Some(&owner),
            Some(json!({ "department": "design" })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let application_id = id_of(&body["application"])?;

    let (status, _) = app
        .call(
            Method::GET,
            &format!("/api/v1/answers/application/{application_id}"),
            Some(&other),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .call(
            Method::POST,
            &format!("/api/v1/applications/{application_id}/submit"),
            Some(&other),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .call(
            Method::DELETE,
            &format!("/api/v1/applications/{application_id}"),
            Some(&owner),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn application_quota_is_enforced() -> Result<()> {
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };

    let root = app.super_admin().await?;
    let (_, email) = app.create_user(&root, "applicant").await?;
    let applicant = app.login(&email).await?;

    for department in ["technical", "management"] {
        let (status, body) = app
            .call(
                Method::POST,
                "/api/v1/applications",
                Some(&applicant),
                Some(json!({ "department": department })),
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED, "{body}");
    }

    let (status, _) = app
        .call(
            Method::POST,
            "/api/v1/applications",
            Some(&applicant),
            Some(json!({ "department": "design" })),
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .call(Method::GET, "/api/v1/applications/me", Some(&applicant), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);

    Ok(())
}

#[tokio::test]
async fn verification_code_is_single_use() -> Result<()> {
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };
    let email = unique_email("new");

    let (status, body) = app.register(&email).await?;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["user"]["verified"], false);
    let stored = app.pending_code(&email).await?;
    assert_eq!(stored.map(|hash| hash.len()), Some(32), "only a digest is stored");

    let (status, body) = app.register(&email).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "User with this email already exists");

    app.set_code(&email, "424242", "verification", 600).await?;
    let verify = json!({ "email": email, "code": "424242" });

    let (status, body) = app.post("/api/v1/auth/verify-otp", verify.clone()).await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["user"]["verified"], true);
    assert!(body["token"].is_string());
    assert_eq!(app.pending_code(&email).await?, None);

    let (status, _) = app.post("/api/v1/auth/verify-otp", verify).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn expired_code_is_rejected_even_when_correct() -> Result<()> {
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };
    let email = unique_email("late");
    let (status, _) = app.register(&email).await?;
    assert_eq!(status, StatusCode::CREATED);

    app.set_code(&email, "135790", "verification", -60).await?;
    let (status, body) = app
        .post(
            "/api/v1/auth/verify-otp",
            json!({ "email": email, "code": "135790" }),
        )
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "OTP has expired");
    Ok(())
}

#[tokio::test]
async fn reset_code_does_not_verify_an_account() -> Result<()> {
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };
    let email = unique_email("unverified");
    let (status, _) = app.register(&email).await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app
        .post("/api/v1/auth/forgot-password", json!({ "email": email }))
        .await?;
    assert_eq!(status, StatusCode::OK);
    app.set_code(&email, "111111", "reset", 600).await?;

    let (status, _) = app
        .post(
            "/api/v1/auth/verify-otp",
            json!({ "email": email, "code": "111111" }),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .post(
            "/api/v1/auth/reset-password",
            json!({ "email": email, "code": "111111", "new_password": "new-secret" }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    Ok(())
}

#[tokio::test]
async fn wrong_guesses_exhaust_the_reset_code() -> Result<()> {
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };
    let root = app.super_admin().await?;
    let (_, email) = app.create_user(&root, "applicant").await?;

    let (status, _) = app
        .post("/api/v1/auth/forgot-password", json!({ "email": email }))
        .await?;
    assert_eq!(status, StatusCode::OK);
    app.set_code(&email, "222222", "reset", 600).await?;

    let reset = |code: &str| json!({ "email": email, "code": code, "new_password": "new-secret" });
    for guess in ["000001", "000002", "000003", "000004"] {
        let (status, body) = app.post("/api/v1/auth/reset-password", reset(guess)).await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid OTP");
    }
    let (status, body) = app.post("/api/v1/auth/reset-password", reset("000005")).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Too many invalid codes, request a new one");
    assert_eq!(app.pending_code(&email).await?, None);

    let (status, _) = app.post("/api/v1/auth/reset-password", reset("222222")).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED, "the right code no longer works");
    app.login(&email).await?;
    Ok(())
}

#[tokio::test]
async fn reset_password_hides_unknown_accounts() -> Result<()> {
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };
    let (status, body) = app
        .post(
            "/api/v1/auth/reset-password",
            json!({
                "email": unique_email("ghost"),
                "code": "123456",
                "new_password": "new-secret",
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "error": "Invalid OTP" }));
    Ok(())
}

#[tokio::test]
async fn saved_answers_upsert_within_the_department() -> Result<()> {
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };
    let root = app.super_admin().await?;
    let first = app.create_question(&root, "technical").await?;
    let second = app.create_question(&root, "technical").await?;
    let foreign = app.create_question(&root, "design").await?;

    let (_, email) = app.create_user(&root, "applicant").await?;
    let applicant = app.login(&email).await?;
    let (status, body) = app
        .call(
            Method::POST,
            "/api/v1/applications",
            Some(&applicant),
            Some(json!({ "department": "technical" })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let application_id = id_of(&body["application"])?;
    let save_uri = format!("/api/v1/applications/{application_id}/save");
    let save = |answers: Value| {
        app.call(
            Method::PATCH,
            &save_uri,
            Some(&applicant),
            Some(json!({ "answers": answers })),
        )
    };

    for text in ["first draft", "second draft"] {
        let (status, body) = save(json!([{ "question_id": first, "body": text }])).await?;
        assert_eq!(status, StatusCode::OK, "{body}");
    }
    assert_eq!(
        app.answer_bodies(application_id, first).await?,
        vec!["second draft".to_string()]
    );

    let (status, _) = save(json!([{ "question_id": foreign, "body": "wrong desk" }])).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = save(json!([
        { "question_id": second, "body": "fine" },
        { "question_id": foreign, "body": "wrong desk" },
    ]))
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(
        app.answer_bodies(application_id, second).await?.is_empty(),
        "a rejected batch writes nothing"
    );

    let (status, _) = app
        .call(
            Method::POST,
            &format!("/api/v1/applications/{application_id}/submit"),
            Some(&applicant),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = save(json!([{ "question_id": first, "body": "after submit" }])).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        app.answer_bodies(application_id, first).await?,
        vec!["second draft".to_string()]
    );
    Ok(())
}

#[tokio::test]
async fn only_admins_list_every_application() -> Result<()> {
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };
    let root = app.super_admin().await?;
    let (_, evaluator_email) = app.create_user(&root, "evaluator").await?;
    let (_, admin_email) = app.create_user(&root, "admin").await?;
    let (_, applicant_email) = app.create_user(&root, "applicant").await?;
    let evaluator = app.login(&evaluator_email).await?;
    let admin = app.login(&admin_email).await?;
    let applicant = app.login(&applicant_email).await?;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/v1/applications",
            Some(&applicant),
            Some(json!({ "department": "management" })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let application_id = id_of(&body["application"])?;

    let (status, _) = app
        .call(Method::GET, "/api/v1/applications", Some(&evaluator), None)
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .call(Method::GET, "/api/v1/applications", Some(&admin), None)
        .await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    let listed = body["applications"].as_array().is_some_and(|items| {
        items.iter().any(|item| {
            item["id"] == json!(application_id.to_string())
                && item["applicant_email"] == json!(applicant_email)
        })
    });
    assert!(listed, "admin sees other users' applications");
    Ok(())
}

#[tokio::test]
async fn admins_cannot_delete_admins() -> Result<()> {
    let Some(app) = TestApp::new().await? else {
        return Ok(());
    };
    let root = app.super_admin().await?;
    let (_, admin_email) = app.create_user(&root, "admin").await?;
    let (other_admin_id, _) = app.create_user(&root, "admin").await?;
    let (applicant_id, _) = app.create_user(&root, "applicant").await?;
    let admin = app.login(&admin_email).await?;

    let (status, _) = app
        .call(
            Method::DELETE,
            &format!("/api/v1/users/{other_admin_id}"),
            Some(&admin),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .call(
            Method::DELETE,
            &format!("/api/v1/users/{applicant_id}"),
            Some(&admin),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .call(
            Method::DELETE,
            &format!("/api/v1/users/{other_admin_id}"),
            Some(&root),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}
