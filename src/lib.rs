//! # Recruitment
//!
//! `recruitment` is the backend for a department-based recruitment drive.
//! Applicants register, confirm their email with a one-time code, open one
//! application per department, answer that department's questions and submit.
//! Evaluators and admins review submitted applications of their own department.
//!
//! ## Roles
//!
//! Every user carries exactly one role: `applicant`, `evaluator`, `admin` or
//! `super_admin`. Endpoints declare the explicit set of roles they accept; there
//! is no implicit ordering between roles.
//!
//! ## Application lifecycle
//!
//! - **Draft:** created by the applicant, answers can be saved repeatedly.
//! - **Submitted:** one-way transition, answers become read-only.
//! - **Withdrawn:** an applicant may "chicken out" at any time. The flag is kept
//!   on the user and on every application they own; withdrawn applications leave
//!   the review queue.
//!
//! Ownership-sensitive lookups answer `404 Not Found` for resources that belong to
//! someone else so that ids of other applicants stay hidden.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
