//! Route handlers, grouped by resource.
//!
//! Every group shares the error taxonomy in `error` and the identity types in
//! `auth`. Storage helpers live next to the handlers that use them.

pub mod admin;
pub mod answers;
pub mod applications;
pub mod auth;
pub mod department;
pub mod error;
pub mod health;
pub mod questions;
pub mod reviews;
pub mod users;
