use super::handlers::{
    admin, answers, applications,
    auth::{self, principal, rate_limit::rate_limit, ClientLimit, NoopRateLimiter, RateLimiter},
    health, questions, reviews, users,
};
use axum::middleware::{from_fn, from_fn_with_state};
use std::sync::Arc;
use utoipa::{
    openapi::{
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
        ComponentsBuilder, Contact, InfoBuilder, License, OpenApiBuilder, Tag,
    },
    Modify,
};
use utoipa_axum::{router::OpenApiRouter, routes};

/// Limiters for the two rate-limit tiers.
#[derive(Clone)]
pub struct RateLimits {
    /// Auth, users and admin routes.
    pub strict: Arc<dyn RateLimiter>,
    /// Question routes.
    pub default: Arc<dyn RateLimiter>,
    /// Key clients by `x-forwarded-for`/`x-real-ip` instead of the peer address.
    pub trust_proxy_headers: bool,
}

impl RateLimits {
    #[must_use]
    pub fn unlimited() -> Self {
        Self {
            strict: Arc::new(NoopRateLimiter),
            default: Arc::new(NoopRateLimiter),
            trust_proxy_headers: false,
        }
    }

    fn strict(&self) -> ClientLimit {
        ClientLimit::new(self.strict.clone(), self.trust_proxy_headers)
    }

    fn default_tier(&self) -> ClientLimit {
        ClientLimit::new(self.default.clone(), self.trust_proxy_headers)
    }
}

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let (_router, openapi) = api_router(&RateLimits::unlimited()).split_for_parts();
    openapi
}

/// Registers the `bearer` scheme referenced by `security(("bearer" = []))`.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(|| ComponentsBuilder::new().build());
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// Build the router that also drives the `OpenAPI` document.
///
/// Each resource is its own group so it can carry its own rate-limit tier and
/// role middleware. Paths in `#[utoipa::path]` are absolute, so groups are
/// merged rather than nested.
pub(crate) fn api_router(limits: &RateLimits) -> OpenApiRouter {
    let strict = || from_fn_with_state(limits.strict(), rate_limit);

    let auth_public = OpenApiRouter::new()
        .routes(routes!(auth::register::register))
        .routes(routes!(auth::verification::verify_otp))
        .routes(routes!(auth::verification::resend_otp))
        .routes(routes!(auth::login::login))
        .routes(routes!(auth::login::refresh))
        .routes(routes!(auth::password_reset::forgot_password))
        .routes(routes!(auth::password_reset::reset_password));
    let auth_session = OpenApiRouter::new()
        .routes(routes!(auth::login::profile))
        .routes(routes!(auth::withdrawal::chicken_out))
        .route_layer(from_fn(principal::authenticate));
    let auth_routes = auth_public.merge(auth_session).layer(strict());

    let application_routes = OpenApiRouter::new()
        .routes(routes!(
            applications::list_applications,
            applications::create_application
        ))
        .routes(routes!(applications::my_applications))
        .routes(routes!(applications::save_application))
        .routes(routes!(applications::submit_application))
        .routes(routes!(applications::delete_application))
        .route_layer(from_fn(principal::authenticate));

    let answer_routes = OpenApiRouter::new()
        .routes(routes!(answers::post_answer))
        .routes(routes!(answers::delete_answer))
        .routes(routes!(answers::application_answers))
        .routes(routes!(answers::user_answers))
        .route_layer(from_fn(principal::authenticate));

    let question_routes = OpenApiRouter::new()
        .routes(routes!(
            questions::questions_by_department,
            questions::create_question
        ))
        .routes(routes!(questions::all_questions))
        .routes(routes!(questions::get_question, questions::delete_question))
        .layer(from_fn_with_state(limits.default_tier(), rate_limit));

    let user_routes = OpenApiRouter::new()
        .routes(routes!(users::list_users, users::create_user))
        .routes(routes!(users::get_user, users::delete_user))
        .routes(routes!(users::get_user_by_email))
        .route_layer(from_fn(principal::require_evaluator_or_above))
        .layer(strict());

    let admin_routes = OpenApiRouter::new()
        .routes(routes!(admin::update_user_role))
        .routes(routes!(admin::verify_user))
        .route_layer(from_fn(principal::require_super_admin))
        .layer(strict());

    let review_routes = OpenApiRouter::new()
        .routes(routes!(reviews::review_queue))
        .routes(routes!(reviews::application_for_review))
        .routes(routes!(reviews::save_review))
        .routes(routes!(reviews::review_stats))
        .route_layer(from_fn(principal::require_evaluator_or_above));

    let router = OpenApiRouter::with_openapi(cargo_openapi())
        .routes(routes!(health::health))
        .merge(auth_routes)
        .merge(application_routes)
        .merge(answer_routes)
        .merge(question_routes)
        .merge(user_routes)
        .merge(admin_routes)
        .merge(review_routes);

    let (axum_router, mut api) = router.split_for_parts();
    api.tags = Some(vec![
        tag("health", "Liveness and database connectivity"),
        tag("auth", "Registration, verification, login and password reset"),
        tag("applications", "Application lifecycle"),
        tag("answers", "Single-answer upsert and lookups"),
        tag("questions", "Department question bank"),
        tag("users", "User directory for staff"),
        tag("admin", "Role and verification management"),
        tag("reviews", "Department-scoped review workflow"),
    ]);
    BearerAuth.modify(&mut api);

    OpenApiRouter::with_openapi(api).merge(OpenApiRouter::from(axum_router))
}

fn tag(name: &str, description: &str) -> Tag {
    let mut tag = Tag::new(name);
    tag.description = Some(description.to_string());
    tag
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    // Use Cargo.toml metadata instead of the utoipa-axum crate info defaults.
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.contact = cargo_contact();
    info.license = cargo_license();

    OpenApiBuilder::new().info(info).build()
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let authors = env!("CARGO_PKG_AUTHORS");
    let primary = authors.split(';').next().map(str::trim)?;
    if primary.is_empty() {
        return None;
    }

    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    fn non_empty(value: &str) -> Option<&str> {
        Some(value).filter(|value| !value.is_empty())
    }

    match author.find('<') {
        Some(start) => (
            non_empty(author[..start].trim()),
            non_empty(author[start + 1..].trim_end_matches('>').trim()),
        ),
        None => (non_empty(author.trim()), None),
    }
}
