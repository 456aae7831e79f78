//! Per-client request limiting for route groups.
//!
//! Each limited group owns a `governor` token bucket keyed by client IP. The
//! key is the TCP peer address unless forwarded headers are explicitly
//! trusted. Allowed responses carry `X-RateLimit-*` headers; rejected requests
//! get `429` with a `Retry-After` header.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use governor::{
    clock::{Clock, DefaultClock},
    middleware::StateInformationMiddleware,
    state::keyed::DefaultKeyedStateStore,
    Quota,
};
use serde_json::json;
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    num::NonZeroU32,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use tracing::debug;

use super::utils::extract_client_ip;

/// Stale buckets are dropped every this many checks.
const RETAIN_EVERY: u64 = 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed {
        limit: u32,
        remaining: u32,
        reset_after: Duration,
    },
    Limited {
        limit: u32,
        retry_after: Duration,
    },
    /// No limiter configured for this route group.
    Unlimited,
}

pub trait RateLimiter: Send + Sync {
    fn check(&self, client: IpAddr) -> RateLimitDecision;
}

#[derive(Clone, Debug)]
pub struct NoopRateLimiter;

impl RateLimiter for NoopRateLimiter {
    fn check(&self, _client: IpAddr) -> RateLimitDecision {
        RateLimitDecision::Unlimited
    }
}

type KeyedLimiter = governor::RateLimiter<
    IpAddr,
    DefaultKeyedStateStore<IpAddr>,
    DefaultClock,
    StateInformationMiddleware,
>;

/// Token bucket per client IP.
pub struct GovernorLimiter {
    limiter: KeyedLimiter,
    checks: AtomicU64,
}

impl GovernorLimiter {
    #[must_use]
    pub fn new(quota: Quota) -> Self {
        Self {
            limiter: governor::RateLimiter::keyed(quota)
                .with_middleware::<StateInformationMiddleware>(),
            checks: AtomicU64::new(0),
        }
    }

    /// `limit` requests per minute, all of which may arrive as one burst.
    #[must_use]
    pub fn per_minute(limit: u32) -> Self {
        Self::new(Quota::per_minute(NonZeroU32::new(limit).unwrap_or(NonZeroU32::MIN)))
    }

    /// Drop buckets that have refilled completely.
    pub fn prune(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }

    #[must_use]
    pub fn tracked_clients(&self) -> usize {
        self.limiter.len()
    }
}

impl RateLimiter for GovernorLimiter {
    fn check(&self, client: IpAddr) -> RateLimitDecision {
        if self.checks.fetch_add(1, Ordering::Relaxed) % RETAIN_EVERY == RETAIN_EVERY - 1 {
            self.prune();
        }

        match self.limiter.check_key(&client) {
            Ok(snapshot) => {
                let quota = snapshot.quota();
                let limit = quota.burst_size().get();
                let remaining = snapshot.remaining_burst_capacity();
                RateLimitDecision::Allowed {
                    limit,
                    remaining,
                    reset_after: quota.replenish_interval() * (limit - remaining),
                }
            }
            Err(not_until) => RateLimitDecision::Limited {
                limit: not_until.quota().burst_size().get(),
                retry_after: not_until.wait_time_from(self.limiter.clock().now()),
            },
        }
    }
}

/// Limiter plus the rule for deriving the client key.
#[derive(Clone)]
pub struct ClientLimit {
    limiter: Arc<dyn RateLimiter>,
    trust_proxy_headers: bool,
}

impl ClientLimit {
    #[must_use]
    pub fn new(limiter: Arc<dyn RateLimiter>, trust_proxy_headers: bool) -> Self {
        Self {
            limiter,
            trust_proxy_headers,
        }
    }

    /// Forwarded headers are only honoured behind a trusted proxy; otherwise
    /// any caller could pick a fresh key per request.
    fn client_ip(&self, request: &Request) -> IpAddr {
        let forwarded = if self.trust_proxy_headers {
            extract_client_ip(request.headers())
        } else {
            None
        };
        forwarded
            .or_else(|| {
                request
                    .extensions()
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip())
            })
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
    }
}

fn ceil_seconds(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs.max(1)
    }
}

fn reset_timestamp(reset_after: Duration) -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|now| now.as_secs())
        .unwrap_or_default()
        + ceil_seconds(reset_after)
}

fn insert_header(headers: &mut HeaderMap, name: &'static str, value: u64) {
    if let Ok(value) = HeaderValue::from_str(&value.to_string()) {
        headers.insert(HeaderName::from_static(name), value);
    }
}

/// Middleware applying a [`ClientLimit`] to every request of a route group.
pub async fn rate_limit(
    State(limit): State<ClientLimit>,
    request: Request,
    next: Next,
) -> Response {
    let client = limit.client_ip(&request);

    match limit.limiter.check(client) {
        RateLimitDecision::Unlimited => next.run(request).await,
        RateLimitDecision::Allowed {
            limit,
            remaining,
            reset_after,
        } => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            insert_header(headers, "x-ratelimit-limit", u64::from(limit));
            insert_header(headers, "x-ratelimit-remaining", u64::from(remaining));
            insert_header(headers, "x-ratelimit-reset", reset_timestamp(reset_after));
            response
        }
        RateLimitDecision::Limited { limit, retry_after } => {
            debug!(%client, "rate limit exceeded");
            let retry_after_secs = ceil_seconds(retry_after);
            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({
                    "error": "Rate limit exceeded",
                    "message": "Too many requests. Please try again later.",
                    "retry_after": retry_after_secs,
                })),
            )
                .into_response();
            let headers = response.headers_mut();
            insert_header(headers, "x-ratelimit-limit", u64::from(limit));
            insert_header(headers, "x-ratelimit-remaining", 0);
            insert_header(headers, "x-ratelimit-reset", reset_timestamp(retry_after));
            insert_header(headers, "retry-after", retry_after_secs);
            response
        }
    }
}
