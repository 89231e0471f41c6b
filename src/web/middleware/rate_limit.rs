//! Per-IP rate limiting for the search endpoints.
//!
//! Every search miss fans out into several billed provider calls, so each
//! client IP gets a keyed token bucket refilled evenly over the window.
//! Requests whose IP cannot be determined are let through.

use crate::web::error::{ApiError, ApiErrorCode};
use anyhow::anyhow;
use axum::extract::{ConnectInfo, Request};
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use governor::clock::{Clock, DefaultClock};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tower::{Layer, Service};
use tracing::warn;

/// Searches allowed per client IP per window unless configured otherwise.
pub const DEFAULT_SEARCH_LIMIT: u32 = 100;

/// Window over which [`DEFAULT_SEARCH_LIMIT`] applies.
pub const DEFAULT_SEARCH_WINDOW: Duration = Duration::from_secs(15 * 60);

const RATE_LIMITED_MESSAGE: &str = "Too many search requests. Please wait before searching again.";

/// `count` requests per `window`, all of which may be spent at once.
fn quota(count: u32, window: Duration) -> Option<Quota> {
    let burst = NonZeroU32::new(count)?;
    Some(Quota::with_period(window / count)?.allow_burst(burst))
}

pub struct SearchRateLimiter {
    limiter: DefaultKeyedRateLimiter<IpAddr>,
}

impl SearchRateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> anyhow::Result<Self> {
        let quota = quota(max_requests, window).ok_or_else(|| {
            anyhow!("search rate limit needs a positive count and window, got {max_requests} per {window:?}")
        })?;
        Ok(Self {
            limiter: RateLimiter::keyed(quota),
        })
    }

    /// `Err(retry_after_secs)` once `ip` has used up its bucket.
    fn check(&self, ip: IpAddr) -> Result<(), u64> {
        self.limiter.check_key(&ip).map_err(|not_until| {
            let wait = not_until.wait_time_from(DefaultClock::default().now());
            wait.as_secs().max(1)
        })
    }
}

impl Default for SearchRateLimiter {
    fn default() -> Self {
        let quota = quota(DEFAULT_SEARCH_LIMIT, DEFAULT_SEARCH_WINDOW)
            .unwrap_or_else(|| Quota::per_minute(NonZeroU32::MIN));
        Self {
            limiter: RateLimiter::keyed(quota),
        }
    }
}

pub type SharedSearchRateLimiter = Arc<SearchRateLimiter>;

#[derive(Clone)]
pub struct SearchRateLimitLayer {
    limiter: SharedSearchRateLimiter,
}

impl SearchRateLimitLayer {
    pub fn new(limiter: SharedSearchRateLimiter) -> Self {
        Self { limiter }
    }
}

impl<S> Layer<S> for SearchRateLimitLayer {
    type Service = SearchRateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SearchRateLimitService {
            inner,
            limiter: self.limiter.clone(),
        }
    }
}

#[derive(Clone)]
pub struct SearchRateLimitService<S> {
    inner: S,
    limiter: SharedSearchRateLimiter,
}

impl<S> Service<Request> for SearchRateLimitService<S>
where
    S: Service<Request, Response = Response> + Send + Clone + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let Some(ip) = client_ip(&req) else {
            return Box::pin(self.inner.call(req));
        };

        match self.limiter.check(ip) {
            Ok(()) => Box::pin(self.inner.call(req)),
            Err(retry_after) => {
                warn!(
                    client_ip = %ip,
                    path = req.uri().path(),
                    retry_after_secs = retry_after,
                    "search rate limit exceeded"
                );
                let response = rate_limited_response(retry_after);
                Box::pin(async move { Ok(response) })
            }
        }
    }
}

/// Client IP from trusted proxy headers, falling back to the socket peer.
///
/// Priority: `CF-Connecting-IP`, then the rightmost `X-Forwarded-For` entry,
/// then the connection's peer address.
fn client_ip(req: &Request) -> Option<IpAddr> {
    ip_from_headers(req.headers()).or_else(|| {
        req.extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
    })
}

fn ip_from_headers(headers: &HeaderMap) -> Option<IpAddr> {
    let header_str = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    if let Some(ip) = header_str("cf-connecting-ip").and_then(|s| s.trim().parse().ok()) {
        return Some(ip);
    }
    header_str("x-forwarded-for")?
        .rsplit(',')
        .next()
        .map(str::trim)
        .and_then(|s| s.parse().ok())
}

fn rate_limited_response(retry_after: u64) -> Response {
    let mut response =
        ApiError::new(ApiErrorCode::RateLimited, RATE_LIMITED_MESSAGE).into_response();
    response
        .headers_mut()
        .insert("retry-after", HeaderValue::from(retry_after));
    response
}
