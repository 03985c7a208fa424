//! Per-client request throttling.
//!
//! Two token-bucket limiters keyed by client IP: a strict one for login attempts and a loose one
//! for the rest of `/api`. Buckets start full, hold `max_requests` tokens and refill at
//! `max_requests / window`.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::{
    AppState,
    auth::middleware::normalize_path,
    config::{RateLimitConfig, RateLimitRule},
    errors::Error,
};

const LOGIN_PATH: &str = "/api/auth/login";

pub const LOGIN_LIMIT_MESSAGE: &str = "Too many login attempts, please try again later";
pub const API_LIMIT_MESSAGE: &str = "Too many requests, please try again later";

/// Container for all request limiters. `None` means unlimited.
#[derive(Debug, Default, Clone)]
pub struct Limiters {
    pub login: Option<Arc<RateLimiter>>,
    pub api: Option<Arc<RateLimiter>>,
}

impl Limiters {
    pub fn new(config: &RateLimitConfig) -> Self {
        if !config.enabled {
            return Self::default();
        }
        Self {
            login: Some(Arc::new(RateLimiter::from_rule(&config.login))),
            api: Some(Arc::new(RateLimiter::from_rule(&config.api))),
        }
    }

    /// Periodically drop buckets that have refilled completely, so the maps stay bounded by the
    /// number of recently active clients.
    pub fn spawn_purge_task(&self, every: Duration) -> Option<JoinHandle<()>> {
        let limiters: Vec<_> = [self.login.clone(), self.api.clone()].into_iter().flatten().collect();
        if limiters.is_empty() {
            return None;
        }

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                for limiter in &limiters {
                    let removed = limiter.purge_stale();
                    if removed > 0 {
                        debug!(removed, "purged idle rate limit buckets");
                    }
                }
            }
        }))
    }
}

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_refill: Instant::now(),
        }
    }

    fn try_consume(&mut self, now: Instant, rate: f64, capacity: f64) -> bool {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.last_refill = now;
        self.tokens = (self.tokens + elapsed * rate).min(capacity);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Token buckets per client IP.
#[derive(Debug)]
pub struct RateLimiter {
    buckets: DashMap<IpAddr, TokenBucket>,
    /// Tokens per second
    rate: f64,
    capacity: f64,
}

impl RateLimiter {
    pub fn new(rate: f64, capacity: f64) -> Self {
        Self {
            buckets: DashMap::new(),
            rate,
            capacity,
        }
    }

    pub fn from_rule(rule: &RateLimitRule) -> Self {
        let capacity = f64::from(rule.max_requests);
        Self::new(capacity / rule.window.as_secs_f64().max(f64::EPSILON), capacity)
    }

    /// Take one token for `ip`. Returns false when the bucket is empty.
    pub fn check(&self, ip: IpAddr) -> bool {
        self.check_at(ip, Instant::now())
    }

    fn check_at(&self, ip: IpAddr, now: Instant) -> bool {
        let mut bucket = self.buckets.entry(ip).or_insert_with(|| TokenBucket::new(self.capacity));
        bucket.try_consume(now, self.rate, self.capacity)
    }

    /// Remove buckets that would be full by now. Returns how many were removed.
    pub fn purge_stale(&self) -> usize {
        let now = Instant::now();
        let before = self.buckets.len();
        self.buckets.retain(|_, bucket| {
            let idle = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
            bucket.tokens + idle * self.rate < self.capacity
        });
        before.saturating_sub(self.buckets.len())
    }

    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }
}

/// Client address: the socket peer when known, else the first `X-Forwarded-For` hop, else
/// `X-Real-IP`.
pub fn extract_client_ip(request: &Request) -> Option<IpAddr> {
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return Some(addr.ip());
    }

    let header_ip = |name: &str| {
        request
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse::<IpAddr>().ok())
    };

    header_ip("x-forwarded-for").or_else(|| header_ip("x-real-ip"))
}

/// Throttle `/api` by client IP. Requests whose client cannot be identified pass unthrottled.
pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Result<Response, Error> {
    let path = normalize_path(request.uri().path());
    let (limiter, message) = if path == LOGIN_PATH && request.method() == Method::POST {
        (state.limiters.login.as_deref(), LOGIN_LIMIT_MESSAGE)
    } else if path.starts_with("/api/") {
        (state.limiters.api.as_deref(), API_LIMIT_MESSAGE)
    } else {
        (None, API_LIMIT_MESSAGE)
    };

    if let (Some(limiter), Some(ip)) = (limiter, extract_client_ip(&request)) {
        if !limiter.check(ip) {
            warn!(%ip, %path, "rate limit exceeded");
            return Err(Error::TooManyRequests {
                message: message.to_string(),
            });
        }
    }

    Ok(next.run(request).await)
}
