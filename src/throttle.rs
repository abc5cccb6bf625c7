//! Fixed-window request limiter keyed by client address.

use std::{
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::header::RETRY_AFTER,
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use tracing::warn;

use crate::{config::ThrottleConfig, error::AppError};

/// Stale windows are swept once the map grows past this many clients.
const SWEEP_THRESHOLD: usize = 10_000;

struct Window {
    started: Instant,
    count: u32,
}

pub struct Throttle {
    limit: u32,
    window: Duration,
    hits: DashMap<String, Window>,
}

impl Throttle {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit: limit.max(1),
            window,
            hits: DashMap::new(),
        }
    }

    pub fn from_config(cfg: &ThrottleConfig) -> Self {
        Self::new(cfg.limit, Duration::from_secs(cfg.ttl_seconds))
    }

    /// Counts one request for `key`. Over the limit, returns how long until
    /// the current window closes.
    pub fn check(&self, key: &str) -> Result<(), Duration> {
        let now = Instant::now();
        if self.hits.len() > SWEEP_THRESHOLD {
            self.hits
                .retain(|_, w| now.duration_since(w.started) < self.window);
        }

        let mut entry = self.hits.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });
        let elapsed = now.duration_since(entry.started);
        if elapsed >= self.window {
            entry.started = now;
            entry.count = 0;
        }
        if entry.count >= self.limit {
            return Err(self.window.saturating_sub(elapsed));
        }
        entry.count += 1;
        Ok(())
    }
}

fn client_key(req: &Request) -> String {
    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }
    req.headers()
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn limit(State(throttle): State<Arc<Throttle>>, req: Request, next: Next) -> Response {
    let key = client_key(&req);
    match throttle.check(&key) {
        Ok(()) => next.run(req).await,
        Err(retry_after) => {
            let secs = retry_after.as_secs().max(1);
            warn!(client = %key, path = %req.uri().path(), retry_after = secs, "request throttled");
            let err = AppError::TooManyRequests("Too many requests".into());
            ([(RETRY_AFTER, secs.to_string())], err).into_response()
        }
    }
}
