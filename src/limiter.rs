//! Call pacing: rolling-window rate limiting and durable monthly quotas.

use std::collections::VecDeque;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::{Result, SearchError};

/// Paces calls to at most `max_calls` per rolling `window`.
///
/// Calls beyond the budget wait for a slot to open; nothing is ever
/// rejected or dropped.
pub struct RateLimiter {
    max_calls: usize,
    window: Duration,
    calls: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Creates a limiter allowing `max_calls` per `window`.
    pub fn new(max_calls: usize, window: Duration) -> Self {
        Self {
            max_calls: max_calls.max(1),
            window,
            calls: Mutex::new(VecDeque::new()),
        }
    }

    /// Default pacing for search backends: 10 calls per minute.
    pub fn for_search() -> Self {
        Self::new(10, Duration::from_secs(60))
    }

    /// Runs `f` once a slot inside the rolling window is available.
    pub async fn execute<F, Fut, T>(&self, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.acquire().await;
        f().await
    }

    async fn acquire(&self) {
        loop {
            let wait = {
                let mut calls = self.calls.lock().await;
                let now = Instant::now();
                while calls
                    .front()
                    .is_some_and(|t| now.duration_since(*t) >= self.window)
                {
                    calls.pop_front();
                }
                if calls.len() < self.max_calls {
                    calls.push_back(now);
                    return;
                }
                match calls.front() {
                    Some(oldest) => self.window.saturating_sub(now.duration_since(*oldest)),
                    None => Duration::ZERO,
                }
            };
            debug!(wait_ms = wait.as_millis() as u64, "rate limit reached, waiting for slot");
            sleep(wait.max(Duration::from_millis(10))).await;
        }
    }
}

/// Durable monthly usage record, persisted as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyUsage {
    /// Calendar month key, "YYYY-MM".
    pub month: String,
    /// Successful calls made within `month`.
    pub count: u64,
}

struct QuotaState {
    usage: Option<MonthlyUsage>,
    last_call: Option<Instant>,
}

/// Per-second pacing plus a durable monthly call cap.
///
/// The counter lives in a JSON file and is reloaded on first use, so the cap
/// survives restarts. The file is rewritten after every successful call;
/// failed calls are not charged. Single-writer deployments only: there is
/// no cross-process file locking, and concurrent writers can corrupt the
/// record.
pub struct QuotaLimiter {
    min_interval: Duration,
    monthly_cap: u64,
    path: PathBuf,
    state: Mutex<QuotaState>,
}

impl QuotaLimiter {
    /// Creates a limiter with explicit pacing, cap, and storage path.
    pub fn new(min_interval: Duration, monthly_cap: u64, path: impl Into<PathBuf>) -> Self {
        Self {
            min_interval,
            monthly_cap,
            path: path.into(),
            state: Mutex::new(QuotaState {
                usage: None,
                last_call: None,
            }),
        }
    }

    /// Default limits for the Brave Search API free tier: 1 call/s,
    /// 2000 calls/month, persisted under the user's home directory.
    pub fn for_brave_api() -> Self {
        let home = std::env::var("HOME").map(PathBuf::from).unwrap_or_default();
        Self::new(
            Duration::from_secs(1),
            2000,
            home.join(".scour").join("brave_quota.json"),
        )
    }

    /// Runs `f` if quota remains, charging the counter only on success.
    ///
    /// At the cap this fails immediately, without invoking `f`, and
    /// reports the days left until the month rolls over.
    pub async fn execute<F, Fut, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.execute_in_month(&current_month(), f).await
    }

    /// Remaining calls in the current month, loading the record if needed.
    pub async fn remaining(&self) -> u64 {
        let mut state = self.state.lock().await;
        let month = current_month();
        let usage = self.loaded_usage(&mut state, &month);
        self.monthly_cap.saturating_sub(usage.count)
    }

    async fn execute_in_month<F, Fut, T>(&self, month: &str, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut state = self.state.lock().await;

        let cap = self.monthly_cap;
        let usage = self.loaded_usage(&mut state, month);
        if usage.count >= cap {
            return Err(SearchError::QuotaExceeded {
                days_remaining: days_until_next_month(),
            });
        }

        if let Some(last) = state.last_call {
            let since = last.elapsed();
            if since < self.min_interval {
                sleep(self.min_interval - since).await;
            }
        }
        state.last_call = Some(Instant::now());

        let out = f().await;

        if out.is_ok() {
            let usage = self.loaded_usage(&mut state, month);
            usage.count += 1;
            let snapshot = usage.clone();
            if let Err(e) = self.persist(&snapshot) {
                warn!(path = %self.path.display(), "failed to persist quota counter: {e}");
            }
        }
        out
    }

    /// Returns the in-memory usage record, loading from disk on first use
    /// and resetting the counter when the stored month has passed.
    fn loaded_usage<'a>(&self, state: &'a mut QuotaState, month: &str) -> &'a mut MonthlyUsage {
        let usage = state
            .usage
            .get_or_insert_with(|| self.load_or_default(month));
        if usage.month != month {
            debug!(old = %usage.month, new = %month, "quota month rolled over, resetting counter");
            usage.month = month.to_string();
            usage.count = 0;
        }
        usage
    }

    /// Missing or corrupt files count as a fresh month with zero calls.
    fn load_or_default(&self, month: &str) -> MonthlyUsage {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => match serde_json::from_str::<MonthlyUsage>(&raw) {
                Ok(usage) => usage,
                Err(e) => {
                    warn!(path = %self.path.display(), "corrupt quota file, starting fresh: {e}");
                    MonthlyUsage {
                        month: month.to_string(),
                        count: 0,
                    }
                }
            },
            Err(_) => MonthlyUsage {
                month: month.to_string(),
                count: 0,
            },
        }
    }

    fn persist(&self, usage: &MonthlyUsage) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, serde_json::to_string(usage)?)?;
        Ok(())
    }
}

fn current_month() -> String {
    let now = Utc::now();
    format!("{:04}-{:02}", now.year(), now.month())
}

fn days_until_next_month() -> i64 {
    let today = Utc::now().date_naive();
    let (year, month) = if today.month() == 12 {
        (today.year() + 1, 1)
    } else {
        (today.year(), today.month() + 1)
    };
    match NaiveDate::from_ymd_opt(year, month, 1) {
        Some(next) => (next - today).num_days(),
        None => 0,
    }
}
