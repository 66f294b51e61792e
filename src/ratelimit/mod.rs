//! Fixed-window rate limiting per (route, client).
//!
//! Each limited route has a [`RateRule`] such as `5/minute`. A request bumps
//! the counter for its route and client key; once the count passes the
//! limit the request is rejected with `429` and a `Retry-After` of the
//! seconds left in the window.
//!
//! The limiter lives in `AppState` and is handed to route layers explicitly.
//! Counters sit behind the [`RateLimitStore`] trait; [`InMemoryStore`] is the
//! process-local implementation.

pub mod middleware;
mod store;

pub use middleware::{client_key, enforce_rate_limit, RouteLimit};
pub use store::{InMemoryStore, RateLimitStore, WindowHit};

use crate::types::{AppError, Result};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Longest accepted window.
pub const MAX_WINDOW: Duration = Duration::from_secs(366 * 86_400);

/// A request budget: at most `limit` requests per `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateRule {
    pub limit: u64,
    pub window: Duration,
}

impl RateRule {
    pub fn new(limit: u64, window: Duration) -> Self {
        Self { limit, window }
    }

    /// Parses `"<limit>/<period>"`, e.g. `5/minute`, `3/5minutes`, `50/day`.
    pub fn parse(value: &str) -> Result<Self> {
        let invalid = || AppError::Config(format!("Invalid rate limit rule '{value}'"));

        let (limit, period) = value.trim().split_once('/').ok_or_else(invalid)?;
        let limit: u64 = limit.trim().parse().map_err(|_| invalid())?;
        if limit == 0 {
            return Err(invalid());
        }

        let period = period.trim();
        let digits = period
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(invalid)?;
        let (multiplier, unit) = period.split_at(digits);
        let multiplier: u64 = if multiplier.is_empty() {
            1
        } else {
            multiplier.parse().map_err(|_| invalid())?
        };
        if multiplier == 0 {
            return Err(invalid());
        }

        let unit_secs: u64 = match unit.trim().trim_end_matches('s') {
            "second" | "sec" => 1,
            "minute" | "min" => 60,
            "hour" => 3_600,
            "day" => 86_400,
            _ => return Err(invalid()),
        };

        let window = unit_secs
            .checked_mul(multiplier)
            .map(Duration::from_secs)
            .filter(|window| *window <= MAX_WINDOW)
            .ok_or_else(|| {
                AppError::Config(format!(
                    "Rate limit window in '{value}' exceeds {} days",
                    MAX_WINDOW.as_secs() / 86_400
                ))
            })?;

        Ok(Self::new(limit, window))
    }
}

impl FromStr for RateRule {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for RateRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}s", self.limit, self.window.as_secs())
    }
}

/// Outcome of an allowed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub limit: u64,
    pub remaining: u64,
    pub resets_in: Duration,
}

/// Shared, cheaply cloneable limiter holding the per-route rules.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    rules: Arc<HashMap<String, RateRule>>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, rules: HashMap<String, RateRule>) -> Self {
        Self {
            store,
            rules: Arc::new(rules),
        }
    }

    /// In-memory limiter with the given rules.
    pub fn in_memory(rules: HashMap<String, RateRule>) -> Self {
        Self::new(Arc::new(InMemoryStore::new()), rules)
    }

    pub fn rule(&self, route: &str) -> Option<RateRule> {
        self.rules.get(route).copied()
    }

    /// Counts a request from `client` on `route`.
    ///
    /// Routes without a rule are not limited.
    pub async fn check(&self, route: &str, client: &str) -> Result<Option<RateDecision>> {
        self.check_at(route, client, Instant::now()).await
    }

    pub async fn check_at(
        &self,
        route: &str,
        client: &str,
        now: Instant,
    ) -> Result<Option<RateDecision>> {
        let Some(rule) = self.rule(route) else {
            return Ok(None);
        };

        let hit = self
            .store
            .hit(&counter_key(route, client), rule.window, now)
            .await?;

        if hit.count > rule.limit {
            return Err(AppError::RateLimited {
                retry_after: retry_after_secs(hit.resets_in),
            });
        }

        Ok(Some(RateDecision {
            limit: rule.limit,
            remaining: rule.limit - hit.count,
            resets_in: hit.resets_in,
        }))
    }

    pub async fn count(&self, route: &str, client: &str) -> Result<u64> {
        self.store
            .count(&counter_key(route, client), Instant::now())
            .await
    }

    /// Removes counters whose window has elapsed.
    pub async fn purge(&self) -> Result<usize> {
        self.store.purge(Instant::now()).await
    }
}

fn counter_key(route: &str, client: &str) -> String {
    format!("{route}:{client}")
}

/// Whole seconds until reset, rounded up, never below 1.
fn retry_after_secs(resets_in: Duration) -> u64 {
    let secs = resets_in
        .as_secs()
        .saturating_add(u64::from(resets_in.subsec_nanos() > 0));
    secs.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn limiter(limit: u64, window: Duration) -> RateLimiter {
        RateLimiter::in_memory(HashMap::from([(
            "login".to_string(),
            RateRule::new(limit, window),
        )]))
    }

    #[rstest]
    #[case("5/minute", 5, 60)]
    #[case("10/minute", 10, 60)]
    #[case("3/5minutes", 3, 300)]
    #[case("50/day", 50, 86_400)]
    #[case("100/hour", 100, 3_600)]
    #[case("2/30seconds", 2, 30)]
    #[case(" 7 / 2 hours ", 7, 7_200)]
    #[case("1/366days", 1, 366 * 86_400)]
    fn test_parse_rule(#[case] input: &str, #[case] limit: u64, #[case] secs: u64) {
        let rule = RateRule::parse(input).unwrap();
        assert_eq!(rule, RateRule::new(limit, Duration::from_secs(secs)));
    }

    #[rstest]
    #[case("")]
    #[case("5")]
    #[case("five/minute")]
    #[case("0/minute")]
    #[case("5/0minutes")]
    #[case("5/fortnight")]
    #[case("5/10")]
    #[case("1/10000000000000000000seconds")]
    #[case("1/999999999999999999days")]
    #[case("1/367days")]
    fn test_parse_rule_rejects(#[case] input: &str) {
        assert!(matches!(RateRule::parse(input), Err(AppError::Config(_))));
    }

    #[tokio::test]
    async fn test_sixth_request_in_window_is_rejected() {
        let limiter = limiter(5, Duration::from_secs(60));
        let start = Instant::now();

        for i in 0..5 {
            let decision = limiter
                .check_at("login", "10.0.0.1", start + Duration::from_secs(i))
                .await
                .unwrap()
                .unwrap();
            assert_eq!(decision.remaining, 4 - i);
        }

        let rejected = limiter
            .check_at("login", "10.0.0.1", start + Duration::from_millis(5_500))
            .await;
        match rejected {
            Err(AppError::RateLimited { retry_after }) => assert_eq!(retry_after, 55),
            other => panic!("expected RateLimited, got {other:?}"),
        }

        let after_window = limiter
            .check_at("login", "10.0.0.1", start + Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(after_window.map(|d| d.remaining), Some(4));
    }

    #[tokio::test]
    async fn test_clients_do_not_share_budget() {
        let limiter = limiter(1, Duration::from_secs(60));
        let now = Instant::now();

        assert!(limiter.check_at("login", "a", now).await.is_ok());
        assert!(limiter.check_at("login", "a", now).await.is_err());
        assert!(limiter.check_at("login", "b", now).await.is_ok());
    }

    #[tokio::test]
    async fn test_unlisted_route_is_not_limited() {
        let limiter = limiter(1, Duration::from_secs(60));

        for _ in 0..10 {
            assert_eq!(limiter.check("stats", "a").await.unwrap(), None);
        }
        assert_eq!(limiter.count("stats", "a").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_retry_after_is_at_least_one_second() {
        let limiter = limiter(1, Duration::from_secs(1));
        let start = Instant::now();

        limiter.check_at("login", "a", start).await.unwrap();
        let rejected = limiter
            .check_at("login", "a", start + Duration::from_millis(999))
            .await;

        assert!(matches!(
            rejected,
            Err(AppError::RateLimited { retry_after: 1 })
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_are_not_lost() {
        let limiter = limiter(10_000, Duration::from_secs(3_600));
        let tasks = 500;

        let handles: Vec<_> = (0..tasks)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move { limiter.check("login", "shared").await })
            })
            .collect();

        for result in futures::future::join_all(handles).await {
            result.unwrap().unwrap();
        }

        assert_eq!(limiter.count("login", "shared").await.unwrap(), tasks);
    }

    #[test]
    fn test_retry_after_rounding() {
        assert_eq!(retry_after_secs(Duration::ZERO), 1);
        assert_eq!(retry_after_secs(Duration::from_millis(1)), 1);
        assert_eq!(retry_after_secs(Duration::from_secs(30)), 30);
        assert_eq!(retry_after_secs(Duration::from_millis(30_001)), 31);
    }
}
