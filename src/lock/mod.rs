//! Distributed lock service used to serialize conflicting operations across
//! horizontally scaled API and worker processes.
//!
//! A lock is a `(key, token, expiry)` tuple in the backing cache. Mutual
//! exclusion holds as long as the critical section completes within the TTL;
//! holders that may outlive the TTL rely on the database transaction as the
//! second line of defense.

pub mod memory;
pub mod redis;

use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

pub use self::memory::InProcessLockService;
pub use self::redis::RedisLockService;

const BACKOFF_BASE_MS: u64 = 50;
const BACKOFF_FACTOR: f64 = 1.5;
const BACKOFF_CAP_MS: u64 = 500;
const BACKOFF_JITTER_MS: i64 = 25;

#[async_trait]
pub trait LockService: Send + Sync {
    /// Try to take the lock once. Returns the holder token on success, `None`
    /// when another holder currently owns the key.
    async fn acquire(&self, key: &str, ttl: Duration) -> AppResult<Option<String>>;

    /// Release the lock if `token` still owns it. Returns `false` when the
    /// lock already expired or was taken over; the caller is expected to have
    /// aborted whatever the lock was protecting.
    async fn release(&self, key: &str, token: &str) -> AppResult<bool>;
}

/// Caller-generated globally unique holder token.
pub fn generate_token() -> String {
    let entropy: u32 = rand::rng().random();
    format!(
        "{}-{:08x}-{}",
        chrono::Utc::now().timestamp_millis(),
        entropy,
        std::process::id()
    )
}

/// Poll delay before the `attempt`-th retry (0-based), with ±jitter applied.
fn backoff_delay(attempt: u32) -> Duration {
    let base = (BACKOFF_BASE_MS as f64) * BACKOFF_FACTOR.powi(attempt as i32);
    let capped = (base as u64).min(BACKOFF_CAP_MS) as i64;
    let jitter = rand::rng().random_range(-BACKOFF_JITTER_MS..=BACKOFF_JITTER_MS);
    Duration::from_millis(capped.saturating_add(jitter).max(1) as u64)
}

/// Acquire with polling retries until `max_wait` elapses.
pub async fn acquire_waiting(
    locks: &dyn LockService,
    key: &str,
    ttl: Duration,
    max_wait: Duration,
) -> AppResult<String> {
    let deadline = Instant::now() + max_wait;
    let mut attempt: u32 = 0;
    loop {
        if let Some(token) = locks.acquire(key, ttl).await? {
            return Ok(token);
        }
        let delay = backoff_delay(attempt);
        if Instant::now() + delay > deadline {
            return Err(AppError::LockUnavailable(key.to_string()));
        }
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

/// Run `f` under the lock, releasing it afterwards even when `f` fails.
pub async fn with_lock<T, F, Fut>(
    locks: &dyn LockService,
    key: &str,
    ttl: Duration,
    max_wait: Duration,
    f: F,
) -> AppResult<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let token = acquire_waiting(locks, key, ttl, max_wait).await?;
    let result = f().await;
    match locks.release(key, &token).await {
        Ok(true) => {}
        Ok(false) => log::warn!("Lock {key} expired before release"),
        Err(e) => log::warn!("Failed to release lock {key}: {e}"),
    }
    result
}

pub fn auction_lock_key(auction_id: i64) -> String {
    format!("auction:{auction_id}")
}

pub fn user_bid_lock_key(user_id: i64) -> String {
    format!("user:{user_id}:bid")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_carries_millis_entropy_and_pid() {
        let token = generate_token();
        let parts: Vec<&str> = token.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert!(parts[0].parse::<i64>().unwrap() > 0);
        assert_eq!(parts[1].len(), 8);
        assert_eq!(parts[2], std::process::id().to_string());
    }

    #[test]
    fn tokens_are_unique() {
        assert_ne!(generate_token(), generate_token());
    }

    #[test]
    fn backoff_grows_to_the_cap() {
        // 50 * 1.5^n, capped at 500, jittered by at most ±25.
        let first = backoff_delay(0).as_millis() as i64;
        assert!((first - 50).abs() <= 25, "first delay was {first}ms");

        let late = backoff_delay(10).as_millis() as i64;
        assert!((late - 500).abs() <= 25, "late delay was {late}ms");
    }

    #[test]
    fn lock_keys() {
        assert_eq!(auction_lock_key(42), "auction:42");
        assert_eq!(user_bid_lock_key(7), "user:7:bid");
    }
}
