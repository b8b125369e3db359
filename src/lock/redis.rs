use super::{LockService, generate_token};
use crate::error::AppResult;
use async_trait::async_trait;
use deadpool_redis::Pool;
use std::time::Duration;

/// Compare-and-delete so a holder never removes a lock stolen after TTL
/// expiry.
const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

pub struct RedisLockService {
    pool: Pool,
}

impl RedisLockService {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LockService for RedisLockService {
    async fn acquire(&self, key: &str, ttl: Duration) -> AppResult<Option<String>> {
        let mut conn = self.pool.get().await?;
        let token = generate_token();

        // Write only when no entry exists.
        let set: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(&token)
            .arg("NX")
            .arg("PX")
            .arg(ttl.as_millis() as u64)
            .query_async(&mut conn)
            .await?;
        if set.is_none() {
            return Ok(None);
        }

        // Re-read and confirm the stored token is ours, guarding against
        // concurrent writers racing the NX.
        let stored: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        if stored.as_deref() == Some(token.as_str()) {
            Ok(Some(token))
        } else {
            Ok(None)
        }
    }

    async fn release(&self, key: &str, token: &str) -> AppResult<bool> {
        let mut conn = self.pool.get().await?;
        let deleted: i64 = redis::Script::new(RELEASE_SCRIPT)
            .key(key)
            .arg(token)
            .invoke_async(&mut conn)
            .await?;
        Ok(deleted == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::acquire_waiting;

    fn test_pool() -> Pool {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into());
        deadpool_redis::Config::from_url(url)
            .create_pool(Some(deadpool_redis::Runtime::Tokio1))
            .unwrap()
    }

    #[tokio::test]
    #[ignore] // Requires running Redis
    async fn acquire_is_exclusive_until_release() {
        let locks = RedisLockService::new(test_pool());
        let ttl = Duration::from_secs(5);

        let token = locks.acquire("test:lock:a", ttl).await.unwrap().unwrap();
        assert!(locks.acquire("test:lock:a", ttl).await.unwrap().is_none());

        assert!(locks.release("test:lock:a", &token).await.unwrap());
        assert!(locks.acquire("test:lock:a", ttl).await.unwrap().is_some());
    }

    #[tokio::test]
    #[ignore] // Requires running Redis
    async fn release_with_foreign_token_is_refused() {
        let locks = RedisLockService::new(test_pool());
        let ttl = Duration::from_secs(5);

        let token = locks.acquire("test:lock:b", ttl).await.unwrap().unwrap();
        assert!(!locks.release("test:lock:b", "not-the-token").await.unwrap());
        assert!(locks.release("test:lock:b", &token).await.unwrap());
    }

    #[tokio::test]
    #[ignore] // Requires running Redis
    async fn waiter_gets_the_lock_after_ttl_expiry() {
        let locks = RedisLockService::new(test_pool());

        locks
            .acquire("test:lock:c", Duration::from_millis(200))
            .await
            .unwrap()
            .unwrap();

        let token = acquire_waiting(
            &locks,
            "test:lock:c",
            Duration::from_secs(5),
            Duration::from_secs(2),
        )
        .await
        .unwrap();
        locks.release("test:lock:c", &token).await.unwrap();
    }
}
