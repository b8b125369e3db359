use super::{LockService, generate_token};
use crate::error::AppResult;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Lock service for single-process deployments and the test harness. Keeps
/// the same acquire/release semantics as the Redis implementation, including
/// TTL takeover.
#[derive(Default)]
pub struct InProcessLockService {
    held: Mutex<HashMap<String, (String, Instant)>>,
}

impl InProcessLockService {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LockService for InProcessLockService {
    async fn acquire(&self, key: &str, ttl: Duration) -> AppResult<Option<String>> {
        let mut held = self.held.lock().await;
        let now = Instant::now();
        if let Some((_, expiry)) = held.get(key)
            && *expiry > now
        {
            return Ok(None);
        }
        let token = generate_token();
        held.insert(key.to_string(), (token.clone(), now + ttl));
        Ok(Some(token))
    }

    async fn release(&self, key: &str, token: &str) -> AppResult<bool> {
        let mut held = self.held.lock().await;
        match held.get(key) {
            Some((holder, expiry)) if holder == token && *expiry > Instant::now() => {
                held.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
