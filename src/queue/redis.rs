use super::messages::{STREAM_STAGE, STREAM_TRIGGER, StageMessage, TriggerMessage};
use super::MessageBus;
use crate::error::AppResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_redis::Pool;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// On-wire wrapper carrying delivery metadata next to the payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Envelope {
    pub id: Uuid,
    pub attempts: u32,
    pub published_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}

pub(crate) fn delayed_key(stream: &str) -> String {
    format!("mq:{stream}:delayed")
}

pub(crate) fn ready_key(stream: &str) -> String {
    format!("mq:{stream}:ready")
}

pub(crate) fn processing_key(stream: &str) -> String {
    format!("mq:{stream}:processing")
}

pub(crate) fn dead_key(stream: &str) -> String {
    format!("mq:{stream}:dead")
}

/// Publisher half of the bus. Zero-delay messages go straight to the ready
/// list; delayed ones sit in a sorted set scored by their delivery time until
/// a consumer promotes them.
#[derive(Clone)]
pub struct RedisMessageBus {
    pool: Pool,
}

impl RedisMessageBus {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub(crate) async fn publish_envelope(
        &self,
        stream: &str,
        envelope: &Envelope,
        delay: Duration,
    ) -> AppResult<()> {
        let mut conn = self.pool.get().await?;
        let raw = serde_json::to_string(envelope)?;

        if delay.is_zero() {
            let _: i64 = redis::cmd("LPUSH")
                .arg(ready_key(stream))
                .arg(&raw)
                .query_async(&mut conn)
                .await?;
        } else {
            let deliver_at = Utc::now().timestamp_millis() + delay.as_millis() as i64;
            let _: i64 = redis::cmd("ZADD")
                .arg(delayed_key(stream))
                .arg(deliver_at)
                .arg(&raw)
                .query_async(&mut conn)
                .await?;
        }
        Ok(())
    }

    async fn publish(
        &self,
        stream: &str,
        id: Uuid,
        published_at: DateTime<Utc>,
        payload: serde_json::Value,
        delay: Duration,
    ) -> AppResult<()> {
        let envelope = Envelope {
            id,
            attempts: 0,
            published_at,
            payload,
        };
        self.publish_envelope(stream, &envelope, delay).await
    }
}

#[async_trait]
impl MessageBus for RedisMessageBus {
    async fn publish_trigger(&self, msg: &TriggerMessage, delay: Duration) -> AppResult<()> {
        self.publish(
            STREAM_TRIGGER,
            msg.id,
            msg.published_at,
            serde_json::to_value(msg)?,
            delay,
        )
        .await
    }

    async fn publish_stage(&self, msg: &StageMessage, delay: Duration) -> AppResult<()> {
        self.publish(
            STREAM_STAGE,
            msg.id,
            msg.published_at,
            serde_json::to_value(msg)?,
            delay,
        )
        .await
    }
}
