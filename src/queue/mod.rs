//! Delayed message bus driving round finalization.
//!
//! Two logical streams are bound: `trigger` carries round-end triggers,
//! `stage` carries per-stage continuations. Messages are persistent and
//! acknowledged only on success; transient failures requeue with a bounded
//! retry budget, data integrity failures dead-letter.

pub mod consumer;
pub mod memory;
pub mod messages;
pub mod redis;

use crate::error::AppResult;
use async_trait::async_trait;
use std::time::Duration;

pub use self::consumer::QueueConsumer;
pub use self::memory::InMemoryBus;
pub use self::messages::{FinalizeStage, STREAM_STAGE, STREAM_TRIGGER, StageMessage, TriggerMessage};
pub use self::redis::RedisMessageBus;

#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publish a round-end trigger, delivered no earlier than `delay` from now.
    async fn publish_trigger(&self, msg: &TriggerMessage, delay: Duration) -> AppResult<()>;

    /// Publish a stage continuation, delivered no earlier than `delay` from now.
    async fn publish_stage(&self, msg: &StageMessage, delay: Duration) -> AppResult<()>;
}
