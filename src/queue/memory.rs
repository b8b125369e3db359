use super::messages::{StageMessage, TriggerMessage};
use super::MessageBus;
use crate::error::AppResult;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;

/// Bus for the test harness: records published messages so a driver can pump
/// them through the finalizer by hand, delays included.
#[derive(Default)]
pub struct InMemoryBus {
    triggers: Mutex<VecDeque<(TriggerMessage, Duration)>>,
    stages: Mutex<VecDeque<(StageMessage, Duration)>>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn pop_trigger(&self) -> Option<(TriggerMessage, Duration)> {
        self.triggers.lock().await.pop_front()
    }

    pub async fn pop_stage(&self) -> Option<(StageMessage, Duration)> {
        self.stages.lock().await.pop_front()
    }

    pub async fn stage_count(&self) -> usize {
        self.stages.lock().await.len()
    }
}

#[async_trait]
impl MessageBus for InMemoryBus {
    async fn publish_trigger(&self, msg: &TriggerMessage, delay: Duration) -> AppResult<()> {
        self.triggers.lock().await.push_back((msg.clone(), delay));
        Ok(())
    }

    async fn publish_stage(&self, msg: &StageMessage, delay: Duration) -> AppResult<()> {
        self.stages.lock().await.push_back((msg.clone(), delay));
        Ok(())
    }
}
