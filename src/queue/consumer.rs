use super::messages::{STREAM_STAGE, STREAM_TRIGGER, StageMessage, TriggerMessage};
use super::redis::{Envelope, dead_key, delayed_key, processing_key, ready_key};
use crate::error::{AppError, AppResult};
use crate::services::Finalizer;
use chrono::Utc;
use deadpool_redis::Pool;
use std::sync::Arc;
use std::time::Duration;

const MAX_DELIVERY_ATTEMPTS: u32 = 5;
const RETRY_BASE_MS: u64 = 500;
const RETRY_CAP_MS: u64 = 30_000;

/// Redelivery delay after `attempts` failed deliveries.
fn retry_backoff(attempts: u32) -> Duration {
    let ms = RETRY_BASE_MS.saturating_mul(1u64 << attempts.min(16));
    Duration::from_millis(ms.min(RETRY_CAP_MS))
}

/// Consumes both streams, acknowledging only on success. Anything left on
/// the processing list from a previous run is pushed back to ready at
/// startup; the resulting duplicate deliveries are absorbed by the
/// finalizer's processing-status checks.
pub struct QueueConsumer {
    pool: Pool,
    finalizer: Arc<Finalizer>,
    delay_warning: Duration,
}

impl QueueConsumer {
    pub fn new(pool: Pool, finalizer: Arc<Finalizer>, delay_warning: Duration) -> Self {
        Self {
            pool,
            finalizer,
            delay_warning,
        }
    }

    /// Detach one consumer loop per stream.
    pub fn spawn(self) {
        let this = Arc::new(self);
        for stream in [STREAM_TRIGGER, STREAM_STAGE] {
            let consumer = this.clone();
            tokio::spawn(async move {
                consumer.run(stream).await;
            });
        }
    }

    async fn run(&self, stream: &'static str) {
        if let Err(e) = self.recover_processing(stream).await {
            log::error!("Failed to recover in-flight {stream} messages: {e}");
        }
        log::info!("Queue consumer started for stream {stream}");
        loop {
            if let Err(e) = self.tick(stream).await {
                log::error!("Queue consumer error on stream {stream}: {e}");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }

    async fn recover_processing(&self, stream: &str) -> AppResult<()> {
        let mut conn = self.pool.get().await?;
        let mut recovered = 0usize;
        loop {
            let moved: Option<String> = redis::cmd("LMOVE")
                .arg(processing_key(stream))
                .arg(ready_key(stream))
                .arg("RIGHT")
                .arg("LEFT")
                .query_async(&mut conn)
                .await?;
            if moved.is_none() {
                break;
            }
            recovered += 1;
        }
        if recovered > 0 {
            log::warn!("Requeued {recovered} in-flight messages on stream {stream}");
        }
        Ok(())
    }

    async fn tick(&self, stream: &str) -> AppResult<()> {
        self.promote_due(stream).await?;

        let mut conn = self.pool.get().await?;
        let raw: Option<String> = redis::cmd("BLMOVE")
            .arg(ready_key(stream))
            .arg(processing_key(stream))
            .arg("RIGHT")
            .arg("LEFT")
            .arg(1.0f64)
            .query_async(&mut conn)
            .await?;
        drop(conn);

        match raw {
            Some(raw) => self.dispatch(stream, raw).await,
            None => Ok(()),
        }
    }

    /// Move messages whose delivery time has passed onto the ready list.
    async fn promote_due(&self, stream: &str) -> AppResult<()> {
        let mut conn = self.pool.get().await?;
        let now_ms = Utc::now().timestamp_millis();
        let due: Vec<String> = redis::cmd("ZRANGEBYSCORE")
            .arg(delayed_key(stream))
            .arg("-inf")
            .arg(now_ms)
            .arg("LIMIT")
            .arg(0)
            .arg(16)
            .query_async(&mut conn)
            .await?;

        for raw in due {
            // ZREM returning 1 means this consumer won the promotion race.
            let removed: i64 = redis::cmd("ZREM")
                .arg(delayed_key(stream))
                .arg(&raw)
                .query_async(&mut conn)
                .await?;
            if removed == 1 {
                let _: i64 = redis::cmd("LPUSH")
                    .arg(ready_key(stream))
                    .arg(&raw)
                    .query_async(&mut conn)
                    .await?;
            }
        }
        Ok(())
    }

    async fn dispatch(&self, stream: &str, raw: String) -> AppResult<()> {
        let envelope: Envelope = match serde_json::from_str(&raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                log::error!("Unparseable message on stream {stream}: {e}");
                self.dead_letter(stream, &raw).await?;
                return Ok(());
            }
        };

        let queue_delay = Utc::now() - envelope.published_at;
        if queue_delay.num_milliseconds() > self.delay_warning.as_millis() as i64 {
            log::warn!(
                "Queue delay {}ms on stream {stream} exceeds threshold (message {})",
                queue_delay.num_milliseconds(),
                envelope.id
            );
        }

        let outcome = self.handle(stream, &envelope).await;
        match outcome {
            Ok(()) => self.ack(stream, &raw).await,
            Err(e) if e.is_data_integrity() => {
                log::error!("Dead-lettering message {} on stream {stream}: {e}", envelope.id);
                self.dead_letter(stream, &raw).await
            }
            Err(e) => {
                log::warn!(
                    "Requeueing message {} on stream {stream} (attempt {}): {e}",
                    envelope.id,
                    envelope.attempts + 1
                );
                self.requeue(stream, &raw, envelope).await
            }
        }
    }

    async fn handle(&self, stream: &str, envelope: &Envelope) -> AppResult<()> {
        match stream {
            STREAM_TRIGGER => {
                let msg: TriggerMessage = serde_json::from_value(envelope.payload.clone())
                    .map_err(|e| AppError::DataIntegrity(format!("bad trigger payload: {e}")))?;
                self.finalizer.on_trigger(&msg).await
            }
            STREAM_STAGE => {
                let msg: StageMessage = serde_json::from_value(envelope.payload.clone())
                    .map_err(|e| AppError::DataIntegrity(format!("bad stage payload: {e}")))?;
                self.finalizer.on_stage(&msg).await
            }
            other => Err(AppError::DataIntegrity(format!("unknown stream {other}"))),
        }
    }

    async fn ack(&self, stream: &str, raw: &str) -> AppResult<()> {
        let mut conn = self.pool.get().await?;
        let _: i64 = redis::cmd("LREM")
            .arg(processing_key(stream))
            .arg(1)
            .arg(raw)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn dead_letter(&self, stream: &str, raw: &str) -> AppResult<()> {
        let mut conn = self.pool.get().await?;
        let _: i64 = redis::cmd("LPUSH")
            .arg(dead_key(stream))
            .arg(raw)
            .query_async(&mut conn)
            .await?;
        let _: i64 = redis::cmd("LREM")
            .arg(processing_key(stream))
            .arg(1)
            .arg(raw)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn requeue(&self, stream: &str, raw: &str, mut envelope: Envelope) -> AppResult<()> {
        envelope.attempts += 1;
        if envelope.attempts >= MAX_DELIVERY_ATTEMPTS {
            log::error!(
                "Message {} exhausted its {MAX_DELIVERY_ATTEMPTS} delivery attempts",
                envelope.id
            );
            return self.dead_letter(stream, raw).await;
        }

        let delay = retry_backoff(envelope.attempts);
        let mut conn = self.pool.get().await?;
        let deliver_at = Utc::now().timestamp_millis() + delay.as_millis() as i64;
        let requeued = serde_json::to_string(&envelope)?;
        let _: i64 = redis::cmd("ZADD")
            .arg(delayed_key(stream))
            .arg(deliver_at)
            .arg(&requeued)
            .query_async(&mut conn)
            .await?;
        let _: i64 = redis::cmd("LREM")
            .arg(processing_key(stream))
            .arg(1)
            .arg(raw)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_backoff_doubles_and_caps() {
        assert_eq!(retry_backoff(1), Duration::from_millis(1_000));
        assert_eq!(retry_backoff(2), Duration::from_millis(2_000));
        assert_eq!(retry_backoff(4), Duration::from_millis(8_000));
        assert_eq!(retry_backoff(10), Duration::from_millis(30_000));
    }
}
