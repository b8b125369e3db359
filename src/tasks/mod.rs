//! Background scheduled tasks.
//!
//! The scheduler sweep is the liveness safety net for round finalization: the
//! delayed trigger published at auction creation (or after an anti-sniping
//! extension) normally fires first, but if that message is lost the sweep
//! republishes a zero-delay trigger. Duplicates are dropped by the
//! finalizer's precondition checks.

use crate::entities::{
    AuctionStatus, RoundStatus, auction_entity as auctions, round_entity as rounds,
};
use crate::error::AppResult;
use crate::queue::{MessageBus, TriggerMessage};
use chrono::Utc;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use std::sync::Arc;
use std::time::Duration;

/// Spawn all background tasks. Detaches via `tokio::spawn`; does not block.
pub fn spawn_all(pool: DatabaseConnection, bus: Arc<dyn MessageBus>, interval_ms: u64) {
    tokio::spawn(async move {
        loop {
            match sweep_expired_rounds(&pool, bus.as_ref()).await {
                Ok(n) if n > 0 => log::info!("Scheduler published {n} round-end triggers"),
                Ok(_) => {}
                Err(e) => log::error!("Scheduler sweep failed: {e:?}"),
            }
            tokio::time::sleep(Duration::from_millis(interval_ms)).await;
        }
    });
}

/// Publish a trigger for every ACTIVE auction that has an expired ACTIVE
/// round. Returns the number of triggers published.
pub async fn sweep_expired_rounds(
    pool: &DatabaseConnection,
    bus: &dyn MessageBus,
) -> AppResult<usize> {
    let now = Utc::now();
    let due_rounds = rounds::Entity::find()
        .filter(rounds::Column::Status.eq(RoundStatus::Active))
        .filter(rounds::Column::EndTime.lte(now))
        .all(pool)
        .await?;

    let mut auction_ids: Vec<i64> = due_rounds.iter().map(|r| r.auction_id).collect();
    auction_ids.sort_unstable();
    auction_ids.dedup();
    if auction_ids.is_empty() {
        return Ok(0);
    }

    let active = auctions::Entity::find()
        .filter(auctions::Column::Id.is_in(auction_ids))
        .filter(auctions::Column::Status.eq(AuctionStatus::Active))
        .all(pool)
        .await?;

    let mut published = 0;
    for auction in active {
        bus.publish_trigger(&TriggerMessage::new(auction.id), Duration::ZERO)
            .await?;
        published += 1;
    }
    Ok(published)
}
