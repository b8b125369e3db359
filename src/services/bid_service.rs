use crate::entities::{
    AuctionStatus, BidStatus, RoundStatus, TransactionType, auction_entity as auctions,
    bid_entity as bids, round_entity as rounds, transaction_entity as txs,
    wallet_entity as wallets,
};
use crate::error::{AppError, AppResult};
use crate::lock::{self, LockService};
use crate::models::PlaceBidResponse;
use crate::queue::{MessageBus, TriggerMessage};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

const USER_LOCK_TTL: Duration = Duration::from_secs(15);
const LOCK_MAX_WAIT: Duration = Duration::from_secs(10);
const MAX_BID_AMOUNT: i64 = 1_000_000_000_000;

#[derive(Clone)]
pub struct BidService {
    pool: DatabaseConnection,
    locks: Arc<dyn LockService>,
    bus: Arc<dyn MessageBus>,
    /// TTL of the auction lock; must exceed the worst-case critical section.
    auction_lock_ttl: Duration,
}

impl BidService {
    pub fn new(
        pool: DatabaseConnection,
        locks: Arc<dyn LockService>,
        bus: Arc<dyn MessageBus>,
        auction_lock_ttl: Duration,
    ) -> Self {
        Self {
            pool,
            locks,
            bus,
            auction_lock_ttl,
        }
    }

    /// Place a first bid or raise an existing one.
    ///
    /// Locks are taken in the fixed global order (auction, then user) so bid
    /// placement can never deadlock against finalization or against other
    /// bidders. All wallet, bid and round mutations happen in one database
    /// transaction; a rejection rolls everything back.
    pub async fn place_bid(
        &self,
        user_id: i64,
        auction_id: i64,
        amount: i64,
    ) -> AppResult<PlaceBidResponse> {
        let started = Instant::now();
        if amount <= 0 || amount > MAX_BID_AMOUNT {
            return Err(AppError::AmountOutOfRange);
        }

        let auction_key = lock::auction_lock_key(auction_id);
        let user_key = lock::user_bid_lock_key(user_id);
        let result = lock::with_lock(
            self.locks.as_ref(),
            &auction_key,
            self.auction_lock_ttl,
            LOCK_MAX_WAIT,
            || async {
                lock::with_lock(
                    self.locks.as_ref(),
                    &user_key,
                    USER_LOCK_TTL,
                    LOCK_MAX_WAIT,
                    || async { self.place_bid_locked(user_id, auction_id, amount).await },
                )
                .await
            },
        )
        .await;

        let elapsed_ms = started.elapsed().as_millis();
        match &result {
            Ok((_, extended)) => {
                log::info!(
                    "Bid accepted: auction={auction_id} user={user_id} amount={amount} \
                     extended={extended} elapsed_ms={elapsed_ms}"
                );
            }
            Err(e) => {
                log::info!(
                    "Bid rejected: auction={auction_id} user={user_id} amount={amount} \
                     decision={} elapsed_ms={elapsed_ms}",
                    e.reason()
                );
            }
        }

        let (response, extended) = result?;

        // The original trigger was scheduled for the old end time; after an
        // extension a fresh one is needed. Duplicates are dropped by the
        // finalizer, and the scheduler sweep backstops a lost publish.
        if extended && let Some(new_end) = response.new_end_date {
            let delay = (new_end - Utc::now()).to_std().unwrap_or_default();
            let trigger = TriggerMessage::new(auction_id);
            if let Err(e) = self.bus.publish_trigger(&trigger, delay).await {
                log::warn!("Failed to reschedule round-end trigger for auction {auction_id}: {e}");
            }
        }

        Ok(response)
    }

    async fn place_bid_locked(
        &self,
        user_id: i64,
        auction_id: i64,
        amount: i64,
    ) -> AppResult<(PlaceBidResponse, bool)> {
        let txn = self.pool.begin().await?;
        let now = Utc::now();

        let auction = auctions::Entity::find_by_id(auction_id)
            .one(&txn)
            .await?
            .ok_or(AppError::NoSuchAuction(auction_id))?;
        if auction.status != AuctionStatus::Active {
            return Err(AppError::AuctionEnded);
        }

        let all_rounds = rounds::Entity::find()
            .filter(rounds::Column::AuctionId.eq(auction_id))
            .order_by_asc(rounds::Column::Idx)
            .all(&txn)
            .await?;
        let open_rounds: Vec<&rounds::Model> = all_rounds
            .iter()
            .filter(|r| r.status == RoundStatus::Active)
            .collect();
        if open_rounds.is_empty() || open_rounds.iter().all(|r| r.end_time < now) {
            return Err(AppError::AuctionEnded);
        }
        // A round is biddable strictly before its end time; a bid arriving at
        // the exact end instant is expired.
        if !open_rounds.iter().any(|r| r.end_time > now) {
            return Err(AppError::RoundExpired);
        }

        if amount < auction.min_bid {
            return Err(AppError::BelowMinBid);
        }

        let wallet = wallets::Entity::find()
            .filter(wallets::Column::UserId.eq(user_id))
            .one(&txn)
            .await?
            .ok_or(AppError::NoSuchWallet(user_id))?;

        let prior = bids::Entity::find()
            .filter(bids::Column::AuctionId.eq(auction_id))
            .filter(bids::Column::UserId.eq(user_id))
            .filter(bids::Column::Status.eq(BidStatus::Active))
            .one(&txn)
            .await?;

        match prior {
            Some(prior_bid) => {
                if amount <= prior_bid.amount {
                    return Err(AppError::NotHigher);
                }
                if amount < prior_bid.amount + auction.min_bid_difference {
                    return Err(AppError::BelowMinDifference);
                }
                let delta = amount - prior_bid.amount;
                if wallet.available() < delta {
                    return Err(AppError::NotEnough);
                }

                let mut wallet_am = wallet.clone().into_active_model();
                wallet_am.locked_balance = Set(wallet.locked_balance + delta);
                wallet_am.updated_at = Set(Some(now));
                wallet_am.update(&txn).await?;

                let mut bid_am = prior_bid.into_active_model();
                bid_am.amount = Set(amount);
                bid_am.updated_at = Set(Some(now));
                bid_am.update(&txn).await?;

                txs::ActiveModel {
                    from_wallet_id: Set(wallet.id),
                    to_wallet_id: Set(None),
                    amount: Set(delta),
                    tx_type: Set(TransactionType::IncreaseBid),
                    related_entity_id: Set(Some(auction_id)),
                    related_entity_type: Set(Some("auction".to_string())),
                    description: Set(Some(format!(
                        "Raised bid to {amount} on auction {}",
                        auction.name
                    ))),
                    created_at: Set(Some(now)),
                    ..Default::default()
                }
                .insert(&txn)
                .await?;
            }
            None => {
                if wallet.available() < amount {
                    return Err(AppError::NotEnough);
                }

                let mut wallet_am = wallet.clone().into_active_model();
                wallet_am.locked_balance = Set(wallet.locked_balance + amount);
                wallet_am.updated_at = Set(Some(now));
                wallet_am.update(&txn).await?;

                bids::ActiveModel {
                    user_id: Set(user_id),
                    auction_id: Set(auction_id),
                    amount: Set(amount),
                    status: Set(BidStatus::Active),
                    won_round_idx: Set(None),
                    created_at: Set(Some(now)),
                    updated_at: Set(Some(now)),
                    ..Default::default()
                }
                .insert(&txn)
                .await?;

                txs::ActiveModel {
                    from_wallet_id: Set(wallet.id),
                    to_wallet_id: Set(None),
                    amount: Set(amount),
                    tx_type: Set(TransactionType::Bid),
                    related_entity_id: Set(Some(auction_id)),
                    related_entity_type: Set(Some("auction".to_string())),
                    description: Set(Some(format!(
                        "Placed bid of {amount} on auction {}",
                        auction.name
                    ))),
                    created_at: Set(Some(now)),
                    ..Default::default()
                }
                .insert(&txn)
                .await?;
            }
        }

        // Anti-sniping: push still-open rounds forward, never shorten them.
        let open_now: Vec<&rounds::Model> = open_rounds
            .iter()
            .copied()
            .filter(|r| r.end_time > now)
            .collect();
        let mut end_times: Vec<DateTime<Utc>> = open_now.iter().map(|r| r.end_time).collect();
        let mut extended = false;
        if auction.antisniping_secs > 0 {
            let window = ChronoDuration::seconds(auction.antisniping_secs);
            let adjusted = cascade_end_times(&end_times, now, window);
            for (round, (&old_end, &new_end)) in
                open_now.iter().zip(end_times.iter().zip(adjusted.iter()))
            {
                if new_end != old_end {
                    let mut round_am = (*round).clone().into_active_model();
                    round_am.end_time = Set(new_end);
                    round_am.updated_at = Set(Some(now));
                    round_am.update(&txn).await?;
                    extended = true;
                }
            }
            end_times = adjusted;
        }
        let new_end_date = end_times.into_iter().min();

        txn.commit().await?;

        Ok((PlaceBidResponse { amount, new_end_date }, extended))
    }
}

/// Monotonic anti-sniping cascade over the still-open rounds, in order.
///
/// The first window starts at `now + window`; every round whose end falls
/// inside the running threshold is pushed out to it, and the threshold
/// advances one window per round so back-to-back rounds stay disjoint.
pub(crate) fn cascade_end_times(
    end_times: &[DateTime<Utc>],
    now: DateTime<Utc>,
    window: ChronoDuration,
) -> Vec<DateTime<Utc>> {
    let mut adjusted = Vec::with_capacity(end_times.len());
    let mut threshold = now + window;
    for &end in end_times {
        adjusted.push(if threshold > end { threshold } else { end });
        threshold += window;
    }
    adjusted
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn late_bid_extends_the_round() {
        // Round ends at T+30, anti-sniping 60s, bid arrives at T+25.
        let adjusted = cascade_end_times(&[t(30)], t(25), ChronoDuration::seconds(60));
        assert_eq!(adjusted, vec![t(85)]);

        // A second late bid at T+80 pushes the end to T+140.
        let adjusted = cascade_end_times(&[t(85)], t(80), ChronoDuration::seconds(60));
        assert_eq!(adjusted, vec![t(140)]);
    }

    #[test]
    fn early_bid_never_shortens() {
        let adjusted = cascade_end_times(&[t(3600)], t(0), ChronoDuration::seconds(60));
        assert_eq!(adjusted, vec![t(3600)]);
    }

    #[test]
    fn cascade_pushes_consecutive_rounds() {
        // Two back-to-back rounds ending at T+30 and T+50; a bid at T+25
        // with a 60s window pushes both, keeping them a window apart.
        let adjusted = cascade_end_times(&[t(30), t(50)], t(25), ChronoDuration::seconds(60));
        assert_eq!(adjusted, vec![t(85), t(145)]);
    }

    #[test]
    fn far_rounds_are_left_alone() {
        let adjusted =
            cascade_end_times(&[t(40), t(5000)], t(25), ChronoDuration::seconds(60));
        assert_eq!(adjusted, vec![t(85), t(5000)]);
    }
}
