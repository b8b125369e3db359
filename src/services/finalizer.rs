use crate::entities::{
    AuctionStatus, BidStatus, ProcessingStatus, RoundStatus, TransactionType,
    auction_entity as auctions, bid_entity as bids, item_entity as items,
    round_entity as rounds, round_item_entity as round_items, transaction_entity as txs,
    wallet_entity as wallets,
};
use crate::error::{AppError, AppResult};
use crate::lock::{self, LockService};
use crate::queue::{FinalizeStage, MessageBus, StageMessage, TriggerMessage};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

const FINALIZE_LOCK_WAIT: Duration = Duration::from_secs(30);

/// Inclusive range of processing-status ranks a stage accepts on entry.
/// A round past the range already ran the stage; a round before it received
/// the stage out of order.
fn entry_bounds(stage: FinalizeStage) -> (u8, u8) {
    match stage {
        FinalizeStage::DetermineWinners => (
            ProcessingStatus::Pending.rank(),
            ProcessingStatus::Active.rank(),
        ),
        FinalizeStage::TransferItems => (
            ProcessingStatus::ProcessingWinners.rank(),
            ProcessingStatus::ProcessingWinners.rank(),
        ),
        FinalizeStage::ProcessPayments => (
            ProcessingStatus::ProcessingTransfers.rank(),
            ProcessingStatus::ProcessingTransfers.rank(),
        ),
        FinalizeStage::RefundLosers | FinalizeStage::Finalize => (
            ProcessingStatus::ProcessingLosers.rank(),
            ProcessingStatus::ProcessingLosers.rank(),
        ),
    }
}

fn next_stage(stage: FinalizeStage, is_last_round: bool) -> Option<FinalizeStage> {
    match stage {
        FinalizeStage::DetermineWinners => Some(FinalizeStage::TransferItems),
        FinalizeStage::TransferItems => Some(FinalizeStage::ProcessPayments),
        FinalizeStage::ProcessPayments => Some(if is_last_round {
            FinalizeStage::RefundLosers
        } else {
            FinalizeStage::Finalize
        }),
        FinalizeStage::RefundLosers => Some(FinalizeStage::Finalize),
        FinalizeStage::Finalize => None,
    }
}

/// Stage to resume from, given a round's persisted watermark.
fn resume_stage(status: ProcessingStatus, is_last_round: bool) -> Option<FinalizeStage> {
    match status {
        ProcessingStatus::Pending | ProcessingStatus::Active => {
            Some(FinalizeStage::DetermineWinners)
        }
        ProcessingStatus::ProcessingWinners => Some(FinalizeStage::TransferItems),
        ProcessingStatus::ProcessingTransfers => Some(FinalizeStage::ProcessPayments),
        ProcessingStatus::ProcessingLosers => Some(if is_last_round {
            FinalizeStage::RefundLosers
        } else {
            FinalizeStage::Finalize
        }),
        ProcessingStatus::Completed | ProcessingStatus::Failed => None,
    }
}

/// Drives ended rounds through the staged finalization pipeline.
///
/// Stage progress is persisted in `rounds.processing_status`, so a crashed or
/// redelivered stage resumes instead of restarting. Every stage whose writes
/// are not naturally idempotent advances that watermark inside its own
/// transaction; replays of a committed stage skip the body and only re-publish
/// the successor.
pub struct Finalizer {
    pool: DatabaseConnection,
    locks: Arc<dyn LockService>,
    bus: Arc<dyn MessageBus>,
    /// Stages are sized to finish well inside this TTL.
    lock_ttl: Duration,
}

impl Finalizer {
    pub fn new(
        pool: DatabaseConnection,
        locks: Arc<dyn LockService>,
        bus: Arc<dyn MessageBus>,
        lock_ttl: Duration,
    ) -> Self {
        Self {
            pool,
            locks,
            bus,
            lock_ttl,
        }
    }

    /// Entry point for `trigger` messages: fan out a DETERMINE_WINNERS stage
    /// for every ended round of the auction. Triggers for auctions no longer
    /// ACTIVE are acknowledged and dropped.
    pub async fn on_trigger(&self, msg: &TriggerMessage) -> AppResult<()> {
        let auction_id = msg.auction_id;
        let key = lock::auction_lock_key(auction_id);
        lock::with_lock(
            self.locks.as_ref(),
            &key,
            self.lock_ttl,
            FINALIZE_LOCK_WAIT,
            || async {
                let auction = auctions::Entity::find_by_id(auction_id)
                    .one(&self.pool)
                    .await?
                    .ok_or_else(|| {
                        AppError::DataIntegrity(format!("trigger for unknown auction {auction_id}"))
                    })?;
                if auction.status != AuctionStatus::Active {
                    log::debug!("Dropping trigger for auction {auction_id}: not active");
                    return Ok(());
                }

                let now = Utc::now();
                let due = rounds::Entity::find()
                    .filter(rounds::Column::AuctionId.eq(auction_id))
                    .filter(rounds::Column::Status.eq(RoundStatus::Active))
                    .filter(rounds::Column::EndTime.lte(now))
                    .order_by_asc(rounds::Column::Idx)
                    .all(&self.pool)
                    .await?;
                for round in due {
                    let stage_msg = StageMessage::new(
                        auction_id,
                        round.idx,
                        FinalizeStage::DetermineWinners,
                    );
                    self.bus.publish_stage(&stage_msg, Duration::ZERO).await?;
                    log::info!(
                        "Scheduled finalization: auction={auction_id} round={}",
                        round.idx
                    );
                }
                Ok(())
            },
        )
        .await
    }

    /// Entry point for `stage` messages.
    pub async fn on_stage(&self, msg: &StageMessage) -> AppResult<()> {
        let key = lock::auction_lock_key(msg.auction_id);
        lock::with_lock(
            self.locks.as_ref(),
            &key,
            self.lock_ttl,
            FINALIZE_LOCK_WAIT,
            || async { self.run_stage(msg).await },
        )
        .await
    }

    async fn run_stage(&self, msg: &StageMessage) -> AppResult<()> {
        let started = Instant::now();
        let auction = auctions::Entity::find_by_id(msg.auction_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| {
                AppError::DataIntegrity(format!("stage for unknown auction {}", msg.auction_id))
            })?;
        let round = rounds::Entity::find()
            .filter(rounds::Column::AuctionId.eq(msg.auction_id))
            .filter(rounds::Column::Idx.eq(msg.round_idx))
            .one(&self.pool)
            .await?
            .ok_or_else(|| {
                AppError::DataIntegrity(format!(
                    "auction {} has no round {}",
                    msg.auction_id, msg.round_idx
                ))
            })?;
        let is_last = self.is_last_round(&self.pool, msg.auction_id, msg.round_idx).await?;

        match round.processing_status {
            ProcessingStatus::Completed => {
                log::debug!(
                    "Dropping stage {}: auction={} round={} already completed",
                    msg.stage,
                    msg.auction_id,
                    msg.round_idx
                );
                return Ok(());
            }
            ProcessingStatus::Failed => {
                return Err(AppError::DataIntegrity(format!(
                    "auction {} round {} is marked failed",
                    msg.auction_id, msg.round_idx
                )));
            }
            _ => {}
        }

        let (entry_min, entry_max) = entry_bounds(msg.stage);
        let rank = round.processing_status.rank();
        if rank > entry_max {
            // The stage already committed but its successor was never
            // published (crash between commit and publish). Re-publish it.
            if let Some(next) = next_stage(msg.stage, is_last) {
                let next_msg = StageMessage::new(msg.auction_id, msg.round_idx, next);
                self.bus.publish_stage(&next_msg, Duration::ZERO).await?;
            }
            return Ok(());
        }
        if rank < entry_min {
            return Err(AppError::DataIntegrity(format!(
                "stage {} delivered out of order for auction {} round {} (status rank {rank})",
                msg.stage, msg.auction_id, msg.round_idx
            )));
        }

        let txn = self.pool.begin().await?;
        match msg.stage {
            FinalizeStage::DetermineWinners => {
                self.determine_winners(&txn, &auction, &round).await?
            }
            FinalizeStage::TransferItems => self.transfer_items(&txn, &auction, &round).await?,
            FinalizeStage::ProcessPayments => self.process_payments(&txn, &auction, &round).await?,
            FinalizeStage::RefundLosers => self.refund_losers(&txn, &auction, &round).await?,
            FinalizeStage::Finalize => self.finalize_round(&txn, &auction, &round, is_last).await?,
        }
        txn.commit().await?;

        log::info!(
            "Stage {} done: auction={} round={} elapsed_ms={}",
            msg.stage,
            msg.auction_id,
            msg.round_idx,
            started.elapsed().as_millis()
        );

        // Enqueue the continuation only after the stage committed; the
        // destination re-checks the watermark, so a duplicate is harmless.
        if let Some(next) = next_stage(msg.stage, is_last) {
            let next_msg = StageMessage::new(msg.auction_id, msg.round_idx, next);
            self.bus.publish_stage(&next_msg, Duration::ZERO).await?;
        }
        Ok(())
    }

    /// Run every ended round of the auction through all stages back-to-back
    /// inside a single transaction. This is the path used when the message
    /// bus is unavailable and by the test harness.
    pub async fn finalize_auction_sync(&self, auction_id: i64) -> AppResult<()> {
        let key = lock::auction_lock_key(auction_id);
        lock::with_lock(
            self.locks.as_ref(),
            &key,
            self.lock_ttl,
            FINALIZE_LOCK_WAIT,
            || async {
                let txn = self.pool.begin().await?;
                let auction = auctions::Entity::find_by_id(auction_id)
                    .one(&txn)
                    .await?
                    .ok_or(AppError::NoSuchAuction(auction_id))?;
                if auction.status != AuctionStatus::Active {
                    return Ok(());
                }

                let now = Utc::now();
                let all_rounds = rounds::Entity::find()
                    .filter(rounds::Column::AuctionId.eq(auction_id))
                    .order_by_asc(rounds::Column::Idx)
                    .all(&txn)
                    .await?;
                let last_idx = all_rounds.last().map(|r| r.idx).ok_or_else(|| {
                    AppError::DataIntegrity(format!("auction {auction_id} has no rounds"))
                })?;

                for round in all_rounds
                    .iter()
                    .filter(|r| r.status == RoundStatus::Active && r.end_time <= now)
                {
                    let is_last = round.idx == last_idx;
                    let mut stage = resume_stage(round.processing_status, is_last);
                    while let Some(current) = stage {
                        match current {
                            FinalizeStage::DetermineWinners => {
                                self.determine_winners(&txn, &auction, round).await?
                            }
                            FinalizeStage::TransferItems => {
                                self.transfer_items(&txn, &auction, round).await?
                            }
                            FinalizeStage::ProcessPayments => {
                                self.process_payments(&txn, &auction, round).await?
                            }
                            FinalizeStage::RefundLosers => {
                                self.refund_losers(&txn, &auction, round).await?
                            }
                            FinalizeStage::Finalize => {
                                self.finalize_round(&txn, &auction, round, is_last).await?
                            }
                        }
                        stage = next_stage(current, is_last);
                    }
                    log::info!("Finalized synchronously: auction={auction_id} round={}", round.idx);
                }

                txn.commit().await?;
                Ok(())
            },
        )
        .await
    }

    async fn is_last_round<C: ConnectionTrait>(
        &self,
        conn: &C,
        auction_id: i64,
        round_idx: i32,
    ) -> AppResult<bool> {
        let last = rounds::Entity::find()
            .filter(rounds::Column::AuctionId.eq(auction_id))
            .order_by_desc(rounds::Column::Idx)
            .one(conn)
            .await?
            .ok_or_else(|| {
                AppError::DataIntegrity(format!("auction {auction_id} has no rounds"))
            })?;
        Ok(last.idx == round_idx)
    }

    async fn advance_processing<C: ConnectionTrait>(
        &self,
        conn: &C,
        round: &rounds::Model,
        status: ProcessingStatus,
    ) -> AppResult<()> {
        let mut round_am = round.clone().into_active_model();
        round_am.processing_status = Set(status);
        round_am.updated_at = Set(Some(Utc::now()));
        round_am.update(conn).await?;
        Ok(())
    }

    /// Items of the round sorted by collectible number ascending; the sort is
    /// the pairing side of the winner ordering rule.
    async fn round_items_sorted<C: ConnectionTrait>(
        &self,
        conn: &C,
        round_id: i64,
    ) -> AppResult<Vec<items::Model>> {
        let links = round_items::Entity::find()
            .filter(round_items::Column::RoundId.eq(round_id))
            .all(conn)
            .await?;
        if links.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i64> = links.iter().map(|l| l.item_id).collect();
        let list = items::Entity::find()
            .filter(items::Column::Id.is_in(ids))
            .order_by_asc(items::Column::Num)
            .all(conn)
            .await?;
        Ok(list)
    }

    /// This round's winners, highest amount first, ties broken by earlier
    /// creation. Stable across retries because the set was stamped with the
    /// round index when winners were determined.
    async fn round_winners_sorted<C: ConnectionTrait>(
        &self,
        conn: &C,
        auction_id: i64,
        round_idx: i32,
    ) -> AppResult<Vec<bids::Model>> {
        let winners = bids::Entity::find()
            .filter(bids::Column::AuctionId.eq(auction_id))
            .filter(bids::Column::Status.eq(BidStatus::Won))
            .filter(bids::Column::WonRoundIdx.eq(round_idx))
            .order_by_desc(bids::Column::Amount)
            .order_by_asc(bids::Column::CreatedAt)
            .all(conn)
            .await?;
        Ok(winners)
    }

    async fn determine_winners<C: ConnectionTrait>(
        &self,
        conn: &C,
        auction: &auctions::Model,
        round: &rounds::Model,
    ) -> AppResult<()> {
        self.advance_processing(conn, round, ProcessingStatus::ProcessingWinners)
            .await?;

        let item_count = round_items::Entity::find()
            .filter(round_items::Column::RoundId.eq(round.id))
            .count(conn)
            .await? as usize;

        let candidates = bids::Entity::find()
            .filter(bids::Column::AuctionId.eq(auction.id))
            .filter(bids::Column::Status.eq(BidStatus::Active))
            .order_by_desc(bids::Column::Amount)
            .order_by_asc(bids::Column::CreatedAt)
            .all(conn)
            .await?;

        let now = Utc::now();
        let winner_count = item_count.min(candidates.len());
        for bid in candidates.into_iter().take(winner_count) {
            let mut bid_am = bid.into_active_model();
            bid_am.status = Set(BidStatus::Won);
            bid_am.won_round_idx = Set(Some(round.idx));
            bid_am.updated_at = Set(Some(now));
            bid_am.update(conn).await?;
        }
        Ok(())
    }

    async fn transfer_items<C: ConnectionTrait>(
        &self,
        conn: &C,
        auction: &auctions::Model,
        round: &rounds::Model,
    ) -> AppResult<()> {
        self.advance_processing(conn, round, ProcessingStatus::ProcessingTransfers)
            .await?;

        let round_items_list = self.round_items_sorted(conn, round.id).await?;
        let winners = self.round_winners_sorted(conn, auction.id, round.idx).await?;

        // Pair by index; items beyond the winner count stay with the seller.
        for (item, bid) in round_items_list.iter().zip(winners.iter()) {
            let mut item_am = item.clone().into_active_model();
            item_am.owner_id = Set(bid.user_id);
            item_am.update(conn).await?;
        }
        Ok(())
    }

    async fn process_payments<C: ConnectionTrait>(
        &self,
        conn: &C,
        auction: &auctions::Model,
        round: &rounds::Model,
    ) -> AppResult<()> {
        // Balance movements are not idempotent, so the watermark advances in
        // the same transaction.
        self.advance_processing(conn, round, ProcessingStatus::ProcessingLosers)
            .await?;

        let winners = self.round_winners_sorted(conn, auction.id, round.idx).await?;
        let now = Utc::now();
        let mut total: i64 = 0;

        for bid in &winners {
            let wallet = wallets::Entity::find()
                .filter(wallets::Column::UserId.eq(bid.user_id))
                .one(conn)
                .await?
                .ok_or(AppError::NoSuchWallet(bid.user_id))?;
            if wallet.balance < bid.amount || wallet.locked_balance < bid.amount {
                return Err(AppError::DataIntegrity(format!(
                    "wallet {} cannot settle winning bid {} of {}",
                    wallet.id, bid.id, bid.amount
                )));
            }

            let mut wallet_am = wallet.clone().into_active_model();
            wallet_am.balance = Set(wallet.balance - bid.amount);
            wallet_am.locked_balance = Set(wallet.locked_balance - bid.amount);
            wallet_am.updated_at = Set(Some(now));
            wallet_am.update(conn).await?;

            txs::ActiveModel {
                from_wallet_id: Set(wallet.id),
                to_wallet_id: Set(Some(auction.seller_wallet_id)),
                amount: Set(bid.amount),
                tx_type: Set(TransactionType::Transfer),
                related_entity_id: Set(Some(auction.id)),
                related_entity_type: Set(Some("auction".to_string())),
                description: Set(Some(format!(
                    "Settlement of auction {} round {}",
                    auction.name, round.idx
                ))),
                created_at: Set(Some(now)),
                ..Default::default()
            }
            .insert(conn)
            .await?;

            total += bid.amount;
        }

        if total > 0 {
            let seller_wallet = wallets::Entity::find_by_id(auction.seller_wallet_id)
                .one(conn)
                .await?
                .ok_or_else(|| {
                    AppError::DataIntegrity(format!(
                        "seller wallet {} of auction {} is missing",
                        auction.seller_wallet_id, auction.id
                    ))
                })?;
            let mut seller_am = seller_wallet.clone().into_active_model();
            seller_am.balance = Set(seller_wallet.balance + total);
            seller_am.updated_at = Set(Some(now));
            seller_am.update(conn).await?;
        }
        Ok(())
    }

    /// Flip every still-ACTIVE bid of the auction to LOST and unlock the
    /// reserved funds. Runs on the last round only; reading ACTIVE bids
    /// before flipping makes a replay a no-op.
    async fn refund_losers<C: ConnectionTrait>(
        &self,
        conn: &C,
        auction: &auctions::Model,
        round: &rounds::Model,
    ) -> AppResult<()> {
        self.advance_processing(conn, round, ProcessingStatus::ProcessingLosers)
            .await?;

        let losers = bids::Entity::find()
            .filter(bids::Column::AuctionId.eq(auction.id))
            .filter(bids::Column::Status.eq(BidStatus::Active))
            .all(conn)
            .await?;

        let now = Utc::now();
        for bid in losers {
            let wallet = wallets::Entity::find()
                .filter(wallets::Column::UserId.eq(bid.user_id))
                .one(conn)
                .await?
                .ok_or(AppError::NoSuchWallet(bid.user_id))?;
            if wallet.locked_balance < bid.amount {
                return Err(AppError::DataIntegrity(format!(
                    "wallet {} cannot release {} for losing bid {}",
                    wallet.id, bid.amount, bid.id
                )));
            }

            let mut wallet_am = wallet.clone().into_active_model();
            wallet_am.locked_balance = Set(wallet.locked_balance - bid.amount);
            wallet_am.updated_at = Set(Some(now));
            wallet_am.update(conn).await?;

            let mut bid_am = bid.into_active_model();
            bid_am.status = Set(BidStatus::Lost);
            bid_am.updated_at = Set(Some(now));
            bid_am.update(conn).await?;
        }
        Ok(())
    }

    async fn finalize_round<C: ConnectionTrait>(
        &self,
        conn: &C,
        auction: &auctions::Model,
        round: &rounds::Model,
        is_last: bool,
    ) -> AppResult<()> {
        let now = Utc::now();
        let mut round_am = round.clone().into_active_model();
        round_am.processing_status = Set(ProcessingStatus::Completed);
        round_am.status = Set(RoundStatus::Ended);
        round_am.updated_at = Set(Some(now));
        round_am.update(conn).await?;

        if is_last {
            let mut auction_am = auction.clone().into_active_model();
            auction_am.status = Set(AuctionStatus::Ended);
            auction_am.updated_at = Set(Some(now));
            auction_am.update(conn).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_order_is_fixed() {
        use FinalizeStage::*;
        assert_eq!(next_stage(DetermineWinners, false), Some(TransferItems));
        assert_eq!(next_stage(TransferItems, false), Some(ProcessPayments));
        assert_eq!(next_stage(ProcessPayments, false), Some(Finalize));
        assert_eq!(next_stage(ProcessPayments, true), Some(RefundLosers));
        assert_eq!(next_stage(RefundLosers, true), Some(Finalize));
        assert_eq!(next_stage(Finalize, true), None);
    }

    #[test]
    fn entry_bounds_follow_the_watermark() {
        let (min, max) = entry_bounds(FinalizeStage::DetermineWinners);
        assert_eq!((min, max), (0, 1));
        let (min, max) = entry_bounds(FinalizeStage::ProcessPayments);
        assert_eq!((min, max), (3, 3));
    }

    #[test]
    fn resume_skips_committed_stages() {
        assert_eq!(
            resume_stage(ProcessingStatus::Pending, false),
            Some(FinalizeStage::DetermineWinners)
        );
        assert_eq!(
            resume_stage(ProcessingStatus::ProcessingTransfers, false),
            Some(FinalizeStage::ProcessPayments)
        );
        assert_eq!(
            resume_stage(ProcessingStatus::ProcessingLosers, true),
            Some(FinalizeStage::RefundLosers)
        );
        assert_eq!(
            resume_stage(ProcessingStatus::ProcessingLosers, false),
            Some(FinalizeStage::Finalize)
        );
        assert_eq!(resume_stage(ProcessingStatus::Completed, true), None);
    }
}
