use crate::entities::{
    AuctionStatus, ProcessingStatus, RoundStatus, auction_entity as auctions, bid_entity as bids,
    item_entity as items, round_entity as rounds, round_item_entity as round_items,
    user_entity as users, wallet_entity as wallets,
};
use crate::error::{AppError, AppResult};
use crate::models::{
    AuctionResponse, BidResponse, CreateAuctionRequest, PageQuery, Paginated, RoundResponse,
};
use crate::queue::{MessageBus, TriggerMessage};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AuctionService {
    pool: DatabaseConnection,
    bus: Arc<dyn MessageBus>,
}

impl AuctionService {
    pub fn new(pool: DatabaseConnection, bus: Arc<dyn MessageBus>) -> Self {
        Self { pool, bus }
    }

    /// Admin path: create an auction with its ordered rounds and item lists,
    /// then schedule one delayed round-end trigger per round.
    pub async fn create_auction(&self, request: CreateAuctionRequest) -> AppResult<AuctionResponse> {
        if request.rounds.is_empty() {
            return Err(AppError::Validation("auction needs at least one round".into()));
        }
        for round in &request.rounds {
            if round.end_time <= round.start_time {
                return Err(AppError::Validation("round end must be after its start".into()));
            }
        }
        if request.settings.antisniping_secs < 0
            || request.settings.min_bid < 0
            || request.settings.min_bid_difference < 0
        {
            return Err(AppError::Validation("auction settings must be non-negative".into()));
        }

        let txn = self.pool.begin().await?;
        let now = Utc::now();

        let seller = users::Entity::find_by_id(request.seller_id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("seller {}", request.seller_id)))?;
        let seller_wallet = wallets::Entity::find()
            .filter(wallets::Column::UserId.eq(seller.id))
            .one(&txn)
            .await?
            .ok_or(AppError::NoSuchWallet(seller.id))?;

        let auction = auctions::ActiveModel {
            name: Set(request.name.clone()),
            status: Set(AuctionStatus::Active),
            seller_id: Set(seller.id),
            seller_wallet_id: Set(seller_wallet.id),
            antisniping_secs: Set(request.settings.antisniping_secs),
            min_bid: Set(request.settings.min_bid),
            min_bid_difference: Set(request.settings.min_bid_difference),
            created_at: Set(Some(now)),
            updated_at: Set(Some(now)),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        for (idx, round_req) in request.rounds.iter().enumerate() {
            let processing = if round_req.start_time <= now {
                ProcessingStatus::Active
            } else {
                ProcessingStatus::Pending
            };
            let round = rounds::ActiveModel {
                auction_id: Set(auction.id),
                idx: Set(idx as i32),
                start_time: Set(round_req.start_time),
                end_time: Set(round_req.end_time),
                status: Set(RoundStatus::Active),
                processing_status: Set(processing),
                created_at: Set(Some(now)),
                updated_at: Set(Some(now)),
                ..Default::default()
            }
            .insert(&txn)
            .await?;

            for key in &round_req.items {
                let item = items::Entity::find()
                    .filter(items::Column::CollectionName.eq(key.collection_name.clone()))
                    .filter(items::Column::Num.eq(key.num))
                    .one(&txn)
                    .await?
                    .ok_or_else(|| {
                        AppError::NotFound(format!("item {}#{}", key.collection_name, key.num))
                    })?;
                if item.owner_id != seller.id {
                    return Err(AppError::Validation(format!(
                        "item {}#{} does not belong to the seller",
                        key.collection_name, key.num
                    )));
                }
                round_items::ActiveModel {
                    round_id: Set(round.id),
                    item_id: Set(item.id),
                    ..Default::default()
                }
                .insert(&txn)
                .await?;
            }
        }

        txn.commit().await?;

        for round_req in &request.rounds {
            let delay = (round_req.end_time - Utc::now()).to_std().unwrap_or_default();
            let trigger = TriggerMessage::new(auction.id);
            if let Err(e) = self.bus.publish_trigger(&trigger, delay).await {
                log::warn!("Failed to schedule round-end trigger for auction {}: {e}", auction.id);
            }
        }

        log::info!("Auction created: id={} name={}", auction.id, auction.name);
        self.to_response(&self.pool, auction).await
    }

    pub async fn get_auction(&self, auction_id: i64) -> AppResult<AuctionResponse> {
        let auction = auctions::Entity::find_by_id(auction_id)
            .one(&self.pool)
            .await?
            .ok_or(AppError::NoSuchAuction(auction_id))?;
        self.to_response(&self.pool, auction).await
    }

    pub async fn list_auctions(&self, query: &PageQuery) -> AppResult<Paginated<AuctionResponse>> {
        let total = auctions::Entity::find().count(&self.pool).await?;
        let page = auctions::Entity::find()
            .order_by_desc(auctions::Column::CreatedAt)
            .limit(query.per_page() as u64)
            .offset(query.offset())
            .all(&self.pool)
            .await?;

        let mut responses = Vec::with_capacity(page.len());
        for auction in page {
            responses.push(self.to_response(&self.pool, auction).await?);
        }
        Ok(Paginated::new(responses, query, total))
    }

    pub async fn list_bids(
        &self,
        auction_id: i64,
        query: &PageQuery,
    ) -> AppResult<Paginated<BidResponse>> {
        auctions::Entity::find_by_id(auction_id)
            .one(&self.pool)
            .await?
            .ok_or(AppError::NoSuchAuction(auction_id))?;

        let base = bids::Entity::find().filter(bids::Column::AuctionId.eq(auction_id));
        let total = base.clone().count(&self.pool).await?;
        let page = base
            .order_by_desc(bids::Column::Amount)
            .order_by_asc(bids::Column::CreatedAt)
            .limit(query.per_page() as u64)
            .offset(query.offset())
            .all(&self.pool)
            .await?;

        let responses: Vec<BidResponse> = page.into_iter().map(Into::into).collect();
        Ok(Paginated::new(responses, query, total))
    }

    async fn to_response<C: ConnectionTrait>(
        &self,
        conn: &C,
        auction: auctions::Model,
    ) -> AppResult<AuctionResponse> {
        let round_models = rounds::Entity::find()
            .filter(rounds::Column::AuctionId.eq(auction.id))
            .order_by_asc(rounds::Column::Idx)
            .all(conn)
            .await?;

        let mut round_responses = Vec::with_capacity(round_models.len());
        for round in round_models {
            let item_ids: Vec<i64> = round_items::Entity::find()
                .filter(round_items::Column::RoundId.eq(round.id))
                .all(conn)
                .await?
                .into_iter()
                .map(|link| link.item_id)
                .collect();
            round_responses.push(RoundResponse {
                idx: round.idx,
                start_time: round.start_time,
                end_time: round.end_time,
                status: round.status,
                processing_status: round.processing_status,
                item_ids,
            });
        }

        Ok(AuctionResponse {
            id: auction.id,
            name: auction.name,
            status: auction.status,
            seller_id: auction.seller_id,
            antisniping_secs: auction.antisniping_secs,
            min_bid: auction.min_bid,
            min_bid_difference: auction.min_bid_difference,
            rounds: round_responses,
            created_at: auction.created_at,
        })
    }
}
