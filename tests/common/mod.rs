#![allow(dead_code)]

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use gavel_backend::entities::{
    bid_entity as bids, item_entity as items, round_entity as rounds,
    transaction_entity as txs, wallet_entity as wallets,
};
use gavel_backend::lock::{InProcessLockService, LockService};
use gavel_backend::models::{
    AuctionSettings, CreateAuctionRequest, CreateRoundRequest, ItemKey, TelegramLoginRequest,
};
use gavel_backend::queue::{InMemoryBus, MessageBus};
use gavel_backend::services::{
    AuctionService, AuthService, BidService, Finalizer, WalletService,
};
use gavel_backend::utils::JwtService;
use migration::{Migrator, MigratorTrait};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectOptions, Database, DatabaseConnection, EntityTrait,
    IntoActiveModel, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use std::time::Duration;

pub struct TestApp {
    pub db: DatabaseConnection,
    pub bus: Arc<InMemoryBus>,
    pub auth_service: AuthService,
    pub auction_service: AuctionService,
    pub bid_service: BidService,
    pub wallet_service: WalletService,
    pub finalizer: Finalizer,
}

pub async fn spawn_app() -> TestApp {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1).sqlx_logging(false);
    let db = Database::connect(options).await.unwrap();
    Migrator::up(&db, None).await.unwrap();

    let locks: Arc<dyn LockService> = Arc::new(InProcessLockService::new());
    let bus = Arc::new(InMemoryBus::new());
    let bus_dyn: Arc<dyn MessageBus> = bus.clone();

    TestApp {
        db: db.clone(),
        bus: bus.clone(),
        auth_service: AuthService::new(db.clone(), JwtService::new("test-secret", 3600)),
        auction_service: AuctionService::new(db.clone(), bus_dyn.clone()),
        bid_service: BidService::new(
            db.clone(),
            locks.clone(),
            bus_dyn.clone(),
            Duration::from_secs(30),
        ),
        wallet_service: WalletService::new(db.clone()),
        finalizer: Finalizer::new(db, locks, bus_dyn, Duration::from_secs(60)),
    }
}

impl TestApp {
    /// Provision a user with a funded wallet, returning the user id.
    pub async fn seed_user(&self, telegram_id: i64, balance: i64) -> i64 {
        let auth = self
            .auth_service
            .login_telegram(TelegramLoginRequest {
                telegram_id,
                username: Some(format!("user{telegram_id}")),
            })
            .await
            .unwrap();
        if balance > 0 {
            self.wallet_service.deposit(auth.user.id, balance).await.unwrap();
        }
        auth.user.id
    }

    pub async fn seed_item(&self, owner_id: i64, collection: &str, num: i32) -> i64 {
        items::ActiveModel {
            collection_name: Set(collection.to_string()),
            num: Set(num),
            value: Set(0),
            owner_id: Set(owner_id),
            created_at: Set(Some(Utc::now())),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .unwrap()
        .id
    }

    /// One-round auction over the given item keys, ending `ends_in` from now.
    pub async fn seed_auction(
        &self,
        seller_id: i64,
        settings: AuctionSettings,
        item_keys: Vec<ItemKey>,
        ends_in: ChronoDuration,
    ) -> i64 {
        let now = Utc::now();
        self.auction_service
            .create_auction(CreateAuctionRequest {
                name: "test auction".to_string(),
                seller_id,
                settings,
                rounds: vec![CreateRoundRequest {
                    start_time: now - ChronoDuration::minutes(1),
                    end_time: now + ends_in,
                    items: item_keys,
                }],
            })
            .await
            .unwrap()
            .id
    }

    pub async fn wallet_of(&self, user_id: i64) -> wallets::Model {
        wallets::Entity::find()
            .filter(wallets::Column::UserId.eq(user_id))
            .one(&self.db)
            .await
            .unwrap()
            .unwrap()
    }

    pub async fn bids_of(&self, auction_id: i64) -> Vec<bids::Model> {
        bids::Entity::find()
            .filter(bids::Column::AuctionId.eq(auction_id))
            .order_by_desc(bids::Column::Amount)
            .all(&self.db)
            .await
            .unwrap()
    }

    pub async fn round_of(&self, auction_id: i64, idx: i32) -> rounds::Model {
        rounds::Entity::find()
            .filter(rounds::Column::AuctionId.eq(auction_id))
            .filter(rounds::Column::Idx.eq(idx))
            .one(&self.db)
            .await
            .unwrap()
            .unwrap()
    }

    pub async fn item_by_key(&self, collection: &str, num: i32) -> items::Model {
        items::Entity::find()
            .filter(items::Column::CollectionName.eq(collection))
            .filter(items::Column::Num.eq(num))
            .one(&self.db)
            .await
            .unwrap()
            .unwrap()
    }

    pub async fn transactions_from(&self, wallet_id: i64) -> Vec<txs::Model> {
        txs::Entity::find()
            .filter(txs::Column::FromWalletId.eq(wallet_id))
            .order_by_asc(txs::Column::Id)
            .all(&self.db)
            .await
            .unwrap()
    }

    /// Move a round's end into the past so it becomes eligible for
    /// finalization.
    pub async fn expire_round(&self, auction_id: i64, idx: i32) {
        let round = self.round_of(auction_id, idx).await;
        let mut round_am = round.into_active_model();
        round_am.end_time = Set(Utc::now() - ChronoDuration::seconds(1));
        round_am.update(&self.db).await.unwrap();
    }

    pub async fn set_round_end(&self, auction_id: i64, idx: i32, end_time: DateTime<Utc>) {
        let round = self.round_of(auction_id, idx).await;
        let mut round_am = round.into_active_model();
        round_am.end_time = Set(end_time);
        round_am.update(&self.db).await.unwrap();
    }

    /// Drain the in-memory stage queue through the finalizer, as the queue
    /// consumer would.
    pub async fn pump_stages(&self) {
        while let Some((msg, _delay)) = self.bus.pop_stage().await {
            self.finalizer.on_stage(&msg).await.unwrap();
        }
    }

    /// Assert the universal wallet invariant `0 <= locked <= balance` over
    /// every wallet.
    pub async fn assert_wallet_invariants(&self) {
        let all = wallets::Entity::find().all(&self.db).await.unwrap();
        for wallet in all {
            assert!(
                wallet.locked_balance >= 0 && wallet.locked_balance <= wallet.balance,
                "wallet {} violates 0 <= locked({}) <= balance({})",
                wallet.id,
                wallet.locked_balance,
                wallet.balance
            );
        }
    }

    pub async fn sum_of_balances(&self) -> (i64, i64) {
        let all = wallets::Entity::find().all(&self.db).await.unwrap();
        let balance = all.iter().map(|w| w.balance).sum();
        let locked = all.iter().map(|w| w.locked_balance).sum();
        (balance, locked)
    }
}

pub fn default_settings() -> AuctionSettings {
    AuctionSettings {
        antisniping_secs: 60,
        min_bid: 10,
        min_bid_difference: 5,
    }
}
