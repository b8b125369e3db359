mod common;

use chrono::{Duration as ChronoDuration, Utc};
use common::{default_settings, spawn_app};
use gavel_backend::entities::{
    AuctionStatus, BidStatus, ProcessingStatus, RoundStatus, TransactionType,
};
use gavel_backend::models::{
    AuctionSettings, CreateAuctionRequest, CreateRoundRequest, ItemKey,
};
use gavel_backend::queue::{FinalizeStage, StageMessage, TriggerMessage};
use gavel_backend::tasks;

fn key(collection: &str, num: i32) -> ItemKey {
    ItemKey {
        collection_name: collection.into(),
        num,
    }
}

/// Three items, four bidders at 100/200/300/400: the top three win the items
/// in bid order, the lowest is refunded, the seller collects 900.
#[tokio::test]
async fn finalize_sync_settles_winners_and_refunds_losers() {
    let app = spawn_app().await;
    let seller = app.seed_user(1000, 0).await;
    let bidders = [
        app.seed_user(1001, 1000).await,
        app.seed_user(1002, 1000).await,
        app.seed_user(1003, 1000).await,
        app.seed_user(1004, 1000).await,
    ];
    for num in 1..=3 {
        app.seed_item(seller, "gift", num).await;
    }
    let auction = app
        .seed_auction(
            seller,
            default_settings(),
            vec![key("gift", 1), key("gift", 2), key("gift", 3)],
            ChronoDuration::hours(1),
        )
        .await;

    for (bidder, amount) in bidders.iter().zip([100i64, 200, 300, 400]) {
        app.bid_service.place_bid(*bidder, auction, amount).await.unwrap();
    }

    app.expire_round(auction, 0).await;
    app.finalizer.finalize_auction_sync(auction).await.unwrap();

    // Bid statuses: 400, 300, 200 won; 100 lost.
    let bids = app.bids_of(auction).await;
    assert_eq!(
        bids.iter().map(|b| (b.amount, b.status)).collect::<Vec<_>>(),
        vec![
            (400, BidStatus::Won),
            (300, BidStatus::Won),
            (200, BidStatus::Won),
            (100, BidStatus::Lost),
        ]
    );

    // Items by num ascending paired with winners by amount descending.
    assert_eq!(app.item_by_key("gift", 1).await.owner_id, bidders[3]);
    assert_eq!(app.item_by_key("gift", 2).await.owner_id, bidders[2]);
    assert_eq!(app.item_by_key("gift", 3).await.owner_id, bidders[1]);

    // Winner wallets paid exactly their bid; loser fully unlocked.
    for (bidder, paid) in bidders.iter().zip([0i64, 200, 300, 400]) {
        let wallet = app.wallet_of(*bidder).await;
        assert_eq!((wallet.balance, wallet.locked_balance), (1000 - paid, 0));
    }
    assert_eq!(app.wallet_of(seller).await.balance, 900);

    // One TRANSFER ledger entry per winner.
    let seller_wallet = app.wallet_of(seller).await;
    let mut transfers = 0;
    for bidder in &bidders {
        let wallet = app.wallet_of(*bidder).await;
        for tx in app.transactions_from(wallet.id).await {
            if tx.tx_type == TransactionType::Transfer {
                assert_eq!(tx.to_wallet_id, Some(seller_wallet.id));
                transfers += 1;
            }
        }
    }
    assert_eq!(transfers, 3);

    let round = app.round_of(auction, 0).await;
    assert_eq!(round.status, RoundStatus::Ended);
    assert_eq!(round.processing_status, ProcessingStatus::Completed);
    let listed = app.auction_service.get_auction(auction).await.unwrap();
    assert_eq!(listed.status, AuctionStatus::Ended);

    app.assert_wallet_invariants().await;
}

/// The staged pipeline, driven message by message, advances the watermark in
/// order and ends in the same state as the synchronous mode.
#[tokio::test]
async fn staged_pipeline_advances_the_watermark_in_order() {
    let app = spawn_app().await;
    let seller = app.seed_user(1100, 0).await;
    let winner = app.seed_user(1101, 1000).await;
    let loser = app.seed_user(1102, 1000).await;
    app.seed_item(seller, "gift", 1).await;
    let auction = app
        .seed_auction(seller, default_settings(), vec![key("gift", 1)], ChronoDuration::hours(1))
        .await;

    app.bid_service.place_bid(loser, auction, 100).await.unwrap();
    app.bid_service.place_bid(winner, auction, 250).await.unwrap();
    app.expire_round(auction, 0).await;

    app.finalizer
        .on_trigger(&TriggerMessage::new(auction))
        .await
        .unwrap();

    let expected = [
        (FinalizeStage::DetermineWinners, ProcessingStatus::ProcessingWinners),
        (FinalizeStage::TransferItems, ProcessingStatus::ProcessingTransfers),
        (FinalizeStage::ProcessPayments, ProcessingStatus::ProcessingLosers),
        (FinalizeStage::RefundLosers, ProcessingStatus::ProcessingLosers),
        (FinalizeStage::Finalize, ProcessingStatus::Completed),
    ];
    for (stage, watermark) in expected {
        let (msg, _) = app.bus.pop_stage().await.expect("pipeline stalled");
        assert_eq!(msg.stage, stage);
        app.finalizer.on_stage(&msg).await.unwrap();
        assert_eq!(app.round_of(auction, 0).await.processing_status, watermark);
    }
    assert_eq!(app.bus.stage_count().await, 0);

    assert_eq!(app.item_by_key("gift", 1).await.owner_id, winner);
    let winner_wallet = app.wallet_of(winner).await;
    assert_eq!((winner_wallet.balance, winner_wallet.locked_balance), (750, 0));
    let loser_wallet = app.wallet_of(loser).await;
    assert_eq!((loser_wallet.balance, loser_wallet.locked_balance), (1000, 0));
    assert_eq!(app.wallet_of(seller).await.balance, 250);

    app.assert_wallet_invariants().await;
}

/// Duplicate deliveries mid-pipeline and after completion commit no
/// additional changes.
#[tokio::test]
async fn replayed_stages_are_idempotent() {
    let app = spawn_app().await;
    let seller = app.seed_user(1200, 0).await;
    let winner = app.seed_user(1201, 1000).await;
    app.seed_item(seller, "gift", 1).await;
    let auction = app
        .seed_auction(seller, default_settings(), vec![key("gift", 1)], ChronoDuration::hours(1))
        .await;
    app.bid_service.place_bid(winner, auction, 400).await.unwrap();
    app.expire_round(auction, 0).await;

    app.finalizer
        .on_trigger(&TriggerMessage::new(auction))
        .await
        .unwrap();

    // Run the first stage, then deliver it a second time before the rest of
    // the pipeline, as a crashed-and-redelivered consumer would.
    let (first, _) = app.bus.pop_stage().await.unwrap();
    assert_eq!(first.stage, FinalizeStage::DetermineWinners);
    app.finalizer.on_stage(&first).await.unwrap();
    let duplicate = StageMessage::new(auction, 0, FinalizeStage::DetermineWinners);
    app.finalizer.on_stage(&duplicate).await.unwrap();

    app.pump_stages().await;

    // Exactly one winner, paid exactly once.
    let bids = app.bids_of(auction).await;
    assert_eq!(bids.len(), 1);
    assert_eq!(bids[0].status, BidStatus::Won);
    let wallet = app.wallet_of(winner).await;
    assert_eq!((wallet.balance, wallet.locked_balance), (600, 0));
    assert_eq!(app.wallet_of(seller).await.balance, 400);

    let transfers: Vec<_> = app
        .transactions_from(wallet.id)
        .await
        .into_iter()
        .filter(|tx| tx.tx_type == TransactionType::Transfer)
        .collect();
    assert_eq!(transfers.len(), 1);

    // Replaying a stage of a completed round changes nothing.
    let (balance_before, locked_before) = app.sum_of_balances().await;
    let late = StageMessage::new(auction, 0, FinalizeStage::ProcessPayments);
    app.finalizer.on_stage(&late).await.unwrap();
    assert_eq!(app.sum_of_balances().await, (balance_before, locked_before));
    assert_eq!(
        app.round_of(auction, 0).await.processing_status,
        ProcessingStatus::Completed
    );
}

#[tokio::test]
async fn tied_bids_resolve_to_the_earlier_bidder() {
    let app = spawn_app().await;
    let seller = app.seed_user(1300, 0).await;
    let early = app.seed_user(1301, 1000).await;
    let late = app.seed_user(1302, 1000).await;
    app.seed_item(seller, "gift", 1).await;
    let auction = app
        .seed_auction(seller, default_settings(), vec![key("gift", 1)], ChronoDuration::hours(1))
        .await;

    app.bid_service.place_bid(early, auction, 300).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    app.bid_service.place_bid(late, auction, 300).await.unwrap();

    app.expire_round(auction, 0).await;
    app.finalizer.finalize_auction_sync(auction).await.unwrap();

    assert_eq!(app.item_by_key("gift", 1).await.owner_id, early);
    let early_wallet = app.wallet_of(early).await;
    assert_eq!((early_wallet.balance, early_wallet.locked_balance), (700, 0));
    let late_wallet = app.wallet_of(late).await;
    assert_eq!((late_wallet.balance, late_wallet.locked_balance), (1000, 0));
    app.assert_wallet_invariants().await;
}

#[tokio::test]
async fn unsold_items_stay_with_the_seller() {
    let app = spawn_app().await;
    let seller = app.seed_user(1400, 0).await;
    let only_bidder = app.seed_user(1401, 1000).await;
    for num in 1..=3 {
        app.seed_item(seller, "gift", num).await;
    }
    let auction = app
        .seed_auction(
            seller,
            default_settings(),
            vec![key("gift", 1), key("gift", 2), key("gift", 3)],
            ChronoDuration::hours(1),
        )
        .await;

    app.bid_service.place_bid(only_bidder, auction, 500).await.unwrap();
    app.expire_round(auction, 0).await;
    app.finalizer.finalize_auction_sync(auction).await.unwrap();

    assert_eq!(app.item_by_key("gift", 1).await.owner_id, only_bidder);
    assert_eq!(app.item_by_key("gift", 2).await.owner_id, seller);
    assert_eq!(app.item_by_key("gift", 3).await.owner_id, seller);
    assert_eq!(app.wallet_of(seller).await.balance, 500);

    let listed = app.auction_service.get_auction(auction).await.unwrap();
    assert_eq!(listed.status, AuctionStatus::Ended);
}

/// Losers keep their funds locked until the last round of the auction is
/// finalized.
#[tokio::test]
async fn two_round_auction_refunds_only_after_the_last_round() {
    let app = spawn_app().await;
    let seller = app.seed_user(1500, 0).await;
    let bidders = [
        app.seed_user(1501, 1000).await,
        app.seed_user(1502, 1000).await,
        app.seed_user(1503, 1000).await,
    ];
    app.seed_item(seller, "gold", 1).await;
    app.seed_item(seller, "gold", 2).await;

    let now = Utc::now();
    let auction = app
        .auction_service
        .create_auction(CreateAuctionRequest {
            name: "two rounds".into(),
            seller_id: seller,
            settings: AuctionSettings {
                antisniping_secs: 0,
                min_bid: 10,
                min_bid_difference: 0,
            },
            rounds: vec![
                CreateRoundRequest {
                    start_time: now - ChronoDuration::minutes(1),
                    end_time: now + ChronoDuration::hours(1),
                    items: vec![key("gold", 1)],
                },
                CreateRoundRequest {
                    start_time: now + ChronoDuration::hours(1),
                    end_time: now + ChronoDuration::hours(2),
                    items: vec![key("gold", 2)],
                },
            ],
        })
        .await
        .unwrap()
        .id;

    for (bidder, amount) in bidders.iter().zip([100i64, 200, 300]) {
        app.bid_service.place_bid(*bidder, auction, amount).await.unwrap();
    }

    // Round 0 ends: the top bid wins, everyone else stays locked in.
    app.expire_round(auction, 0).await;
    app.finalizer.finalize_auction_sync(auction).await.unwrap();

    assert_eq!(app.item_by_key("gold", 1).await.owner_id, bidders[2]);
    let top = app.wallet_of(bidders[2]).await;
    assert_eq!((top.balance, top.locked_balance), (700, 0));
    let mid = app.wallet_of(bidders[1]).await;
    assert_eq!((mid.balance, mid.locked_balance), (1000, 200));
    let low = app.wallet_of(bidders[0]).await;
    assert_eq!((low.balance, low.locked_balance), (1000, 100));

    let listed = app.auction_service.get_auction(auction).await.unwrap();
    assert_eq!(listed.status, AuctionStatus::Active);
    assert_eq!(listed.rounds[0].status, RoundStatus::Ended);
    assert_eq!(listed.rounds[1].status, RoundStatus::Active);

    // Round 1 ends: second-highest wins the second item, the rest refund.
    app.expire_round(auction, 1).await;
    app.finalizer.finalize_auction_sync(auction).await.unwrap();

    assert_eq!(app.item_by_key("gold", 2).await.owner_id, bidders[1]);
    let mid = app.wallet_of(bidders[1]).await;
    assert_eq!((mid.balance, mid.locked_balance), (800, 0));
    let low = app.wallet_of(bidders[0]).await;
    assert_eq!((low.balance, low.locked_balance), (1000, 0));
    assert_eq!(app.wallet_of(seller).await.balance, 500);

    let listed = app.auction_service.get_auction(auction).await.unwrap();
    assert_eq!(listed.status, AuctionStatus::Ended);
    assert!(
        app.bids_of(auction)
            .await
            .iter()
            .all(|b| b.status != BidStatus::Active)
    );
    app.assert_wallet_invariants().await;
}

#[tokio::test]
async fn scheduler_sweep_republishes_lost_triggers() {
    let app = spawn_app().await;
    let seller = app.seed_user(1600, 0).await;
    let bidder = app.seed_user(1601, 1000).await;
    app.seed_item(seller, "gift", 1).await;
    let auction = app
        .seed_auction(seller, default_settings(), vec![key("gift", 1)], ChronoDuration::hours(1))
        .await;
    app.bid_service.place_bid(bidder, auction, 100).await.unwrap();

    // Drop whatever triggers creation queued, as if they were lost.
    while app.bus.pop_trigger().await.is_some() {}

    app.expire_round(auction, 0).await;
    let published = tasks::sweep_expired_rounds(&app.db, app.bus.as_ref())
        .await
        .unwrap();
    assert_eq!(published, 1);

    let (trigger, _) = app.bus.pop_trigger().await.unwrap();
    assert_eq!(trigger.auction_id, auction);

    // Driving that trigger finalizes the auction.
    app.finalizer.on_trigger(&trigger).await.unwrap();
    app.pump_stages().await;
    let listed = app.auction_service.get_auction(auction).await.unwrap();
    assert_eq!(listed.status, AuctionStatus::Ended);
}
