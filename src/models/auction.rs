use crate::entities::{AuctionStatus, ProcessingStatus, RoundStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct AuctionSettings {
    /// Anti-sniping window in seconds; 0 disables the extension.
    #[serde(default)]
    pub antisniping_secs: i64,
    #[serde(default)]
    pub min_bid: i64,
    #[serde(default)]
    pub min_bid_difference: i64,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ItemKey {
    pub collection_name: String,
    pub num: i32,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateRoundRequest {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Items sold in this round, identified by `(collection_name, num)`.
    pub items: Vec<ItemKey>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateAuctionRequest {
    pub name: String,
    pub seller_id: i64,
    #[serde(default)]
    pub settings: AuctionSettings,
    pub rounds: Vec<CreateRoundRequest>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoundResponse {
    pub idx: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: RoundStatus,
    pub processing_status: ProcessingStatus,
    pub item_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuctionResponse {
    pub id: i64,
    pub name: String,
    pub status: AuctionStatus,
    pub seller_id: i64,
    pub antisniping_secs: i64,
    pub min_bid: i64,
    pub min_bid_difference: i64,
    pub rounds: Vec<RoundResponse>,
    pub created_at: Option<DateTime<Utc>>,
}
