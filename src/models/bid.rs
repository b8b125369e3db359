use crate::entities::{BidStatus, bid_entity as bids};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct PlaceBidRequest {
    /// Bid amount in minor units. For a raise this is the new total, not the
    /// increment.
    pub amount: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlaceBidResponse {
    pub amount: i64,
    /// Earliest still-open round end after any anti-sniping adjustment.
    pub new_end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BidResponse {
    pub id: i64,
    pub user_id: i64,
    pub auction_id: i64,
    pub amount: i64,
    pub status: BidStatus,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<bids::Model> for BidResponse {
    fn from(m: bids::Model) -> Self {
        Self {
            id: m.id,
            user_id: m.user_id,
            auction_id: m.auction_id,
            amount: m.amount,
            status: m.status,
            created_at: m.created_at,
        }
    }
}
