use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoundStatus {
    #[sea_orm(string_value = "ACTIVE")]
    Active,
    #[sea_orm(string_value = "ENDED")]
    Ended,
    #[sea_orm(string_value = "CANCELLED")]
    Cancelled,
}

/// Finalization watermark of a round. Advances monotonically; a stage whose
/// writes are not naturally idempotent commits its advancement in the same
/// transaction as its effects.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessingStatus {
    #[sea_orm(string_value = "PENDING")]
    Pending,
    #[sea_orm(string_value = "ACTIVE")]
    Active,
    #[sea_orm(string_value = "PROCESSING_WINNERS")]
    ProcessingWinners,
    #[sea_orm(string_value = "PROCESSING_TRANSFERS")]
    ProcessingTransfers,
    #[sea_orm(string_value = "PROCESSING_LOSERS")]
    ProcessingLosers,
    #[sea_orm(string_value = "COMPLETED")]
    Completed,
    #[sea_orm(string_value = "FAILED")]
    Failed,
}

impl ProcessingStatus {
    /// Position in the defined processing order.
    pub fn rank(&self) -> u8 {
        match self {
            ProcessingStatus::Pending => 0,
            ProcessingStatus::Active => 1,
            ProcessingStatus::ProcessingWinners => 2,
            ProcessingStatus::ProcessingTransfers => 3,
            ProcessingStatus::ProcessingLosers => 4,
            ProcessingStatus::Completed => 5,
            ProcessingStatus::Failed => 6,
        }
    }
}

/// A time-bounded sub-auction. The `(auction_id, idx)` pair is the stable
/// identifier used by stage messages.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "rounds")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub auction_id: i64,
    pub idx: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: RoundStatus,
    pub processing_status: ProcessingStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
