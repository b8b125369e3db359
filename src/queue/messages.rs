use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const STREAM_TRIGGER: &str = "trigger";
pub const STREAM_STAGE: &str = "stage";

/// Asks the finalizer to look at an auction whose round may have ended.
/// Duplicates are harmless; the finalizer re-checks preconditions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerMessage {
    pub id: Uuid,
    pub auction_id: i64,
    pub published_at: DateTime<Utc>,
}

impl TriggerMessage {
    pub fn new(auction_id: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            auction_id,
            published_at: Utc::now(),
        }
    }
}

/// Continuation for one stage of one round's finalization pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageMessage {
    pub id: Uuid,
    pub auction_id: i64,
    pub round_idx: i32,
    pub stage: FinalizeStage,
    pub published_at: DateTime<Utc>,
}

impl StageMessage {
    pub fn new(auction_id: i64, round_idx: i32, stage: FinalizeStage) -> Self {
        Self {
            id: Uuid::new_v4(),
            auction_id,
            round_idx,
            stage,
            published_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FinalizeStage {
    DetermineWinners,
    TransferItems,
    ProcessPayments,
    RefundLosers,
    Finalize,
}

impl FinalizeStage {
    pub fn name(&self) -> &'static str {
        match self {
            FinalizeStage::DetermineWinners => "DETERMINE_WINNERS",
            FinalizeStage::TransferItems => "TRANSFER_ITEMS",
            FinalizeStage::ProcessPayments => "PROCESS_PAYMENTS",
            FinalizeStage::RefundLosers => "REFUND_LOSERS",
            FinalizeStage::Finalize => "FINALIZE",
        }
    }
}

impl std::fmt::Display for FinalizeStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
