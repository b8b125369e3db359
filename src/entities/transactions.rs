use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    #[sea_orm(string_value = "BID")]
    Bid,
    #[sea_orm(string_value = "INCREASE_BID")]
    IncreaseBid,
    #[sea_orm(string_value = "TRANSFER")]
    Transfer,
}

/// Append-only ledger entry. A null `to_wallet_id` records a balance lock
/// rather than a transfer.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub from_wallet_id: i64,
    pub to_wallet_id: Option<i64>,
    pub amount: i64,
    pub tx_type: TransactionType,
    pub related_entity_id: Option<i64>,
    pub related_entity_type: Option<String>,
    pub description: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
