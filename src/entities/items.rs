use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

/// A collectible, identified by `(collection_name, num)`. `owner_id` changes
/// only when a finalized round transfers the item to its winning bidder.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub collection_name: String,
    pub num: i32,
    pub value: i64,
    pub owner_id: i64,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
