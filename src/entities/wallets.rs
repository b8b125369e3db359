use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

/// Custodial wallet. `locked_balance` is the portion reserved against
/// outstanding ACTIVE bids; `locked_balance <= balance` holds after every
/// committed transaction.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "wallets")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: i64,
    pub balance: i64,
    pub locked_balance: i64,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model {
    pub fn available(&self) -> i64 {
        self.balance - self.locked_balance
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
