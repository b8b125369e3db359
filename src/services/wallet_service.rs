use crate::entities::{transaction_entity as txs, wallet_entity as wallets};
use crate::error::{AppError, AppResult};
use crate::models::{PageQuery, Paginated, TransactionResponse, WalletResponse};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};

#[derive(Clone)]
pub struct WalletService {
    pool: DatabaseConnection,
}

impl WalletService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    pub async fn get_wallet(&self, user_id: i64) -> AppResult<WalletResponse> {
        let wallet = wallets::Entity::find()
            .filter(wallets::Column::UserId.eq(user_id))
            .one(&self.pool)
            .await?
            .ok_or(AppError::NoSuchWallet(user_id))?;
        Ok(wallet.into())
    }

    /// Operator provisioning path: credit a wallet's spendable balance.
    pub async fn deposit(&self, user_id: i64, amount: i64) -> AppResult<WalletResponse> {
        if amount <= 0 {
            return Err(AppError::Validation("deposit amount must be positive".into()));
        }

        let txn = self.pool.begin().await?;
        let wallet = wallets::Entity::find()
            .filter(wallets::Column::UserId.eq(user_id))
            .one(&txn)
            .await?
            .ok_or(AppError::NoSuchWallet(user_id))?;

        let mut wallet_am = wallet.clone().into_active_model();
        wallet_am.balance = Set(wallet.balance + amount);
        wallet_am.updated_at = Set(Some(Utc::now()));
        let updated = wallet_am.update(&txn).await?;
        txn.commit().await?;

        log::info!("Deposited {amount} into wallet of user {user_id}");
        Ok(updated.into())
    }

    pub async fn list_transactions(
        &self,
        user_id: i64,
        query: &PageQuery,
    ) -> AppResult<Paginated<TransactionResponse>> {
        let wallet = wallets::Entity::find()
            .filter(wallets::Column::UserId.eq(user_id))
            .one(&self.pool)
            .await?
            .ok_or(AppError::NoSuchWallet(user_id))?;

        let involving_wallet = Condition::any()
            .add(txs::Column::FromWalletId.eq(wallet.id))
            .add(txs::Column::ToWalletId.eq(wallet.id));

        let base = txs::Entity::find().filter(involving_wallet);
        let total = base.clone().count(&self.pool).await?;
        let page = base
            .order_by_desc(txs::Column::CreatedAt)
            .limit(query.per_page() as u64)
            .offset(query.offset())
            .all(&self.pool)
            .await?;

        let responses: Vec<TransactionResponse> = page.into_iter().map(Into::into).collect();
        Ok(Paginated::new(responses, query, total))
    }
}
