use crate::entities::{TransactionType, transaction_entity as txs, wallet_entity as wallets};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WalletResponse {
    pub balance: i64,
    pub locked_balance: i64,
    /// Spendable portion, `balance - locked_balance`.
    pub available: i64,
}

impl From<wallets::Model> for WalletResponse {
    fn from(m: wallets::Model) -> Self {
        let available = m.available();
        Self {
            balance: m.balance,
            locked_balance: m.locked_balance,
            available,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct DepositRequest {
    pub amount: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TransactionResponse {
    pub id: i64,
    pub from_wallet_id: i64,
    pub to_wallet_id: Option<i64>,
    pub amount: i64,
    pub tx_type: TransactionType,
    pub description: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<txs::Model> for TransactionResponse {
    fn from(m: txs::Model) -> Self {
        Self {
            id: m.id,
            from_wallet_id: m.from_wallet_id,
            to_wallet_id: m.to_wallet_id,
            amount: m.amount,
            tx_type: m.tx_type,
            description: m.description,
            created_at: m.created_at,
        }
    }
}
