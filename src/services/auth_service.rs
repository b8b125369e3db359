use crate::entities::{user_entity as users, wallet_entity as wallets};
use crate::error::AppResult;
use crate::models::{AuthResponse, TelegramLoginRequest, UserResponse};
use crate::utils::JwtService;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    Set, TransactionTrait,
};

#[derive(Clone)]
pub struct AuthService {
    pool: DatabaseConnection,
    jwt_service: JwtService,
}

impl AuthService {
    pub fn new(pool: DatabaseConnection, jwt_service: JwtService) -> Self {
        Self { pool, jwt_service }
    }

    /// Telegram login. The first login provisions the user and an empty
    /// wallet in one transaction.
    pub async fn login_telegram(&self, request: TelegramLoginRequest) -> AppResult<AuthResponse> {
        let txn = self.pool.begin().await?;

        let existing = users::Entity::find()
            .filter(users::Column::TelegramId.eq(request.telegram_id))
            .one(&txn)
            .await?;

        let user = match existing {
            Some(user) => {
                if request.username.is_some() && request.username != user.username {
                    let mut user_am = user.clone().into_active_model();
                    user_am.username = Set(request.username.clone());
                    user_am.update(&txn).await?
                } else {
                    user
                }
            }
            None => {
                let user = users::ActiveModel {
                    telegram_id: Set(request.telegram_id),
                    username: Set(request.username.clone()),
                    created_at: Set(Some(Utc::now())),
                    ..Default::default()
                }
                .insert(&txn)
                .await?;

                wallets::ActiveModel {
                    user_id: Set(user.id),
                    balance: Set(0),
                    locked_balance: Set(0),
                    created_at: Set(Some(Utc::now())),
                    updated_at: Set(Some(Utc::now())),
                    ..Default::default()
                }
                .insert(&txn)
                .await?;

                log::info!("Provisioned user and wallet for telegram id {}", request.telegram_id);
                user
            }
        };

        txn.commit().await?;

        let token = self.jwt_service.issue_token(user.id)?;
        Ok(AuthResponse {
            token,
            user: UserResponse::from(user),
        })
    }
}
