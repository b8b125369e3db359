use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("Cache pool error: {0}")]
    CachePool(#[from] deadpool_redis::PoolError),

    #[error("Lock unavailable: {0}")]
    LockUnavailable(String),

    #[error("Queue unavailable: {0}")]
    QueueUnavailable(String),

    #[error("Bid amount out of range")]
    AmountOutOfRange,

    #[error("Bid below minimum bid")]
    BelowMinBid,

    #[error("Bid below minimum difference over previous bid")]
    BelowMinDifference,

    #[error("Bid not higher than previous bid")]
    NotHigher,

    #[error("Not enough available balance")]
    NotEnough,

    #[error("Auction has ended")]
    AuctionEnded,

    #[error("Round has expired")]
    RoundExpired,

    #[error("Auction {0} not found")]
    NoSuchAuction(i64),

    #[error("Wallet for user {0} not found")]
    NoSuchWallet(i64),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    #[error("Auth error: {0}")]
    Auth(String),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Wire-level reason code, returned verbatim in error responses.
    pub fn reason(&self) -> &'static str {
        match self {
            AppError::AmountOutOfRange => "AmountOutOfRange",
            AppError::BelowMinBid => "BelowMinBid",
            AppError::BelowMinDifference => "BelowMinDifference",
            AppError::NotHigher => "NotHigher",
            AppError::NotEnough => "NotEnough",
            AppError::AuctionEnded => "AuctionEnded",
            AppError::RoundExpired => "RoundExpired",
            AppError::NoSuchAuction(_) => "NoSuchAuction",
            AppError::NoSuchWallet(_) => "NoSuchWallet",
            AppError::NotFound(_) => "NotFound",
            AppError::Validation(_) => "Validation",
            AppError::Auth(_) | AppError::Jwt(_) => "Unauthorized",
            AppError::Database(_)
            | AppError::Cache(_)
            | AppError::CachePool(_)
            | AppError::LockUnavailable(_)
            | AppError::QueueUnavailable(_) => "Transient",
            AppError::DataIntegrity(_) => "DataIntegrity",
            AppError::Json(_) | AppError::Internal(_) => "Internal",
        }
    }

    /// Whether a queue consumer should requeue the message that failed with
    /// this error. Data integrity failures are dead-lettered instead.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            AppError::Database(_)
                | AppError::Cache(_)
                | AppError::CachePool(_)
                | AppError::LockUnavailable(_)
                | AppError::QueueUnavailable(_)
        )
    }

    pub fn is_data_integrity(&self) -> bool {
        matches!(
            self,
            AppError::DataIntegrity(_) | AppError::NoSuchAuction(_) | AppError::NoSuchWallet(_)
        )
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let status_code = match self {
            AppError::AmountOutOfRange
            | AppError::BelowMinBid
            | AppError::BelowMinDifference
            | AppError::NotHigher
            | AppError::NotEnough
            | AppError::Validation(_) => actix_web::http::StatusCode::BAD_REQUEST,
            AppError::AuctionEnded | AppError::RoundExpired => {
                actix_web::http::StatusCode::CONFLICT
            }
            AppError::NoSuchAuction(_) | AppError::NoSuchWallet(_) | AppError::NotFound(_) => {
                actix_web::http::StatusCode::NOT_FOUND
            }
            AppError::Auth(msg) => {
                log::warn!("Authentication error: {msg}");
                actix_web::http::StatusCode::UNAUTHORIZED
            }
            AppError::Jwt(err) => {
                log::warn!("JWT error: {err}");
                actix_web::http::StatusCode::UNAUTHORIZED
            }
            AppError::Database(err) => {
                log::error!("Database error: {err}");
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Cache(_)
            | AppError::CachePool(_)
            | AppError::LockUnavailable(_)
            | AppError::QueueUnavailable(_) => {
                log::error!("Transient infrastructure error: {self}");
                actix_web::http::StatusCode::SERVICE_UNAVAILABLE
            }
            _ => {
                log::error!("Internal error: {self}");
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        HttpResponse::build(status_code).json(json!({
            "status": "error",
            "reason": self.reason()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reject_reasons_match_wire_codes() {
        assert_eq!(AppError::BelowMinBid.reason(), "BelowMinBid");
        assert_eq!(AppError::NotEnough.reason(), "NotEnough");
        assert_eq!(AppError::NoSuchAuction(7).reason(), "NoSuchAuction");
    }

    #[test]
    fn transient_errors_are_retriable() {
        assert!(AppError::LockUnavailable("auction:1".into()).is_retriable());
        assert!(!AppError::DataIntegrity("missing round".into()).is_retriable());
        assert!(!AppError::NotEnough.is_retriable());
    }
}
