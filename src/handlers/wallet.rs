use crate::error::AppError;
use crate::models::{DepositRequest, PageQuery};
use crate::services::WalletService;
use actix_web::{HttpMessage, HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

fn get_user_id_from_request(req: &HttpRequest) -> Option<i64> {
    req.extensions().get::<i64>().copied()
}

#[utoipa::path(
    get,
    path = "/wallet",
    tag = "wallet",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Wallet balances", body = crate::models::WalletResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn get_wallet(
    wallet_service: web::Data<WalletService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let Some(user_id) = get_user_id_from_request(&req) else {
        return Ok(AppError::Auth("Missing authenticated user".to_string()).error_response());
    };
    match wallet_service.get_wallet(user_id).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "status": "ok",
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/wallet/deposit",
    tag = "wallet",
    request_body = DepositRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Wallet credited", body = crate::models::WalletResponse),
        (status = 400, description = "Non-positive amount")
    )
)]
pub async fn deposit(
    wallet_service: web::Data<WalletService>,
    req: HttpRequest,
    request: web::Json<DepositRequest>,
) -> Result<HttpResponse> {
    let Some(user_id) = get_user_id_from_request(&req) else {
        return Ok(AppError::Auth("Missing authenticated user".to_string()).error_response());
    };
    match wallet_service.deposit(user_id, request.amount).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "status": "ok",
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/wallet/transactions",
    tag = "wallet",
    params(
        ("page" = Option<u32>, Query, description = "Page number"),
        ("per_page" = Option<u32>, Query, description = "Page size")
    ),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Ledger entries involving the caller's wallet"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_transactions(
    wallet_service: web::Data<WalletService>,
    req: HttpRequest,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse> {
    let Some(user_id) = get_user_id_from_request(&req) else {
        return Ok(AppError::Auth("Missing authenticated user".to_string()).error_response());
    };
    match wallet_service.list_transactions(user_id, &query).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "status": "ok",
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn wallet_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/wallet")
            .route("", web::get().to(get_wallet))
            .route("/deposit", web::post().to(deposit))
            .route("/transactions", web::get().to(list_transactions)),
    );
}
