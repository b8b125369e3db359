use crate::models::{CreateAuctionRequest, PageQuery};
use crate::services::AuctionService;
use actix_web::{HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/auctions",
    tag = "auctions",
    params(
        ("page" = Option<u32>, Query, description = "Page number"),
        ("per_page" = Option<u32>, Query, description = "Page size")
    ),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Paginated auctions with their rounds"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_auctions(
    auction_service: web::Data<AuctionService>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse> {
    match auction_service.list_auctions(&query).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "status": "ok",
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/auctions/{auction_id}",
    tag = "auctions",
    params(("auction_id" = i64, Path, description = "Auction id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Auction with rounds", body = crate::models::AuctionResponse),
        (status = 404, description = "No such auction")
    )
)]
pub async fn get_auction(
    auction_service: web::Data<AuctionService>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    match auction_service.get_auction(path.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "status": "ok",
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/auctions",
    tag = "auctions",
    request_body = CreateAuctionRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Auction created and round-end triggers scheduled"),
        (status = 400, description = "Invalid rounds or settings"),
        (status = 404, description = "Seller or item not found")
    )
)]
pub async fn create_auction(
    auction_service: web::Data<AuctionService>,
    request: web::Json<CreateAuctionRequest>,
) -> Result<HttpResponse> {
    match auction_service.create_auction(request.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "status": "ok",
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn auction_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auctions")
            .route("", web::get().to(list_auctions))
            .route("", web::post().to(create_auction))
            .route("/{auction_id}", web::get().to(get_auction)),
    );
}
