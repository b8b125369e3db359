use crate::error::AppError;
use crate::models::{PageQuery, PlaceBidRequest};
use crate::services::{AuctionService, BidService};
use actix_web::{HttpMessage, HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

fn get_user_id_from_request(req: &HttpRequest) -> Option<i64> {
    req.extensions().get::<i64>().copied()
}

#[utoipa::path(
    post,
    path = "/auctions/{auction_id}/bids",
    tag = "bids",
    params(("auction_id" = i64, Path, description = "Auction id")),
    request_body = PlaceBidRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Bid accepted", body = crate::models::PlaceBidResponse),
        (status = 400, description = "Rejected: AmountOutOfRange, BelowMinBid, BelowMinDifference, NotHigher or NotEnough"),
        (status = 409, description = "Rejected: AuctionEnded or RoundExpired"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn place_bid(
    bid_service: web::Data<BidService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<PlaceBidRequest>,
) -> Result<HttpResponse> {
    let Some(user_id) = get_user_id_from_request(&req) else {
        return Ok(AppError::Auth("Missing authenticated user".to_string()).error_response());
    };
    let auction_id = path.into_inner();

    match bid_service.place_bid(user_id, auction_id, request.amount).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "status": "ok",
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/auctions/{auction_id}/bids",
    tag = "bids",
    params(
        ("auction_id" = i64, Path, description = "Auction id"),
        ("page" = Option<u32>, Query, description = "Page number"),
        ("per_page" = Option<u32>, Query, description = "Page size")
    ),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Bids of the auction, highest first"),
        (status = 404, description = "No such auction")
    )
)]
pub async fn list_bids(
    auction_service: web::Data<AuctionService>,
    path: web::Path<i64>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse> {
    match auction_service.list_bids(path.into_inner(), &query).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "status": "ok",
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn bid_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auctions/{auction_id}/bids")
            .route("", web::post().to(place_bid))
            .route("", web::get().to(list_bids)),
    );
}
