use actix_web::web;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::auth::telegram_login,
        crate::handlers::auction::list_auctions,
        crate::handlers::auction::get_auction,
        crate::handlers::auction::create_auction,
        crate::handlers::bid::place_bid,
        crate::handlers::bid::list_bids,
        crate::handlers::wallet::get_wallet,
        crate::handlers::wallet::deposit,
        crate::handlers::wallet::list_transactions,
    ),
    components(schemas(
        crate::models::TelegramLoginRequest,
        crate::models::UserResponse,
        crate::models::AuthResponse,
        crate::models::CreateAuctionRequest,
        crate::models::CreateRoundRequest,
        crate::models::AuctionSettings,
        crate::models::ItemKey,
        crate::models::AuctionResponse,
        crate::models::RoundResponse,
        crate::models::PlaceBidRequest,
        crate::models::PlaceBidResponse,
        crate::models::BidResponse,
        crate::models::WalletResponse,
        crate::models::DepositRequest,
        crate::models::TransactionResponse,
        crate::entities::AuctionStatus,
        crate::entities::RoundStatus,
        crate::entities::ProcessingStatus,
        crate::entities::BidStatus,
        crate::entities::TransactionType,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Telegram login and provisioning"),
        (name = "auctions", description = "Auction admin and read surface"),
        (name = "bids", description = "Bid placement"),
        (name = "wallet", description = "Custodial wallet")
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    );
}
