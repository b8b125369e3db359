pub mod auction_service;
pub mod auth_service;
pub mod bid_service;
pub mod finalizer;
pub mod wallet_service;

pub use auction_service::AuctionService;
pub use auth_service::AuthService;
pub use bid_service::BidService;
pub use finalizer::Finalizer;
pub use wallet_service::WalletService;
