pub mod auction;
pub mod auth;
pub mod bid;
pub mod wallet;

pub use auction::auction_config;
pub use auth::auth_config;
pub use bid::bid_config;
pub use wallet::wallet_config;
