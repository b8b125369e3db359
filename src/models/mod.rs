pub mod auction;
pub mod bid;
pub mod common;
pub mod user;
pub mod wallet;

pub use auction::{
    AuctionResponse, AuctionSettings, CreateAuctionRequest, CreateRoundRequest, ItemKey,
    RoundResponse,
};
pub use bid::{BidResponse, PlaceBidRequest, PlaceBidResponse};
pub use common::{PageQuery, Paginated};
pub use user::{AuthResponse, TelegramLoginRequest, UserResponse};
pub use wallet::{DepositRequest, TransactionResponse, WalletResponse};
