pub mod auctions;
pub mod bids;
pub mod items;
pub mod round_items;
pub mod rounds;
pub mod transactions;
pub mod users;
pub mod wallets;

pub use auctions as auction_entity;
pub use bids as bid_entity;
pub use items as item_entity;
pub use round_items as round_item_entity;
pub use rounds as round_entity;
pub use transactions as transaction_entity;
pub use users as user_entity;
pub use wallets as wallet_entity;

// Re-export enums/types that are shared
pub use auctions::AuctionStatus;
pub use bids::BidStatus;
pub use rounds::{ProcessingStatus, RoundStatus};
pub use transactions::TransactionType;
