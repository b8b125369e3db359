use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    TelegramId,
    Username,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Wallets {
    Table,
    Id,
    UserId,
    Balance,
    LockedBalance,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Items {
    Table,
    Id,
    CollectionName,
    Num,
    Value,
    OwnerId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Auctions {
    Table,
    Id,
    Name,
    Status,
    SellerId,
    SellerWalletId,
    AntisnipingSecs,
    MinBid,
    MinBidDifference,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Rounds {
    Table,
    Id,
    AuctionId,
    Idx,
    StartTime,
    EndTime,
    Status,
    ProcessingStatus,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum RoundItems {
    Table,
    Id,
    RoundId,
    ItemId,
}

#[derive(DeriveIden)]
enum Bids {
    Table,
    Id,
    UserId,
    AuctionId,
    Amount,
    Status,
    WonRoundIdx,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Transactions {
    Table,
    Id,
    FromWalletId,
    ToWalletId,
    Amount,
    TxType,
    RelatedEntityId,
    RelatedEntityType,
    Description,
    CreatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // users
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Users::TelegramId)
                            .big_integer()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Users::Username).string().null())
                    .col(ColumnDef::new(Users::CreatedAt).timestamp_with_time_zone().null())
                    .to_owned(),
            )
            .await?;

        // wallets
        manager
            .create_table(
                Table::create()
                    .table(Wallets::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Wallets::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Wallets::UserId)
                            .big_integer()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Wallets::Balance).big_integer().not_null().default(0))
                    .col(
                        ColumnDef::new(Wallets::LockedBalance)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Wallets::CreatedAt).timestamp_with_time_zone().null())
                    .col(ColumnDef::new(Wallets::UpdatedAt).timestamp_with_time_zone().null())
                    .to_owned(),
            )
            .await?;

        // items
        manager
            .create_table(
                Table::create()
                    .table(Items::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Items::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Items::CollectionName).string().not_null())
                    .col(ColumnDef::new(Items::Num).integer().not_null())
                    .col(ColumnDef::new(Items::Value).big_integer().not_null().default(0))
                    .col(ColumnDef::new(Items::OwnerId).big_integer().not_null())
                    .col(ColumnDef::new(Items::CreatedAt).timestamp_with_time_zone().null())
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_items_collection_num")
                    .table(Items::Table)
                    .col(Items::CollectionName)
                    .col(Items::Num)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // auctions
        manager
            .create_table(
                Table::create()
                    .table(Auctions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Auctions::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Auctions::Name).string().not_null())
                    .col(ColumnDef::new(Auctions::Status).string_len(16).not_null())
                    .col(ColumnDef::new(Auctions::SellerId).big_integer().not_null())
                    .col(ColumnDef::new(Auctions::SellerWalletId).big_integer().not_null())
                    .col(
                        ColumnDef::new(Auctions::AntisnipingSecs)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Auctions::MinBid).big_integer().not_null().default(0))
                    .col(
                        ColumnDef::new(Auctions::MinBidDifference)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Auctions::CreatedAt).timestamp_with_time_zone().null())
                    .col(ColumnDef::new(Auctions::UpdatedAt).timestamp_with_time_zone().null())
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_auctions_status")
                    .table(Auctions::Table)
                    .col(Auctions::Status)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_auctions_seller_status")
                    .table(Auctions::Table)
                    .col(Auctions::SellerId)
                    .col(Auctions::Status)
                    .to_owned(),
            )
            .await?;

        // rounds
        manager
            .create_table(
                Table::create()
                    .table(Rounds::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Rounds::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Rounds::AuctionId).big_integer().not_null())
                    .col(ColumnDef::new(Rounds::Idx).integer().not_null())
                    .col(
                        ColumnDef::new(Rounds::StartTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Rounds::EndTime).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Rounds::Status).string_len(16).not_null())
                    .col(
                        ColumnDef::new(Rounds::ProcessingStatus)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Rounds::CreatedAt).timestamp_with_time_zone().null())
                    .col(ColumnDef::new(Rounds::UpdatedAt).timestamp_with_time_zone().null())
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_rounds_auction_idx")
                    .table(Rounds::Table)
                    .col(Rounds::AuctionId)
                    .col(Rounds::Idx)
                    .unique()
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_rounds_status_end_time")
                    .table(Rounds::Table)
                    .col(Rounds::Status)
                    .col(Rounds::EndTime)
                    .to_owned(),
            )
            .await?;

        // round_items
        manager
            .create_table(
                Table::create()
                    .table(RoundItems::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RoundItems::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(RoundItems::RoundId).big_integer().not_null())
                    .col(ColumnDef::new(RoundItems::ItemId).big_integer().not_null())
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_round_items_round_item")
                    .table(RoundItems::Table)
                    .col(RoundItems::RoundId)
                    .col(RoundItems::ItemId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // bids
        manager
            .create_table(
                Table::create()
                    .table(Bids::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Bids::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Bids::UserId).big_integer().not_null())
                    .col(ColumnDef::new(Bids::AuctionId).big_integer().not_null())
                    .col(ColumnDef::new(Bids::Amount).big_integer().not_null())
                    .col(ColumnDef::new(Bids::Status).string_len(16).not_null())
                    .col(ColumnDef::new(Bids::WonRoundIdx).integer().null())
                    .col(ColumnDef::new(Bids::CreatedAt).timestamp_with_time_zone().null())
                    .col(ColumnDef::new(Bids::UpdatedAt).timestamp_with_time_zone().null())
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_bids_auction_status_amount")
                    .table(Bids::Table)
                    .col(Bids::AuctionId)
                    .col(Bids::Status)
                    .col(Bids::Amount)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_bids_auction_user_status")
                    .table(Bids::Table)
                    .col(Bids::AuctionId)
                    .col(Bids::UserId)
                    .col(Bids::Status)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_bids_user")
                    .table(Bids::Table)
                    .col(Bids::UserId)
                    .to_owned(),
            )
            .await?;

        // transactions
        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Transactions::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Transactions::FromWalletId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::ToWalletId).big_integer().null())
                    .col(ColumnDef::new(Transactions::Amount).big_integer().not_null())
                    .col(ColumnDef::new(Transactions::TxType).string_len(16).not_null())
                    .col(ColumnDef::new(Transactions::RelatedEntityId).big_integer().null())
                    .col(ColumnDef::new(Transactions::RelatedEntityType).string_len(32).null())
                    .col(ColumnDef::new(Transactions::Description).string().null())
                    .col(
                        ColumnDef::new(Transactions::CreatedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_transactions_related_entity")
                    .table(Transactions::Table)
                    .col(Transactions::RelatedEntityId)
                    .col(Transactions::RelatedEntityType)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Bids::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RoundItems::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Rounds::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Auctions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Items::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Wallets::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}
