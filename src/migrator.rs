use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260301_000001_create_ro_orders_table::Migration),
            Box::new(m20260301_000002_create_ro_order_lines_table::Migration),
            Box::new(m20260301_000003_create_ro_fulfillment_tables::Migration),
            Box::new(m20260301_000004_create_ro_sequences_table::Migration),
            Box::new(m20260301_000005_create_stock_collaborator_tables::Migration),
        ]
    }
}

mod m20260301_000001_create_ro_orders_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20260301_000001_create_ro_orders_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Aligned with entities::ro_order Model
            manager
                .create_table(
                    Table::create()
                        .table(RoOrders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(RoOrders::Id)
                                .string()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(RoOrders::StoreName).string().not_null())
                        .col(ColumnDef::new(RoOrders::Notes).text().null())
                        .col(ColumnDef::new(RoOrders::Status).string().not_null())
                        .col(
                            ColumnDef::new(RoOrders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RoOrders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RoOrders::Version)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_ro_orders_status")
                        .table(RoOrders::Table)
                        .col(RoOrders::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_ro_orders_created_at")
                        .table(RoOrders::Table)
                        .col(RoOrders::CreatedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(RoOrders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum RoOrders {
        Table,
        Id,
        StoreName,
        Notes,
        Status,
        CreatedAt,
        UpdatedAt,
        Version,
    }
}

mod m20260301_000002_create_ro_order_lines_table {

    use super::m20260301_000001_create_ro_orders_table::RoOrders;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20260301_000002_create_ro_order_lines_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(RoOrderLines::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(RoOrderLines::OrderId).string().not_null())
                        .col(ColumnDef::new(RoOrderLines::ArticleCode).string().not_null())
                        .col(ColumnDef::new(RoOrderLines::ArticleName).string().null())
                        .col(
                            ColumnDef::new(RoOrderLines::BoxesRequested)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RoOrderLines::BoxesDdd)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(RoOrderLines::BoxesLjbb)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(RoOrderLines::BoxesMbb)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(RoOrderLines::BoxesUbb)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(RoOrderLines::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RoOrderLines::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .primary_key(
                            Index::create()
                                .col(RoOrderLines::OrderId)
                                .col(RoOrderLines::ArticleCode),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_ro_order_lines_order_id")
                                .from(RoOrderLines::Table, RoOrderLines::OrderId)
                                .to(RoOrders::Table, RoOrders::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(RoOrderLines::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum RoOrderLines {
        Table,
        OrderId,
        ArticleCode,
        ArticleName,
        BoxesRequested,
        BoxesDdd,
        BoxesLjbb,
        BoxesMbb,
        BoxesUbb,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20260301_000003_create_ro_fulfillment_tables {

    use super::m20260301_000001_create_ro_orders_table::RoOrders;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20260301_000003_create_ro_fulfillment_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(RoDnpb::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(RoDnpb::OrderId).string().not_null())
                        .col(ColumnDef::new(RoDnpb::Warehouse).string().not_null())
                        .col(ColumnDef::new(RoDnpb::Number).string().not_null())
                        .col(
                            ColumnDef::new(RoDnpb::Matched)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(RoDnpb::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .primary_key(Index::create().col(RoDnpb::OrderId).col(RoDnpb::Warehouse))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_ro_dnpb_order_id")
                                .from(RoDnpb::Table, RoDnpb::OrderId)
                                .to(RoOrders::Table, RoOrders::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(RoReceiptLines::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(RoReceiptLines::OrderId).string().not_null())
                        .col(
                            ColumnDef::new(RoReceiptLines::ArticleCode)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RoReceiptLines::PairsPerBox)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(RoReceiptLines::BoxesDdd).integer().not_null())
                        .col(ColumnDef::new(RoReceiptLines::BoxesLjbb).integer().not_null())
                        .col(ColumnDef::new(RoReceiptLines::BoxesMbb).integer().not_null())
                        .col(ColumnDef::new(RoReceiptLines::BoxesUbb).integer().not_null())
                        .col(
                            ColumnDef::new(RoReceiptLines::PairsShipped)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(RoReceiptLines::Fisik).integer().not_null())
                        .col(
                            ColumnDef::new(RoReceiptLines::Selisih)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(RoReceiptLines::Status).string().not_null())
                        .col(ColumnDef::new(RoReceiptLines::ConfirmedBy).string().null())
                        .col(
                            ColumnDef::new(RoReceiptLines::ConfirmedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(RoReceiptLines::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RoReceiptLines::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .primary_key(
                            Index::create()
                                .col(RoReceiptLines::OrderId)
                                .col(RoReceiptLines::ArticleCode),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_ro_receipt_lines_order_id")
                                .from(RoReceiptLines::Table, RoReceiptLines::OrderId)
                                .to(RoOrders::Table, RoOrders::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_ro_receipt_lines_status")
                        .table(RoReceiptLines::Table)
                        .col(RoReceiptLines::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(RoBandingNotices::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(RoBandingNotices::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(RoBandingNotices::OrderId).string().not_null())
                        .col(ColumnDef::new(RoBandingNotices::RaisedBy).string().not_null())
                        .col(
                            ColumnDef::new(RoBandingNotices::RaisedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(RoBandingNotices::Status).string().not_null())
                        .col(ColumnDef::new(RoBandingNotices::Message).text().not_null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_ro_banding_notices_order_id")
                                .from(RoBandingNotices::Table, RoBandingNotices::OrderId)
                                .to(RoOrders::Table, RoOrders::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(RoStatusHistory::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(RoStatusHistory::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(RoStatusHistory::OrderId).string().not_null())
                        .col(ColumnDef::new(RoStatusHistory::FromStatus).string().null())
                        .col(ColumnDef::new(RoStatusHistory::ToStatus).string().not_null())
                        .col(ColumnDef::new(RoStatusHistory::Actor).string().null())
                        .col(
                            ColumnDef::new(RoStatusHistory::ChangedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_ro_status_history_order_id")
                                .from(RoStatusHistory::Table, RoStatusHistory::OrderId)
                                .to(RoOrders::Table, RoOrders::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_ro_status_history_order_id")
                        .table(RoStatusHistory::Table)
                        .col(RoStatusHistory::OrderId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(RoStatusHistory::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(RoBandingNotices::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(RoReceiptLines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(RoDnpb::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum RoDnpb {
        Table,
        OrderId,
        Warehouse,
        Number,
        Matched,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum RoReceiptLines {
        Table,
        OrderId,
        ArticleCode,
        PairsPerBox,
        BoxesDdd,
        BoxesLjbb,
        BoxesMbb,
        BoxesUbb,
        PairsShipped,
        Fisik,
        Selisih,
        Status,
        ConfirmedBy,
        ConfirmedAt,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum RoBandingNotices {
        Table,
        Id,
        OrderId,
        RaisedBy,
        RaisedAt,
        Status,
        Message,
    }

    #[derive(DeriveIden)]
    enum RoStatusHistory {
        Table,
        Id,
        OrderId,
        FromStatus,
        ToStatus,
        Actor,
        ChangedAt,
    }
}

mod m20260301_000004_create_ro_sequences_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20260301_000004_create_ro_sequences_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // One row per YYMM period; bumped with a single upsert per order
            manager
                .create_table(
                    Table::create()
                        .table(RoSequences::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(RoSequences::Period)
                                .string()
                                .not_null()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(RoSequences::LastSeq)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(RoSequences::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum RoSequences {
        Table,
        Period,
        LastSeq,
    }
}

mod m20260301_000005_create_stock_collaborator_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20260301_000005_create_stock_collaborator_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Owned by the warehouse side; created here so a fresh database is usable
            manager
                .create_table(
                    Table::create()
                        .table(ArticleStock::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ArticleStock::ArticleCode)
                                .string()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(ArticleStock::ArticleName).string().null())
                        .col(
                            ColumnDef::new(ArticleStock::StockDdd)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ArticleStock::StockLjbb)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ArticleStock::StockMbb)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ArticleStock::StockUbb)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ArticleStock::StockTotal)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ArticlePackSizes::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ArticlePackSizes::ArticleCode)
                                .string()
                                .not_null()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(ArticlePackSizes::PairsPerBox)
                                .integer()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(WarehouseTransactions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(WarehouseTransactions::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(WarehouseTransactions::Source)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WarehouseTransactions::ArticleCode)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(WarehouseTransactions::DeliveryNote)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(WarehouseTransactions::Quantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(WarehouseTransactions::RecordedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_warehouse_transactions_source_delivery_note")
                        .table(WarehouseTransactions::Table)
                        .col(WarehouseTransactions::Source)
                        .col(WarehouseTransactions::DeliveryNote)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(WarehouseTransactions::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ArticlePackSizes::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ArticleStock::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum ArticleStock {
        Table,
        ArticleCode,
        ArticleName,
        StockDdd,
        StockLjbb,
        StockMbb,
        StockUbb,
        StockTotal,
    }

    #[derive(DeriveIden)]
    enum ArticlePackSizes {
        Table,
        ArticleCode,
        PairsPerBox,
    }

    #[derive(DeriveIden)]
    enum WarehouseTransactions {
        Table,
        Id,
        Source,
        ArticleCode,
        DeliveryNote,
        Quantity,
        RecordedAt,
    }
}
