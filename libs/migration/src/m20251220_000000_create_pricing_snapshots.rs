use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Append-only catalog: rows are never updated, superseded rows stay for history
        manager
            .create_table(
                Table::create()
                    .table(PricingSnapshots::Table)
                    .if_not_exists()
                    .col(pk_uuid(PricingSnapshots::Id))
                    .col(string_len(PricingSnapshots::Provider, 16).not_null())
                    .col(string_len(PricingSnapshots::ServiceType, 32).not_null())
                    .col(string_len(PricingSnapshots::ServiceName, 100).not_null())
                    .col(string_len(PricingSnapshots::Region, 50).not_null())
                    .col(string_len(PricingSnapshots::InstanceType, 100).not_null())
                    .col(string_len(PricingSnapshots::Unit, 32).not_null())
                    .col(
                        string_len(PricingSnapshots::Currency, 3)
                            .not_null()
                            .default("USD"),
                    )
                    // Prices are scaled integers: amount / 10^scale
                    .col(big_integer_null(PricingSnapshots::PricePerHourAmount))
                    .col(small_integer_null(PricingSnapshots::PricePerHourScale))
                    .col(big_integer_null(PricingSnapshots::PricePerMonthAmount))
                    .col(small_integer_null(PricingSnapshots::PricePerMonthScale))
                    .col(integer_null(PricingSnapshots::Vcpus))
                    .col(double_null(PricingSnapshots::MemoryGb))
                    .col(integer_null(PricingSnapshots::Gpus))
                    .col(date(PricingSnapshots::EffectiveDate).not_null())
                    .col(
                        timestamp_with_time_zone(PricingSnapshots::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // One snapshot per key per day
        manager
            .create_index(
                Index::create()
                    .name("idx_pricing_snapshots_key_date")
                    .table(PricingSnapshots::Table)
                    .col(PricingSnapshots::Provider)
                    .col(PricingSnapshots::ServiceType)
                    .col(PricingSnapshots::ServiceName)
                    .col(PricingSnapshots::Region)
                    .col(PricingSnapshots::InstanceType)
                    .col(PricingSnapshots::EffectiveDate)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Candidate scans filter on the scope and sort by date
        manager
            .create_index(
                Index::create()
                    .name("idx_pricing_snapshots_scope")
                    .table(PricingSnapshots::Table)
                    .col(PricingSnapshots::Provider)
                    .col(PricingSnapshots::ServiceType)
                    .col(PricingSnapshots::Region)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_pricing_snapshots_effective_date")
                    .table(PricingSnapshots::Table)
                    .col(PricingSnapshots::EffectiveDate)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PricingSnapshots::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum PricingSnapshots {
    Table,
    Id,
    Provider,
    ServiceType,
    ServiceName,
    Region,
    InstanceType,
    Unit,
    Currency,
    PricePerHourAmount,
    PricePerHourScale,
    PricePerMonthAmount,
    PricePerMonthScale,
    Vcpus,
    MemoryGb,
    Gpus,
    EffectiveDate,
    CreatedAt,
}
