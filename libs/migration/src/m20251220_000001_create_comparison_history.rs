use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ComparisonHistory::Table)
                    .if_not_exists()
                    .col(pk_uuid(ComparisonHistory::Id))
                    .col(big_integer(ComparisonHistory::TemplateId).not_null())
                    .col(string_len(ComparisonHistory::Region, 50).not_null())
                    .col(
                        json_binary(ComparisonHistory::Overrides)
                            .not_null()
                            .default("{}"),
                    )
                    .col(date(ComparisonHistory::AsOf).not_null())
                    // Monthly totals in cents; null when the provider was unavailable
                    .col(big_integer_null(ComparisonHistory::AwsTotal))
                    .col(big_integer_null(ComparisonHistory::AzureTotal))
                    .col(big_integer_null(ComparisonHistory::GcpTotal))
                    .col(string_len_null(ComparisonHistory::CheapestProvider, 16))
                    .col(big_integer_null(ComparisonHistory::MaxSavings))
                    .col(boolean(ComparisonHistory::Complete).not_null())
                    .col(string_len_null(ComparisonHistory::IpAddress, 45))
                    .col(text_null(ComparisonHistory::UserAgent))
                    .col(
                        timestamp_with_time_zone(ComparisonHistory::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_comparison_history_template_id")
                    .table(ComparisonHistory::Table)
                    .col(ComparisonHistory::TemplateId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_comparison_history_created_at")
                    .table(ComparisonHistory::Table)
                    .col(ComparisonHistory::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ComparisonHistory::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ComparisonHistory {
    Table,
    Id,
    TemplateId,
    Region,
    Overrides,
    AsOf,
    AwsTotal,
    AzureTotal,
    GcpTotal,
    CheapestProvider,
    MaxSavings,
    Complete,
    IpAddress,
    UserAgent,
    CreatedAt,
}
