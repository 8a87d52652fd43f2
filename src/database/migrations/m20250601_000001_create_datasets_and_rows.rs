use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        create_datasets_table(manager).await?;
        create_rows_table(manager).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Rows::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Datasets::Table).to_owned())
            .await?;
        Ok(())
    }
}

async fn create_datasets_table(manager: &SchemaManager<'_>) -> Result<(), DbErr> {
    manager
        .create_table(
            Table::create()
                .table(Datasets::Table)
                .if_not_exists()
                .col(
                    ColumnDef::new(Datasets::Id)
                        .integer()
                        .not_null()
                        .auto_increment()
                        .primary_key(),
                )
                .col(ColumnDef::new(Datasets::Name).string().not_null())
                .col(
                    ColumnDef::new(Datasets::CreatedAt)
                        .timestamp_with_time_zone()
                        .not_null(),
                )
                .to_owned(),
        )
        .await?;

    manager
        .create_index(
            Index::create()
                .name("idx_datasets_created_at")
                .table(Datasets::Table)
                .col(Datasets::CreatedAt)
                .to_owned(),
        )
        .await
}

async fn create_rows_table(manager: &SchemaManager<'_>) -> Result<(), DbErr> {
    manager
        .create_table(
            Table::create()
                .table(Rows::Table)
                .if_not_exists()
                .col(
                    ColumnDef::new(Rows::Id)
                        .integer()
                        .not_null()
                        .auto_increment()
                        .primary_key(),
                )
                .col(ColumnDef::new(Rows::DatasetId).integer().not_null())
                .col(ColumnDef::new(Rows::Data).json().not_null())
                .foreign_key(
                    ForeignKey::create()
                        .name("fk_rows_dataset")
                        .from(Rows::Table, Rows::DatasetId)
                        .to(Datasets::Table, Datasets::Id)
                        .on_delete(ForeignKeyAction::Cascade),
                )
                .to_owned(),
        )
        .await?;

    manager
        .create_index(
            Index::create()
                .name("idx_rows_dataset_id")
                .table(Rows::Table)
                .col(Rows::DatasetId)
                .to_owned(),
        )
        .await
}

#[derive(DeriveIden)]
enum Datasets {
    Table,
    Id,
    Name,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Rows {
    Table,
    Id,
    DatasetId,
    Data,
}
