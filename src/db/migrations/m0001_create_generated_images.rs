use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(GeneratedImages::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GeneratedImages::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(GeneratedImages::Prompt).text().not_null())
                    .col(
                        ColumnDef::new(GeneratedImages::MimeType)
                            .string()
                            .not_null()
                            .default("image/png"),
                    )
                    .col(ColumnDef::new(GeneratedImages::ImageData).text().null())
                    .col(ColumnDef::new(GeneratedImages::ImageUrl).text().null())
                    .col(ColumnDef::new(GeneratedImages::ProviderId).string().null())
                    .col(
                        ColumnDef::new(GeneratedImages::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_generated_images_created_at")
                    .table(GeneratedImages::Table)
                    .col(GeneratedImages::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(GeneratedImages::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum GeneratedImages {
    Table,
    Id,
    Prompt,
    MimeType,
    ImageData,
    ImageUrl,
    ProviderId,
    CreatedAt,
}
