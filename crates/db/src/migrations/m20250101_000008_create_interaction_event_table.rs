//! Create interaction event table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(InteractionEvent::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(InteractionEvent::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(InteractionEvent::UserId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InteractionEvent::InteractionType)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InteractionEvent::ContentType)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(InteractionEvent::ContentId).big_integer())
                    .col(ColumnDef::new(InteractionEvent::ContentMeta).string_len(256))
                    .col(ColumnDef::new(InteractionEvent::Score).double().not_null())
                    .col(
                        ColumnDef::new(InteractionEvent::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: (user_id, created_at) - per-user history and preference window
        manager
            .create_index(
                Index::create()
                    .name("idx_interaction_event_user_id_created_at")
                    .table(InteractionEvent::Table)
                    .col(InteractionEvent::UserId)
                    .col(InteractionEvent::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // Index: (content_type, content_id, interaction_type) - view/share counts
        manager
            .create_index(
                Index::create()
                    .name("idx_interaction_event_content")
                    .table(InteractionEvent::Table)
                    .col(InteractionEvent::ContentType)
                    .col(InteractionEvent::ContentId)
                    .col(InteractionEvent::InteractionType)
                    .to_owned(),
            )
            .await?;

        // Index: created_at (retention purge)
        manager
            .create_index(
                Index::create()
                    .name("idx_interaction_event_created_at")
                    .table(InteractionEvent::Table)
                    .col(InteractionEvent::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(InteractionEvent::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum InteractionEvent {
    Table,
    Id,
    UserId,
    InteractionType,
    ContentType,
    ContentId,
    ContentMeta,
    Score,
    CreatedAt,
}
