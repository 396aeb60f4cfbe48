//! Create post metrics table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PostMetrics::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PostMetrics::PostId)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PostMetrics::ViewsCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(PostMetrics::LikesCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(PostMetrics::CommentsCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(PostMetrics::SharesCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(PostMetrics::PopularityScore)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(PostMetrics::TrendingScore)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(PostMetrics::LastUpdated)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_post_metrics_post")
                            .from(PostMetrics::Table, PostMetrics::PostId)
                            .to(Post::Table, Post::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: popularity_score (popular-unseen recommendations)
        manager
            .create_index(
                Index::create()
                    .name("idx_post_metrics_popularity_score")
                    .table(PostMetrics::Table)
                    .col(PostMetrics::PopularityScore)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PostMetrics::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum PostMetrics {
    Table,
    PostId,
    ViewsCount,
    LikesCount,
    CommentsCount,
    SharesCount,
    PopularityScore,
    TrendingScore,
    LastUpdated,
}

#[derive(Iden)]
enum Post {
    Table,
    Id,
}
