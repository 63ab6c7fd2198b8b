use sea_orm_migration::prelude::*;

use crate::m20250601_000001_create_user_tables::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 搜索会话表
        manager
            .create_table(
                Table::create()
                    .table(Searches::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Searches::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Searches::Title).string_len(255).not_null())
                    .col(ColumnDef::new(Searches::Ip).string_len(255).not_null())
                    .col(ColumnDef::new(Searches::UserId).integer().not_null())
                    .col(ColumnDef::new(Searches::CreatedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Searches::UpdatedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Searches::DeletedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_searches_user")
                            .from(Searches::Table, Searches::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_searches_user_id")
                    .table(Searches::Table)
                    .col(Searches::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_searches_deleted_at")
                    .table(Searches::Table)
                    .col(Searches::DeletedAt)
                    .to_owned(),
            )
            .await?;

        // 回答表，随搜索会话级联删除
        manager
            .create_table(
                Table::create()
                    .table(Responses::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Responses::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Responses::SearchId).integer().not_null())
                    .col(ColumnDef::new(Responses::Question).string_len(255).not_null())
                    .col(ColumnDef::new(Responses::Details).text().not_null())
                    .col(ColumnDef::new(Responses::RelatedQuestions).json().not_null())
                    .col(ColumnDef::new(Responses::Images).json().not_null())
                    .col(ColumnDef::new(Responses::Charts).json().not_null())
                    .col(
                        ColumnDef::new(Responses::IsRelatedQuestion)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Responses::CreatedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Responses::UpdatedAt).timestamp_with_time_zone().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_responses_search")
                            .from(Responses::Table, Responses::SearchId)
                            .to(Searches::Table, Searches::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_responses_search_id")
                    .table(Responses::Table)
                    .col(Responses::SearchId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Responses::Table).to_owned())
            .await?;
        manager.drop_table(Table::drop().table(Searches::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum Searches {
    Table,
    Id,
    Title,
    Ip,
    UserId,
    CreatedAt,
    UpdatedAt,
    DeletedAt,
}

#[derive(DeriveIden)]
enum Responses {
    Table,
    Id,
    SearchId,
    Question,
    Details,
    RelatedQuestions,
    Images,
    Charts,
    IsRelatedQuestion,
    CreatedAt,
    UpdatedAt,
}
