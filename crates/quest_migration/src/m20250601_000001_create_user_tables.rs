use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 用户表
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Users::Name).string_len(100).not_null())
                    .col(ColumnDef::new(Users::Email).string_len(255).not_null().unique_key())
                    .col(ColumnDef::new(Users::Role).string_len(32).not_null().default("user"))
                    .col(ColumnDef::new(Users::CreatedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Users::UpdatedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Users::DeletedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_users_deleted_at")
                    .table(Users::Table)
                    .col(Users::DeletedAt)
                    .to_owned(),
            )
            .await?;

        // 用户资料表，user_id 唯一保证一对一
        manager
            .create_table(
                Table::create()
                    .table(UserDetails::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserDetails::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(UserDetails::UserId).integer().not_null().unique_key())
                    .col(ColumnDef::new(UserDetails::Address).string_len(255).not_null().default(""))
                    .col(ColumnDef::new(UserDetails::City).string_len(100).not_null().default(""))
                    .col(ColumnDef::new(UserDetails::Road).string_len(100).not_null().default(""))
                    .col(ColumnDef::new(UserDetails::CreatedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(UserDetails::UpdatedAt).timestamp_with_time_zone().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_details_user")
                            .from(UserDetails::Table, UserDetails::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // 图片表，user_detail_id 可为空
        manager
            .create_table(
                Table::create()
                    .table(Images::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Images::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Images::UserDetailId).integer().unique_key())
                    .col(ColumnDef::new(Images::Path).string_len(512).not_null())
                    .col(ColumnDef::new(Images::WebPath).string_len(512).not_null())
                    .col(ColumnDef::new(Images::DiskType).string_len(16).not_null().default("local"))
                    .col(ColumnDef::new(Images::OriginalName).string_len(255).not_null())
                    .col(ColumnDef::new(Images::ModifiedName).string_len(255).not_null())
                    .col(ColumnDef::new(Images::CreatedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Images::UpdatedAt).timestamp_with_time_zone().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_images_user_detail")
                            .from(Images::Table, Images::UserDetailId)
                            .to(UserDetails::Table, UserDetails::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // 第三方账号表
        manager
            .create_table(
                Table::create()
                    .table(SocialProfiles::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SocialProfiles::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SocialProfiles::UserId).integer().not_null())
                    .col(ColumnDef::new(SocialProfiles::Provider).string_len(64).not_null())
                    .col(ColumnDef::new(SocialProfiles::ProviderUserId).string_len(255).not_null())
                    .col(ColumnDef::new(SocialProfiles::ProfileUrl).string_len(512))
                    .col(ColumnDef::new(SocialProfiles::CreatedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(SocialProfiles::UpdatedAt).timestamp_with_time_zone().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_social_profiles_user")
                            .from(SocialProfiles::Table, SocialProfiles::UserId)
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
                    .name("idx_social_profiles_user_id")
                    .table(SocialProfiles::Table)
                    .col(SocialProfiles::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SocialProfiles::Table).to_owned())
            .await?;
        manager.drop_table(Table::drop().table(Images::Table).to_owned()).await?;
        manager
            .drop_table(Table::drop().table(UserDetails::Table).to_owned())
            .await?;
        manager.drop_table(Table::drop().table(Users::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
pub enum Users {
    Table,
    Id,
    Name,
    Email,
    Role,
    CreatedAt,
    UpdatedAt,
    DeletedAt,
}

#[derive(DeriveIden)]
enum UserDetails {
    Table,
    Id,
    UserId,
    Address,
    City,
    Road,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Images {
    Table,
    Id,
    UserDetailId,
    Path,
    WebPath,
    DiskType,
    OriginalName,
    ModifiedName,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum SocialProfiles {
    Table,
    Id,
    UserId,
    Provider,
    ProviderUserId,
    ProfileUrl,
    CreatedAt,
    UpdatedAt,
}
