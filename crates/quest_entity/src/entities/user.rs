use sea_orm::entity::prelude::*;

/// 用户实体，deleted_at 非空即视为已软删除
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    #[sea_orm(unique)]
    pub email: String,
    pub role: String,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    pub deleted_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::user_detail::Entity")]
    UserDetail,
    #[sea_orm(has_many = "super::social_profile::Entity")]
    SocialProfile,
    #[sea_orm(has_many = "super::search::Entity")]
    Search,
}

impl Related<super::user_detail::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UserDetail.def()
    }
}

impl Related<super::social_profile::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SocialProfile.def()
    }
}

impl Related<super::search::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Search.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
