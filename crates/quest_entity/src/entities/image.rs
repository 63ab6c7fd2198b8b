use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 图片存储位置
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, strum::Display)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DiskType {
    #[sea_orm(string_value = "local")]
    Local,
    #[sea_orm(string_value = "remote")]
    Remote,
}

/// 用户头像等图片记录，user_detail_id 可为空（图片可以脱离资料单独存在）
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "images")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub user_detail_id: Option<i32>,
    /// 磁盘上的实际路径
    pub path: String,
    /// 对外可访问的路径
    pub web_path: String,
    pub disk_type: DiskType,
    pub original_name: String,
    pub modified_name: String,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user_detail::Entity",
        from = "Column::UserDetailId",
        to = "super::user_detail::Column::Id",
        on_delete = "SetNull"
    )]
    UserDetail,
}

impl Related<super::user_detail::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UserDetail.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
