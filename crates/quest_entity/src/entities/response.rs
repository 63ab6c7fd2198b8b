use sea_orm::entity::prelude::*;
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 字符串数组，以 JSON 形式存储
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct StringList(pub Vec<String>);

/// 图表对象数组，每项为任意键值对象
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct ChartList(pub Vec<Map<String, Value>>);

/// 搜索会话中的一轮 AI 回答
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "responses")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub search_id: i32,
    pub question: String,
    #[sea_orm(column_type = "Text")]
    pub details: String,
    #[sea_orm(column_type = "Json")]
    pub related_questions: StringList,
    #[sea_orm(column_type = "Json")]
    pub images: StringList,
    #[sea_orm(column_type = "Json")]
    pub charts: ChartList,
    pub is_related_question: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::search::Entity",
        from = "Column::SearchId",
        to = "super::search::Column::Id",
        on_delete = "Cascade"
    )]
    Search,
}

impl Related<super::search::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Search.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
