use chrono::{DateTime, Utc};
use quest_entity::{image, response, search, social_profile, user, user_detail};
use serde::Serialize;
use serde_json::{Map, Value};
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct HelloResponse {
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ImageView {
    pub id: i32,
    pub user_detail_id: Option<i32>,
    pub web_path: String,
    #[schema(value_type = String)]
    pub disk_type: image::DiskType,
    pub original_name: String,
    pub modified_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<image::Model> for ImageView {
    fn from(model: image::Model) -> Self {
        Self {
            id: model.id,
            user_detail_id: model.user_detail_id,
            web_path: model.web_path,
            disk_type: model.disk_type,
            original_name: model.original_name,
            modified_name: model.modified_name,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserDetailView {
    pub id: i32,
    pub user_id: i32,
    pub address: String,
    pub city: String,
    pub road: String,
    pub image: Option<ImageView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserDetailView {
    pub fn new(model: user_detail::Model, image: Option<image::Model>) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            address: model.address,
            city: model.city,
            road: model.road,
            image: image.map(ImageView::from),
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SocialProfileView {
    pub id: i32,
    pub provider: String,
    pub provider_user_id: String,
    pub profile_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<social_profile::Model> for SocialProfileView {
    fn from(model: social_profile::Model) -> Self {
        Self {
            id: model.id,
            provider: model.provider,
            provider_user_id: model.provider_user_id,
            profile_url: model.profile_url,
            created_at: model.created_at,
        }
    }
}

/// 完整的用户资料
#[derive(Debug, Serialize, ToSchema)]
pub struct UserProfile {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub role: String,
    pub user_detail: Option<UserDetailView>,
    pub social_profiles: Vec<SocialProfileView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn new(
        user: user::Model,
        detail: Option<user_detail::Model>,
        image: Option<image::Model>,
        social_profiles: Vec<social_profile::Model>,
    ) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            user_detail: detail.map(|detail| UserDetailView::new(detail, image)),
            social_profiles: social_profiles.into_iter().map(SocialProfileView::from).collect(),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ResponseView {
    pub id: i32,
    pub search_id: i32,
    pub question: String,
    pub details: String,
    pub related_questions: Vec<String>,
    pub images: Vec<String>,
    #[schema(value_type = Vec<Object>)]
    pub charts: Vec<Map<String, Value>>,
    #[serde(rename = "isRelatedQuestion")]
    pub is_related_question: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<response::Model> for ResponseView {
    fn from(model: response::Model) -> Self {
        Self {
            id: model.id,
            search_id: model.search_id,
            question: model.question,
            details: model.details,
            related_questions: model.related_questions.0,
            images: model.images.0,
            charts: model.charts.0,
            is_related_question: model.is_related_question,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SearchView {
    pub id: i32,
    pub title: String,
    pub ip: String,
    pub user_id: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responses: Option<Vec<ResponseView>>,
}

impl SearchView {
    pub fn new(model: search::Model, responses: Option<Vec<response::Model>>) -> Self {
        Self {
            id: model.id,
            title: model.title,
            ip: model.ip,
            user_id: model.user_id,
            created_at: model.created_at,
            updated_at: model.updated_at,
            responses: responses.map(|items| items.into_iter().map(ResponseView::from).collect()),
        }
    }
}

impl From<search::Model> for SearchView {
    fn from(model: search::Model) -> Self {
        Self::new(model, None)
    }
}

/// 提问接口的返回：新会话返回整个会话，追加时返回新的回答
#[derive(Debug, Serialize, ToSchema)]
#[serde(untagged)]
pub enum CreatedAnswer {
    Search(SearchView),
    Response(ResponseView),
}
