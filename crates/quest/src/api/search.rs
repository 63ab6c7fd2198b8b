use chrono::Utc;
use quest_entity::response::{ChartList, StringList};
use quest_entity::{response, search};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::{info, warn};

use crate::api::auth::AuthUser;
use crate::api::error::InnerApiError;
use crate::api::response::{ResponseView, SearchView};
use crate::api::wrapper::ApiError;
use crate::utils::ai_gateway::{AiAnswer, AiError, AiGateway, HistoryItem};

/// AI 服务不可用时写入的占位回答
pub const PLACEHOLDER_ANSWER: &str = "An error occurred. Try again later.";

/// 写入数据库的回答内容，始终为完整的值
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerContent {
    pub details: String,
    pub related_questions: Vec<String>,
    pub images: Vec<String>,
    pub charts: ChartList,
}

impl AnswerContent {
    /// 网关失败或回答为空时使用占位内容
    pub fn from_gateway(result: Result<AiAnswer, AiError>) -> Self {
        let answer = result
            .inspect_err(|e| warn!("获取 AI 回答失败，使用占位回答: {}", e))
            .unwrap_or_default();
        let details = if answer.answer_details.is_empty() {
            PLACEHOLDER_ANSWER.to_string()
        } else {
            answer.answer_details
        };
        Self {
            details,
            related_questions: answer.related_questions,
            images: answer.images,
            charts: ChartList(answer.charts),
        }
    }

    fn into_active_model(self, search_id: i32, question: &str, is_related_question: bool) -> response::ActiveModel {
        let now = Utc::now();
        response::ActiveModel {
            search_id: Set(search_id),
            question: Set(question.to_string()),
            details: Set(self.details),
            related_questions: Set(StringList(self.related_questions)),
            images: Set(StringList(self.images)),
            charts: Set(self.charts),
            is_related_question: Set(is_related_question),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
    }
}

/// 用每条回答自身的创建时间构造历史
pub fn history_from_responses(responses: &[response::Model]) -> Vec<HistoryItem> {
    responses
        .iter()
        .map(|r| HistoryItem {
            question: r.question.clone(),
            answer: r.details.clone(),
            timestamp: r.created_at.timestamp(),
        })
        .collect()
}

/// 新建搜索会话，会话与首条回答在同一事务中写入
pub async fn start_topic(
    db: &DatabaseConnection,
    ai: &dyn AiGateway,
    user: &AuthUser,
    ip: &str,
    question: &str,
) -> Result<SearchView, ApiError> {
    let content = AnswerContent::from_gateway(ai.ask(question, &[]).await);

    let txn = db.begin().await?;
    let now = Utc::now();
    let created = search::ActiveModel {
        title: Set(question.to_string()),
        ip: Set(ip.to_string()),
        user_id: Set(user.id),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await
    .map_err(|e| ApiError::internal("Failed to create search").with_details(e.to_string()))?;
    let first = content
        .into_active_model(created.id, question, false)
        .insert(&txn)
        .await
        .map_err(|e| ApiError::internal("Failed to create search").with_details(e.to_string()))?;
    txn.commit()
        .await
        .map_err(|e| ApiError::internal("Failed to create search").with_details(e.to_string()))?;

    info!("用户 {} 创建了搜索会话 {}", user.id, created.id);
    Ok(SearchView::new(created, Some(vec![first])))
}

/// 读取调用者自己的搜索会话：不存在返回 404，属于他人返回 403
pub async fn find_owned_search(
    db: &DatabaseConnection,
    user: &AuthUser,
    search_id: &str,
) -> Result<search::Model, ApiError> {
    let not_found = || ApiError::from(InnerApiError::NotFound("Search not found".to_string()));
    // 非数字的 id 不可能存在
    let id: i32 = search_id.trim().parse().map_err(|_| not_found())?;
    let found = search::Entity::find_by_id(id)
        .filter(search::Column::DeletedAt.is_null())
        .one(db)
        .await?
        .ok_or_else(not_found)?;
    if found.user_id != user.id {
        return Err(InnerApiError::Forbidden("You are not authorized to access this search".to_string()).into());
    }
    Ok(found)
}

pub async fn responses_of(db: &DatabaseConnection, search_id: i32) -> Result<Vec<response::Model>, ApiError> {
    response::Entity::find()
        .filter(response::Column::SearchId.eq(search_id))
        .order_by_asc(response::Column::Id)
        .all(db)
        .await
        .map_err(|e| ApiError::internal("Failed to fetch responses").with_details(e.to_string()))
}

/// 在已有的搜索会话中追加一轮问答
pub async fn append_to_topic(
    db: &DatabaseConnection,
    ai: &dyn AiGateway,
    user: &AuthUser,
    search_id: &str,
    question: &str,
    is_related_question: bool,
) -> Result<ResponseView, ApiError> {
    let existing = find_owned_search(db, user, search_id).await?;
    let history = history_from_responses(&responses_of(db, existing.id).await?);

    let content = AnswerContent::from_gateway(ai.ask(question, &history).await);
    let created = content
        .into_active_model(existing.id, question, is_related_question)
        .insert(db)
        .await
        .map_err(|e| ApiError::internal("Failed to create response").with_details(e.to_string()))?;

    info!("用户 {} 在搜索会话 {} 中追加了回答 {}", user.id, existing.id, created.id);
    Ok(created.into())
}
