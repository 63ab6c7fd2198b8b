use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Extension, Multipart, Path, Query};
use axum::http::StatusCode;
use axum::Json;
use quest_entity::search;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Value};
use tracing::debug;
use utoipa::OpenApi;

use crate::api::auth::{AuthUser, OpenAPIAuth};
use crate::api::error::InnerApiError;
use crate::api::profile::{load_profile_graph, update_profile_internal};
use crate::api::request::{AddResponseRequest, ClientIp, SearchListQuery, UpdateProfileRequest};
use crate::api::response::{CreatedAnswer, HelloResponse, ResponseView, SearchView, UserProfile};
use crate::api::search::{append_to_topic, find_owned_search, responses_of, start_topic};
use crate::api::wrapper::{ApiError, ApiResponse};
use crate::config::Config;
use crate::database::{self, HealthStatus};
use crate::utils::ai_gateway::AiGateway;
use crate::utils::pagination::{paginate, ListFilters, PaginationOptions};

#[derive(OpenApi)]
#[openapi(
    paths(health, hello_user, get_profile, update_profile, create_response, get_all_searches, get_search_by_id),
    components(schemas(
        HealthStatus,
        HelloResponse,
        UserProfile,
        SearchView,
        ResponseView,
        CreatedAnswer,
        AddResponseRequest
    )),
    modifiers(&OpenAPIAuth),
    tags((name = "quest", description = "用户资料与 AI 搜索"))
)]
pub struct ApiDoc;

/// 数据库健康检查
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, body = HealthStatus),
        (status = 503, body = HealthStatus),
    )
)]
pub async fn health(Extension(db): Extension<Arc<DatabaseConnection>>) -> (StatusCode, Json<HealthStatus>) {
    let status = database::health(&db).await;
    let code = if status.is_up() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(status))
}

#[utoipa::path(
    get,
    path = "/api/v1/user/hello",
    responses(
        (status = 200, body = ApiResponse<HelloResponse>),
    ),
    security(("Token" = []))
)]
pub async fn hello_user(user: AuthUser) -> ApiResponse<HelloResponse> {
    debug!("用户 {} 访问了 hello 接口", user.email);
    ApiResponse::ok(
        "Hello from user group",
        HelloResponse {
            message: format!("Hello, {}", user.email),
        },
    )
}

/// 获取当前用户的完整资料
#[utoipa::path(
    get,
    path = "/api/v1/user/profile",
    responses(
        (status = 200, body = ApiResponse<UserProfile>),
        (status = 404, description = "用户不存在"),
    ),
    security(("Token" = []))
)]
pub async fn get_profile(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    user: AuthUser,
) -> Result<ApiResponse<UserProfile>, ApiError> {
    let graph = load_profile_graph(db.as_ref(), user.id)
        .await?
        .ok_or_else(|| ApiError::from(InnerApiError::NotFound("User not found".to_string())))?;
    Ok(ApiResponse::ok("Profile retrieved successfully", graph.into()))
}

/// 更新用户名、地址信息和头像（multipart/form-data）
#[utoipa::path(
    put,
    path = "/api/v1/user/profile",
    request_body(content_type = "multipart/form-data", description = "name, address, city, road, image"),
    responses(
        (status = 200, body = ApiResponse<UserProfile>),
        (status = 400, description = "字段校验失败或文件不是图片"),
        (status = 404, description = "用户不存在"),
    ),
    security(("Token" = []))
)]
pub async fn update_profile(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(config): Extension<Arc<Config>>,
    user: AuthUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<ApiResponse<UserProfile>, ApiError> {
    let multipart = multipart.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let request = UpdateProfileRequest::from_multipart(multipart).await?;
    request.validate()?;
    let profile = update_profile_internal(db.as_ref(), user.id, &request, &config.upload_dir).await?;
    Ok(ApiResponse::ok("Profile updated successfully", profile))
}

/// 提问：searchId 为空时新建搜索会话，否则在已有会话中追加
#[utoipa::path(
    post,
    path = "/api/v1/search",
    request_body = AddResponseRequest,
    responses(
        (status = 201, body = ApiResponse<CreatedAnswer>),
        (status = 400, description = "参数错误"),
        (status = 403, description = "会话属于其他用户"),
        (status = 404, description = "会话不存在"),
    ),
    security(("Token" = []))
)]
pub async fn create_response(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    Extension(ai): Extension<Arc<dyn AiGateway>>,
    user: AuthUser,
    ClientIp(ip): ClientIp,
    payload: Result<Json<AddResponseRequest>, JsonRejection>,
) -> Result<ApiResponse<CreatedAnswer>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    request.validate()?;

    let created = match request.search_id() {
        None if request.is_related_question() => {
            return Err(
                InnerApiError::BadRequest("searchId is required when isRelatedQuestion is true".to_string()).into(),
            );
        }
        None => CreatedAnswer::Search(start_topic(db.as_ref(), ai.as_ref(), &user, &ip, &request.question).await?),
        Some(search_id) => CreatedAnswer::Response(
            append_to_topic(
                db.as_ref(),
                ai.as_ref(),
                &user,
                search_id,
                &request.question,
                request.is_related_question(),
            )
            .await?,
        ),
    };
    Ok(ApiResponse::created("Response created successfully", created))
}

/// 分页列出当前用户的搜索会话
#[utoipa::path(
    get,
    path = "/api/v1/search",
    params(SearchListQuery),
    responses(
        (status = 200, body = ApiResponse<Vec<SearchView>>),
        (status = 400, description = "查询参数错误"),
    ),
    security(("Token" = []))
)]
pub async fn get_all_searches(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    user: AuthUser,
    query: Result<Query<SearchListQuery>, QueryRejection>,
) -> Result<ApiResponse<Vec<SearchView>>, ApiError> {
    let Query(query) = query.map_err(|e| {
        ApiError::bad_request("Invalid query parameters").with_details(e.body_text())
    })?;
    let options = PaginationOptions::from_query(
        query.page,
        query.limit,
        query.sort_by.as_deref(),
        query.sort_order.as_deref(),
    )?;
    let non_empty = |value: Option<String>| -> Option<Value> { value.filter(|v| !v.is_empty()).map(Value::from) };
    let filters = ListFilters::<search::Entity> {
        equals: vec![
            (search::Column::UserId, Some(user.id.into())),
            (search::Column::Ip, non_empty(query.ip)),
            (search::Column::Title, non_empty(query.title)),
        ],
        search_term: query.search_term,
        search_fields: vec![search::Column::Title],
    };
    let base = search::Entity::find().filter(search::Column::DeletedAt.is_null());

    let paged = paginate(db.as_ref(), base, &options, &filters).await?.map(SearchView::from);
    let meta = paged.meta();
    Ok(ApiResponse::ok("Searches fetched successfully", paged.data).with_meta(meta))
}

/// 获取单个搜索会话及其全部回答
#[utoipa::path(
    get,
    path = "/api/v1/search/{searchId}",
    params(("searchId" = String, Path, description = "搜索会话 ID")),
    responses(
        (status = 200, body = ApiResponse<SearchView>),
        (status = 403, description = "会话属于其他用户"),
        (status = 404, description = "会话不存在"),
    ),
    security(("Token" = []))
)]
pub async fn get_search_by_id(
    Extension(db): Extension<Arc<DatabaseConnection>>,
    user: AuthUser,
    Path(search_id): Path<String>,
) -> Result<ApiResponse<SearchView>, ApiError> {
    let found = find_owned_search(db.as_ref(), &user, &search_id).await?;
    let responses = responses_of(db.as_ref(), found.id).await?;
    Ok(ApiResponse::ok(
        "Search fetched successfully",
        SearchView::new(found, Some(responses)),
    ))
}
