use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts, Multipart};
use axum::http::request::Parts;
use axum::http::{Extensions, HeaderMap};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::api::error::{FieldErrors, InnerApiError};
use crate::api::wrapper::ApiError;
use crate::utils::upload::FilePart;

/// 请求方 IP：优先 X-Forwarded-For 的第一项，其次 X-Real-IP，最后是连接地址
pub fn client_ip(headers: &HeaderMap, extensions: &Extensions) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(ip) = forwarded.or(real_ip) {
        return ip.to_string();
    }
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[derive(Debug, Clone)]
pub struct ClientIp(pub String);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientIp(client_ip(&parts.headers, &parts.extensions)))
    }
}

fn check_length(errors: &mut FieldErrors, field: &str, value: &str, min: usize, max: usize) {
    if value.is_empty() {
        return;
    }
    let len = value.chars().count();
    if len < min {
        errors
            .entry(field.to_string())
            .or_default()
            .push(format!("{} must be at least {} characters", field, min));
    }
    if len > max {
        errors
            .entry(field.to_string())
            .or_default()
            .push(format!("{} must be at most {} characters", field, max));
    }
}

fn into_result(errors: FieldErrors) -> Result<(), ApiError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(InnerApiError::Validation(errors).into())
    }
}

/// 更新资料的 multipart 表单，空字符串视为未提供
#[derive(Debug, Default)]
pub struct UpdateProfileRequest {
    pub name: String,
    pub address: String,
    pub city: String,
    pub road: String,
    pub image: Option<FilePart>,
}

impl UpdateProfileRequest {
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut request = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e)))?
        {
            let name = field.name().map(|n| n.to_string());
            match name.as_deref() {
                Some("image") => {
                    let file_name = field.file_name().unwrap_or_default().to_string();
                    let content_type = field.content_type().map(|c| c.to_string());
                    let data = field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::bad_request(format!("Failed to read uploaded image: {}", e)))?;
                    // 浏览器在未选择文件时也会提交一个空的文件字段
                    if !(file_name.is_empty() && data.is_empty()) {
                        request.image = Some(FilePart {
                            file_name,
                            content_type,
                            data,
                        });
                    }
                }
                Some(key @ ("name" | "address" | "city" | "road")) => {
                    let key = key.to_string();
                    let value = field
                        .text()
                        .await
                        .map_err(|e| ApiError::bad_request(format!("Invalid field {}: {}", key, e)))?;
                    let value = value.trim().to_string();
                    match key.as_str() {
                        "name" => request.name = value,
                        "address" => request.address = value,
                        "city" => request.city = value,
                        _ => request.road = value,
                    }
                }
                _ => {}
            }
        }
        Ok(request)
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        check_length(&mut errors, "name", &self.name, 2, 100);
        check_length(&mut errors, "address", &self.address, 0, 255);
        check_length(&mut errors, "city", &self.city, 0, 100);
        check_length(&mut errors, "road", &self.road, 0, 100);
        into_result(errors)
    }
}

/// 提问请求，searchId 为空时开启新的搜索会话
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddResponseRequest {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub search_id: Option<String>,
    #[serde(default)]
    pub is_related_question: Option<bool>,
}

impl AddResponseRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        if self.question.trim().is_empty() {
            errors
                .entry("question".to_string())
                .or_default()
                .push("question is required".to_string());
        }
        check_length(&mut errors, "question", &self.question, 0, 255);
        into_result(errors)
    }

    /// 去除空白后的 searchId，空字符串视为未提供
    pub fn search_id(&self) -> Option<&str> {
        self.search_id.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn is_related_question(&self) -> bool {
        self.is_related_question.unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct SearchListQuery {
    /// 页码，从 1 开始
    pub page: Option<i64>,
    /// 每页数量
    pub limit: Option<i64>,
    /// 排序字段，默认 created_at
    pub sort_by: Option<String>,
    /// asc 或 desc
    pub sort_order: Option<String>,
    /// 在标题中模糊搜索
    pub search_term: Option<String>,
    pub ip: Option<String>,
    pub title: Option<String>,
}
