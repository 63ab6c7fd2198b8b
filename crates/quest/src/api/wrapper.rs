use std::panic::Location;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use sea_orm::DbErr;
use serde::Serialize;
use serde_json::{json, Value};
use utoipa::ToSchema;

use crate::api::auth::AuthError;
use crate::api::error::InnerApiError;
use crate::utils::pagination::{PageMeta, PaginationError};
use crate::utils::upload::UploadError;

/// 统一的成功响应
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T: Serialize> {
    #[serde(skip)]
    status: StatusCode,
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<PageMeta>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self::with_status(StatusCode::OK, message, data)
    }

    pub fn created(message: impl Into<String>, data: T) -> Self {
        Self::with_status(StatusCode::CREATED, message, data)
    }

    fn with_status(status: StatusCode, message: impl Into<String>, data: T) -> Self {
        Self {
            status,
            success: true,
            message: message.into(),
            data: Some(data),
            meta: None,
        }
    }

    pub fn with_meta(mut self, meta: PageMeta) -> Self {
        self.meta = Some(meta);
        self
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// 错误响应中附带给日志中间件的信息
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub status: StatusCode,
    pub message: String,
    pub stack: String,
    pub details: Option<String>,
}

/// 统一的错误响应，记录错误产生的位置
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    error_messages: Option<Value>,
    details: Option<String>,
    location: &'static Location<'static>,
}

impl ApiError {
    #[track_caller]
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            error_messages: None,
            details: None,
            location: Location::caller(),
        }
    }

    #[track_caller]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    #[track_caller]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    #[track_caller]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// 附加仅写入日志的错误详情
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn stack(&self) -> String {
        format!("{}:{}", self.location.file(), self.location.line())
    }
}

impl From<InnerApiError> for ApiError {
    #[track_caller]
    fn from(value: InnerApiError) -> Self {
        let status = match &value {
            InnerApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            InnerApiError::NotFound(_) => StatusCode::NOT_FOUND,
            InnerApiError::BadRequest(_) | InnerApiError::Validation(_) => StatusCode::BAD_REQUEST,
        };
        let mut error = ApiError::new(status, value.to_string());
        if let InnerApiError::Validation(fields) = value {
            error.error_messages = Some(json!(fields));
        }
        error
    }
}

impl From<DbErr> for ApiError {
    #[track_caller]
    fn from(value: DbErr) -> Self {
        ApiError::internal(value.to_string())
    }
}

impl From<anyhow::Error> for ApiError {
    #[track_caller]
    fn from(value: anyhow::Error) -> Self {
        ApiError::internal(value.to_string()).with_details(format!("{:?}", value))
    }
}

impl From<PaginationError> for ApiError {
    #[track_caller]
    fn from(value: PaginationError) -> Self {
        if value.is_client_error() {
            ApiError::bad_request(value.to_string())
        } else {
            ApiError::internal(value.to_string())
        }
    }
}

impl From<UploadError> for ApiError {
    #[track_caller]
    fn from(value: UploadError) -> Self {
        if value.is_client_error() {
            ApiError::bad_request(value.to_string())
        } else {
            ApiError::internal("failed to save uploaded file").with_details(value.to_string())
        }
    }
}

impl From<AuthError> for ApiError {
    #[track_caller]
    fn from(value: AuthError) -> Self {
        ApiError::unauthorized(value.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let stack = self.stack();
        let mut body = json!({
            "success": false,
            "statusCode": self.status.as_u16(),
            "message": self.message,
            "stack": stack,
        });
        if let Some(error_messages) = self.error_messages {
            body["errorMessages"] = error_messages;
        }
        let mut response = (self.status, Json(json!({ "error": body }))).into_response();
        response.extensions_mut().insert(ErrorReport {
            status: self.status,
            message: self.message,
            stack,
            details: self.details,
        });
        response
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;

    use super::*;

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_success_envelope() {
        let response = ApiResponse::created("Created", json!({"id": 1}))
            .with_meta(PageMeta {
                page: 1,
                limit: 10,
                total_count: 1,
                total_pages: 1,
            })
            .into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(
            body_json(response).await,
            json!({
                "success": true,
                "message": "Created",
                "data": {"id": 1},
                "meta": {"page": 1, "limit": 10, "totalCount": 1, "totalPages": 1}
            })
        );
    }

    #[tokio::test]
    async fn test_error_envelope_with_validation() {
        let mut fields = crate::api::error::FieldErrors::new();
        fields.insert("name".to_string(), vec!["name must be at least 2 characters".to_string()]);
        let error = ApiError::from(InnerApiError::Validation(fields));
        let expected_stack = error.stack();
        assert!(expected_stack.contains("wrapper.rs"));

        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let report = response.extensions().get::<ErrorReport>().cloned().unwrap();
        assert_eq!(report.stack, expected_stack);

        let body = body_json(response).await;
        assert_eq!(body["error"]["success"], json!(false));
        assert_eq!(body["error"]["statusCode"], json!(400));
        assert_eq!(body["error"]["message"], json!("Validation failed"));
        assert_eq!(
            body["error"]["errorMessages"]["name"],
            json!(["name must be at least 2 characters"])
        );
        assert_eq!(body["error"]["stack"], json!(expected_stack));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::from(InnerApiError::Forbidden("no".into())).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(InnerApiError::NotFound("gone".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(PaginationError::InvalidSortBy("x".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(DbErr::Custom("boom".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(ApiError::from(UploadError::NotAnImage).status(), StatusCode::BAD_REQUEST);
    }
}
