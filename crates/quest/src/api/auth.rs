use std::sync::Arc;

use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::Modify;

use crate::api::wrapper::ApiError;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("missing authorization header")]
    MissingHeader,
    #[error("authorization header must be a Bearer token")]
    MalformedHeader,
    #[error("invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
    #[error("invalid user ID format")]
    InvalidId,
    #[error("invalid email format")]
    InvalidEmail,
    #[error("invalid role format")]
    InvalidRole,
}

/// 已认证的调用者
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthUser {
    pub id: i32,
    pub email: String,
    pub role: String,
}

impl AuthUser {
    /// 从 JWT claims 构造，id / email / role 缺失或类型不对都视为认证失败
    pub fn from_claims(claims: &Map<String, Value>) -> Result<Self, AuthError> {
        let id = match claims.get("id") {
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                .and_then(|v| i32::try_from(v).ok())
                .ok_or(AuthError::InvalidId)?,
            _ => return Err(AuthError::InvalidId),
        };
        let email = match claims.get("email") {
            Some(Value::String(s)) => s.clone(),
            _ => return Err(AuthError::InvalidEmail),
        };
        let role = match claims.get("role") {
            Some(Value::String(s)) => s.clone(),
            _ => return Err(AuthError::InvalidRole),
        };
        Ok(Self { id, email, role })
    }
}

/// HS256 Bearer Token 校验器
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn verify(&self, authorization: Option<&str>) -> Result<AuthUser, AuthError> {
        let header = authorization.ok_or(AuthError::MissingHeader)?;
        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MalformedHeader)?;
        let data = decode::<Map<String, Value>>(token, &self.key, &self.validation)?;
        AuthUser::from_claims(&data.claims)
    }
}

/// 在 OpenAPI 文档中声明 Bearer Token 认证
pub struct OpenAPIAuth;

impl Modify for OpenAPIAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "Token",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

pub async fn auth_middleware(
    State(verifier): State<Arc<TokenVerifier>>,
    mut request: Request,
    next: Next,
) -> Response {
    let authorization = request.headers().get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    let user = match verifier.verify(authorization) {
        Ok(user) => user,
        Err(e) => {
            debug!("认证失败: {}", e);
            return ApiError::from(e).into_response();
        }
    };

    request.extensions_mut().insert(user.clone());
    let mut response = next.run(request).await;
    // 供错误日志中间件记录调用者
    response.extensions_mut().insert(user);
    response
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("User not authenticated"))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use assert_matches::assert_matches;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    use super::*;

    pub(crate) const TEST_SECRET: &str = "test-secret";

    pub(crate) fn sign(claims: Value) -> String {
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
        )
        .unwrap()
    }

    pub(crate) fn token_for(id: i32) -> String {
        let exp = chrono::Utc::now().timestamp() + 3600;
        sign(json!({"id": id, "email": format!("user{}@example.com", id), "role": "user", "exp": exp}))
    }

    fn claims(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_from_claims() {
        let user = AuthUser::from_claims(&claims(json!({"id": 7, "email": "a@b.c", "role": "admin"}))).unwrap();
        assert_eq!(user.id, 7);
        assert_eq!(user.role, "admin");

        // JSON 数字可能以浮点形式出现
        let user = AuthUser::from_claims(&claims(json!({"id": 7.0, "email": "a@b.c", "role": "user"}))).unwrap();
        assert_eq!(user.id, 7);

        assert_matches!(
            AuthUser::from_claims(&claims(json!({"id": "7", "email": "a@b.c", "role": "user"}))),
            Err(AuthError::InvalidId)
        );
        assert_matches!(
            AuthUser::from_claims(&claims(json!({"id": 7.5, "email": "a@b.c", "role": "user"}))),
            Err(AuthError::InvalidId)
        );
        assert_matches!(
            AuthUser::from_claims(&claims(json!({"id": 7, "role": "user"}))),
            Err(AuthError::InvalidEmail)
        );
        assert_matches!(
            AuthUser::from_claims(&claims(json!({"id": 7, "email": "a@b.c", "role": 1}))),
            Err(AuthError::InvalidRole)
        );
    }

    #[test]
    fn test_verify() {
        let verifier = TokenVerifier::new(TEST_SECRET);
        let header = format!("Bearer {}", token_for(3));
        assert_eq!(verifier.verify(Some(&header)).unwrap().id, 3);

        assert_matches!(verifier.verify(None), Err(AuthError::MissingHeader));
        assert_matches!(verifier.verify(Some("Token abc")), Err(AuthError::MalformedHeader));
        assert_matches!(verifier.verify(Some("Bearer ")), Err(AuthError::MalformedHeader));
        assert_matches!(
            verifier.verify(Some("Bearer not.a.jwt")),
            Err(AuthError::InvalidToken(_))
        );

        let other = TokenVerifier::new("another-secret");
        assert_matches!(other.verify(Some(&header)), Err(AuthError::InvalidToken(_)));

        let expired = sign(json!({"id": 3, "email": "a@b.c", "role": "user", "exp": 1_000_000}));
        assert_matches!(
            verifier.verify(Some(&format!("Bearer {}", expired))),
            Err(AuthError::InvalidToken(_))
        );
    }
}
