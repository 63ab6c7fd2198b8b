use std::collections::BTreeMap;

use thiserror::Error;

/// 字段名 -> 错误信息列表
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Error, Debug)]
pub enum InnerApiError {
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("Validation failed")]
    Validation(FieldErrors),
}
