use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

/// AI 请求的固定超时时间
pub const AI_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// 历史对话中的一轮问答
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryItem {
    pub question: String,
    pub answer: String,
    /// unix 秒
    pub timestamp: i64,
}

#[derive(Serialize)]
struct AskRequest<'a> {
    question: &'a str,
    history: &'a [HistoryItem],
}

/// 经过校验的 AI 回答
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AiAnswer {
    pub answer_details: String,
    pub related_questions: Vec<String>,
    pub images: Vec<String>,
    pub charts: Vec<Map<String, Value>>,
}

#[derive(Error, Debug)]
pub enum AiError {
    #[error("AI service URL is not configured")]
    NotConfigured,
    #[error("AI request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("failed to decode AI response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid AI response envelope: {0}")]
    InvalidEnvelope(&'static str),
    #[error("AI service reported failure")]
    Unsuccessful,
}

#[async_trait]
pub trait AiGateway: Send + Sync {
    async fn ask(&self, question: &str, history: &[HistoryItem]) -> Result<AiAnswer, AiError>;
}

/// 通过 HTTP 调用外部 AI 问答服务
pub struct HttpAiGateway {
    client: Client,
    url: Option<String>,
}

impl HttpAiGateway {
    pub fn new(url: Option<String>) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(AI_REQUEST_TIMEOUT).build()?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl AiGateway for HttpAiGateway {
    async fn ask(&self, question: &str, history: &[HistoryItem]) -> Result<AiAnswer, AiError> {
        let url = self.url.as_deref().ok_or(AiError::NotConfigured)?;
        debug!("请求 AI 服务: question_len={}, history_len={}", question.len(), history.len());

        // 状态码不作判断，以返回体中的 success 为准
        let body = self
            .client
            .post(url)
            .json(&AskRequest { question, history })
            .send()
            .await?
            .bytes()
            .await?;

        parse_envelope(&body).inspect_err(|e| warn!("AI 服务返回无效响应: {}", e))
    }
}

/// 解析 AI 服务返回的松散 JSON
///
/// success 必须为 true；related_questions / images 中的非字符串项被丢弃，charts 中只保留对象。
pub fn parse_envelope(body: &[u8]) -> Result<AiAnswer, AiError> {
    let value: Value = serde_json::from_slice(body)?;
    let Value::Object(mut envelope) = value else {
        return Err(AiError::InvalidEnvelope("body is not a JSON object"));
    };
    match envelope.get("success") {
        Some(Value::Bool(true)) => {}
        Some(Value::Bool(false)) => return Err(AiError::Unsuccessful),
        Some(_) => return Err(AiError::InvalidEnvelope("success is not a boolean")),
        None => return Err(AiError::InvalidEnvelope("missing success field")),
    }

    let answer_details = match envelope.remove("answer_details") {
        Some(Value::String(s)) => s,
        _ => String::new(),
    };
    let charts = match envelope.remove("charts") {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };

    Ok(AiAnswer {
        answer_details,
        related_questions: string_list(envelope.remove("related_questions")),
        images: string_list(envelope.remove("images")),
        charts,
    })
}

fn string_list(value: Option<Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use assert_matches::assert_matches;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;

    use super::*;

    #[test]
    fn test_parse_envelope() {
        let body = json!({
            "success": true,
            "answer_details": "Rust 是一门系统编程语言",
            "related_questions": ["what is cargo?", 42, null, "what is borrowck?"],
            "images": "not-an-array",
            "charts": [{"type": "bar", "data": [1, 2]}, "oops", 7]
        });
        let answer = parse_envelope(body.to_string().as_bytes()).unwrap();
        assert_eq!(answer.answer_details, "Rust 是一门系统编程语言");
        assert_eq!(answer.related_questions, vec!["what is cargo?", "what is borrowck?"]);
        assert!(answer.images.is_empty());
        assert_eq!(answer.charts.len(), 1);
        assert_eq!(answer.charts[0]["type"], json!("bar"));
    }

    #[test]
    fn test_parse_envelope_failures() {
        assert_matches!(parse_envelope(b"not json"), Err(AiError::Decode(_)));
        assert_matches!(parse_envelope(b"[1,2]"), Err(AiError::InvalidEnvelope(_)));
        assert_matches!(parse_envelope(br#"{"answer_details":"x"}"#), Err(AiError::InvalidEnvelope(_)));
        assert_matches!(parse_envelope(br#"{"success":"true"}"#), Err(AiError::InvalidEnvelope(_)));
        assert_matches!(parse_envelope(br#"{"success":false}"#), Err(AiError::Unsuccessful));
        assert_eq!(parse_envelope(br#"{"success":true}"#).unwrap(), AiAnswer::default());
    }

    #[tokio::test]
    async fn test_not_configured() {
        let gateway = HttpAiGateway::new(None).unwrap();
        assert_matches!(gateway.ask("hi", &[]).await, Err(AiError::NotConfigured));
    }

    #[tokio::test]
    async fn test_ask_posts_question_and_history() {
        let received = Arc::new(Mutex::new(None::<Value>));
        let captured = received.clone();
        let app = Router::new().route(
            "/ask",
            post(move |Json(body): Json<Value>| {
                let captured = captured.clone();
                async move {
                    *captured.lock().unwrap() = Some(body);
                    // 状态码为 500 但 success 为 true，依然视为成功
                    (
                        axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                        Json(json!({"success": true, "answer_details": "ok", "images": ["a.png"]})),
                    )
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let gateway = HttpAiGateway::new(Some(format!("http://{}/ask", addr))).unwrap();
        let history = vec![HistoryItem {
            question: "first".to_string(),
            answer: "one".to_string(),
            timestamp: 1_700_000_000,
        }];
        let answer = gateway.ask("second", &history).await.unwrap();
        assert_eq!(answer.answer_details, "ok");
        assert_eq!(answer.images, vec!["a.png"]);

        let body = received.lock().unwrap().clone().unwrap();
        assert_eq!(body["question"], json!("second"));
        assert_eq!(
            body["history"],
            json!([{"question": "first", "answer": "one", "timestamp": 1_700_000_000}])
        );
    }

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let gateway = HttpAiGateway::new(Some(format!("http://{}/ask", addr))).unwrap();
        assert_matches!(gateway.ask("hi", &[]).await, Err(AiError::Transport(_)));
    }
}
