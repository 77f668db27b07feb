//! 网关传输层
//!
//! Transport trait 把 HTTP 往返与重试逻辑解耦，测试用内存实现注入失败序列；
//! HttpTransport 基于 reqwest，把 reqwest 错误分类为可重试 / 不可重试两族。

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// 传输层失败分类；Timeout / Connection / RateLimited 可重试，其余立即终止
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("rate limited by gateway")]
    RateLimited,

    #[error("http {status}: {body}")]
    Http { status: u16, body: String },

    #[error("transport error: {0}")]
    Other(String),
}

/// 单次 chat completions POST；payload 为完整请求体，bearer 为凭证
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_chat(&self, payload: &Value, bearer: &str) -> Result<Value, TransportError>;
}

/// reqwest 实现：POST {base_url}/chat/completions，带 Bearer 头与请求超时
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, request_timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(request_timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_chat(&self, payload: &Value, bearer: &str) -> Result<Value, TransportError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(bearer)
            .json(payload)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(TransportError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Http {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| TransportError::Other(format!("invalid response body: {e}")))
    }
}

fn classify_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else if e.is_connect() {
        TransportError::Connection(e.to_string())
    } else {
        TransportError::Other(e.to_string())
    }
}
