//! 模型网关客户端
//!
//! 从对话历史 + 过滤后的工具集构建 chat completions 请求，分类失败并按退避表重试：
//! 瞬态传输失败（超时 / 连接）1s,3s,7s；限流 3s,7s,15s；协议与凭证错误立即终止。
//! 重试重发完全相同的请求；取消信号在两次尝试之间生效。

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::conversation::{ConversationHistory, Message};
use crate::llm::transport::{Transport, TransportError};
use crate::llm::types::{ChatResponse, ToolCall, Usage};
use crate::tools::ToolDescriptor;

/// 网关调用的终止性失败；用户可见文案经 `user_message`，内部细节保留在 Display 供日志
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway credential not configured")]
    MissingCredential,

    #[error("request timed out ({attempts} attempts)")]
    Timeout { attempts: u32 },

    #[error("connection failed ({attempts} attempts): {detail}")]
    Connection { attempts: u32, detail: String },

    #[error("rate limited ({attempts} attempts)")]
    RateLimited { attempts: u32 },

    #[error("gateway protocol error: {0}")]
    Protocol(String),

    #[error("cancelled between retry attempts")]
    Cancelled,
}

impl GatewayError {
    /// 面向用户的一句话，与内部错误细节分离
    pub fn user_message(&self) -> String {
        match self {
            Self::MissingCredential => {
                "No gateway credential is configured. Set [gateway].api_key or the \
                 STOCKLINE__GATEWAY__API_KEY environment variable."
                    .to_string()
            }
            Self::Timeout { .. } => "The request timed out. Please try again.".to_string(),
            Self::Connection { .. } => {
                "Connection to the model gateway failed. Please check the network.".to_string()
            }
            Self::RateLimited { .. } => {
                "The model gateway is rate limiting requests. Please wait a moment and try again."
                    .to_string()
            }
            Self::Protocol(_) => "The model gateway returned an error.".to_string(),
            Self::Cancelled => "The request was cancelled.".to_string(),
        }
    }
}

/// 可重试失败的两族：瞬态传输与限流，退避表不同
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RetryClass {
    Transient,
    Throttled,
}

impl RetryClass {
    fn of(err: &TransportError) -> Option<Self> {
        match err {
            TransportError::Timeout | TransportError::Connection(_) => Some(Self::Transient),
            TransportError::RateLimited => Some(Self::Throttled),
            TransportError::Http { .. } | TransportError::Other(_) => None,
        }
    }

    /// attempt 为 1 起算的重试序号：瞬态 1,3,7s；限流 3,7,15s
    fn backoff_secs(self, attempt: u32) -> u64 {
        match self {
            Self::Transient => (1u64 << attempt) - 1,
            Self::Throttled => (1u64 << (attempt + 1)) - 1,
        }
    }
}

/// 网关客户端：持有传输、模型名、凭证与重试上限；对话历史由调用方独占传入
pub struct GatewayClient {
    transport: Arc<dyn Transport>,
    model: String,
    api_key: Option<String>,
    max_retries: u32,
}

impl GatewayClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        model: impl Into<String>,
        api_key: Option<String>,
        max_retries: u32,
    ) -> Self {
        Self {
            transport,
            model: model.into(),
            api_key,
            max_retries,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn credential_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    /// 发送一次 chat completions 请求并解析回复。
    ///
    /// assistant 的原始回复（文本 + 原始 tool_calls 记录）在返回前就追加进历史，
    /// 后续调用能看到它；重试期间不追加任何新消息。
    pub async fn send(
        &self,
        history: &mut ConversationHistory,
        tools: &[ToolDescriptor],
        temperature: f32,
        max_tokens: u32,
        cancel: &CancellationToken,
    ) -> Result<ChatResponse, GatewayError> {
        let bearer = match self.api_key.as_deref() {
            Some(key) if !key.is_empty() => key.to_string(),
            _ => return Err(GatewayError::MissingCredential),
        };

        let payload = self.build_payload(history, tools, temperature, max_tokens);

        let mut retries = 0u32;
        let body = loop {
            match self.transport.post_chat(&payload, &bearer).await {
                Ok(body) => break body,
                Err(err) => {
                    let class = RetryClass::of(&err);
                    match class {
                        Some(class) if retries < self.max_retries => {
                            retries += 1;
                            let wait = class.backoff_secs(retries);
                            tracing::warn!(
                                error = %err,
                                retry = retries,
                                max_retries = self.max_retries,
                                wait_secs = wait,
                                "gateway transport failure, retrying"
                            );
                            tokio::select! {
                                _ = tokio::time::sleep(Duration::from_secs(wait)) => {}
                                _ = cancel.cancelled() => return Err(GatewayError::Cancelled),
                            }
                        }
                        _ => {
                            tracing::error!(error = %err, retries, "gateway call failed");
                            return Err(terminal_error(err, retries + 1));
                        }
                    }
                }
            }
        };

        self.parse_reply(history, body)
    }

    fn build_payload(
        &self,
        history: &ConversationHistory,
        tools: &[ToolDescriptor],
        temperature: f32,
        max_tokens: u32,
    ) -> Value {
        let mut payload = json!({
            "model": self.model,
            "messages": history.messages(),
            "temperature": temperature,
            "max_tokens": max_tokens,
            "top_p": 1,
            "stream": false,
        });
        if !tools.is_empty() {
            payload["tools"] = Value::Array(
                tools
                    .iter()
                    .map(|t| {
                        json!({
                            "type": "function",
                            "function": {
                                "name": t.name,
                                "description": t.description,
                                "parameters": t.parameters,
                            }
                        })
                    })
                    .collect(),
            );
            payload["tool_choice"] = json!("auto");
        }
        payload
    }

    fn parse_reply(
        &self,
        history: &mut ConversationHistory,
        body: Value,
    ) -> Result<ChatResponse, GatewayError> {
        if let Some(err) = body.get("error") {
            let message = err
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown gateway error");
            return Err(GatewayError::Protocol(message.to_string()));
        }

        let choice = body
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|c| c.first())
            .cloned()
            .unwrap_or_default();
        let message = choice.get("message").cloned().unwrap_or_default();

        let content = message
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let raw_calls: Vec<Value> = message
            .get("tool_calls")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let tool_calls: Vec<ToolCall> = raw_calls.iter().filter_map(ToolCall::from_raw).collect();
        let finish_reason = choice
            .get("finish_reason")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let usage = body
            .get("usage")
            .cloned()
            .and_then(|u| serde_json::from_value::<Usage>(u).ok())
            .unwrap_or_default();

        history.push(Message::assistant_with_calls(content.clone(), raw_calls));

        Ok(ChatResponse {
            content,
            tool_calls,
            finish_reason,
            usage,
        })
    }
}

fn terminal_error(err: TransportError, attempts: u32) -> GatewayError {
    match err {
        TransportError::Timeout => GatewayError::Timeout { attempts },
        TransportError::Connection(detail) => GatewayError::Connection { attempts, detail },
        TransportError::RateLimited => GatewayError::RateLimited { attempts },
        TransportError::Http { status, body } => {
            GatewayError::Protocol(format!("http {status}: {body}"))
        }
        TransportError::Other(detail) => GatewayError::Protocol(detail),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    /// 测试传输：按脚本顺序弹出结果，并统计调用次数
    struct ScriptedTransport {
        script: Mutex<VecDeque<Result<Value, TransportError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Result<Value, TransportError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn post_chat(&self, _payload: &Value, _bearer: &str) -> Result<Value, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .await
                .pop_front()
                .unwrap_or(Err(TransportError::Other("script exhausted".into())))
        }
    }

    fn reply_body(content: &str) -> Value {
        json!({
            "choices": [{
                "message": {"content": content},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        })
    }

    fn client(transport: Arc<ScriptedTransport>, max_retries: u32) -> GatewayClient {
        GatewayClient::new(transport, "test-model", Some("sk-test".into()), max_retries)
    }

    #[tokio::test]
    async fn missing_credential_is_fatal_without_any_request() {
        let transport = ScriptedTransport::new(vec![Ok(reply_body("hi"))]);
        let gateway = GatewayClient::new(transport.clone(), "test-model", None, 3);
        let mut history = ConversationHistory::new();

        let err = gateway
            .send(&mut history, &[], 0.7, 256, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::MissingCredential));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_then_success_on_third_attempt() {
        let transport = ScriptedTransport::new(vec![
            Err(TransportError::Timeout),
            Err(TransportError::Connection("reset".into())),
            Ok(reply_body("recovered")),
        ]);
        let gateway = client(transport.clone(), 3);
        let mut history = ConversationHistory::new();

        let response = gateway
            .send(&mut history, &[], 0.7, 256, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(response.content, "recovered");
        assert_eq!(transport.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_make_exactly_four_attempts() {
        let transport = ScriptedTransport::new(vec![
            Err(TransportError::Timeout),
            Err(TransportError::Timeout),
            Err(TransportError::Timeout),
            Err(TransportError::Timeout),
            Err(TransportError::Timeout),
        ]);
        let gateway = client(transport.clone(), 3);
        let mut history = ConversationHistory::new();

        let err = gateway
            .send(&mut history, &[], 0.7, 256, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::Timeout { attempts: 4 }));
        assert_eq!(transport.call_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_retries_then_reports_terminal_error() {
        let transport = ScriptedTransport::new(vec![
            Err(TransportError::RateLimited),
            Err(TransportError::RateLimited),
        ]);
        let gateway = client(transport.clone(), 1);
        let mut history = ConversationHistory::new();

        let err = gateway
            .send(&mut history, &[], 0.7, 256, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::RateLimited { attempts: 2 }));
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test]
    async fn protocol_error_is_never_retried() {
        let transport = ScriptedTransport::new(vec![
            Ok(json!({"error": {"message": "model overloaded"}})),
            Ok(reply_body("unreachable")),
        ]);
        let gateway = client(transport.clone(), 3);
        let mut history = ConversationHistory::new();

        let err = gateway
            .send(&mut history, &[], 0.7, 256, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::Protocol(ref m) if m == "model overloaded"));
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn reply_is_appended_to_history_before_returning() {
        let body = json!({
            "choices": [{
                "message": {
                    "content": "checking stock",
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "get_low_stock_items", "arguments": "{}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        });
        let transport = ScriptedTransport::new(vec![Ok(body)]);
        let gateway = client(transport, 3);
        let mut history = ConversationHistory::new();
        history.push_user("show low stock");

        let response = gateway
            .send(&mut history, &[], 0.7, 256, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].function_name, "get_low_stock_items");
        let last = history.messages().last().unwrap();
        assert_eq!(last.role, crate::conversation::Role::Assistant);
        assert_eq!(last.tool_calls.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn backoff_schedules_match_failure_class() {
        assert_eq!(RetryClass::Transient.backoff_secs(1), 1);
        assert_eq!(RetryClass::Transient.backoff_secs(2), 3);
        assert_eq!(RetryClass::Transient.backoff_secs(3), 7);
        assert_eq!(RetryClass::Throttled.backoff_secs(1), 3);
        assert_eq!(RetryClass::Throttled.backoff_secs(2), 7);
        assert_eq!(RetryClass::Throttled.backoff_secs(3), 15);
    }
}
