//! 工具分发器
//!
//! 对网关返回的一批 tool calls：逐个查注册表、在宿主注入的执行环境内调用、
//! 记录逐调用结果或错误。批内任一失败不跳过其余调用（与顺序计划的中止语义刻意不同），
//! 每个调用无论成败都以 tool 消息写回历史：wire 协议要求每个 tool call
//! 在下一轮 assistant 前配对恰好一条结果。

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::conversation::{ConversationHistory, Message};
use crate::llm::ToolCall;
use crate::tools::registry::{ExecutionScope, ToolRegistry};

/// 单次调用的结果：result 与 error 恰有其一
#[derive(Clone, Debug, Serialize)]
pub struct CallOutcome {
    pub tool_call_id: String,
    pub function_name: String,
    pub result: Option<Value>,
    pub error: Option<String>,
}

impl CallOutcome {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// 分发器：持有注册表，调用在注入的 ExecutionScope 内进行
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// 单个工具调用：未注册返回 Err，工具失败原样透传错误描述；每次调用输出审计日志
    pub async fn invoke(
        &self,
        name: &str,
        args: Map<String, Value>,
        scope: &dyn ExecutionScope,
    ) -> Result<Value, String> {
        let handler = self
            .registry
            .handler(name)
            .ok_or_else(|| format!("Tool '{name}' not found"))?;

        let start = Instant::now();
        let result = handler.call(scope, args).await;
        let audit = json!({
            "event": "tool_audit",
            "tool": name,
            "ok": result.is_ok(),
            "duration_ms": start.elapsed().as_millis() as u64,
        });
        tracing::info!(audit = %audit, "tool");
        result
    }

    /// 执行一批 tool calls：每个调用都执行、都落历史；任一错误使整批被调用方视为失败
    pub async fn execute(
        &self,
        tool_calls: &[ToolCall],
        scope: &dyn ExecutionScope,
        history: &mut ConversationHistory,
    ) -> Vec<CallOutcome> {
        let mut outcomes = Vec::with_capacity(tool_calls.len());

        for call in tool_calls {
            let outcome = match self.invoke(&call.function_name, call.arguments.clone(), scope).await
            {
                Ok(result) => {
                    history.push(Message::tool_result(&call.id, result.to_string()));
                    CallOutcome {
                        tool_call_id: call.id.clone(),
                        function_name: call.function_name.clone(),
                        result: Some(result),
                        error: None,
                    }
                }
                Err(error) => {
                    history.push(Message::tool_result(
                        &call.id,
                        json!({"error": error}).to_string(),
                    ));
                    CallOutcome {
                        tool_call_id: call.id.clone(),
                        function_name: call.function_name.clone(),
                        result: None,
                        error: Some(error),
                    }
                }
            };
            outcomes.push(outcome);
        }

        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::conversation::Role;
    use crate::tools::registry::{Tool, ToolDescriptor, ToolRegistry};

    struct FixedTool(Value);

    #[async_trait]
    impl Tool for FixedTool {
        async fn call(
            &self,
            _scope: &dyn ExecutionScope,
            _args: Map<String, Value>,
        ) -> Result<Value, String> {
            Ok(self.0.clone())
        }
    }

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        async fn call(
            &self,
            _scope: &dyn ExecutionScope,
            _args: Map<String, Value>,
        ) -> Result<Value, String> {
            Err("database unavailable".to_string())
        }
    }

    fn registry() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry
            .register(
                ToolDescriptor::new("counts", "", json!({"type": "object"})),
                Arc::new(FixedTool(json!({"total": 3}))),
            )
            .unwrap();
        registry
            .register(
                ToolDescriptor::new("broken", "", json!({"type": "object"})),
                Arc::new(FailingTool),
            )
            .unwrap();
        Arc::new(registry)
    }

    fn call(id: &str, name: &str) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            function_name: name.to_string(),
            arguments: Map::new(),
        }
    }

    #[tokio::test]
    async fn every_call_runs_even_after_a_failure() {
        let dispatcher = ToolDispatcher::new(registry());
        let mut history = ConversationHistory::new();
        let calls = vec![
            call("call_1", "broken"),
            call("call_2", "counts"),
            call("call_3", "missing_tool"),
        ];

        let outcomes = dispatcher.execute(&calls, &(), &mut history).await;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].error.as_deref(), Some("database unavailable"));
        assert_eq!(outcomes[1].result, Some(json!({"total": 3})));
        assert_eq!(
            outcomes[2].error.as_deref(),
            Some("Tool 'missing_tool' not found")
        );
    }

    #[tokio::test]
    async fn each_call_is_paired_with_a_tool_message() {
        let dispatcher = ToolDispatcher::new(registry());
        let mut history = ConversationHistory::new();
        let calls = vec![call("call_1", "counts"), call("call_2", "broken")];

        dispatcher.execute(&calls, &(), &mut history).await;

        let tool_messages: Vec<_> = history
            .messages()
            .iter()
            .filter(|m| m.role == Role::Tool)
            .collect();
        assert_eq!(tool_messages.len(), 2);
        assert_eq!(tool_messages[0].tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(tool_messages[1].tool_call_id.as_deref(), Some("call_2"));
        assert!(tool_messages[1].content.contains("database unavailable"));
    }
}
