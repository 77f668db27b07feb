//! 助手端到端集成测试
//!
//! 用脚本化传输与固定结果工具搭完整管线：规划器路径、网关工具调用路径、
//! 兜底分类器路径与会话注册表隔离。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio::sync::Mutex as AsyncMutex;

use stockline::config::AppConfig;
use stockline::llm::{Transport, TransportError};
use stockline::tools::{register_standard, ExecutionScope, Tool, ToolRegistry};
use stockline::{Assistant, SessionRegistry};

/// 按脚本顺序回放网关响应
struct ScriptedTransport {
    script: AsyncMutex<VecDeque<Value>>,
    calls: AtomicUsize,
}

impl ScriptedTransport {
    fn new(script: Vec<Value>) -> Arc<Self> {
        Arc::new(Self {
            script: AsyncMutex::new(script.into()),
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
            .ok_or_else(|| TransportError::Other("transport script exhausted".into()))
    }
}

/// 固定返回值的工具
struct StaticTool(Value);

#[async_trait]
impl Tool for StaticTool {
    async fn call(
        &self,
        _scope: &dyn ExecutionScope,
        _args: Map<String, Value>,
    ) -> Result<Value, String> {
        Ok(self.0.clone())
    }
}

/// 记录收到参数的工具
struct ArgsRecordingTool {
    seen: Arc<AsyncMutex<Vec<Map<String, Value>>>>,
}

#[async_trait]
impl Tool for ArgsRecordingTool {
    async fn call(
        &self,
        _scope: &dyn ExecutionScope,
        args: Map<String, Value>,
    ) -> Result<Value, String> {
        self.seen.lock().await.push(args);
        Ok(json!({"items": [], "summary": {"low_stock_count": 0, "out_of_stock_count": 0}}))
    }
}

fn low_stock_payload() -> Value {
    json!({
        "items": [
            {"name": "Cola", "current_stock": 2, "reorder_point": 10, "suggested_reorder_qty": 24}
        ],
        "summary": {"low_stock_count": 1, "out_of_stock_count": 0}
    })
}

fn standard_registry() -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    register_standard(
        &mut registry,
        "get_inventory_status",
        Arc::new(StaticTool(json!({
            "inventory": [{"name": "Cola", "status": "ok"}],
            "total_products": 1
        }))),
    )
    .unwrap();
    register_standard(
        &mut registry,
        "get_low_stock_items",
        Arc::new(StaticTool(low_stock_payload())),
    )
    .unwrap();
    register_standard(
        &mut registry,
        "get_purchase_orders",
        Arc::new(StaticTool(json!({"orders": [], "total_orders": 0}))),
    )
    .unwrap();
    register_standard(
        &mut registry,
        "suggest_reorder_quantities",
        Arc::new(StaticTool(json!({
            "suggestions": [{
                "name": "Cola", "suggested_reorder_qty": 24, "current_stock": 2,
                "daily_sales_velocity": 1.5, "estimated_cost": 18.0
            }],
            "total_estimated_cost": 18.0,
            "analysis_period_days": 30
        }))),
    )
    .unwrap();
    Arc::new(registry)
}

fn config_with_key() -> AppConfig {
    let mut config = AppConfig::default();
    config.gateway.api_key = Some("sk-test".to_string());
    config
}

fn gateway_reply(content: &str, tool_calls: Value) -> Value {
    json!({
        "choices": [{
            "message": {"content": content, "tool_calls": tool_calls},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 20, "completion_tokens": 10, "total_tokens": 30}
    })
}

#[tokio::test]
async fn planner_owns_matched_commands_without_touching_the_gateway() {
    let transport = ScriptedTransport::new(vec![]);
    let mut assistant = Assistant::new(&config_with_key(), transport.clone(), standard_registry());

    let outcome = assistant.process_command("give me the daily report", &()).await;

    assert!(outcome.success, "plan should succeed: {}", outcome.message);
    assert_eq!(transport.call_count(), 0);
    assert_eq!(outcome.tool_results.len(), 3);
    // 三个并行步骤各自落到独立的结果槽位并被渲染
    assert!(outcome.message.contains("Inventory Summary"));
    assert!(outcome.message.contains("**Cola**"));
    assert!(outcome.message.contains("No purchase orders found."));
}

#[tokio::test]
async fn conditional_plan_reports_no_action_when_nothing_is_low() {
    let mut registry = ToolRegistry::new();
    register_standard(
        &mut registry,
        "get_low_stock_items",
        Arc::new(StaticTool(json!({"items": [], "summary": {}}))),
    )
    .unwrap();
    let reorder_calls = Arc::new(AtomicUsize::new(0));
    {
        struct Counting(Arc<AtomicUsize>);
        #[async_trait]
        impl Tool for Counting {
            async fn call(
                &self,
                _scope: &dyn ExecutionScope,
                _args: Map<String, Value>,
            ) -> Result<Value, String> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(json!({}))
            }
        }
        register_standard(
            &mut registry,
            "suggest_reorder_quantities",
            Arc::new(Counting(reorder_calls.clone())),
        )
        .unwrap();
    }

    let transport = ScriptedTransport::new(vec![]);
    let mut assistant = Assistant::new(&config_with_key(), transport, Arc::new(registry));

    let outcome = assistant.process_command("check and reorder", &()).await;

    assert!(outcome.success);
    assert!(outcome.message.contains("No action needed"));
    assert_eq!(reorder_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn gateway_tool_calls_are_executed_and_summarized() -> anyhow::Result<()> {
    let first = gateway_reply(
        "",
        json!([{
            "id": "call_1",
            "type": "function",
            "function": {"name": "get_low_stock_items", "arguments": "{}"}
        }]),
    );
    let follow_up = gateway_reply("One item needs a reorder: Cola.", json!(null));
    let transport = ScriptedTransport::new(vec![first, follow_up]);
    let mut assistant = Assistant::new(&config_with_key(), transport.clone(), standard_registry());

    let outcome = assistant.process_command("anything running out?", &()).await;

    assert!(outcome.success);
    assert_eq!(outcome.message, "One item needs a reorder: Cola.");
    assert_eq!(outcome.tool_results.len(), 1);
    assert_eq!(outcome.tool_results[0].function_name, "get_low_stock_items");
    assert_eq!(transport.call_count(), 2);
    assert_eq!(outcome.usage.map(|u| u.total_tokens), Some(30));

    // 历史中 tool call 与 tool 结果配对
    let status = assistant.get_status();
    assert!(status.conversation_length >= 5);
    Ok(())
}

#[tokio::test]
async fn malformed_arguments_still_dispatch_with_empty_map() {
    let seen = Arc::new(AsyncMutex::new(Vec::new()));
    let mut registry = ToolRegistry::new();
    register_standard(
        &mut registry,
        "get_low_stock_items",
        Arc::new(ArgsRecordingTool { seen: seen.clone() }),
    )
    .unwrap();

    let first = gateway_reply(
        "",
        json!([{
            "id": "call_1",
            "type": "function",
            "function": {"name": "get_low_stock_items", "arguments": "{broken json"}
        }]),
    );
    let follow_up = gateway_reply("Nothing is low.", json!(null));
    let transport = ScriptedTransport::new(vec![first, follow_up]);
    let mut assistant = Assistant::new(&config_with_key(), transport, Arc::new(registry));

    let outcome = assistant.process_command("anything running out?", &()).await;

    assert!(outcome.success);
    let seen = seen.lock().await;
    assert_eq!(seen.len(), 1, "call must not be dropped");
    assert!(seen[0].is_empty(), "malformed arguments degrade to empty map");
}

#[tokio::test]
async fn fallback_classifier_handles_empty_gateway_replies() {
    let empty = gateway_reply("", json!(null));
    let transport = ScriptedTransport::new(vec![empty]);
    let mut assistant = Assistant::new(&config_with_key(), transport, standard_registry());

    let outcome = assistant.process_command("show low stock", &()).await;

    assert!(outcome.success);
    assert!(outcome.message.contains("**Cola**"), "display formatting expected");
    assert_eq!(outcome.tool_results.len(), 1);
    assert_eq!(outcome.tool_results[0].function_name, "get_low_stock_items");
}

#[tokio::test]
async fn unmatched_fallback_returns_static_help() {
    let empty = gateway_reply("", json!(null));
    let transport = ScriptedTransport::new(vec![empty]);
    let mut assistant = Assistant::new(&config_with_key(), transport, standard_registry());

    let outcome = assistant.process_command("xyzzy", &()).await;

    assert!(outcome.success);
    assert!(outcome.message.contains("I can help you with inventory"));
    assert!(outcome.tool_results.is_empty());
}

#[tokio::test]
async fn gateway_failure_surfaces_user_sentence_and_detail() {
    struct FailingTransport;
    #[async_trait]
    impl Transport for FailingTransport {
        async fn post_chat(&self, _p: &Value, _b: &str) -> Result<Value, TransportError> {
            Err(TransportError::Http {
                status: 500,
                body: "internal".into(),
            })
        }
    }

    let mut assistant = Assistant::new(
        &config_with_key(),
        Arc::new(FailingTransport),
        standard_registry(),
    );

    let outcome = assistant.process_command("what do we have on hand?", &()).await;

    assert!(!outcome.success);
    assert_eq!(outcome.message, "The model gateway returned an error.");
    assert!(outcome.error.unwrap().contains("http 500"));
}

#[tokio::test]
async fn session_registry_keeps_conversations_apart() -> anyhow::Result<()> {
    let sessions = SessionRegistry::new(
        config_with_key(),
        ScriptedTransport::new(vec![]),
        standard_registry(),
    );

    let a = sessions.session("sess_a").await;
    let b = sessions.session("sess_b").await;

    a.lock().await.process_command("daily report", &()).await;

    let a_turns = a.lock().await.session_context().turn_count;
    let b_turns = b.lock().await.session_context().turn_count;
    assert_eq!(a_turns, 1);
    assert_eq!(b_turns, 0);

    assert!(sessions.clear_conversation("sess_a").await);
    assert_eq!(a.lock().await.get_status().conversation_length, 1);
    Ok(())
}

#[tokio::test]
async fn status_reflects_configuration_and_registry() {
    let transport = ScriptedTransport::new(vec![]);
    let assistant = Assistant::new(&config_with_key(), transport, standard_registry());

    let status = assistant.get_status();
    assert!(status.credential_configured);
    assert_eq!(status.model, "gpt-4o-mini");
    assert_eq!(status.tools_registered, 4);
    assert_eq!(status.conversation_length, 1); // 仅 system prompt
}
