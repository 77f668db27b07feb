//! 网关回复的数据类型
//!
//! ToolCall / ChatResponse / Usage 均为单次网络往返的瞬态对象；
//! tool call 参数从 wire 上的 JSON 字符串防御式解码，畸形负载降级为空参数表而非中断本轮。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 模型发出的一次工具调用请求，按 id 与工具结果配对
#[derive(Clone, Debug, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub function_name: String,
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    /// 从 wire 上的原始 tool_call 记录解析；非 function 类型返回 None
    pub fn from_raw(raw: &Value) -> Option<Self> {
        if raw.get("type").and_then(Value::as_str) != Some("function") {
            return None;
        }
        let function = raw.get("function")?;
        Some(Self {
            id: raw
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            function_name: function
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            arguments: decode_arguments(function.get("arguments")),
        })
    }
}

/// 参数字符串解码：非法 JSON 或非对象一律降级为空表
fn decode_arguments(raw: Option<&Value>) -> Map<String, Value> {
    let text = match raw.and_then(Value::as_str) {
        Some(t) => t,
        None => return Map::new(),
    };
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

/// token 用量统计（单次往返）
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// 网关的一次成功回复；失败走 `GatewayError`，因此这里不携带 error 字段
#[derive(Clone, Debug, Default)]
pub struct ChatResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: String,
    pub usage: Usage,
}
