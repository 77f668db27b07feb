//! 对话历史
//!
//! 角色化消息转写（system/user/assistant/tool），供网关客户端构建请求与编排器渲染。
//! 不变式：system 消息至多一条且永远在下标 0；clear 仅保留 system prompt。

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 消息角色（与网关 wire 协议一致）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// 单条消息；assistant 消息可携带原始 tool_calls 记录，tool 消息以 tool_call_id 配对
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// assistant 回复，带网关返回的原始 tool_calls 记录（原样回传，供下一轮请求）
    pub fn assistant_with_calls(content: impl Into<String>, tool_calls: Vec<Value>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: if tool_calls.is_empty() {
                None
            } else {
                Some(tool_calls)
            },
            tool_call_id: None,
        }
    }

    /// tool 结果消息：每个 tool call 必须在下一轮 assistant 前配对一条
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

/// 对话转写：一次会话期间持续累积，由唯一的编排器实例独占
#[derive(Clone, Debug, Default)]
pub struct ConversationHistory {
    messages: Vec<Message>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置 system prompt：先移除已有 system 消息，再插入到下标 0
    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        self.messages.retain(|m| m.role != Role::System);
        self.messages.insert(0, Message::system(prompt));
    }

    pub fn push(&mut self, msg: Message) {
        self.messages.push(msg);
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(Message::user(content));
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// 清空对话，仅保留 system prompt
    pub fn clear(&mut self) {
        self.messages.retain(|m| m.role == Role::System);
    }

    /// 供 UI / 日志展示的转写视图，content 截断到 max_chars
    pub fn preview(&self, max_chars: usize) -> Vec<Message> {
        self.messages
            .iter()
            .map(|m| {
                let mut m = m.clone();
                if m.content.chars().count() > max_chars {
                    m.content = format!("{}...", m.content.chars().take(max_chars).collect::<String>());
                }
                m
            })
            .collect()
    }
}
