//! 会话状态与会话注册表
//!
//! SessionContext 是每会话的暂存状态，仅供编排器做连续性展示，不参与正确性。
//! SessionRegistry 以会话 id 发放独立的 Assistant 实例（各自持有历史 / 会话状态），
//! 共享的协作者（配置、传输、工具注册表）注入一次；取代进程级单例，
//! 并发用户之间不串状态。

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::core::orchestrator::Assistant;
use crate::llm::Transport;
use crate::tools::{CallOutcome, ToolRegistry};

/// 每会话暂存：最近一次指令 / 工具 / 结果与轮次计数，每处理一条指令更新一次
#[derive(Clone, Debug, Default, Serialize)]
pub struct SessionContext {
    pub last_query: Option<String>,
    pub last_tool_used: Option<String>,
    pub last_result: Option<String>,
    pub turn_count: u64,
}

impl SessionContext {
    pub(crate) fn note_turn(&mut self, query: &str, tool_results: &[CallOutcome], message: &str) {
        self.turn_count += 1;
        self.last_query = Some(query.to_string());
        if let Some(last) = tool_results.last() {
            self.last_tool_used = Some(last.function_name.clone());
        }
        let truncated: String = message.chars().take(200).collect();
        self.last_result = Some(truncated);
    }
}

/// 会话注册表：session id → Assistant；协作者注入一次，实例按需构建
pub struct SessionRegistry {
    config: AppConfig,
    transport: Arc<dyn Transport>,
    tools: Arc<ToolRegistry>,
    sessions: RwLock<HashMap<String, Arc<Mutex<Assistant>>>>,
}

impl SessionRegistry {
    pub fn new(config: AppConfig, transport: Arc<dyn Transport>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            config,
            transport,
            tools,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn mint_session_id() -> String {
        format!("sess_{}", Uuid::new_v4())
    }

    /// 取出或创建指定会话的 Assistant
    pub async fn session(&self, session_id: &str) -> Arc<Mutex<Assistant>> {
        if let Some(existing) = self.sessions.read().await.get(session_id) {
            return existing.clone();
        }
        let mut sessions = self.sessions.write().await;
        // 写锁下复查，两个并发首访只建一个实例
        if let Some(existing) = sessions.get(session_id) {
            return existing.clone();
        }
        tracing::info!(session_id, "creating assistant session");
        let assistant = Arc::new(Mutex::new(Assistant::new(
            &self.config,
            self.transport.clone(),
            self.tools.clone(),
        )));
        sessions.insert(session_id.to_string(), assistant.clone());
        assistant
    }

    /// 清空指定会话的对话历史；会话不存在返回 false
    pub async fn clear_conversation(&self, session_id: &str) -> bool {
        match self.sessions.read().await.get(session_id) {
            Some(assistant) => {
                assistant.lock().await.clear_conversation();
                true
            }
            None => false,
        }
    }

    /// 整体移除会话（历史与暂存状态一并丢弃）
    pub async fn remove(&self, session_id: &str) -> bool {
        self.sessions.write().await.remove(session_id).is_some()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::Value;

    use crate::llm::TransportError;

    struct DeadTransport;

    #[async_trait]
    impl Transport for DeadTransport {
        async fn post_chat(&self, _payload: &Value, _bearer: &str) -> Result<Value, TransportError> {
            Err(TransportError::Other("unused".into()))
        }
    }

    fn registry() -> SessionRegistry {
        SessionRegistry::new(
            AppConfig::default(),
            Arc::new(DeadTransport),
            Arc::new(ToolRegistry::new()),
        )
    }

    #[tokio::test]
    async fn same_id_returns_same_instance() {
        let sessions = registry();
        let a = sessions.session("sess_1").await;
        let b = sessions.session("sess_1").await;
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(sessions.session_count().await, 1);
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let sessions = registry();
        let a = sessions.session("sess_a").await;
        let b = sessions.session("sess_b").await;

        a.lock().await.set_system_prompt("prompt for a");
        assert_eq!(a.lock().await.get_status().conversation_length, 1);
        assert_eq!(b.lock().await.get_status().conversation_length, 1);
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn clear_conversation_requires_existing_session() {
        let sessions = registry();
        assert!(!sessions.clear_conversation("nope").await);
        sessions.session("sess_x").await;
        assert!(sessions.clear_conversation("sess_x").await);
        assert!(sessions.remove("sess_x").await);
        assert_eq!(sessions.session_count().await, 0);
    }
}
