//! 助手编排器：单条指令的主控流程
//!
//! 规划器优先：命中即独立于网关执行整个工作流。未命中时类别过滤收窄工具集、
//! 网关发起模型调用、分发器执行返回的 tool calls 并回灌历史；仅当模型既未给出
//! 文本也未调用工具时才轮到兜底分类器。每个实例独占一份历史与会话状态，
//! 由 SessionRegistry 按会话发放。

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::conversation::{ConversationHistory, Message};
use crate::core::session::SessionContext;
use crate::fallback::FallbackClassifier;
use crate::llm::{GatewayClient, Transport, Usage};
use crate::plan::{PlanExecutor, PlanRun, TaskPlanner};
use crate::tools::{
    relevant_subset, CallOutcome, ExecutionScope, OutputMode, ToolDispatcher, ToolRegistry,
};

/// 处理一条指令的结果
#[derive(Clone, Debug, Serialize)]
pub struct CommandOutcome {
    pub success: bool,
    pub message: String,
    pub tool_results: Vec<CallOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 助手当前状态快照
#[derive(Clone, Debug, Serialize)]
pub struct AssistantStatus {
    pub credential_configured: bool,
    pub model: String,
    pub tools_registered: usize,
    pub conversation_length: usize,
}

/// 默认 system prompt，标注当天日期
pub fn default_system_prompt() -> String {
    let current_date = chrono::Local::now().format("%Y-%m-%d");
    format!(
        "You are an inventory and procurement assistant for a point-of-sale system. \
         You help manage inventory, purchase orders, suppliers and warehouse operations.\n\n\
         You have access to tools that read and modify real data. When the user asks for \
         an action or a figure, call the appropriate tool - never invent inventory numbers \
         or product information.\n\n\
         Guidelines:\n\
         - Be concise but include specific numbers from tool results\n\
         - Use bullet points for lists\n\
         - If a tool returns an error, explain it to the user\n\n\
         Current date: {current_date}"
    )
}

/// 每会话一个实例；协作者（传输、工具注册表）注入，核心不自行构造
pub struct Assistant {
    history: ConversationHistory,
    session: SessionContext,
    gateway: GatewayClient,
    planner: TaskPlanner,
    plan_executor: PlanExecutor,
    dispatcher: ToolDispatcher,
    fallback: FallbackClassifier,
    tools: Arc<ToolRegistry>,
    temperature: f32,
    max_tokens: u32,
    cancel: CancellationToken,
}

impl Assistant {
    pub fn new(config: &AppConfig, transport: Arc<dyn Transport>, tools: Arc<ToolRegistry>) -> Self {
        let gateway = GatewayClient::new(
            transport,
            config.gateway.model.clone(),
            config.gateway.resolve_api_key(),
            config.assistant.max_retries,
        );
        let mut history = ConversationHistory::new();
        history.set_system_prompt(default_system_prompt());

        Self {
            history,
            session: SessionContext::default(),
            gateway,
            planner: TaskPlanner::new(),
            plan_executor: PlanExecutor::new(),
            dispatcher: ToolDispatcher::new(tools.clone()),
            fallback: FallbackClassifier::new(),
            tools,
            temperature: config.assistant.temperature,
            max_tokens: config.assistant.max_tokens,
            cancel: CancellationToken::new(),
        }
    }

    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        self.history.set_system_prompt(prompt);
    }

    pub fn session_context(&self) -> &SessionContext {
        &self.session
    }

    /// 供宿主中断重试等待的取消信号
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn get_status(&self) -> AssistantStatus {
        AssistantStatus {
            credential_configured: self.gateway.credential_configured(),
            model: self.gateway.model().to_string(),
            tools_registered: self.tools.len(),
            conversation_length: self.history.len(),
        }
    }

    /// 展示用转写视图（内容截断到 200 字符）
    pub fn conversation_preview(&self) -> Vec<Message> {
        self.history.preview(200)
    }

    /// 清空对话，保留 system prompt；会话暂存状态保留
    pub fn clear_conversation(&mut self) {
        self.history.clear();
    }

    /// 处理一条自然语言指令；scope 为宿主注入的请求级执行环境
    pub async fn process_command(
        &mut self,
        command: &str,
        scope: &dyn ExecutionScope,
    ) -> CommandOutcome {
        tracing::info!(command = %truncate(command, 50), "processing command");

        // 1. 规划器优先：命中的工作流独立于网关执行
        if let Some(plan) = self.planner.match_command(command) {
            let run = self.plan_executor.run(&plan, &self.dispatcher, scope).await;
            let message = self.render_plan(&run);
            let tool_results = plan_outcomes(&run);
            let error = (!run.success).then(|| run.message.clone());
            return self.finish(command, run.success, message, tool_results, None, error);
        }

        // 2. 类别过滤 + 网关调用
        let tools = relevant_subset(command, &self.tools);
        self.history.push_user(command);
        let cancel = self.cancel.clone();
        let response = match self
            .gateway
            .send(&mut self.history, &tools, self.temperature, self.max_tokens, &cancel)
            .await
        {
            Ok(response) => response,
            Err(err) => {
                let message = err.user_message();
                let detail = err.to_string();
                return self.finish(command, false, message, Vec::new(), None, Some(detail));
            }
        };

        // 3. 执行模型要求的工具调用
        if !response.tool_calls.is_empty() {
            let tool_results = self
                .dispatcher
                .execute(&response.tool_calls, scope, &mut self.history)
                .await;

            let errors: Vec<String> = tool_results
                .iter()
                .filter_map(|r| r.error.as_ref().map(|e| format!("- {}: {e}", r.function_name)))
                .collect();
            if !errors.is_empty() {
                let message = format!(
                    "I encountered errors while processing your request:\n{}",
                    errors.join("\n")
                );
                return self.finish(
                    command,
                    false,
                    message,
                    tool_results,
                    Some(response.usage),
                    Some("Tool execution failed".to_string()),
                );
            }

            let message = self.summarize(&tool_results, &response.content, &cancel).await;
            return self.finish(command, true, message, tool_results, Some(response.usage), None);
        }

        // 4. 有文本就直接用
        if !response.content.is_empty() {
            let message = response.content.clone();
            return self.finish(command, true, message, Vec::new(), Some(response.usage), None);
        }

        // 5. 兜底：既无文本也无工具调用
        match self.fallback.classify(command) {
            Some(matched) => {
                match self
                    .dispatcher
                    .invoke(matched.tool_name, matched.arguments.clone(), scope)
                    .await
                {
                    Ok(result) => {
                        let message =
                            self.tools
                                .format_result(matched.tool_name, &result, OutputMode::Display);
                        let outcome = CallOutcome {
                            tool_call_id: "fallback".to_string(),
                            function_name: matched.tool_name.to_string(),
                            result: Some(result),
                            error: None,
                        };
                        self.finish(
                            command,
                            true,
                            message,
                            vec![outcome],
                            Some(response.usage),
                            None,
                        )
                    }
                    Err(err) => {
                        let outcome = CallOutcome {
                            tool_call_id: "fallback".to_string(),
                            function_name: matched.tool_name.to_string(),
                            result: None,
                            error: Some(err.clone()),
                        };
                        let message = format!("I couldn't complete that request: {err}");
                        self.finish(
                            command,
                            false,
                            message,
                            vec![outcome],
                            Some(response.usage),
                            Some(err),
                        )
                    }
                }
            }
            None => {
                let message = self.fallback.help_text();
                self.finish(command, true, message, Vec::new(), Some(response.usage), None)
            }
        }
    }

    /// 工具批量成功后的跟进调用：让模型基于结果摘要产出面向用户的总结。
    /// 跟进不带工具集（只要文本）；失败时退回首轮回复的文本
    async fn summarize(
        &mut self,
        tool_results: &[CallOutcome],
        first_content: &str,
        cancel: &CancellationToken,
    ) -> String {
        let summary: Vec<String> = tool_results
            .iter()
            .filter_map(|r| {
                r.result.as_ref().map(|value| {
                    self.tools
                        .format_result(&r.function_name, value, OutputMode::Summary)
                })
            })
            .collect();
        self.history.push_user(format!(
            "Based on the tool results:\n{}\n\nPlease provide a clear, concise summary of \
             what was accomplished for the user.",
            summary.join("\n")
        ));

        match self
            .gateway
            .send(&mut self.history, &[], self.temperature, self.max_tokens, cancel)
            .await
        {
            Ok(follow_up) if !follow_up.content.is_empty() => follow_up.content,
            Ok(_) => first_content.to_string(),
            Err(err) => {
                tracing::warn!(error = %err, "follow-up summary failed, using first reply");
                first_content.to_string()
            }
        }
    }

    /// 计划结果渲染：成功步骤用 Display 格式化器逐段拼接，短路与失败直接用计划消息
    fn render_plan(&self, run: &PlanRun) -> String {
        if !run.success {
            let details: Vec<String> = run
                .steps
                .iter()
                .filter_map(|s| s.error.as_ref().map(|e| format!("- {}: {e}", s.tool_name)))
                .collect();
            if details.is_empty() {
                return run.message.clone();
            }
            return format!("{}\n{}", run.message, details.join("\n"));
        }

        let sections: Vec<String> = run
            .steps
            .iter()
            .filter(|s| !s.skipped)
            .filter_map(|s| {
                s.result.as_ref().map(|value| {
                    self.tools
                        .format_result(&s.tool_name, value, OutputMode::Display)
                })
            })
            .collect();
        if sections.is_empty() {
            run.message.clone()
        } else {
            sections.join("\n\n")
        }
    }

    /// 收尾：更新会话暂存、写审计日志、组装结果
    fn finish(
        &mut self,
        command: &str,
        success: bool,
        message: String,
        tool_results: Vec<CallOutcome>,
        usage: Option<Usage>,
        error: Option<String>,
    ) -> CommandOutcome {
        self.session.note_turn(command, &tool_results, &message);

        let actions: Vec<&str> = tool_results
            .iter()
            .filter(|r| r.result.is_some())
            .map(|r| r.function_name.as_str())
            .collect();
        let audit = json!({
            "event": "command_audit",
            "command": truncate(command, 50),
            "success": success,
            "actions": actions,
            "turn": self.session.turn_count,
        });
        tracing::info!(audit = %audit, "command");

        CommandOutcome {
            success,
            message,
            tool_results,
            usage,
            error,
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    } else {
        text.to_string()
    }
}

/// 计划步骤结果映射为统一的工具结果条目
fn plan_outcomes(run: &PlanRun) -> Vec<CallOutcome> {
    run.steps
        .iter()
        .enumerate()
        .map(|(i, s)| CallOutcome {
            tool_call_id: format!("{}_step_{}", run.plan_id, i + 1),
            function_name: s.tool_name.clone(),
            result: s.result.clone(),
            error: s.error.clone(),
        })
        .collect()
}
