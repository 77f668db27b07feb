//! Stockline - 库存与采购智能助手核心
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **conversation**: 对话历史（system/user/assistant/tool 转写）
//! - **core**: 编排器、会话状态与会话注册表
//! - **fallback**: 兜底意图分类器（模型未调用工具时的关键词匹配）
//! - **llm**: 模型网关客户端（请求构建、失败分类、退避重试）
//! - **plan**: 任务规划器与执行器（顺序 / 并行 / 条件工作流）
//! - **tools**: 工具注册表、标准目录、类别过滤、结果格式化与分发
//!
//! CRUD 持久层、HTTP 路由与具体业务工具是外部协作者：宿主通过
//! [`tools::ToolRegistry`] 注册可调用、通过 [`tools::ExecutionScope`]
//! 注入请求级资源，再经 [`SessionRegistry`] 按会话取得 [`Assistant`]。

pub mod config;
pub mod conversation;
pub mod core;
pub mod fallback;
pub mod llm;
pub mod observability;
pub mod plan;
pub mod tools;

pub use crate::core::{Assistant, AssistantStatus, CommandOutcome, SessionRegistry};
