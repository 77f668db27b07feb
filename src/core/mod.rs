//! 核心层：编排器、会话状态与会话注册表

pub mod orchestrator;
pub mod session;

pub use orchestrator::{default_system_prompt, Assistant, AssistantStatus, CommandOutcome};
pub use session::{SessionContext, SessionRegistry};
