//! 工具层：注册表、标准目录、类别过滤、结果格式化与批量分发

pub mod catalog;
pub mod dispatcher;
pub mod format;
pub mod registry;

pub use catalog::{register_standard, relevant_subset};
pub use dispatcher::{CallOutcome, ToolDispatcher};
pub use registry::{
    ExecutionScope, OutputMode, RegistryError, ResultFormatter, Tool, ToolDescriptor,
    ToolRegistry,
};
