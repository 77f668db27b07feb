//! 工具注册表
//!
//! 工具实现 Tool trait，在注册时与描述符（名称 / 说明 / 参数 schema）和可选的
//! 结果格式化器绑定；名称即分发键，重复注册在注册时拒绝而非调用时发现。

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// 宿主注入的执行环境（如请求级数据库句柄）；核心从不自行构造，
/// 工具实现按需 downcast 到宿主的具体类型
pub trait ExecutionScope: Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

/// 无资源的空环境，供测试与无状态工具使用
impl ExecutionScope for () {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// 工具：命名的异步可调用，参数为 JSON 对象，返回 JSON 结果或错误描述。
/// 失败以 Err(String) 表达，由分发器落为单条调用错误，不向上传播
#[async_trait]
pub trait Tool: Send + Sync {
    async fn call(
        &self,
        scope: &dyn ExecutionScope,
        args: Map<String, Value>,
    ) -> Result<Value, String>;
}

/// 工具描述符：注册一次，名称唯一；parameters 为 JSON Schema
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// 结果格式化的输出模式：Summary 供模型总结用的一行摘要，Display 面向用户的完整渲染
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputMode {
    Summary,
    Display,
}

/// 每工具一个格式化器，按 OutputMode 选择措辞
pub type ResultFormatter = fn(&Value, OutputMode) -> String;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("tool '{0}' is already registered")]
    Duplicate(String),
}

struct ToolEntry {
    descriptor: ToolDescriptor,
    handler: Arc<dyn Tool>,
    formatter: Option<ResultFormatter>,
}

/// 工具注册表：名称 → {描述符, 可调用, 格式化器}
#[derive(Default)]
pub struct ToolRegistry {
    entries: HashMap<String, ToolEntry>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        descriptor: ToolDescriptor,
        handler: Arc<dyn Tool>,
    ) -> Result<(), RegistryError> {
        self.register_with_formatter(descriptor, handler, None)
    }

    pub fn register_with_formatter(
        &mut self,
        descriptor: ToolDescriptor,
        handler: Arc<dyn Tool>,
        formatter: Option<ResultFormatter>,
    ) -> Result<(), RegistryError> {
        let name = descriptor.name.clone();
        if self.entries.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        self.entries.insert(
            name,
            ToolEntry {
                descriptor,
                handler,
                formatter,
            },
        );
        Ok(())
    }

    pub fn handler(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.entries.get(name).map(|e| e.handler.clone())
    }

    pub fn descriptor(&self, name: &str) -> Option<&ToolDescriptor> {
        self.entries.get(name).map(|e| &e.descriptor)
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.entries.values().map(|e| e.descriptor.clone()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 用注册的格式化器渲染工具结果；未注册格式化器时退回截断的 JSON
    pub fn format_result(&self, name: &str, result: &Value, mode: OutputMode) -> String {
        match self.entries.get(name).and_then(|e| e.formatter) {
            Some(fmt) => fmt(result, mode),
            None => crate::tools::format::generic(name, result, mode),
        }
    }
}
