//! 模型网关层：传输抽象、失败分类、重试与回复解析

pub mod client;
pub mod transport;
pub mod types;

pub use client::{GatewayClient, GatewayError};
pub use transport::{HttpTransport, Transport, TransportError};
pub use types::{ChatResponse, ToolCall, Usage};
