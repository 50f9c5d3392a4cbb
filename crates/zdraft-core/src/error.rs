//! 内核错误定义

use crate::element::ElementId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KernelError {
    /// 索引与元素存储不一致，属于程序错误
    #[error("Consistency violation: {0}")]
    ConsistencyViolation(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(String),

    #[error("Element not found: {0}")]
    ElementNotFound(ElementId),

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),
}

impl KernelError {
    /// 构造一致性错误并立即记录
    pub fn consistency(message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::error!("consistency violation: {}", message);
        KernelError::ConsistencyViolation(message)
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        KernelError::InvalidOperation(message.into())
    }

    pub fn degenerate(message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::warn!("rejected degenerate geometry: {}", message);
        KernelError::DegenerateGeometry(message)
    }
}

pub type Result<T> = std::result::Result<T, KernelError>;
