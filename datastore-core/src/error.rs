//! 持久化模板统一错误定义
//!
//! 覆盖数据映射、参数校验、实体描述、序列化与底层存储等最小必要集合，
//! 客户端实现产生的错误以 `Store` 原样透传，模板内部不做包装与重试。
//!
use thiserror::Error;

/// 统一错误类型
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DatastoreError {
    // --- 数据映射 ---
    #[error("data access error: {reason}")]
    DataAccess { reason: String },
    #[error("illegal argument: {reason}")]
    IllegalArgument { reason: String },
    #[error("mapping error: {reason}")]
    Mapping { reason: String },
    #[error("type mismatch: expected={expected}, found={found}")]
    TypeMismatch { expected: String, found: String },

    // --- 序列化 ---
    #[error("serialization error: {source}")]
    Serde {
        #[from]
        source: serde_json::Error,
    },

    // --- 底层存储 ---
    #[error("store error: {reason}")]
    Store { reason: String },

    // --- 事件 ---
    #[error("event bus error: {reason}")]
    EventBus { reason: String },
}

impl DatastoreError {
    pub fn data_access(reason: impl Into<String>) -> Self {
        Self::DataAccess {
            reason: reason.into(),
        }
    }

    pub fn illegal_argument(reason: impl Into<String>) -> Self {
        Self::IllegalArgument {
            reason: reason.into(),
        }
    }

    pub fn mapping(reason: impl Into<String>) -> Self {
        Self::Mapping {
            reason: reason.into(),
        }
    }

    pub fn store(reason: impl Into<String>) -> Self {
        Self::Store {
            reason: reason.into(),
        }
    }

    pub fn event_bus(reason: impl Into<String>) -> Self {
        Self::EventBus {
            reason: reason.into(),
        }
    }

    /// 实体类型上不存在指定的关联字段
    pub fn unknown_relation<T: ?Sized>(field: &str) -> Self {
        Self::Mapping {
            reason: format!(
                "{} has no relation field named {field}",
                std::any::type_name::<T>()
            ),
        }
    }

    pub(crate) fn type_mismatch<T: ?Sized>(found: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: std::any::type_name::<T>().to_string(),
            found: found.into(),
        }
    }
}

/// 统一 Result 类型别名
pub type DatastoreResult<T> = Result<T, DatastoreError>;
