//! Errors - エラー型と分類
//!
//! # 分類
//! - InvalidTask: validate_task で検出（呼び出し側が Task を直す必要がある）
//! - NotImplemented / Unsupported: backend がその操作を持っていない
//! - ResultDoesNotExist / ResultNotReady: 結果の参照失敗
//! - MissingOption / InvalidOption / InvalidBackend: 構成エラー
//! - Io: 設定ファイルなどの読み込み失敗
//!
//! どのエラーもリトライされず、そのまま呼び出し側に返ります。

use thiserror::Error;

use super::ids::ResultId;
use crate::typed::RegistryError;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("invalid task: {0}")]
    InvalidTask(String),

    #[error("{0} is not implemented by this backend")]
    NotImplemented(&'static str),

    #[error("{0}")]
    Unsupported(String),

    #[error("result does not exist: {0}")]
    ResultDoesNotExist(ResultId),

    #[error("result {0} has no return value yet")]
    ResultNotReady(ResultId),

    #[error("missing backend option: {0}")]
    MissingOption(&'static str),

    #[error("invalid backend option {key}: {reason}")]
    InvalidOption { key: &'static str, reason: String },

    #[error("invalid task backend: {0}")]
    InvalidBackend(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("sync bridge failure: {0}")]
    Bridge(String),

    #[error("codec: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl TaskError {
    pub fn invalid_task(reason: impl Into<String>) -> Self {
        Self::InvalidTask(reason.into())
    }

    /// validate_task 由来のエラーか
    pub fn is_invalid_task(&self) -> bool {
        matches!(self, Self::InvalidTask(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_descriptive() {
        let err = TaskError::invalid_task("priority must be positive");
        assert_eq!(err.to_string(), "invalid task: priority must be positive");
        assert!(err.is_invalid_task());

        let err = TaskError::NotImplemented("enqueue");
        assert_eq!(err.to_string(), "enqueue is not implemented by this backend");
        assert!(!err.is_invalid_task());

        let err = TaskError::MissingOption("ALIAS");
        assert_eq!(err.to_string(), "missing backend option: ALIAS");
    }

    #[test]
    fn registry_errors_convert() {
        let err: TaskError = RegistryError::NotRegistered("app::missing".to_string()).into();
        assert!(matches!(err, TaskError::Registry(_)));
        assert!(err.to_string().contains("app::missing"));
    }
}
