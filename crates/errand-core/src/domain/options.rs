//! BackendOptions - backend を構築するときのオプション
//!
//! 文字列キーのマップです。base が読むのは `ALIAS` と `QUEUES` だけで、
//! それ以外（`OPTIONS` など）は各 backend が解釈します。

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::errors::TaskError;

pub const ALIAS: &str = "ALIAS";
pub const BACKEND: &str = "BACKEND";
pub const QUEUES: &str = "QUEUES";
pub const OPTIONS: &str = "OPTIONS";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackendOptions(serde_json::Map<String, serde_json::Value>);

impl BackendOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// `{"ALIAS": alias}` だけを持つオプション
    pub fn with_alias(alias: impl Into<String>) -> Self {
        let alias: String = alias.into();
        Self::new().set(ALIAS, alias)
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    /// 必須の `ALIAS`
    pub fn alias(&self) -> Result<&str, TaskError> {
        match self.0.get(ALIAS) {
            None => Err(TaskError::MissingOption(ALIAS)),
            Some(serde_json::Value::String(alias)) => Ok(alias),
            Some(other) => Err(TaskError::InvalidOption {
                key: ALIAS,
                reason: format!("expected a string, got {other}"),
            }),
        }
    }

    /// 許可されたキュー名。`None` はどのキューでも可。
    pub fn queues(&self) -> Result<Option<BTreeSet<String>>, TaskError> {
        let Some(value) = self.0.get(QUEUES) else {
            return Ok(None);
        };
        let queues: BTreeSet<String> =
            serde_json::from_value(value.clone()).map_err(|e| TaskError::InvalidOption {
                key: QUEUES,
                reason: e.to_string(),
            })?;
        Ok((!queues.is_empty()).then_some(queues))
    }

    /// backend 固有の `OPTIONS` を `O` として読む（なければ `O::default()`）
    pub fn backend_options<O>(&self) -> Result<O, TaskError>
    where
        O: serde::de::DeserializeOwned + Default,
    {
        match self.0.get(OPTIONS) {
            None => Ok(O::default()),
            Some(value) => {
                serde_json::from_value(value.clone()).map_err(|e| TaskError::InvalidOption {
                    key: OPTIONS,
                    reason: e.to_string(),
                })
            }
        }
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for BackendOptions {
    fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
        Self(map)
    }
}
