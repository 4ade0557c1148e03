//! TasksConfig - backend の設定
//!
//! alias → backend 設定 のマップを JSON から読みます。
//!
//! ```json
//! {
//!   "default": { "BACKEND": "errand::ImmediateBackend" },
//!   "dummy":   { "BACKEND": "errand::DummyBackend", "QUEUES": ["default", "emails"],
//!                "OPTIONS": { "max_results": 100 } }
//! }
//! ```
//!
//! `default` は必須です。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::domain::options::{self, BackendOptions};
use crate::domain::task::DEFAULT_BACKEND_ALIAS;
use crate::domain::TaskError;
use crate::impls::ImmediateBackend;

/// 1 つの backend の設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", deny_unknown_fields)]
pub struct BackendConfig {
    /// BackendFactory に登録されたパス
    pub backend: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub queues: Vec<String>,

    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub options: serde_json::Map<String, serde_json::Value>,
}

impl BackendConfig {
    pub fn new(backend: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            queues: Vec::new(),
            options: serde_json::Map::new(),
        }
    }

    pub fn with_queues<I, S>(mut self, queues: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.queues = queues.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// ALIAS を足して backend に渡すオプションを作る
    pub fn to_options(&self, alias: &str) -> BackendOptions {
        let mut opts = BackendOptions::with_alias(alias).set(options::BACKEND, self.backend.as_str());
        if !self.queues.is_empty() {
            opts = opts.set(options::QUEUES, self.queues.clone());
        }
        if !self.options.is_empty() {
            opts = opts.set(options::OPTIONS, self.options.clone());
        }
        opts
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TasksConfig {
    backends: BTreeMap<String, BackendConfig>,
}

impl TasksConfig {
    pub fn new() -> Self {
        Self {
            backends: BTreeMap::new(),
        }
    }

    pub fn with_backend(mut self, alias: impl Into<String>, config: BackendConfig) -> Self {
        self.backends.insert(alias.into(), config);
        self
    }

    pub fn from_json_str(s: &str) -> Result<Self, TaskError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, TaskError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).inspect_err(|e| {
            tracing::warn!(path = %path.display(), error = %e, "cannot read tasks config");
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), TaskError> {
        if !self.backends.contains_key(DEFAULT_BACKEND_ALIAS) {
            return Err(TaskError::InvalidBackend(format!(
                "no '{DEFAULT_BACKEND_ALIAS}' backend configured"
            )));
        }
        Ok(())
    }

    pub fn get(&self, alias: &str) -> Option<&BackendConfig> {
        self.backends.get(alias)
    }

    pub fn aliases(&self) -> Vec<String> {
        self.backends.keys().cloned().collect()
    }
}

impl Default for TasksConfig {
    /// `default` = ImmediateBackend
    fn default() -> Self {
        Self::new().with_backend(DEFAULT_BACKEND_ALIAS, BackendConfig::new(ImmediateBackend::PATH))
    }
}
