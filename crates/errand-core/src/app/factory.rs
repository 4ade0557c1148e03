//! BackendFactory - backend パスから backend を作る
//!
//! 設定ファイルの `BACKEND` に書かれたパスを、コンストラクタに解決します。
//! 組み込みの backend は最初から登録済みです。

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::{BackendOptions, TaskError};
use crate::impls::{DummyBackend, ImmediateBackend};
use crate::ports::TaskBackend;
use crate::typed::TaskRegistry;

pub type BackendConstructor = Arc<
    dyn Fn(&BackendOptions, Arc<TaskRegistry>) -> Result<Arc<dyn TaskBackend>, TaskError>
        + Send
        + Sync,
>;

pub struct BackendFactory {
    constructors: HashMap<String, BackendConstructor>,
}

impl BackendFactory {
    /// 何も登録されていない factory
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// 組み込みの backend を登録した factory
    pub fn new() -> Self {
        let mut factory = Self::empty();
        factory.insert(ImmediateBackend::PATH, |options, registry| {
            let backend: Arc<dyn TaskBackend> = Arc::new(ImmediateBackend::new(options, registry)?);
            Ok(backend)
        });
        factory.insert(DummyBackend::PATH, |options, registry| {
            let backend: Arc<dyn TaskBackend> = Arc::new(DummyBackend::new(options, registry)?);
            Ok(backend)
        });
        factory
    }

    /// 独自の backend を登録する
    pub fn register<F>(&mut self, path: &str, constructor: F) -> Result<(), TaskError>
    where
        F: Fn(&BackendOptions, Arc<TaskRegistry>) -> Result<Arc<dyn TaskBackend>, TaskError>
            + Send
            + Sync
            + 'static,
    {
        if self.constructors.contains_key(path) {
            return Err(TaskError::InvalidBackend(format!(
                "backend path '{path}' is already registered"
            )));
        }
        self.insert(path, constructor);
        Ok(())
    }

    fn insert<F>(&mut self, path: &str, constructor: F)
    where
        F: Fn(&BackendOptions, Arc<TaskRegistry>) -> Result<Arc<dyn TaskBackend>, TaskError>
            + Send
            + Sync
            + 'static,
    {
        self.constructors.insert(path.to_string(), Arc::new(constructor));
    }

    pub fn contains(&self, path: &str) -> bool {
        self.constructors.contains_key(path)
    }

    pub fn build(
        &self,
        path: &str,
        options: &BackendOptions,
        registry: Arc<TaskRegistry>,
    ) -> Result<Arc<dyn TaskBackend>, TaskError> {
        let constructor = self
            .constructors
            .get(path)
            .ok_or_else(|| TaskError::InvalidBackend(format!("unknown backend path '{path}'")))?;
        constructor(options, registry)
    }
}

impl Default for BackendFactory {
    fn default() -> Self {
        Self::new()
    }
}
