//! BackendHandler - alias から backend を引く
//!
//! 設定された alias ごとに backend を 1 つだけ作り、使い回します。
//! backend は最初に要求されたときに作られます（lazy）。

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::app::config::TasksConfig;
use crate::app::factory::BackendFactory;
use crate::domain::task::DEFAULT_BACKEND_ALIAS;
use crate::domain::{ResultId, Task, TaskArgs, TaskError, TaskResult};
use crate::ports::TaskBackend;
use crate::typed::TaskRegistry;

pub struct BackendHandler {
    config: TasksConfig,
    factory: BackendFactory,
    registry: Arc<TaskRegistry>,
    backends: Mutex<HashMap<String, Arc<dyn TaskBackend>>>,
}

impl BackendHandler {
    pub(crate) fn new(config: TasksConfig, factory: BackendFactory, registry: Arc<TaskRegistry>) -> Self {
        Self {
            config,
            factory,
            registry,
            backends: Mutex::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    pub fn aliases(&self) -> Vec<String> {
        self.config.aliases()
    }

    /// alias の backend（なければ作る）
    ///
    /// コンストラクタの実行中はキャッシュのロックを持たないので、
    /// コンストラクタから handler を呼び返しても構いません。
    /// 同じ alias を同時に作った場合は、先にキャッシュに入った方を返します。
    pub fn get(&self, alias: &str) -> Result<Arc<dyn TaskBackend>, TaskError> {
        if let Some(backend) = self.cached(alias) {
            return Ok(backend);
        }

        let config = self
            .config
            .get(alias)
            .ok_or_else(|| TaskError::InvalidBackend(format!("no backend configured for alias '{alias}'")))?;
        let built = self.factory.build(
            &config.backend,
            &config.to_options(alias),
            Arc::clone(&self.registry),
        )?;

        let mut backends = self.backends.lock().unwrap_or_else(PoisonError::into_inner);
        let backend = backends.entry(alias.to_string()).or_insert(built);
        Ok(Arc::clone(backend))
    }

    fn cached(&self, alias: &str) -> Option<Arc<dyn TaskBackend>> {
        self.backends
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(alias)
            .cloned()
    }

    pub fn default_backend(&self) -> Result<Arc<dyn TaskBackend>, TaskError> {
        self.get(DEFAULT_BACKEND_ALIAS)
    }

    /// 作成済みの backend をすべて close する
    ///
    /// 途中で失敗しても残りは close し、最初のエラーを返します。
    pub fn close_all(&self) -> Result<(), TaskError> {
        let backends: Vec<(String, Arc<dyn TaskBackend>)> = self
            .backends
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .collect();

        let mut first_error = None;
        for (alias, backend) in backends {
            match backend.close() {
                Ok(()) => tracing::debug!(backend = %alias, "task backend closed"),
                Err(err) => {
                    tracing::warn!(backend = %alias, error = %err, "failed to close task backend");
                    first_error.get_or_insert(err);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl<T> Task<T> {
    /// task の alias の backend で検証してから enqueue する
    pub fn enqueue(&self, handler: &BackendHandler, args: TaskArgs) -> Result<TaskResult<T>, TaskError> {
        let backend = handler.get(self.backend())?;
        let task = self.erase();
        backend.validate_task(&task)?;
        Ok(backend.enqueue(&task, args)?.typed())
    }

    pub async fn aenqueue(&self, handler: &BackendHandler, args: TaskArgs) -> Result<TaskResult<T>, TaskError> {
        let backend = handler.get(self.backend())?;
        let task = self.erase();
        backend.validate_task(&task)?;
        Ok(backend.aenqueue(task, args).await?.typed())
    }

    pub fn get_result(&self, handler: &BackendHandler, result_id: &ResultId) -> Result<TaskResult<T>, TaskError> {
        let backend = handler.get(self.backend())?;
        Ok(backend.get_result(result_id)?.typed())
    }

    pub async fn aget_result(&self, handler: &BackendHandler, result_id: ResultId) -> Result<TaskResult<T>, TaskError> {
        let backend = handler.get(self.backend())?;
        Ok(backend.aget_result(result_id).await?.typed())
    }
}
