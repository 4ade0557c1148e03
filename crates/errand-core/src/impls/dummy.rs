//! DummyBackend - 実行せずに記録するだけの backend
//!
//! テストで「何が enqueue されたか」を確認するためのものです。
//! 結果は NEW のまま保持され、get_result で参照できます。
//!
//! # OPTIONS
//! - `max_results`: 保持する件数の上限（超えたら古いものから捨てる）。0 なら何も保持しない

use serde::Deserialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::domain::{BackendOptions, ResultId, Task, TaskArgs, TaskError, TaskResult};
use crate::ports::{BackendCore, TaskBackend};
use crate::typed::TaskRegistry;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DummyOptions {
    #[serde(default)]
    pub max_results: Option<usize>,
}

pub struct DummyBackend {
    core: BackendCore,
    max_results: Option<usize>,
    results: Mutex<VecDeque<TaskResult>>,
}

impl DummyBackend {
    pub const PATH: &'static str = "errand::DummyBackend";

    pub fn new(options: &BackendOptions, registry: Arc<TaskRegistry>) -> Result<Self, TaskError> {
        let dummy: DummyOptions = options.backend_options()?;
        Ok(Self::from_core(BackendCore::from_options(options, registry)?, dummy))
    }

    pub fn from_core(core: BackendCore, options: DummyOptions) -> Self {
        tracing::info!(backend = core.alias(), path = Self::PATH, "task backend ready");
        Self {
            core,
            max_results: options.max_results,
            results: Mutex::new(VecDeque::new()),
        }
    }

    /// 記録済みの結果（古い順）
    pub fn results(&self) -> Vec<TaskResult> {
        self.lock().iter().cloned().collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<TaskResult>> {
        // 記録は単純な push/clear だけなので、poison されても中身は使える
        self.results.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TaskBackend for DummyBackend {
    fn core(&self) -> &BackendCore {
        &self.core
    }

    fn supports_defer(&self) -> bool {
        true
    }

    fn supports_get_result(&self) -> bool {
        true
    }

    fn enqueue(&self, task: &Task, args: TaskArgs) -> Result<TaskResult, TaskError> {
        self.validate_task(task)?;

        let result = self.core.new_result(task, args);
        let mut results = self.lock();
        match self.max_results {
            Some(0) => {}
            Some(max) => {
                while results.len() >= max {
                    results.pop_front();
                }
                results.push_back(result.clone());
            }
            None => results.push_back(result.clone()),
        }
        drop(results);

        tracing::debug!(backend = %self.core.alias(), task = task.name(), result_id = %result.id, "task recorded");
        Ok(result)
    }

    fn get_result(&self, result_id: &ResultId) -> Result<TaskResult, TaskError> {
        self.lock()
            .iter()
            .find(|r| r.id == *result_id)
            .cloned()
            .ok_or(TaskError::ResultDoesNotExist(*result_id))
    }

    fn close(&self) -> Result<(), TaskError> {
        self.clear();
        Ok(())
    }
}
