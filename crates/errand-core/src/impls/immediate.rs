//! ImmediateBackend - enqueue の中でそのまま実行する backend
//!
//! 開発・テスト用です。返る TaskResult は常に完了済み（COMPLETE か FAILED）。
//! タスク関数の panic も FAILED として記録します。
//! run_after と get_result は扱いません。

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::bridge::panic_message;
use crate::domain::{BackendOptions, Task, TaskArgs, TaskError, TaskResult};
use crate::ports::{BackendCore, TaskBackend};
use crate::typed::TaskRegistry;

pub struct ImmediateBackend {
    core: BackendCore,
}

impl ImmediateBackend {
    pub const PATH: &'static str = "errand::ImmediateBackend";

    pub fn new(options: &BackendOptions, registry: Arc<TaskRegistry>) -> Result<Self, TaskError> {
        Ok(Self::from_core(BackendCore::from_options(options, registry)?))
    }

    pub fn from_core(core: BackendCore) -> Self {
        tracing::info!(backend = core.alias(), path = Self::PATH, "task backend ready");
        Self { core }
    }
}

impl TaskBackend for ImmediateBackend {
    fn core(&self) -> &BackendCore {
        &self.core
    }

    fn enqueue(&self, task: &Task, args: TaskArgs) -> Result<TaskResult, TaskError> {
        self.validate_task(task)?;

        let mut result = self.core.new_result(task, args.clone());
        result.mark_running(self.core.now());

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| task.call(args)))
            .unwrap_or_else(|payload| Err(format!("task panicked: {}", panic_message(payload.as_ref()))));

        match outcome {
            Ok(value) => result.mark_complete(self.core.now(), value),
            Err(error) => {
                tracing::warn!(backend = %self.core.alias(), task = task.name(), %error, "task failed");
                result.mark_failed(self.core.now(), error);
            }
        }

        tracing::debug!(
            backend = %self.core.alias(),
            task = task.name(),
            result_id = %result.id,
            status = ?result.status,
            "task executed immediately"
        );
        Ok(result)
    }
}
