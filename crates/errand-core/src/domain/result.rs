//! TaskResult: enqueue 後に返されるハンドル
//!
//! backend が作成し、後で ResultId から参照できます。
//! 戻り値は JSON のまま保持し、`return_value()` で `T` に戻します。

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;

use super::errors::TaskError;
use super::ids::ResultId;
use super::task::{TaskArgs, TaskInfo};
use crate::ports::TaskBackend;

/// Status of a task result.
///
/// JSON 上は NEW / RUNNING / FAILED / COMPLETE。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultStatus {
    /// Enqueued, not yet picked up.
    New,
    Running,
    Failed,
    Complete,
}

impl ResultStatus {
    pub fn is_finished(self) -> bool {
        matches!(self, ResultStatus::Failed | ResultStatus::Complete)
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct TaskResult<T = serde_json::Value> {
    pub id: ResultId,
    pub task: TaskInfo,
    pub args: TaskArgs,
    pub status: ResultStatus,
    pub backend: String,

    pub enqueued_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_value: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip)]
    _marker: PhantomData<fn() -> T>,
}

impl<T> TaskResult<T> {
    /// NEW 状態の結果を作る
    pub fn new(
        id: ResultId,
        task: TaskInfo,
        args: TaskArgs,
        enqueued_at: DateTime<Utc>,
    ) -> Self {
        let backend = task.backend.clone();
        Self {
            id,
            task,
            args,
            status: ResultStatus::New,
            backend,
            enqueued_at: Some(enqueued_at),
            started_at: None,
            finished_at: None,
            return_value: None,
            error: None,
            _marker: PhantomData,
        }
    }

    pub fn with_backend(mut self, alias: impl Into<String>) -> Self {
        self.backend = alias.into();
        self
    }

    pub fn mark_running(&mut self, at: DateTime<Utc>) {
        self.status = ResultStatus::Running;
        self.started_at = Some(at);
    }

    pub fn mark_complete(&mut self, at: DateTime<Utc>, value: serde_json::Value) {
        self.status = ResultStatus::Complete;
        self.finished_at = Some(at);
        self.return_value = Some(value);
        self.error = None;
    }

    pub fn mark_failed(&mut self, at: DateTime<Utc>, error: impl Into<String>) {
        self.status = ResultStatus::Failed;
        self.finished_at = Some(at);
        self.return_value = None;
        self.error = Some(error.into());
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_finished()
    }

    /// 戻り値型を差し替える
    pub fn typed<U>(self) -> TaskResult<U> {
        TaskResult {
            id: self.id,
            task: self.task,
            args: self.args,
            status: self.status,
            backend: self.backend,
            enqueued_at: self.enqueued_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
            return_value: self.return_value,
            error: self.error,
            _marker: PhantomData,
        }
    }

    pub fn erase(self) -> TaskResult {
        self.typed()
    }

    /// Backend から最新の状態を読み直す
    pub fn refresh(&mut self, backend: &dyn TaskBackend) -> Result<(), TaskError> {
        let latest = backend.get_result(&self.id)?;
        *self = latest.typed();
        Ok(())
    }
}

impl<T: DeserializeOwned> TaskResult<T> {
    /// COMPLETE のときだけ戻り値を返す
    pub fn return_value(&self) -> Result<T, TaskError> {
        match (&self.status, &self.return_value) {
            (ResultStatus::Complete, Some(value)) => Ok(serde_json::from_value(value.clone())?),
            _ => Err(TaskError::ResultNotReady(self.id)),
        }
    }
}

impl<T> Clone for TaskResult<T> {
    fn clone(&self) -> Self {
        TaskResult {
            id: self.id,
            task: self.task.clone(),
            args: self.args.clone(),
            status: self.status,
            backend: self.backend.clone(),
            enqueued_at: self.enqueued_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
            return_value: self.return_value.clone(),
            error: self.error.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> PartialEq for TaskResult<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.task == other.task
            && self.args == other.args
            && self.status == other.status
            && self.backend == other.backend
            && self.enqueued_at == other.enqueued_at
            && self.started_at == other.started_at
            && self.finished_at == other.finished_at
            && self.return_value == other.return_value
            && self.error == other.error
    }
}
