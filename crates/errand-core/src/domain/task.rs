//! Task - 遅延実行する仕事の記述
//!
//! Task は「登録済みの関数 + スケジューリングのヒント」です。
//! 実行そのものは backend の責務で、ここではデータだけを持ちます。
//!
//! # 不変性
//! - `with_*` は変更したコピーを返す
//! - backend には `&Task` で渡される（submit 後に書き換えられない）

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::typed::{TaskFn, TypedTaskFn};

pub const DEFAULT_QUEUE_NAME: &str = "default";
pub const DEFAULT_BACKEND_ALIAS: &str = "default";

/// `run_after` の時刻
///
/// タイムゾーン付き（Aware）とタイムゾーンなし（Naive）を区別します。
/// Naive は validate_task で必ず弾かれます。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RunAfter {
    Aware(DateTime<FixedOffset>),
    Naive(NaiveDateTime),
}

impl RunAfter {
    pub fn is_aware(&self) -> bool {
        matches!(self, RunAfter::Aware(_))
    }

    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        match self {
            RunAfter::Aware(dt) => Some(dt.with_timezone(&Utc)),
            RunAfter::Naive(_) => None,
        }
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for RunAfter {
    fn from(dt: DateTime<Tz>) -> Self {
        RunAfter::Aware(dt.fixed_offset())
    }
}

impl From<NaiveDateTime> for RunAfter {
    fn from(dt: NaiveDateTime) -> Self {
        RunAfter::Naive(dt)
    }
}

/// 位置引数とキーワード引数
///
/// 型付き関数への変換（`decode`）:
/// - 両方空 → `null`（`()` を受け取る関数向け）
/// - 位置引数が 1 つだけ → その値そのもの
/// - 位置引数が 2 つ以上 → JSON 配列（タプルなど）
/// - キーワード引数のみ → JSON オブジェクト（struct など）
/// - 両方あり → エラー
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskArgs {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<serde_json::Value>,

    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub kwargs: serde_json::Map<String, serde_json::Value>,
}

impl TaskArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, value: impl Into<serde_json::Value>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn kwarg(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty() && self.kwargs.is_empty()
    }

    pub fn decode<A: DeserializeOwned>(&self) -> Result<A, serde_json::Error> {
        let value = match (self.args.is_empty(), self.kwargs.is_empty()) {
            (true, true) => serde_json::Value::Null,
            (false, true) if self.args.len() == 1 => self.args[0].clone(),
            (false, true) => serde_json::Value::Array(self.args.clone()),
            (true, false) => serde_json::Value::Object(self.kwargs.clone()),
            (false, false) => {
                return Err(<serde_json::Error as serde::de::Error>::custom(
                    "typed task functions take either positional or keyword arguments, not both",
                ));
            }
        };
        serde_json::from_value(value)
    }
}

/// Task の記述部分（関数本体を除いたスナップショット）
///
/// TaskResult に埋め込まれ、JSON にもなります。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskInfo {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_after: Option<RunAfter>,

    pub queue_name: String,
    pub backend: String,
}

/// Task は型付きの遅延実行単位
///
/// `T` は関数の戻り値型で、実行時には使わないマーカーです。
/// `Task`（型引数なし）は `Task<serde_json::Value>` です。
pub struct Task<T = serde_json::Value> {
    name: String,
    func: Arc<dyn TaskFn>,
    priority: Option<i32>,
    run_after: Option<RunAfter>,
    queue_name: String,
    backend: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Task<T> {
    pub(crate) fn from_parts(name: String, func: Arc<dyn TaskFn>) -> Self {
        Self {
            name,
            func,
            priority: None,
            run_after: None,
            queue_name: DEFAULT_QUEUE_NAME.to_string(),
            backend: DEFAULT_BACKEND_ALIAS.to_string(),
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn func(&self) -> &Arc<dyn TaskFn> {
        &self.func
    }

    pub fn priority(&self) -> Option<i32> {
        self.priority
    }

    pub fn run_after(&self) -> Option<&RunAfter> {
        self.run_after.as_ref()
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }

    pub fn with_priority(&self, priority: i32) -> Self {
        let mut task = self.clone();
        task.priority = Some(priority);
        task
    }

    pub fn with_run_after(&self, run_after: impl Into<RunAfter>) -> Self {
        let mut task = self.clone();
        task.run_after = Some(run_after.into());
        task
    }

    pub fn with_queue_name(&self, queue_name: impl Into<String>) -> Self {
        let mut task = self.clone();
        task.queue_name = queue_name.into();
        task
    }

    pub fn with_backend(&self, alias: impl Into<String>) -> Self {
        let mut task = self.clone();
        task.backend = alias.into();
        task
    }

    /// 関数を直接呼び出す（backend を通さない）
    pub fn call(&self, args: TaskArgs) -> Result<serde_json::Value, String> {
        self.func.call(args)
    }

    pub fn info(&self) -> TaskInfo {
        TaskInfo {
            name: self.name.clone(),
            priority: self.priority,
            run_after: self.run_after,
            queue_name: self.queue_name.clone(),
            backend: self.backend.clone(),
        }
    }

    /// 戻り値型を消して backend に渡せる形にする
    pub fn erase(&self) -> Task {
        self.retype()
    }

    pub fn retype<U>(&self) -> Task<U> {
        Task {
            name: self.name.clone(),
            func: Arc::clone(&self.func),
            priority: self.priority,
            run_after: self.run_after,
            queue_name: self.queue_name.clone(),
            backend: self.backend.clone(),
            _marker: PhantomData,
        }
    }
}

impl Task {
    /// レジストリを通さずに Task を作る
    ///
    /// どのレジストリにも登録されていないので、validate_task は
    /// 「グローバルに解決できない関数」として弾きます。
    pub fn from_fn<A, R, F>(name: impl Into<String>, func: F) -> Self
    where
        A: DeserializeOwned + 'static,
        R: Serialize + 'static,
        F: Fn(A) -> Result<R, String> + Send + Sync + 'static,
    {
        Self::from_parts(name.into(), Arc::new(TypedTaskFn::new(func)))
    }
}

impl<T> Clone for Task<T> {
    fn clone(&self) -> Self {
        self.retype()
    }
}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("run_after", &self.run_after)
            .field("queue_name", &self.queue_name)
            .field("backend", &self.backend)
            .finish()
    }
}
