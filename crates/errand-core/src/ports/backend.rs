//! TaskBackend port - タスクの受付と委譲
//!
//! backend はタスクを検証してから、具体的なキューイング・実行・保存に委譲します。
//! 実際の処理を持つのは具体的な backend（`impls`）です。
//!
//! # 状態
//! constructed → validating → delegating のみ。リトライやキュー状態はこの層にはありません。
//!
//! # async 版
//! `aenqueue` / `aget_result` のデフォルト実装は、同期版を backend の SyncBridge
//! （スレッド親和性のある専用スレッド）で実行して待ちます。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::bridge::SyncBridge;
use crate::domain::{BackendOptions, ResultId, Task, TaskArgs, TaskError, TaskResult};
use crate::ports::{Clock, IdGenerator, SystemClock, UlidGenerator};
use crate::typed::TaskRegistry;

/// backend 共通の状態
///
/// 具体的な backend はこれを埋め込み、`TaskBackend::core` で返します。
pub struct BackendCore {
    alias: String,
    queues: Option<BTreeSet<String>>,
    registry: Arc<TaskRegistry>,
    bridge: Arc<SyncBridge>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl BackendCore {
    /// `ALIAS` は必須（なければ `TaskError::MissingOption`）
    pub fn from_options(
        options: &BackendOptions,
        registry: Arc<TaskRegistry>,
    ) -> Result<Self, TaskError> {
        let alias = options.alias()?.to_string();
        let queues = options.queues()?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Ok(Self {
            alias,
            queues,
            registry,
            bridge: SyncBridge::global()?,
            ids: Arc::new(UlidGenerator::new(Arc::clone(&clock))),
            clock,
        })
    }

    /// Clock を差し替える（ID 生成器も同じ Clock を使う）
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.ids = Arc::new(UlidGenerator::new(Arc::clone(&clock)));
        self.clock = clock;
        self
    }

    /// backend 専用の bridge を使う
    pub fn with_bridge(mut self, bridge: Arc<SyncBridge>) -> Self {
        self.bridge = bridge;
        self
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn queues(&self) -> Option<&BTreeSet<String>> {
        self.queues.as_ref()
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    pub fn bridge(&self) -> &Arc<SyncBridge> {
        &self.bridge
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn next_result_id(&self) -> ResultId {
        self.ids.generate_result_id()
    }

    /// NEW 状態の結果を発行する
    pub fn new_result(&self, task: &Task, args: TaskArgs) -> TaskResult {
        TaskResult::new(self.next_result_id(), task.info(), args, self.now())
            .with_backend(self.alias.as_str())
    }

    /// 検証ルール（この順で判定する）
    ///
    /// 1. 関数がレジストリで解決できる
    /// 2. priority があれば 1 以上
    /// 3. run_after があれば backend が defer 対応
    /// 4. run_after があればタイムゾーン付き
    /// 5. QUEUES が設定されていれば queue_name がその中にある
    pub fn validate(&self, task: &Task, supports_defer: bool) -> Result<(), TaskError> {
        let result = self.check(task, supports_defer);
        if let Err(err) = &result {
            tracing::debug!(backend = %self.alias, task = task.name(), error = %err, "task rejected");
        }
        result
    }

    fn check(&self, task: &Task, supports_defer: bool) -> Result<(), TaskError> {
        if !self.registry.resolves_to(task.name(), task.func()) {
            return Err(TaskError::invalid_task(
                "Task function must be a globally importable function",
            ));
        }

        if task.priority().is_some_and(|p| p < 1) {
            return Err(TaskError::invalid_task("priority must be positive"));
        }

        if let Some(run_after) = task.run_after() {
            if !supports_defer {
                return Err(TaskError::invalid_task("Backend does not support run_after"));
            }
            if !run_after.is_aware() {
                return Err(TaskError::invalid_task("run_after must be an aware datetime"));
            }
        }

        if let Some(queues) = &self.queues
            && !queues.contains(task.queue_name())
        {
            return Err(TaskError::invalid_task(format!(
                "Queue does not exist: {}",
                task.queue_name()
            )));
        }

        Ok(())
    }
}

impl std::fmt::Debug for BackendCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendCore")
            .field("alias", &self.alias)
            .field("queues", &self.queues)
            .field("bridge", &self.bridge)
            .finish()
    }
}

/// TaskBackend はタスクの受付口
///
/// # 実装するもの
/// - `core`: 共通状態
/// - `enqueue`: 実際のキューイング（デフォルトは NotImplemented）
/// - 必要に応じて `get_result`, `close`, capability フラグ
///
/// # 呼び出し方
/// async 版は `self: Arc<Self>` を取ります（同期版を別スレッドへ運ぶため）。
/// ```ignore
/// let backend: Arc<dyn TaskBackend> = handler.get("default")?;
/// let result = backend.clone().aenqueue(task, args).await?;
/// ```
#[async_trait]
pub trait TaskBackend: Send + Sync + 'static {
    fn core(&self) -> &BackendCore;

    fn alias(&self) -> &str {
        self.core().alias()
    }

    /// run_after を扱えるか
    fn supports_defer(&self) -> bool {
        false
    }

    /// get_result を扱えるか
    fn supports_get_result(&self) -> bool {
        false
    }

    /// async 関数をタスクとして扱えるか
    fn supports_async_task(&self) -> bool {
        false
    }

    /// このタスクを実行できるか判定する（副作用なし）
    fn validate_task(&self, task: &Task) -> Result<(), TaskError> {
        self.core().validate(task, self.supports_defer())
    }

    /// タスクをキューに積む
    fn enqueue(&self, _task: &Task, _args: TaskArgs) -> Result<TaskResult, TaskError> {
        Err(TaskError::NotImplemented("enqueue"))
    }

    async fn aenqueue(self: Arc<Self>, task: Task, args: TaskArgs) -> Result<TaskResult, TaskError> {
        let bridge = Arc::clone(self.core().bridge());
        bridge.run(move || self.enqueue(&task, args)).await?
    }

    /// ID から結果を引く
    ///
    /// 見つからなければ `TaskError::ResultDoesNotExist`。
    fn get_result(&self, _result_id: &ResultId) -> Result<TaskResult, TaskError> {
        Err(TaskError::Unsupported(
            "This backend does not support retrieving results.".to_string(),
        ))
    }

    async fn aget_result(self: Arc<Self>, result_id: ResultId) -> Result<TaskResult, TaskError> {
        let bridge = Arc::clone(self.core().bridge());
        bridge.run(move || self.get_result(&result_id)).await?
    }

    /// 構築時に開いた資源を解放する
    fn close(&self) -> Result<(), TaskError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::FixedClock;
    use chrono::{NaiveDate, TimeZone};
    use rstest::rstest;
    use serde_json::json;

    fn noop(_: ()) -> Result<(), String> {
        Ok(())
    }

    /// enqueue も get_result も持たない backend
    struct BareBackend {
        core: BackendCore,
        defer: bool,
    }

    impl TaskBackend for BareBackend {
        fn core(&self) -> &BackendCore {
            &self.core
        }

        fn supports_defer(&self) -> bool {
            self.defer
        }
    }

    /// enqueue だけ実装する backend（どのスレッドで呼ばれたかを記録）
    struct RecordingBackend {
        core: BackendCore,
    }

    impl TaskBackend for RecordingBackend {
        fn core(&self) -> &BackendCore {
            &self.core
        }

        fn enqueue(&self, task: &Task, args: TaskArgs) -> Result<TaskResult, TaskError> {
            self.validate_task(task)?;
            let mut result = self.core.new_result(task, args);
            let thread = format!("{:?}", std::thread::current().id());
            result.mark_complete(self.core.now(), json!(thread));
            Ok(result)
        }
    }

    fn registry_with_noop() -> (Arc<TaskRegistry>, Task) {
        let mut registry = TaskRegistry::new();
        let task = registry.register_as("app::noop", noop).unwrap().erase();
        (Arc::new(registry), task)
    }

    fn bare(defer: bool) -> (BareBackend, Task) {
        let (registry, task) = registry_with_noop();
        let core = BackendCore::from_options(&BackendOptions::with_alias("default"), registry).unwrap();
        (BareBackend { core, defer }, task)
    }

    fn aware() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn construct_sets_alias() {
        let (backend, _) = bare(false);
        assert_eq!(backend.alias(), "default");
    }

    #[test]
    fn construct_without_alias_fails() {
        let (registry, _) = registry_with_noop();
        let err = BackendCore::from_options(&BackendOptions::new(), registry).unwrap_err();
        assert!(matches!(err, TaskError::MissingOption("ALIAS")));
    }

    #[test]
    fn registered_task_passes() {
        let (backend, task) = bare(false);
        backend.validate_task(&task).unwrap();
    }

    #[test]
    fn unregistered_function_is_rejected() {
        let (backend, _) = bare(false);
        let local = Task::from_fn("app::noop", noop);

        let err = backend.validate_task(&local).unwrap_err();
        assert!(err.is_invalid_task());
        assert!(err.to_string().contains("globally importable"));
    }

    #[rstest]
    #[case::absent(None, true)]
    #[case::one(Some(1), true)]
    #[case::large(Some(100), true)]
    #[case::zero(Some(0), false)]
    #[case::negative(Some(-5), false)]
    fn priority_must_be_positive(#[case] priority: Option<i32>, #[case] ok: bool) {
        let (backend, task) = bare(false);
        let task = match priority {
            Some(p) => task.with_priority(p),
            None => task,
        };
        assert_eq!(backend.validate_task(&task).is_ok(), ok);
    }

    #[rstest]
    #[case::no_defer(false)]
    #[case::defer(true)]
    fn naive_run_after_always_fails(#[case] defer: bool) {
        let (backend, task) = bare(defer);
        let naive = NaiveDate::from_ymd_opt(2030, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();

        let err = backend.validate_task(&task.with_run_after(naive)).unwrap_err();
        assert!(err.is_invalid_task());
    }

    #[test]
    fn aware_run_after_needs_defer_support() {
        let (backend, task) = bare(false);
        let err = backend.validate_task(&task.with_run_after(aware())).unwrap_err();
        assert_eq!(err.to_string(), "invalid task: Backend does not support run_after");

        let (backend, task) = bare(true);
        backend.validate_task(&task.with_run_after(aware())).unwrap();

        let naive = aware().naive_utc();
        let err = backend.validate_task(&task.with_run_after(naive)).unwrap_err();
        assert_eq!(err.to_string(), "invalid task: run_after must be an aware datetime");
    }

    #[test]
    fn queue_must_be_configured() {
        let (registry, task) = registry_with_noop();
        let options = BackendOptions::with_alias("default").set("QUEUES", json!(["default"]));
        let core = BackendCore::from_options(&options, registry).unwrap();
        let backend = BareBackend { core, defer: false };

        backend.validate_task(&task).unwrap();
        let err = backend.validate_task(&task.with_queue_name("emails")).unwrap_err();
        assert!(err.to_string().contains("Queue does not exist"));
    }

    #[test]
    fn bare_backend_does_not_enqueue_or_get_results() {
        let (backend, task) = bare(false);

        let err = backend.enqueue(&task, TaskArgs::new()).unwrap_err();
        assert!(matches!(err, TaskError::NotImplemented("enqueue")));

        let id = backend.core().next_result_id();
        let err = backend.get_result(&id).unwrap_err();
        assert!(matches!(err, TaskError::Unsupported(_)));

        backend.close().unwrap();
    }

    #[tokio::test]
    async fn async_defaults_surface_sync_errors() {
        let (backend, task) = bare(false);
        let backend = Arc::new(backend);

        let err = backend.clone().aenqueue(task, TaskArgs::new()).await.unwrap_err();
        assert!(matches!(err, TaskError::NotImplemented("enqueue")));

        let id = backend.core().next_result_id();
        let err = backend.aget_result(id).await.unwrap_err();
        assert!(matches!(err, TaskError::Unsupported(_)));
    }

    #[tokio::test]
    async fn aenqueue_matches_enqueue_and_runs_on_bridge_thread() {
        let (registry, task) = registry_with_noop();
        let clock = FixedClock::new(aware());
        let bridge = Arc::new(SyncBridge::new("backend-test").unwrap());
        let core = BackendCore::from_options(&BackendOptions::with_alias("default"), registry)
            .unwrap()
            .with_clock(Arc::new(clock))
            .with_bridge(Arc::clone(&bridge));
        let backend = Arc::new(RecordingBackend { core });

        let sync_result = backend.enqueue(&task, TaskArgs::new()).unwrap();
        let async_result = backend.clone().aenqueue(task, TaskArgs::new()).await.unwrap();

        assert_eq!(async_result.status, sync_result.status);
        assert_eq!(async_result.task, sync_result.task);
        assert_eq!(async_result.enqueued_at, sync_result.enqueued_at);
        assert_eq!(
            async_result.return_value,
            Some(json!(format!("{:?}", bridge.thread_id())))
        );
    }

    #[tokio::test]
    async fn async_validation_failure_is_the_resolved_error() {
        let (registry, _) = registry_with_noop();
        let core = BackendCore::from_options(&BackendOptions::with_alias("default"), registry).unwrap();
        let backend = Arc::new(RecordingBackend { core });

        let local = Task::from_fn("app::noop", noop);
        let err = backend.aenqueue(local, TaskArgs::new()).await.unwrap_err();
        assert!(err.is_invalid_task());
    }
}
