//! SyncBridge - 同期処理を専用スレッドで実行して async から待つ
//!
//! # スレッド親和性（thread-sensitive）
//! 1 つの SyncBridge は OS スレッドを 1 本だけ持ちます。
//! 同じ bridge を通した呼び出しは、すべて同じスレッドで順番に実行されます。
//! スレッドローカルな状態やスレッドセーフでない資源に触る同期コードを
//! async の呼び出し側から安全に使うためのものです。
//!
//! # 終了
//! 最後のハンドルが drop されるとチャネルが閉じ、ワーカースレッドも終了します。

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::{Arc, OnceLock};
use std::thread::{self, ThreadId};

use tokio::sync::oneshot;

use crate::domain::TaskError;

type Job = Box<dyn FnOnce() + Send + 'static>;

const GLOBAL_THREAD_NAME: &str = "errand-sync";

static GLOBAL: OnceLock<Arc<SyncBridge>> = OnceLock::new();

pub struct SyncBridge {
    name: String,
    sender: mpsc::Sender<Job>,
    thread_id: ThreadId,
}

impl SyncBridge {
    /// ワーカースレッドを起動する
    pub fn new(name: impl Into<String>) -> Result<Self, TaskError> {
        let name = name.into();
        let (sender, receiver) = mpsc::channel::<Job>();

        let thread_name = name.clone();
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                tracing::debug!(thread = %thread_name, "sync bridge worker started");
                // 送信側がすべて drop されると抜ける
                for job in receiver {
                    job();
                }
                tracing::debug!(thread = %thread_name, "sync bridge worker stopped");
            })
            .map_err(|e| TaskError::Bridge(format!("failed to spawn {name}: {e}")))?;

        Ok(Self {
            thread_id: handle.thread().id(),
            name,
            sender,
        })
    }

    /// プロセス全体で共有する bridge
    pub fn global() -> Result<Arc<SyncBridge>, TaskError> {
        if let Some(bridge) = GLOBAL.get() {
            return Ok(Arc::clone(bridge));
        }
        let bridge = Arc::new(Self::new(GLOBAL_THREAD_NAME)?);
        // 競合して負けた側の bridge は drop され、スレッドも終わる
        Ok(Arc::clone(GLOBAL.get_or_init(|| bridge)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// ワーカースレッドの ID
    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    /// `f` をワーカースレッドで実行し、結果を待つ
    ///
    /// `f` の中の panic はワーカーを巻き込まず、`TaskError::Bridge` になります。
    pub async fn run<F, R>(&self, f: F) -> Result<R, TaskError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::new(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(f));
            // 呼び出し側が待つのをやめていたら捨てる
            let _ = tx.send(outcome);
        });

        self.sender
            .send(job)
            .map_err(|_| TaskError::Bridge(format!("{} worker has stopped", self.name)))?;

        match rx.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(payload)) => {
                let message = panic_message(payload.as_ref());
                tracing::warn!(thread = %self.name, panic = %message, "sync call panicked");
                Err(TaskError::Bridge(format!("sync call panicked: {message}")))
            }
            Err(_) => Err(TaskError::Bridge(format!(
                "{} dropped the call without a result",
                self.name
            ))),
        }
    }
}

impl std::fmt::Debug for SyncBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncBridge")
            .field("name", &self.name)
            .field("thread_id", &self.thread_id)
            .finish()
    }
}

/// panic の payload からメッセージを取り出す
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    thread_local! {
        static CALLS: Cell<u32> = const { Cell::new(0) };
    }

    #[tokio::test]
    async fn runs_on_the_worker_thread() {
        let bridge = SyncBridge::new("test-bridge").unwrap();
        let caller = thread::current().id();

        let ran_on = bridge.run(|| thread::current().id()).await.unwrap();

        assert_eq!(ran_on, bridge.thread_id());
        assert_ne!(ran_on, caller);
    }

    #[tokio::test]
    async fn successive_calls_share_thread_local_state() {
        let bridge = SyncBridge::new("test-bridge").unwrap();

        for expected in 1..=3 {
            let calls = bridge
                .run(|| {
                    CALLS.with(|c| c.set(c.get() + 1));
                    CALLS.with(Cell::get)
                })
                .await
                .unwrap();
            assert_eq!(calls, expected);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_are_serialized_onto_one_thread() {
        let bridge = Arc::new(SyncBridge::new("test-bridge").unwrap());

        let mut joins = Vec::new();
        for _ in 0..8 {
            let bridge = Arc::clone(&bridge);
            joins.push(tokio::spawn(async move {
                bridge.run(|| thread::current().id()).await.unwrap()
            }));
        }
        for join in joins {
            assert_eq!(join.await.unwrap(), bridge.thread_id());
        }
    }

    #[tokio::test]
    async fn panic_becomes_bridge_error_and_worker_survives() {
        let bridge = SyncBridge::new("test-bridge").unwrap();

        let err = bridge
            .run(|| -> u32 { panic!("kaboom") })
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::Bridge(msg) if msg.contains("kaboom")));

        assert_eq!(bridge.run(|| 7).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn global_bridge_is_shared() {
        let a = SyncBridge::global().unwrap();
        let b = SyncBridge::global().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.name(), GLOBAL_THREAD_NAME);
    }
}
