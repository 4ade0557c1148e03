//! errand-core
//!
//! Pluggable task backends: アプリケーションは関数と引数を enqueue するだけで、
//! どの backend（即時実行、DB、broker）が実行するかを知りません。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（Task, TaskResult, ResultId, BackendOptions, TaskError）
//! - **typed**: タスク関数のレジストリ（名前 → 関数）
//! - **ports**: 抽象化レイヤー（TaskBackend, Clock, IdGenerator）
//! - **bridge**: 同期 backend を async から呼ぶためのスレッド親和性つき bridge
//! - **impls**: 組み込み backend（ImmediateBackend, DummyBackend）
//! - **app**: 設定と backend の解決（TasksConfig, HandlerBuilder, BackendHandler）

pub mod app;
pub mod bridge;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod typed;

pub use app::{BackendConfig, BackendHandler, HandlerBuilder, TasksConfig};
pub use bridge::SyncBridge;
pub use domain::{
    BackendOptions, ResultId, ResultStatus, RunAfter, Task, TaskArgs, TaskError, TaskResult,
};
pub use ports::{BackendCore, TaskBackend};
pub use typed::TaskRegistry;
