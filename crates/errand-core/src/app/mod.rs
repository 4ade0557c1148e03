//! App - アプリケーション層
//!
//! ports と impls を組み合わせて、設定から backend を使える状態にします。
//!
//! # 主要コンポーネント
//! - **TasksConfig**: alias → backend 設定
//! - **BackendFactory**: backend パス → コンストラクタ
//! - **HandlerBuilder**: 起動時検証つきの構築
//! - **BackendHandler**: alias から backend を引く（lazy, キャッシュ）

pub mod builder;
pub mod config;
pub mod factory;
pub mod handler;

pub use self::builder::{BuildError, HandlerBuilder};
pub use self::config::{BackendConfig, TasksConfig};
pub use self::factory::{BackendConstructor, BackendFactory};
pub use self::handler::BackendHandler;
