//! Impls - 組み込みの backend
//!
//! # 含まれる実装
//! - **ImmediateBackend**: enqueue の中で即実行
//! - **DummyBackend**: 実行せずに記録（テスト用）
//!
//! DB や broker を使う backend は別クレートで `TaskBackend` を実装し、
//! `BackendFactory::register` で登録します。

pub mod dummy;
pub mod immediate;

pub use self::dummy::{DummyBackend, DummyOptions};
pub use self::immediate::ImmediateBackend;
