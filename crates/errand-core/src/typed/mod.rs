//! Typed - 型付きタスク関数 API
//!
//! タスク関数の名前解決を型で扱います。
//!
//! # 二層構造
//! - **表層（Typed）**: `TaskRegistry::register` が `Task<R>` を返す
//! - **内部（Dyn）**: `TaskFn` trait - object-safe, type erasure

pub mod func;
pub mod registry;

pub use self::func::{TaskFn, TypedTaskFn};
pub use self::registry::{RegistryError, TaskRegistry};
