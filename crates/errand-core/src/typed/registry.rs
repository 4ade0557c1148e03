//! TaskRegistry - タスク関数の登録と解決
//!
//! 「グローバルに import できる関数か」という動的なチェックを、
//! 名前 → 関数 の明示的なレジストリで表現します。
//!
//! # 命名規約
//! - `module::function` のようにモジュールで修飾された名前
//! - 各セグメントは Rust の識別子
//! - `std::any::type_name` でクロージャを渡すと `{{closure}}` を含む名前になり、登録できない
//!
//! # 使い方
//! - 初期化時に `&mut self` で登録（mutable）
//! - 実行時は `Arc<TaskRegistry>` として backend と共有（immutable）

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;

use super::func::{TaskFn, TypedTaskFn};
use crate::domain::Task;

#[derive(Default)]
pub struct TaskRegistry {
    funcs: HashMap<String, Arc<dyn TaskFn>>,
}

/// RegistryError は TaskRegistry の操作エラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("task function '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("'{0}' is not a module-qualified function name")]
    InvalidName(String),

    #[error("task function '{0}' is not registered")]
    NotRegistered(String),
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self {
            funcs: HashMap::new(),
        }
    }

    /// 関数の型名（`crate::module::function`）で登録する
    ///
    /// クロージャはここで `InvalidName` になります。
    pub fn register<A, R, F>(&mut self, func: F) -> Result<Task<R>, RegistryError>
    where
        A: DeserializeOwned + 'static,
        R: Serialize + 'static,
        F: Fn(A) -> Result<R, String> + Send + Sync + 'static,
    {
        self.register_as(std::any::type_name::<F>(), func)
    }

    /// 明示的な名前で登録する
    pub fn register_as<A, R, F>(&mut self, name: &str, func: F) -> Result<Task<R>, RegistryError>
    where
        A: DeserializeOwned + 'static,
        R: Serialize + 'static,
        F: Fn(A) -> Result<R, String> + Send + Sync + 'static,
    {
        if !is_qualified_name(name) {
            return Err(RegistryError::InvalidName(name.to_string()));
        }
        if self.funcs.contains_key(name) {
            return Err(RegistryError::AlreadyRegistered(name.to_string()));
        }
        let func: Arc<dyn TaskFn> = Arc::new(TypedTaskFn::new(func));
        self.funcs.insert(name.to_string(), Arc::clone(&func));
        tracing::debug!(task = name, "registered task function");
        Ok(Task::from_parts(name.to_string(), func))
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<dyn TaskFn>> {
        self.funcs.get(name).cloned()
    }

    /// name で解決した関数が `func` そのものか
    pub fn resolves_to(&self, name: &str, func: &Arc<dyn TaskFn>) -> bool {
        self.funcs
            .get(name)
            .is_some_and(|registered| Arc::ptr_eq(registered, func))
    }

    /// 登録済みの Task を名前から作り直す（設定ファイルや CLI 用）
    pub fn task(&self, name: &str) -> Result<Task, RegistryError> {
        let func = self
            .resolve(name)
            .ok_or_else(|| RegistryError::NotRegistered(name.to_string()))?;
        Ok(Task::from_parts(name.to_string(), func))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.funcs.contains_key(name)
    }

    pub fn registered_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.funcs.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.funcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.funcs.is_empty()
    }
}

impl std::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("funcs", &self.registered_names())
            .finish()
    }
}

fn is_qualified_name(name: &str) -> bool {
    let segments: Vec<&str> = name.split("::").collect();
    segments.len() >= 2 && segments.iter().all(|s| is_identifier(s))
}

fn is_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {
            chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn add((a, b): (i64, i64)) -> Result<i64, String> {
        Ok(a + b)
    }

    fn noop(_: ()) -> Result<(), String> {
        Ok(())
    }

    #[test]
    fn register_uses_type_name_of_fn_item() {
        let mut registry = TaskRegistry::new();
        let task = registry.register(add).unwrap();

        assert!(task.name().ends_with("::add"));
        assert!(registry.contains(task.name()));
        assert!(registry.resolves_to(task.name(), task.func()));
    }

    #[test]
    fn closures_are_rejected() {
        let mut registry = TaskRegistry::new();
        let result = registry.register(|_: ()| Ok::<_, String>(()));
        assert!(matches!(result, Err(RegistryError::InvalidName(name)) if name.contains("{{closure}}")));
        assert!(registry.is_empty());
    }

    #[test]
    fn double_registration_fails() {
        let mut registry = TaskRegistry::new();
        registry.register_as("app::noop", noop).unwrap();
        let result = registry.register_as("app::noop", noop);
        assert_eq!(
            result.unwrap_err(),
            RegistryError::AlreadyRegistered("app::noop".to_string())
        );
    }

    #[rstest]
    #[case::bare("noop")]
    #[case::empty_segment("app::::noop")]
    #[case::leading_digit("app::1noop")]
    #[case::locals("app::<locals>::noop")]
    #[case::dotted("app.noop")]
    fn unqualified_names_are_rejected(#[case] name: &str) {
        let mut registry = TaskRegistry::new();
        assert!(matches!(
            registry.register_as(name, noop),
            Err(RegistryError::InvalidName(_))
        ));
    }

    #[test]
    fn same_name_in_other_registry_does_not_resolve_to_it() {
        let mut a = TaskRegistry::new();
        let mut b = TaskRegistry::new();
        let task = a.register_as("app::noop", noop).unwrap();
        b.register_as("app::noop", noop).unwrap();

        assert!(a.resolves_to(task.name(), task.func()));
        assert!(!b.resolves_to(task.name(), task.func()));
    }

    #[test]
    fn task_by_name() {
        let mut registry = TaskRegistry::new();
        registry.register_as("app::noop", noop).unwrap();
        registry.register_as("app::add", add).unwrap();

        assert_eq!(registry.registered_names(), vec!["app::add", "app::noop"]);
        assert_eq!(registry.task("app::add").unwrap().name(), "app::add");
        assert_eq!(
            registry.task("app::missing").unwrap_err(),
            RegistryError::NotRegistered("app::missing".to_string())
        );
    }
}
