//! TaskFn - 登録されたタスク関数
//!
//! # 二層構造
//! - **表層（Typed）**: `Fn(A) -> Result<R, String>` - 引数と戻り値は型付き
//! - **内部（Dyn）**: `TaskFn` trait - object-safe, JSON で受け渡し
//!
//! `TypedTaskFn<A, R, F>` が両者をつなぐ type erasure です。

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::marker::PhantomData;

use crate::domain::TaskArgs;

/// TaskFn は object-safe なタスク関数
///
/// `Err` はタスク自身の失敗（結果の status が FAILED になる）を表し、
/// backend のエラーとは区別します。
pub trait TaskFn: Send + Sync {
    fn call(&self, args: TaskArgs) -> Result<serde_json::Value, String>;
}

pub struct TypedTaskFn<A, R, F> {
    func: F,
    _marker: PhantomData<fn(A) -> R>,
}

impl<A, R, F> TypedTaskFn<A, R, F>
where
    A: DeserializeOwned,
    R: Serialize,
    F: Fn(A) -> Result<R, String> + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self {
            func,
            _marker: PhantomData,
        }
    }
}

impl<A, R, F> TaskFn for TypedTaskFn<A, R, F>
where
    A: DeserializeOwned,
    R: Serialize,
    F: Fn(A) -> Result<R, String> + Send + Sync,
{
    fn call(&self, args: TaskArgs) -> Result<serde_json::Value, String> {
        let input: A = args.decode().map_err(|e| format!("argument decode: {e}"))?;
        let output = (self.func)(input)?;
        serde_json::to_value(output).map_err(|e| format!("return value encode: {e}"))
    }
}

impl<A, R, F> fmt::Debug for TypedTaskFn<A, R, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedTaskFn")
            .field("func", &std::any::type_name::<F>())
            .finish()
    }
}
