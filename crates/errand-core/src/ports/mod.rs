//! Ports - 抽象化レイヤー
//!
//! backend が外部システム（DB, broker など）に何を委譲するかを trait で定義します。
//! 実装は `impls` に置きます。

pub mod backend;
pub mod clock;
pub mod id_generator;

pub use self::backend::{BackendCore, TaskBackend};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
