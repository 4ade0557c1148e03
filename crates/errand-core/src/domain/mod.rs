//! Domain model (tasks, results, ids, options, errors).

pub mod errors;
pub mod ids;
pub mod options;
pub mod result;
pub mod task;

pub use self::errors::TaskError;
pub use self::ids::{ParseResultIdError, ResultId};
pub use self::options::BackendOptions;
pub use self::result::{ResultStatus, TaskResult};
pub use self::task::{RunAfter, Task, TaskArgs, TaskInfo};
