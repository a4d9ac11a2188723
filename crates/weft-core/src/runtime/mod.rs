//! Runtime: tasks, the shared executor engine, and the context handed to
//! routed methods.

pub mod context;
pub mod core;
pub mod task;

pub use self::context::TaskContext;
pub use self::core::ExecutorCore;
pub use self::task::{Invoke, RunPolicy, Task};
