//! Executor implementations.

pub mod thread;
pub mod tick;

pub use self::thread::ThreadExecutor;
pub use self::tick::{TickDriver, TickExecutor};
