//! Ports - executor の抽象化とホスト向けフック

pub mod executor;
pub mod listener;

pub use self::executor::{Executor, ExecutorKind, same_executor};
pub use self::listener::ExecutorListener;
