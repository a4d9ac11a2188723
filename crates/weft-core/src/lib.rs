//! weft-core
//!
//! Cooperative multi-executor task dispatch.
//!
//! 名前付きの executor（専用スレッド、またはホストの tick で回るもの）に
//! routed method を task として割り当て、activation flag で起動する。
//! task 同士は registry を介して結果を読み合い、互いを起こし合う。
//!
//! # モジュール構成
//! - **domain**: 名前、cycle 引数、結果、エラー
//! - **runtime**: Task、executor 共通のエンジン（ExecutorCore）、TaskContext
//! - **ports**: Executor trait、ホスト向けの ExecutorListener
//! - **impls**: ThreadExecutor、TickExecutor / TickDriver
//! - **typed**: routed method、routing table、worker
//! - **app**: Registry / Binder、RegistryBuilder、status
//! - **config**: JSON 設定

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod runtime;
pub mod typed;

#[cfg(test)]
pub(crate) mod test_support;

pub use app::{BindReport, BuildError, Registry, RegistryBuilder, RegistryStatus};
pub use config::WeftConfig;
pub use domain::{
    CycleArg, CycleReport, ExecutorName, Outcome, RegistryError, TaskError, TaskName, TaskStatus,
    WeftError,
};
pub use impls::{ThreadExecutor, TickDriver, TickExecutor};
pub use ports::{Executor, ExecutorListener};
pub use runtime::{RunPolicy, Task, TaskContext};
pub use typed::{Method, MethodArguments, RoutingTable, TableWorker, Worker};
