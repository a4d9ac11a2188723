//! Domain model (names, cycle arguments, outcomes, errors).

pub mod cycle;
pub mod errors;
pub mod names;
pub mod outcome;

pub use self::cycle::{CycleArg, CycleReport, SkipReason};
pub use self::errors::{
    BindError, ConfigError, ErrorKind, ParamKind, RegistryError, TaskError, WeftError,
};
pub use self::names::{ExecutorName, TaskName};
pub use self::outcome::{Outcome, TaskOutput, TaskStatus};
