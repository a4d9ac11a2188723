//! Application layer: registry/binder, builder, status snapshots.

pub mod builder;
pub mod registry;
pub mod status;

pub use self::builder::{BuildError, RegistryBuilder};
pub use self::registry::{BindReport, Binding, Registry};
pub use self::status::{ExecutorStatus, RegistryStatus, TaskCounts, TaskView};
