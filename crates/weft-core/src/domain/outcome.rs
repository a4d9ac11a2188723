//! Outcome model: what a routed method hands back, and how a task's last
//! run is classified.
//!
//! Results are opaque to the engine. A task caches whatever its method
//! produced so that other tasks (possibly on other executors) can read it.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Opaque, shareable task result.
pub type TaskOutput = Arc<dyn Any + Send + Sync>;

/// The value returned by one invocation of a routed method.
///
/// `Outcome::empty()` is the equivalent of a method with no return value;
/// it clears the cached result of the task.
#[derive(Clone, Default)]
pub struct Outcome {
    value: Option<TaskOutput>,
}

impl Outcome {
    pub fn empty() -> Self {
        Self { value: None }
    }

    pub fn value<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Some(Arc::new(value)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_none()
    }

    pub fn into_output(self) -> Option<TaskOutput> {
        self.value
    }
}

impl fmt::Debug for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Outcome")
            .field("has_value", &self.value.is_some())
            .finish()
    }
}

/// Classification of a task's most recent run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TaskStatus {
    /// Never ran since it was bound.
    Pending,
    Succeeded,
    /// The routed method returned an error or panicked. The cached result
    /// still holds whatever the previous successful run produced.
    Failed { message: String },
}

impl TaskStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, TaskStatus::Failed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_outcome_downcasts_to_its_type() {
        let out = Outcome::value(String::from("x")).into_output().unwrap();
        let s = out.downcast::<String>().unwrap();
        assert_eq!(s.as_str(), "x");
    }

    #[test]
    fn empty_outcome_has_no_output() {
        assert!(Outcome::empty().is_empty());
        assert!(Outcome::default().into_output().is_none());
    }

    #[test]
    fn failed_status_serializes_with_message() {
        let status = TaskStatus::Failed {
            message: "boom".into(),
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json, serde_json::json!({ "state": "failed", "message": "boom" }));
    }
}
