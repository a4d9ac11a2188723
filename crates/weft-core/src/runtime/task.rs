//! Task: a resettable unit of work wrapping one routed method on one
//! executor, with a cached result.
//!
//! Activation is tracked with an epoch counter. Every `false -> true`
//! transition of `active` (and every explicit [`Task::reset`]) opens a new
//! epoch; a run records the epoch it started under as consumed. A task is
//! consumed when the latest epoch has been run. Re-activating a task while
//! its body is executing opens a fresh epoch, so that activation is never
//! swallowed by the run in flight.
//!
//! A body may also queue activations of other tasks with
//! [`Task::activate_after_run`]. Those are applied only once the run has
//! succeeded and its result is published, so the woken task never reads a
//! missing or stale result.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{CycleArg, ExecutorName, Outcome, TaskError, TaskName, TaskOutput, TaskStatus};

/// How often an active task runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPolicy {
    /// At most once per activation.
    #[default]
    Once,
    /// On every cycle while active (per-frame work on a host loop).
    EveryCycle,
}

/// The seam between a task and whatever it actually calls.
pub trait Invoke: Send + Sync {
    fn invoke(
        &self,
        task: &Task,
        executor: &ExecutorName,
        cycle: CycleArg,
    ) -> Result<Outcome, TaskError>;
}

struct FnInvoke<F>(F);

impl<F> Invoke for FnInvoke<F>
where
    F: Fn(&Task, &ExecutorName, CycleArg) -> Result<Outcome, TaskError> + Send + Sync,
{
    fn invoke(
        &self,
        task: &Task,
        executor: &ExecutorName,
        cycle: CycleArg,
    ) -> Result<Outcome, TaskError> {
        (self.0)(task, executor, cycle)
    }
}

pub struct Task {
    name: TaskName,
    policy: RunPolicy,
    active: AtomicBool,
    /// Current activation epoch.
    activation: AtomicU64,
    /// Epoch of the most recent run.
    consumed_at: AtomicU64,
    runs: AtomicU64,
    result: RwLock<Option<TaskOutput>>,
    status: RwLock<TaskStatus>,
    last_cycle: Mutex<CycleArg>,
    last_run_at: Mutex<Option<DateTime<Utc>>>,
    /// Activations queued by the running body.
    deferred: Mutex<Vec<Arc<Task>>>,
    invoker: Box<dyn Invoke>,
}

impl Task {
    pub fn new(name: impl Into<TaskName>, policy: RunPolicy, invoker: Box<dyn Invoke>) -> Self {
        Self {
            name: name.into(),
            policy,
            active: AtomicBool::new(false),
            activation: AtomicU64::new(1),
            consumed_at: AtomicU64::new(0),
            runs: AtomicU64::new(0),
            result: RwLock::new(None),
            status: RwLock::new(TaskStatus::Pending),
            last_cycle: Mutex::new(CycleArg::None),
            last_run_at: Mutex::new(None),
            deferred: Mutex::new(Vec::new()),
            invoker,
        }
    }

    /// Builds a task around a plain closure.
    pub fn from_fn<F>(name: impl Into<TaskName>, policy: RunPolicy, f: F) -> Self
    where
        F: Fn(&Task, &ExecutorName, CycleArg) -> Result<Outcome, TaskError>
            + Send
            + Sync
            + 'static,
    {
        Self::new(name, policy, Box::new(FnInvoke(f)))
    }

    pub fn name(&self) -> &TaskName {
        &self.name
    }

    pub fn policy(&self) -> RunPolicy {
        self.policy
    }

    /// Sets `active`. Returns `true` when this opened a new activation.
    pub fn activate(&self) -> bool {
        if self.active.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.activation.fetch_add(1, Ordering::AcqRel);
        true
    }

    pub fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }

    pub fn set_active(&self, active: bool) {
        if active {
            self.activate();
        } else {
            self.deactivate();
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// True once the current activation has produced a run.
    pub fn is_consumed(&self) -> bool {
        self.consumed_at.load(Ordering::Acquire) >= self.activation.load(Ordering::Acquire)
    }

    /// Clears `consumed` without touching `active`.
    pub fn reset(&self) {
        self.activation.fetch_add(1, Ordering::AcqRel);
    }

    /// Queues `target` to be activated when the current run completes.
    ///
    /// Meant to be called from this task's own body. The activation happens
    /// after the result is stored, and is dropped if the run fails.
    pub fn activate_after_run(&self, target: Arc<Task>) {
        self.deferred.lock().push(target);
    }

    /// Whether the next cycle of the owning executor should run this task.
    pub fn is_ready(&self) -> bool {
        if !self.is_active() {
            return false;
        }
        match self.policy {
            RunPolicy::Once => !self.is_consumed(),
            RunPolicy::EveryCycle => true,
        }
    }

    /// Invokes the underlying call and caches what it produced.
    ///
    /// Errors and panics are captured: the previous result is kept, the
    /// status turns `Failed`, and the activation still counts as consumed.
    pub fn run(&self, executor: &ExecutorName, cycle: CycleArg) -> Result<(), TaskError> {
        let epoch = self.activation.load(Ordering::Acquire);
        *self.last_cycle.lock() = cycle;
        self.deferred.lock().clear();

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.invoker.invoke(self, executor, cycle)
        }))
        .unwrap_or_else(|payload| Err(TaskError::panicked(payload.as_ref())));

        let outcome = match result {
            Ok(outcome) => {
                *self.result.write() = outcome.into_output();
                *self.status.write() = TaskStatus::Succeeded;
                Ok(())
            }
            Err(err) => {
                *self.status.write() = TaskStatus::Failed {
                    message: err.message().to_string(),
                };
                Err(err)
            }
        };

        *self.last_run_at.lock() = Some(Utc::now());
        self.runs.fetch_add(1, Ordering::AcqRel);
        // result and status are published before the epoch becomes visible
        self.consumed_at.fetch_max(epoch, Ordering::AcqRel);

        let deferred = std::mem::take(&mut *self.deferred.lock());
        if outcome.is_ok() {
            for target in deferred {
                target.activate();
            }
        } else if !deferred.is_empty() {
            debug!(
                task = %self.name,
                dropped = deferred.len(),
                "run failed, follow-up activations dropped"
            );
        }
        outcome
    }

    /// Last cached result, if any.
    pub fn result(&self) -> Option<TaskOutput> {
        self.result.read().clone()
    }

    /// Last cached result, if any and of type `T`.
    pub fn result_as<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.result().and_then(|out| out.downcast::<T>().ok())
    }

    pub fn status(&self) -> TaskStatus {
        self.status.read().clone()
    }

    /// Number of times the body was invoked (including failures).
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::Acquire)
    }

    /// Cycle argument of the most recent run.
    pub fn last_cycle(&self) -> CycleArg {
        *self.last_cycle.lock()
    }

    pub fn last_run_at(&self) -> Option<DateTime<Utc>> {
        *self.last_run_at.lock()
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("policy", &self.policy)
            .field("active", &self.is_active())
            .field("consumed", &self.is_consumed())
            .field("runs", &self.runs())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::sync::atomic::AtomicUsize;

    fn exec() -> ExecutorName {
        ExecutorName::new("test")
    }

    fn counting(policy: RunPolicy) -> (Arc<Task>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        let task = Task::from_fn("count", policy, move |_, _, _| {
            let n = c.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(Outcome::value(n))
        });
        (Arc::new(task), calls)
    }

    #[test]
    fn new_task_is_inactive_and_unconsumed() {
        let (task, _) = counting(RunPolicy::Once);
        assert!(!task.is_active());
        assert!(!task.is_consumed());
        assert!(!task.is_ready());
        assert_eq!(task.status(), TaskStatus::Pending);
    }

    #[test]
    fn run_caches_result_and_consumes() {
        let (task, _) = counting(RunPolicy::Once);
        task.activate();
        task.run(&exec(), CycleArg::None).unwrap();

        assert!(task.is_consumed());
        assert!(!task.is_ready());
        assert_eq!(*task.result_as::<usize>().unwrap(), 1);
        assert_eq!(task.status(), TaskStatus::Succeeded);
        assert!(task.last_run_at().is_some());
    }

    #[test]
    fn activating_twice_does_not_retrigger() {
        let (task, _) = counting(RunPolicy::Once);
        assert!(task.activate());
        task.run(&exec(), CycleArg::None).unwrap();
        assert!(!task.activate());
        assert!(!task.is_ready());
    }

    #[test]
    fn deactivate_then_activate_opens_new_run() {
        let (task, calls) = counting(RunPolicy::Once);
        task.activate();
        task.run(&exec(), CycleArg::None).unwrap();

        task.deactivate();
        task.activate();
        assert!(task.is_ready());
        task.run(&exec(), CycleArg::None).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn reset_clears_consumed_but_keeps_active() {
        let (task, _) = counting(RunPolicy::Once);
        task.activate();
        task.run(&exec(), CycleArg::None).unwrap();
        task.reset();
        assert!(task.is_active());
        assert!(task.is_ready());
    }

    #[rstest]
    #[case::once(RunPolicy::Once, false)]
    #[case::every_cycle(RunPolicy::EveryCycle, true)]
    fn readiness_after_run_depends_on_policy(#[case] policy: RunPolicy, #[case] ready: bool) {
        let (task, _) = counting(policy);
        task.activate();
        task.run(&exec(), CycleArg::None).unwrap();
        assert_eq!(task.is_ready(), ready);
    }

    #[test]
    fn failure_keeps_previous_result() {
        let fail = Arc::new(AtomicBool::new(false));
        let f = Arc::clone(&fail);
        let task = Task::from_fn("flaky", RunPolicy::Once, move |_, _, _| {
            if f.load(Ordering::SeqCst) {
                Err(TaskError::new("down"))
            } else {
                Ok(Outcome::value("first"))
            }
        });
        task.activate();
        task.run(&exec(), CycleArg::None).unwrap();

        fail.store(true, Ordering::SeqCst);
        task.reset();
        let err = task.run(&exec(), CycleArg::None).unwrap_err();

        assert_eq!(err.message(), "down");
        assert_eq!(*task.result_as::<&str>().unwrap(), "first");
        assert!(task.status().is_failed());
        assert!(task.is_consumed());
    }

    #[test]
    fn panic_is_captured_as_failure() {
        let task = Task::from_fn("panics", RunPolicy::Once, |_, _, _| panic!("kaboom"));
        task.activate();
        let err = task.run(&exec(), CycleArg::None).unwrap_err();
        assert!(err.message().contains("kaboom"));
        assert!(task.result().is_none());
        assert!(task.is_consumed());
    }

    #[test]
    fn reactivation_during_run_is_not_lost() {
        let task = Task::from_fn("self_rearm", RunPolicy::Once, |task, _, _| {
            task.deactivate();
            task.activate();
            Ok(Outcome::empty())
        });
        task.activate();
        task.run(&exec(), CycleArg::None).unwrap();
        assert!(task.is_ready());
    }

    #[test]
    fn last_cycle_is_recorded() {
        let (task, _) = counting(RunPolicy::EveryCycle);
        task.activate();
        let tick = CycleArg::Elapsed(std::time::Duration::from_millis(16));
        task.run(&exec(), tick).unwrap();
        assert_eq!(task.last_cycle(), tick);
    }

    #[test]
    fn deferred_activation_waits_for_the_stored_result() {
        let (target, _) = counting(RunPolicy::Once);
        let seen_active = Arc::new(AtomicBool::new(true));

        let t = Arc::clone(&target);
        let seen = Arc::clone(&seen_active);
        let producer = Task::from_fn("produce", RunPolicy::Once, move |task, _, _| {
            task.activate_after_run(Arc::clone(&t));
            seen.store(t.is_active(), Ordering::SeqCst);
            Ok(Outcome::value("x"))
        });
        producer.activate();
        producer.run(&exec(), CycleArg::None).unwrap();

        assert!(!seen_active.load(Ordering::SeqCst));
        assert!(target.is_active());
        assert!(target.is_ready());
    }

    #[test]
    fn deferred_activation_is_dropped_when_the_run_fails() {
        let (target, _) = counting(RunPolicy::Once);
        let t = Arc::clone(&target);
        let producer = Task::from_fn("produce", RunPolicy::Once, move |task, _, _| {
            task.activate_after_run(Arc::clone(&t));
            Err(TaskError::new("no output"))
        });
        producer.activate();
        assert!(producer.run(&exec(), CycleArg::None).is_err());
        assert!(!target.is_active());
    }
}
