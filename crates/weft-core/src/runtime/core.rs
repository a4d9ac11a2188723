//! ExecutorCore: the engine shared by every executor flavour.
//!
//! Owns the task set, the activation/termination flags, and the run cycle.
//!
//! Locking discipline:
//! - `tasks` is held only to insert, remove, or snapshot. A cycle snapshots
//!   the task set and releases the lock before invoking any body, so bodies
//!   may add tasks to, or flip tasks on, their own executor.
//! - `cycle` serialises cycles against each other. It is only try-locked; a
//!   re-entrant or concurrent cycle is reported as `SkipReason::Busy`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::task::Task;
use crate::domain::{CycleArg, CycleReport, ExecutorName, SkipReason, TaskName};

pub struct ExecutorCore {
    name: ExecutorName,
    active: AtomicBool,
    terminated: AtomicBool,
    cycles: AtomicU64,
    tasks: Mutex<HashMap<TaskName, Arc<Task>>>,
    cycle: Mutex<()>,
}

impl ExecutorCore {
    pub fn new(name: impl Into<ExecutorName>) -> Self {
        Self {
            name: name.into(),
            active: AtomicBool::new(false),
            terminated: AtomicBool::new(false),
            cycles: AtomicU64::new(0),
            tasks: Mutex::new(HashMap::new()),
            cycle: Mutex::new(()),
        }
    }

    pub fn name(&self) -> &ExecutorName {
        &self.name
    }

    /// Returns the previous value.
    pub fn set_active(&self, active: bool) -> bool {
        self.active.swap(active, Ordering::AcqRel)
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// One-way: a terminated core never runs again.
    pub fn terminate(&self) {
        if !self.terminated.swap(true, Ordering::AcqRel) {
            debug!(executor = %self.name, "executor terminated");
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    /// Completed (non-skipped) cycles so far.
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Acquire)
    }

    /// Inserts a task, replacing (and returning) any task with the same name.
    pub fn add_task(&self, task: Arc<Task>) -> Option<Arc<Task>> {
        self.tasks.lock().insert(task.name().clone(), task)
    }

    pub fn task(&self, name: &str) -> Option<Arc<Task>> {
        self.tasks.lock().get(name).cloned()
    }

    pub fn task_names(&self) -> Vec<TaskName> {
        self.tasks.lock().keys().cloned().collect()
    }

    pub fn tasks(&self) -> Vec<Arc<Task>> {
        self.tasks.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }

    /// Runs every task that is active and not yet consumed, once.
    ///
    /// Iteration order is unspecified. A task activated by another body
    /// during this cycle runs later in the same cycle if the scan has not
    /// reached it yet, otherwise on the next one. Tasks added during the
    /// cycle join from the next cycle.
    pub fn run_cycle(&self, arg: CycleArg) -> CycleReport {
        if self.is_terminated() {
            return CycleReport::skipped(self.name.clone(), SkipReason::Terminated);
        }
        if !self.is_active() {
            return CycleReport::skipped(self.name.clone(), SkipReason::Disabled);
        }
        let Some(_guard) = self.cycle.try_lock() else {
            debug!(executor = %self.name, "cycle already in progress");
            return CycleReport::skipped(self.name.clone(), SkipReason::Busy);
        };

        let snapshot = self.tasks();
        let mut ran = 0;
        let mut failed = 0;
        for task in snapshot {
            if !task.is_ready() {
                continue;
            }
            ran += 1;
            if let Err(e) = task.run(&self.name, arg) {
                failed += 1;
                warn!(
                    executor = %self.name,
                    task = %task.name(),
                    error = %e,
                    "task failed"
                );
            }
        }

        self.cycles.fetch_add(1, Ordering::AcqRel);
        CycleReport::completed(self.name.clone(), ran, failed)
    }
}

impl std::fmt::Debug for ExecutorCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorCore")
            .field("name", &self.name)
            .field("active", &self.is_active())
            .field("terminated", &self.is_terminated())
            .field("tasks", &self.len())
            .finish()
    }
}
