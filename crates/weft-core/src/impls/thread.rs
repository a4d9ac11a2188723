//! Thread-backed executor.
//!
//! A dedicated OS thread runs the executor's cycle in a loop until the
//! executor is terminated. While disabled the loop keeps spinning (with a
//! small backoff) and skips work; it only exits on termination, which it
//! checks between cycles, never in the middle of a task.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::config::ThreadExecutorConfig;
use crate::domain::{CycleArg, ExecutorName, RegistryError};
use crate::ports::{Executor, ExecutorKind};
use crate::runtime::core::ExecutorCore;

pub struct ThreadExecutor {
    core: Arc<ExecutorCore>,
    config: ThreadExecutorConfig,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ThreadExecutor {
    pub fn new(name: impl Into<ExecutorName>) -> Self {
        Self::with_config(name, ThreadExecutorConfig::default())
    }

    pub fn with_config(name: impl Into<ExecutorName>, config: ThreadExecutorConfig) -> Self {
        Self {
            core: Arc::new(ExecutorCore::new(name)),
            config,
            handle: Mutex::new(None),
        }
    }

    /// Spawns the loop thread. Starting twice is a no-op.
    pub fn start(&self) -> Result<(), RegistryError> {
        if self.core.is_terminated() {
            return Err(RegistryError::Terminated(self.core.name().clone()));
        }
        let mut handle = self.handle.lock();
        if handle.is_some() {
            return Ok(());
        }

        let core = Arc::clone(&self.core);
        let config = self.config.clone();
        let join = thread::Builder::new()
            .name(self.core.name().to_string())
            .spawn(move || run_loop(core, config))
            .map_err(|e| RegistryError::StartFailed {
                executor: self.core.name().clone(),
                reason: e.to_string(),
            })?;
        *handle = Some(join);
        info!(executor = %self.core.name(), "executor thread started");
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.handle.lock().is_some()
    }

    /// True while the loop thread is alive.
    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Waits for the loop thread to exit. Call after `terminate`.
    ///
    /// Returns `false` if there was nothing to join (never started, already
    /// joined, or called from the loop thread itself).
    pub fn join(&self) -> bool {
        let mut slot = self.handle.lock();
        let Some(handle) = slot.take() else {
            return false;
        };
        if handle.thread().id() == thread::current().id() {
            *slot = Some(handle);
            return false;
        }
        drop(slot);
        if handle.join().is_err() {
            error!(executor = %self.core.name(), "executor thread panicked");
        }
        true
    }

    pub fn terminate_and_join(&self) -> bool {
        self.core.terminate();
        self.join()
    }
}

impl Executor for ThreadExecutor {
    fn core(&self) -> &Arc<ExecutorCore> {
        &self.core
    }

    fn kind(&self) -> ExecutorKind {
        ExecutorKind::Thread
    }

    fn on_start(&self) -> Result<(), RegistryError> {
        self.start()
    }
}

impl Drop for ThreadExecutor {
    fn drop(&mut self) {
        // the loop only holds the core, so it would otherwise spin forever
        self.core.terminate();
    }
}

fn run_loop(core: Arc<ExecutorCore>, config: ThreadExecutorConfig) {
    let idle = config.idle_backoff();
    let pause = config.cycle_pause();
    debug!(executor = %core.name(), "executor loop entered");

    while !core.is_terminated() {
        if !core.is_active() {
            thread::sleep(idle);
            continue;
        }
        core.run_cycle(CycleArg::Terminated(core.is_terminated()));
        if pause.is_zero() {
            thread::yield_now();
        } else {
            thread::sleep(pause);
        }
    }

    debug!(executor = %core.name(), cycles = core.cycles(), "executor loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Outcome;
    use crate::runtime::task::{RunPolicy, Task};
    use crate::test_support::{WAIT, wait_until};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter(name: &str, calls: &Arc<AtomicUsize>) -> Arc<Task> {
        let c = Arc::clone(calls);
        Arc::new(Task::from_fn(name, RunPolicy::Once, move |_, _, cycle| {
            assert_eq!(cycle, CycleArg::Terminated(false));
            c.fetch_add(1, Ordering::SeqCst);
            Ok(Outcome::value(thread::current().name().map(str::to_string)))
        }))
    }

    #[test]
    fn runs_active_tasks_on_its_own_thread() {
        let calls = Arc::new(AtomicUsize::new(0));
        let exec = ThreadExecutor::new("worker-thread");
        let task = counter("t", &calls);
        exec.add_task(Arc::clone(&task));
        exec.start().unwrap();
        exec.set_active(true);
        task.activate();

        assert!(wait_until(WAIT, || task.is_consumed()));
        let ran_on = task.result_as::<Option<String>>().unwrap();
        assert_eq!(ran_on.as_deref(), Some("worker-thread"));

        // many more cycles, still exactly one run
        let seen = exec.core().cycles();
        assert!(wait_until(WAIT, || exec.core().cycles() > seen + 100));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert!(exec.terminate_and_join());
        assert!(!exec.is_running());
    }

    #[test]
    fn disabled_loop_stays_alive_without_running() {
        let calls = Arc::new(AtomicUsize::new(0));
        let exec = ThreadExecutor::new("idle");
        let task = counter("t", &calls);
        exec.add_task(Arc::clone(&task));
        task.activate();
        exec.start().unwrap();

        thread::sleep(std::time::Duration::from_millis(20));
        assert!(exec.is_running());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        exec.set_active(true);
        assert!(wait_until(WAIT, || calls.load(Ordering::SeqCst) == 1));
        exec.terminate_and_join();
    }

    #[test]
    fn start_is_idempotent_and_refused_after_terminate() {
        let exec = ThreadExecutor::new("twice");
        exec.start().unwrap();
        exec.start().unwrap();
        assert!(exec.is_started());
        exec.terminate_and_join();

        assert!(matches!(exec.start(), Err(RegistryError::Terminated(_))));
        assert!(!exec.join());
    }

    #[test]
    fn tasks_added_while_running_join_later_cycles() {
        let calls = Arc::new(AtomicUsize::new(0));
        let exec = ThreadExecutor::new("hot");
        exec.set_active(true);
        exec.start().unwrap();

        let tasks: Vec<Arc<Task>> = (0..50)
            .map(|i| counter(&format!("t{i}"), &calls))
            .collect();
        for task in &tasks {
            exec.add_task(Arc::clone(task));
            task.activate();
        }

        assert!(wait_until(WAIT, || calls.load(Ordering::SeqCst) == 50));
        assert_eq!(exec.core().len(), 50);
        assert!(tasks.iter().all(|t| t.runs() == 1));
        exec.terminate_and_join();
    }

    #[test]
    fn dropping_the_executor_stops_the_loop() {
        let exec = ThreadExecutor::new("dropped");
        exec.start().unwrap();
        let core = Arc::clone(exec.core());
        drop(exec);
        assert!(core.is_terminated());
    }
}
