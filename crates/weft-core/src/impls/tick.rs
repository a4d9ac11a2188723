//! Tick-driven executor
//!
//! ループを持たない executor。ホスト側（描画エンジンのフレームコールバック、
//! あるいは `TickDriver::drive`）が `tick` を呼ぶたびに 1 cycle だけ回す。
//! cycle 引数には前回の tick からの経過時間が入る。
//!
//! - registry に登録されると driver に attach され、外されると detach される
//! - terminate されると driver から外れ、以後の tick は何もしない
//!
//! # 使用例
//! ```ignore
//! let driver = Arc::new(TickDriver::new());
//! registry.register_executor("main", Arc::new(TickExecutor::attached_to("main", Arc::clone(&driver))))?;
//! tokio::spawn(driver.drive(Duration::from_millis(16), shutdown_rx));
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::domain::{CycleArg, CycleReport, ExecutorName, RegistryError};
use crate::ports::{Executor, ExecutorKind, ExecutorListener};
use crate::runtime::core::ExecutorCore;

pub struct TickExecutor {
    core: Arc<ExecutorCore>,
    driver: Option<Arc<TickDriver>>,
    listener: RwLock<Option<Arc<dyn ExecutorListener>>>,
}

impl TickExecutor {
    /// driver を持たない executor。ホストが自分で `tick` を呼ぶ
    pub fn new(name: impl Into<ExecutorName>) -> Self {
        Self {
            core: Arc::new(ExecutorCore::new(name)),
            driver: None,
            listener: RwLock::new(None),
        }
    }

    /// 登録時に `driver` へ attach される executor
    pub fn attached_to(name: impl Into<ExecutorName>, driver: Arc<TickDriver>) -> Self {
        Self {
            driver: Some(driver),
            ..Self::new(name)
        }
    }

    pub fn set_listener(&self, listener: Arc<dyn ExecutorListener>) {
        *self.listener.write() = Some(listener);
    }

    /// ホストから 1 cycle 分呼ぶ。実経過時間で回したいなら `TickDriver` を使う
    pub fn tick(&self, elapsed: Duration) -> CycleReport {
        self.core.run_cycle(CycleArg::Elapsed(elapsed))
    }

    fn notify(&self, f: impl FnOnce(&dyn ExecutorListener, &ExecutorName)) {
        let listener = self.listener.read().clone();
        if let Some(listener) = listener {
            f(listener.as_ref(), self.core.name());
        }
    }

    fn detach(&self) {
        if let Some(driver) = &self.driver {
            driver.detach(&self.core);
        }
    }
}

impl Executor for TickExecutor {
    fn core(&self) -> &Arc<ExecutorCore> {
        &self.core
    }

    fn kind(&self) -> ExecutorKind {
        ExecutorKind::Tick
    }

    fn set_active(&self, active: bool) {
        let previous = self.core.set_active(active);
        if previous == active {
            return;
        }
        if active {
            self.notify(|l, name| l.on_enabled(name));
        } else {
            self.notify(|l, name| l.on_disabled(name));
        }
    }

    fn terminate(&self) {
        if self.core.is_terminated() {
            return;
        }
        self.core.terminate();
        self.detach();
        self.notify(|l, name| l.on_terminated(name));
    }

    fn on_start(&self) -> Result<(), RegistryError> {
        if self.core.is_terminated() {
            return Err(RegistryError::Terminated(self.core.name().clone()));
        }
        if let Some(driver) = &self.driver {
            driver.attach(Arc::clone(&self.core));
        }
        self.notify(|l, name| l.on_started(name));
        Ok(())
    }

    fn on_stop(&self) {
        self.detach();
        self.notify(|l, name| l.on_stopped(name));
    }
}

/// ホストループ側。attach された executor を tick ごとに順に回す
#[derive(Default)]
pub struct TickDriver {
    executors: Mutex<Vec<Arc<ExecutorCore>>>,
    last_tick: Mutex<Option<Instant>>,
}

impl TickDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// 既に attach 済みなら `false`
    pub fn attach(&self, core: Arc<ExecutorCore>) -> bool {
        let mut executors = self.executors.lock();
        if executors.iter().any(|c| Arc::ptr_eq(c, &core)) {
            return false;
        }
        debug!(executor = %core.name(), "attached to tick driver");
        executors.push(core);
        true
    }

    pub fn detach(&self, core: &Arc<ExecutorCore>) -> bool {
        let mut executors = self.executors.lock();
        let before = executors.len();
        executors.retain(|c| !Arc::ptr_eq(c, core));
        let removed = executors.len() != before;
        if removed {
            debug!(executor = %core.name(), "detached from tick driver");
        }
        removed
    }

    pub fn is_attached(&self, core: &Arc<ExecutorCore>) -> bool {
        self.executors.lock().iter().any(|c| Arc::ptr_eq(c, core))
    }

    pub fn len(&self) -> usize {
        self.executors.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.executors.lock().is_empty()
    }

    /// attach 順に 1 cycle ずつ回す。terminate 済みのものはここで外す
    ///
    /// cycle 中に attach / detach されても良いように、
    /// ロックはスナップショットを取る間だけ持つ。
    pub fn tick(&self, elapsed: Duration) -> Vec<CycleReport> {
        *self.last_tick.lock() = Some(Instant::now());
        let snapshot: Vec<Arc<ExecutorCore>> = {
            let mut executors = self.executors.lock();
            executors.retain(|c| !c.is_terminated());
            executors.clone()
        };
        snapshot
            .iter()
            .map(|core| core.run_cycle(CycleArg::Elapsed(elapsed)))
            .collect()
    }

    pub fn tick_now(&self) -> Vec<CycleReport> {
        let now = Instant::now();
        let elapsed = (*self.last_tick.lock())
            .map(|prev| now.duration_since(prev))
            .unwrap_or_default();
        self.tick(elapsed)
    }

    /// `period` ごとに tick するホストループ。`shutdown` に true が来るか
    /// sender が drop されると抜ける
    pub async fn drive(self: Arc<Self>, period: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(period_ms = period.as_millis() as u64, "tick driver started");

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = interval.tick() => {
                    self.tick_now();
                }
            }
        }

        info!("tick driver stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Outcome, SkipReason};
    use crate::runtime::task::{RunPolicy, Task};

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn events(&self) -> Vec<String> {
            self.events.lock().clone()
        }

        fn push(&self, event: &str, name: &ExecutorName) {
            self.events.lock().push(format!("{event}:{name}"));
        }
    }

    impl ExecutorListener for Recorder {
        fn on_started(&self, name: &ExecutorName) {
            self.push("started", name);
        }
        fn on_stopped(&self, name: &ExecutorName) {
            self.push("stopped", name);
        }
        fn on_enabled(&self, name: &ExecutorName) {
            self.push("enabled", name);
        }
        fn on_disabled(&self, name: &ExecutorName) {
            self.push("disabled", name);
        }
        fn on_terminated(&self, name: &ExecutorName) {
            self.push("terminated", name);
        }
    }

    fn frame_task() -> Arc<Task> {
        Arc::new(Task::from_fn("frame", RunPolicy::EveryCycle, |task, _, cycle| {
            let seen = task.result_as::<Duration>().map(|d| *d).unwrap_or_default();
            Ok(Outcome::value(seen + cycle.elapsed().unwrap_or_default()))
        }))
    }

    #[test]
    fn tick_hands_elapsed_time_to_tasks() {
        let exec = TickExecutor::new("main");
        let task = frame_task();
        exec.add_task(Arc::clone(&task));
        exec.set_active(true);
        task.activate();

        exec.tick(Duration::from_millis(16));
        exec.tick(Duration::from_millis(17));

        assert_eq!(task.runs(), 2);
        assert_eq!(*task.result_as::<Duration>().unwrap(), Duration::from_millis(33));
        assert_eq!(task.last_cycle().elapsed(), Some(Duration::from_millis(17)));
    }

    #[test]
    fn listener_sees_lifecycle_in_order() {
        let driver = Arc::new(TickDriver::new());
        let exec = TickExecutor::attached_to("main", Arc::clone(&driver));
        let recorder = Arc::new(Recorder::default());
        exec.set_listener(recorder.clone());

        exec.on_start().unwrap();
        assert!(driver.is_attached(exec.core()));
        exec.set_active(true);
        exec.set_active(true);
        exec.set_active(false);
        exec.on_stop();
        assert!(!driver.is_attached(exec.core()));

        assert_eq!(
            recorder.events(),
            ["started:main", "enabled:main", "disabled:main", "stopped:main"]
        );
    }

    #[test]
    fn terminate_detaches_and_noops_later_ticks() {
        let driver = Arc::new(TickDriver::new());
        let exec = TickExecutor::attached_to("main", Arc::clone(&driver));
        let recorder = Arc::new(Recorder::default());
        exec.set_listener(recorder.clone());
        exec.on_start().unwrap();
        exec.set_active(true);

        exec.terminate();
        exec.terminate();

        assert!(driver.is_empty());
        assert_eq!(exec.tick(Duration::ZERO).skipped, Some(SkipReason::Terminated));
        assert_eq!(recorder.events().last().map(String::as_str), Some("terminated:main"));
        assert_eq!(
            recorder.events().iter().filter(|e| e.starts_with("terminated")).count(),
            1
        );
        assert!(matches!(exec.on_start(), Err(RegistryError::Terminated(_))));
    }

    #[test]
    fn driver_prunes_cores_terminated_behind_its_back() {
        let driver = TickDriver::new();
        let a = Arc::new(ExecutorCore::new("a"));
        let b = Arc::new(ExecutorCore::new("b"));
        assert!(driver.attach(Arc::clone(&a)));
        assert!(!driver.attach(Arc::clone(&a)));
        driver.attach(Arc::clone(&b));

        b.terminate();
        let reports = driver.tick(Duration::from_millis(1));

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].executor.as_str(), "a");
        assert_eq!(driver.len(), 1);
    }

    #[test]
    fn driver_measures_frames_from_its_previous_tick() {
        let driver = Arc::new(TickDriver::new());
        let exec = TickExecutor::attached_to("main", Arc::clone(&driver));
        let task = frame_task();
        exec.add_task(Arc::clone(&task));
        exec.on_start().unwrap();
        exec.set_active(true);
        task.activate();

        driver.tick_now();
        assert_eq!(task.last_cycle().elapsed(), Some(Duration::ZERO));

        std::thread::sleep(Duration::from_millis(20));
        driver.tick_now();
        let frame = task.last_cycle().elapsed().unwrap();
        assert!(frame >= Duration::from_millis(20));
    }

    #[tokio::test]
    async fn drive_ticks_until_shutdown() {
        let driver = Arc::new(TickDriver::new());
        let exec = TickExecutor::attached_to("host", Arc::clone(&driver));
        let task = frame_task();
        exec.add_task(Arc::clone(&task));
        exec.on_start().unwrap();
        exec.set_active(true);
        task.activate();

        let (tx, rx) = watch::channel(false);
        let join = tokio::spawn(Arc::clone(&driver).drive(Duration::from_millis(1), rx));

        for _ in 0..1000 {
            if task.runs() >= 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        assert!(task.runs() >= 3);

        tx.send(true).unwrap();
        join.await.unwrap();
        let after = task.runs();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(task.runs(), after);
    }
}
