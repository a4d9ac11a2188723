//! TaskContext - routed method に渡される実行時の文脈
//!
//! 自分がどの executor のどの task として動いているか、この cycle の引数、
//! そして registry への参照を持つ。他の task の結果を読んだり、別の
//! executor の task を起こしたりするのはここから行う。
//!
//! # 使用例
//! ```ignore
//! Method::contextual("produce", |ctx| {
//!     // この run の結果が書かれてから consume が起きる
//!     ctx.activate_on_completion("B", "consume")?;
//!     Ok(Outcome::value("x".to_string()))
//! })
//! ```

use std::sync::Arc;
use std::time::Duration;

use super::task::Task;
use crate::app::Registry;
use crate::domain::{CycleArg, ExecutorName, RegistryError, TaskName};

pub struct TaskContext<'a> {
    registry: &'a Registry,
    executor: &'a ExecutorName,
    task: &'a Task,
    cycle: CycleArg,
}

impl<'a> TaskContext<'a> {
    pub(crate) fn new(
        registry: &'a Registry,
        executor: &'a ExecutorName,
        task: &'a Task,
        cycle: CycleArg,
    ) -> Self {
        Self {
            registry,
            executor,
            task,
            cycle,
        }
    }

    pub fn registry(&self) -> &'a Registry {
        self.registry
    }

    /// 実行中の executor のラベル
    pub fn executor_name(&self) -> &ExecutorName {
        self.executor
    }

    pub fn task_name(&self) -> &TaskName {
        self.task.name()
    }

    pub fn task(&self) -> &Task {
        self.task
    }

    pub fn cycle(&self) -> CycleArg {
        self.cycle
    }

    /// tick 駆動の executor なら前回の tick からの経過時間
    pub fn elapsed(&self) -> Option<Duration> {
        self.cycle.elapsed()
    }

    /// 他の task の結果（まだ無ければ `None`）
    pub fn result<T: Send + Sync + 'static>(
        &self,
        executor: &str,
        task: &str,
    ) -> Result<Option<Arc<T>>, RegistryError> {
        self.registry.result::<T>(executor, task)
    }

    /// 今すぐ起こす。自分の結果を読ませたいなら `activate_on_completion` を使う
    pub fn activate(&self, executor: &str, task: &str) -> Result<bool, RegistryError> {
        self.registry.activate(executor, task)
    }

    /// この run が成功し、結果が書かれた後で起こす
    ///
    /// 相手の task はここで引くので、名前の間違いは即座にエラーになる。
    /// run が失敗した場合は起こさない。
    pub fn activate_on_completion(&self, executor: &str, task: &str) -> Result<(), RegistryError> {
        let target = self.registry.task(executor, task)?;
        self.task.activate_after_run(target);
        Ok(())
    }

    pub fn deactivate(&self, executor: &str, task: &str) -> Result<(), RegistryError> {
        self.registry.set_task_active(executor, task, false)
    }

    /// `EveryCycle` の task が自分を止める時に使う
    pub fn deactivate_self(&self) {
        self.task.deactivate();
    }
}

impl std::fmt::Debug for TaskContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskContext")
            .field("executor", self.executor)
            .field("task", self.task.name())
            .field("cycle", &self.cycle)
            .finish()
    }
}
