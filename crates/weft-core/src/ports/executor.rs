//! Executor port - 名前付きの実行コンテキスト
//!
//! 実装ごとの違いは「誰が cycle を回すか」だけ。
//! - `ThreadExecutor`: 専用スレッドのループ
//! - `TickExecutor`: ホストのフレームコールバック
//!
//! task set と flag の扱いは `ExecutorCore` に委譲する。

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::{CycleArg, CycleReport, ExecutorName, RegistryError};
use crate::runtime::core::ExecutorCore;
use crate::runtime::task::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorKind {
    Thread,
    Tick,
}

pub trait Executor: Send + Sync + 'static {
    fn core(&self) -> &Arc<ExecutorCore>;

    fn kind(&self) -> ExecutorKind;

    /// executor 自身のラベル（スレッド名など）。registry のキーとは別
    fn name(&self) -> &ExecutorName {
        self.core().name()
    }

    fn add_task(&self, task: Arc<Task>) -> Option<Arc<Task>> {
        self.core().add_task(task)
    }

    fn task(&self, name: &str) -> Option<Arc<Task>> {
        self.core().task(name)
    }

    fn tasks(&self) -> Vec<Arc<Task>> {
        self.core().tasks()
    }

    fn run_cycle(&self, arg: CycleArg) -> CycleReport {
        self.core().run_cycle(arg)
    }

    fn set_active(&self, active: bool) {
        self.core().set_active(active);
    }

    fn is_active(&self) -> bool {
        self.core().is_active()
    }

    fn terminate(&self) {
        self.core().terminate();
    }

    fn is_terminated(&self) -> bool {
        self.core().is_terminated()
    }

    /// registry に登録された時に呼ばれる
    fn on_start(&self) -> Result<(), RegistryError> {
        Ok(())
    }

    /// registry から外された時に呼ばれる。terminate はしない
    fn on_stop(&self) {}
}

/// 2 つの executor が同じインスタンスかどうか
pub fn same_executor(a: &dyn Executor, b: &dyn Executor) -> bool {
    Arc::ptr_eq(a.core(), b.core())
}
