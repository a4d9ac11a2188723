//! Status - registry 全体のスナップショット
//!
//! 各 task の `TaskStatus` / 実行回数 / 最終実行時刻をまとめて返す。
//! serde でそのまま JSON にできる。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ExecutorName, TaskName, TaskStatus};
use crate::ports::{Executor, ExecutorKind};
use crate::runtime::task::{RunPolicy, Task};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCounts {
    pub pending: usize,
    pub active: usize,
    pub consumed: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl TaskCounts {
    fn record(&mut self, view: &TaskView) {
        if view.active {
            self.active += 1;
        }
        if view.consumed {
            self.consumed += 1;
        }
        match view.status {
            TaskStatus::Pending => self.pending += 1,
            TaskStatus::Succeeded => self.succeeded += 1,
            TaskStatus::Failed { .. } => self.failed += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskView {
    pub name: TaskName,
    pub policy: RunPolicy,
    pub active: bool,
    pub consumed: bool,
    pub runs: u64,
    pub status: TaskStatus,
    pub last_run_at: Option<DateTime<Utc>>,
}

impl TaskView {
    pub fn of(task: &Task) -> Self {
        Self {
            name: task.name().clone(),
            policy: task.policy(),
            active: task.is_active(),
            consumed: task.is_consumed(),
            runs: task.runs(),
            status: task.status(),
            last_run_at: task.last_run_at(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorStatus {
    /// registry のキー
    pub key: ExecutorName,
    /// executor 自身のラベル
    pub label: ExecutorName,
    pub kind: ExecutorKind,
    pub active: bool,
    pub terminated: bool,
    pub cycles: u64,
    pub tasks: Vec<TaskView>,
}

impl ExecutorStatus {
    pub fn of(key: &ExecutorName, executor: &dyn Executor) -> Self {
        let mut tasks: Vec<TaskView> = executor.tasks().iter().map(|t| TaskView::of(t)).collect();
        tasks.sort_by(|a, b| a.name.cmp(&b.name));
        Self {
            key: key.clone(),
            label: executor.name().clone(),
            kind: executor.kind(),
            active: executor.is_active(),
            terminated: executor.is_terminated(),
            cycles: executor.core().cycles(),
            tasks,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryStatus {
    pub executors: Vec<ExecutorStatus>,
    pub workers: usize,
    pub tasks: TaskCounts,
}

impl RegistryStatus {
    pub(crate) fn collect(executors: Vec<ExecutorStatus>, workers: usize) -> Self {
        let mut tasks = TaskCounts::default();
        for view in executors.iter().flat_map(|e| e.tasks.iter()) {
            tasks.record(view);
        }
        Self {
            executors,
            workers,
            tasks,
        }
    }

    pub fn executor(&self, key: &str) -> Option<&ExecutorStatus> {
        self.executors.iter().find(|e| e.key.as_str() == key)
    }
}
