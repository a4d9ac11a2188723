//! Registry / Binder - executor の管理と routing table の解決
//!
//! - executor を名前（registry のキー）で登録・解除する
//! - worker の routing table を辿って、method ごと・executor 名ごとに
//!   task を作り、該当 executor に `add_task` する
//! - task の本体からは `TaskContext` 経由で他の executor / task / 結果を引ける
//! - 自分の結果を渡す相手は `TaskContext::activate_on_completion` で起こす。
//!   起きるのは結果が書かれた後
//!
//! # 使用例
//! ```ignore
//! let registry = Registry::new();
//! registry.register_executor("A", Arc::new(ThreadExecutor::new("A")))?;
//! registry.register_executor("B", Arc::new(ThreadExecutor::new("B")))?;
//! registry.add_worker(Arc::new(Pipeline));
//! let report = registry.bind(None)?;
//! registry.activate("A", "produce")?;
//! ```
//!
//! # bind のルール
//! - 未登録の executor 名は黙ってスキップ（後から登録して bind し直せる）
//! - shape check に失敗した method は `BindReport::errors` に積み、他の method は続行
//! - 同じ (method, executor) を bind し直すと、新しい非アクティブな task で置き換わる

use std::fmt;
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::status::{ExecutorStatus, RegistryStatus};
use crate::config::RegistryConfig;
use crate::domain::{
    BindError, CycleArg, ExecutorName, Outcome, RegistryError, TaskError, TaskName,
};
use crate::ports::{Executor, same_executor};
use crate::runtime::context::TaskContext;
use crate::runtime::task::{Invoke, Task};
use crate::typed::{Method, MethodArguments, RoutingTable, Worker};

/// (method, executor) の組
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub method: TaskName,
    pub executor: ExecutorName,
}

/// 1 回の bind の結果
#[derive(Debug, Clone, Default)]
pub struct BindReport {
    /// task が作られた組
    pub bound: Vec<Binding>,
    /// executor が未登録だったので飛ばした組
    pub skipped: Vec<Binding>,
    /// shape check に失敗した method
    pub errors: Vec<BindError>,
}

impl BindReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn merge(&mut self, other: BindReport) {
        self.bound.extend(other.bound);
        self.skipped.extend(other.skipped);
        self.errors.extend(other.errors);
    }

    /// 最初の設定エラーを返す
    pub fn into_result(mut self) -> Result<Self, BindError> {
        if self.errors.is_empty() {
            Ok(self)
        } else {
            Err(self.errors.remove(0))
        }
    }
}

pub(crate) struct RegistryInner {
    executors: DashMap<ExecutorName, Arc<dyn Executor>>,
    /// 同一インスタンス検査から insert までを 1 手にする
    registering: Mutex<()>,
    workers: RwLock<Vec<Arc<dyn Worker>>>,
    config: RegistryConfig,
    owner: ThreadId,
}

#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

impl Registry {
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// `confine_binding` が true なら、bind はこの関数を呼んだスレッドからのみ
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                executors: DashMap::new(),
                registering: Mutex::new(()),
                workers: RwLock::new(Vec::new()),
                config,
                owner: thread::current().id(),
            }),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.inner.config
    }

    // ────────────────────────────────────────────────────────────────────
    // executors
    // ────────────────────────────────────────────────────────────────────

    /// executor を `name` で登録し、`on_start` を呼ぶ
    ///
    /// 同じ名前の executor が既にあれば置き換えて古い方を返す（terminate はしない）。
    /// 同じインスタンスを別の名前で二重登録するのはエラー。
    pub fn register_executor(
        &self,
        name: impl Into<ExecutorName>,
        executor: Arc<dyn Executor>,
    ) -> Result<Option<Arc<dyn Executor>>, RegistryError> {
        let name = name.into();
        let _guard = self.inner.registering.lock();
        if let Some(existing) = self.key_of(executor.as_ref()) {
            return Err(RegistryError::AlreadyRegistered { existing });
        }

        executor.on_start()?;
        let previous = self.inner.executors.insert(name.clone(), Arc::clone(&executor));
        if let Some(old) = &previous {
            old.on_stop();
            info!(executor = %name, label = %old.name(), "executor replaced");
        }
        info!(
            executor = %name,
            label = %executor.name(),
            kind = ?executor.kind(),
            "executor registered"
        );
        Ok(previous)
    }

    /// 登録を外して返す。terminate はしない
    pub fn unregister_executor(&self, name: &str) -> Result<Arc<dyn Executor>, RegistryError> {
        let (key, executor) = self
            .inner
            .executors
            .remove(name)
            .ok_or_else(|| RegistryError::ExecutorNotFound(ExecutorName::new(name)))?;
        executor.on_stop();
        info!(executor = %key, "executor unregistered");
        Ok(executor)
    }

    pub fn executor(&self, name: &str) -> Option<Arc<dyn Executor>> {
        self.inner
            .executors
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains_executor(&self, name: &str) -> bool {
        self.inner.executors.contains_key(name)
    }

    pub fn executor_names(&self) -> Vec<ExecutorName> {
        let mut names: Vec<ExecutorName> =
            self.inner.executors.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// その時点の executor 一覧（キー順）
    pub fn executors(&self) -> Vec<(ExecutorName, Arc<dyn Executor>)> {
        let mut all: Vec<(ExecutorName, Arc<dyn Executor>)> = self
            .inner
            .executors
            .iter()
            .map(|e| (e.key().clone(), Arc::clone(e.value())))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    pub fn set_executor_active(&self, name: &str, active: bool) -> Result<(), RegistryError> {
        self.require_executor(name)?.set_active(active);
        Ok(())
    }

    /// 全 executor を terminate する。登録は外さない
    pub fn terminate_all(&self) {
        for (name, executor) in self.executors() {
            executor.terminate();
            debug!(executor = %name, "executor terminated");
        }
    }

    fn require_executor(&self, name: &str) -> Result<Arc<dyn Executor>, RegistryError> {
        self.executor(name)
            .ok_or_else(|| RegistryError::ExecutorNotFound(ExecutorName::new(name)))
    }

    fn key_of(&self, executor: &dyn Executor) -> Option<ExecutorName> {
        self.inner
            .executors
            .iter()
            .find(|e| same_executor(e.value().as_ref(), executor))
            .map(|e| e.key().clone())
    }

    // ────────────────────────────────────────────────────────────────────
    // workers / binding
    // ────────────────────────────────────────────────────────────────────

    pub fn add_worker(&self, worker: Arc<dyn Worker>) {
        debug!(worker = worker.name(), "worker added");
        self.inner.workers.write().push(worker);
    }

    /// worker の集合を丸ごと置き換える。既に bind 済みの task はそのまま
    pub fn set_workers(&self, workers: Vec<Arc<dyn Worker>>) {
        *self.inner.workers.write() = workers;
    }

    pub fn workers(&self) -> Vec<Arc<dyn Worker>> {
        self.inner.workers.read().clone()
    }

    /// 全 worker の routing table を解決して task を作る
    ///
    /// 何度呼んでもよい。呼ぶたびに表を最初から辿り直す。
    pub fn bind(&self, args: Option<MethodArguments>) -> Result<BindReport, RegistryError> {
        self.check_thread()?;
        let mut report = BindReport::default();
        for worker in self.workers() {
            debug!(worker = worker.name(), "binding worker");
            let table = Arc::clone(&worker).routes();
            report.merge(self.bind_routes(&table, args.as_ref()));
        }
        Ok(report)
    }

    /// worker を介さずに表を直接 bind する
    pub fn bind_table(
        &self,
        table: &RoutingTable,
        args: Option<MethodArguments>,
    ) -> Result<BindReport, RegistryError> {
        self.check_thread()?;
        Ok(self.bind_routes(table, args.as_ref()))
    }

    fn bind_routes(&self, table: &RoutingTable, args: Option<&MethodArguments>) -> BindReport {
        let mut report = BindReport::default();
        for route in table.iter() {
            let method = route.method();
            if let Err(e) = method.check_binding(args) {
                warn!(method = %method.name(), error = %e, "method rejected at bind time");
                report.errors.push(e);
                continue;
            }

            for name in route.executors() {
                let binding = Binding {
                    method: method.name().clone(),
                    executor: name.clone(),
                };
                let Some(executor) = self.executor(name.as_str()) else {
                    debug!(method = %method.name(), executor = %name, "executor not registered yet, skipped");
                    report.skipped.push(binding);
                    continue;
                };

                let task = Task::new(
                    method.name().clone(),
                    route.policy(),
                    Box::new(BoundMethod {
                        registry: Arc::downgrade(&self.inner),
                        method: method.clone(),
                        args: args.cloned(),
                    }),
                );
                if executor.add_task(Arc::new(task)).is_some() {
                    debug!(method = %method.name(), executor = %name, "task replaced");
                } else {
                    debug!(method = %method.name(), executor = %name, "task bound");
                }
                report.bound.push(binding);
            }
        }
        report
    }

    fn check_thread(&self) -> Result<(), RegistryError> {
        if !self.inner.config.confine_binding {
            return Ok(());
        }
        let current = thread::current();
        if current.id() == self.inner.owner {
            return Ok(());
        }
        Err(RegistryError::WrongThread {
            expected: format!("{:?}", self.inner.owner),
            actual: match current.name() {
                Some(name) => format!("{name} ({:?})", current.id()),
                None => format!("{:?}", current.id()),
            },
        })
    }

    // ────────────────────────────────────────────────────────────────────
    // tasks
    // ────────────────────────────────────────────────────────────────────

    pub fn task(&self, executor: &str, task: &str) -> Result<Arc<Task>, RegistryError> {
        self.require_executor(executor)?
            .task(task)
            .ok_or_else(|| RegistryError::TaskNotFound {
                executor: ExecutorName::new(executor),
                task: TaskName::new(task),
            })
    }

    /// task の最新の結果。まだ結果が無ければ `Ok(None)`
    pub fn result<T: Send + Sync + 'static>(
        &self,
        executor: &str,
        task: &str,
    ) -> Result<Option<Arc<T>>, RegistryError> {
        let Some(output) = self.task(executor, task)?.result() else {
            return Ok(None);
        };
        output
            .downcast::<T>()
            .map(Some)
            .map_err(|_| RegistryError::ResultType {
                executor: ExecutorName::new(executor),
                task: TaskName::new(task),
                expected: std::any::type_name::<T>(),
            })
    }

    pub fn set_task_active(
        &self,
        executor: &str,
        task: &str,
        active: bool,
    ) -> Result<(), RegistryError> {
        self.task(executor, task)?.set_active(active);
        Ok(())
    }

    /// 新しい activation を開いたら `true`
    pub fn activate(&self, executor: &str, task: &str) -> Result<bool, RegistryError> {
        Ok(self.task(executor, task)?.activate())
    }

    pub fn status(&self) -> RegistryStatus {
        let executors = self
            .executors()
            .iter()
            .map(|(key, executor)| ExecutorStatus::of(key, executor.as_ref()))
            .collect();
        RegistryStatus::collect(executors, self.inner.workers.read().len())
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("executors", &self.executor_names())
            .field("workers", &self.inner.workers.read().len())
            .field("config", &self.inner.config)
            .finish()
    }
}

/// bind された method。task から registry への参照は弱参照
/// （registry → executor → task → registry の循環を作らない）
struct BoundMethod {
    registry: Weak<RegistryInner>,
    method: Method,
    args: Option<MethodArguments>,
}

impl Invoke for BoundMethod {
    fn invoke(
        &self,
        task: &Task,
        executor: &ExecutorName,
        cycle: CycleArg,
    ) -> Result<Outcome, TaskError> {
        let inner = self
            .registry
            .upgrade()
            .ok_or_else(|| TaskError::from_error(RegistryError::RegistryDropped))?;
        let registry = Registry { inner };
        let ctx = TaskContext::new(&registry, executor, task, cycle);
        self.method.call(self.args.as_ref(), &ctx)
    }
}
