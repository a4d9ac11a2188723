//! RegistryBuilder - registry の組み立てと起動時検証
//!
//! executor と worker を積んで `build()` で registry を作る。
//! `expect_executors` を指定すると、足りない executor があれば
//! bind する前に `BuildError` で止まる（Fail-fast）。
//!
//! # 使用例
//! ```ignore
//! let registry = RegistryBuilder::new()
//!     .executor("A", Arc::new(ThreadExecutor::new("A")))
//!     .executor("B", Arc::new(ThreadExecutor::new("B")))
//!     .worker(Arc::new(Pipeline))
//!     .expect_executors(&["A", "B"])
//!     .build()?;
//! ```

use std::sync::Arc;

use super::registry::Registry;
use crate::config::{RegistryConfig, WeftConfig};
use crate::domain::{BindError, ExecutorName, RegistryError};
use crate::ports::Executor;
use crate::typed::{MethodArguments, Worker};

pub struct RegistryBuilder {
    config: RegistryConfig,
    executors: Vec<(ExecutorName, Arc<dyn Executor>)>,
    workers: Vec<Arc<dyn Worker>>,
    arguments: Option<MethodArguments>,
    expected_executors: Option<Vec<String>>,
}

/// BuildError は registry 構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing executors: {0:?}. These executors were expected but not registered.")]
    MissingExecutors(Vec<String>),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("bind-time shape check failed: {0:?}")]
    Bind(Vec<BindError>),
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self {
            config: RegistryConfig::default(),
            executors: Vec::new(),
            workers: Vec::new(),
            arguments: None,
            expected_executors: None,
        }
    }

    /// 設定ファイルの `registry` セクションを使う
    pub fn config(mut self, config: &WeftConfig) -> Self {
        self.config = config.registry.clone();
        self
    }

    /// bind を `build()` を呼んだスレッドに限定する
    pub fn confine_binding_to_current_thread(mut self) -> Self {
        self.config.confine_binding = true;
        self
    }

    pub fn executor(mut self, name: impl Into<ExecutorName>, executor: Arc<dyn Executor>) -> Self {
        self.executors.push((name.into(), executor));
        self
    }

    pub fn worker(mut self, worker: Arc<dyn Worker>) -> Self {
        self.workers.push(worker);
        self
    }

    /// 引数を取る method に渡す値
    pub fn arguments(mut self, arguments: MethodArguments) -> Self {
        self.arguments = Some(arguments);
        self
    }

    /// 登録されているべき executor 名
    pub fn expect_executors(mut self, names: &[&str]) -> Self {
        self.expected_executors = Some(names.iter().map(|n| n.to_string()).collect());
        self
    }

    /// 検証してから executor を登録し、worker を bind する
    ///
    /// # 検証
    /// - `expect_executors` の名前が全て積まれているか
    /// - 全 method が shape check を通るか
    pub fn build(self) -> Result<Registry, BuildError> {
        if let Some(expected) = &self.expected_executors {
            let missing: Vec<String> = expected
                .iter()
                .filter(|name| !self.executors.iter().any(|(n, _)| n.as_str() == name.as_str()))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingExecutors(missing));
            }
        }

        let registry = Registry::with_config(self.config);
        for (name, executor) in self.executors {
            registry.register_executor(name, executor)?;
        }
        if !self.workers.is_empty() {
            registry.set_workers(self.workers);
            let report = registry.bind(self.arguments)?;
            if !report.is_clean() {
                return Err(BuildError::Bind(report.errors));
            }
        }
        Ok(registry)
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Outcome;
    use crate::impls::TickExecutor;
    use crate::typed::{Method, RoutingTable, TableWorker};

    fn worker() -> Arc<dyn Worker> {
        let table = RoutingTable::new()
            .route(Method::bare("ping", || Ok(Outcome::value("pong"))), ["A"])
            .route(
                Method::with_args::<String, _>("greet", |name, _| {
                    Ok(Outcome::value(format!("hello {name}")))
                }),
                ["A"],
            );
        Arc::new(TableWorker::new("demo", table))
    }

    #[test]
    fn build_success_binds_workers() {
        let registry = RegistryBuilder::new()
            .executor("A", Arc::new(TickExecutor::new("A")))
            .worker(worker())
            .arguments(MethodArguments::new("weft".to_string()))
            .expect_executors(&["A"])
            .build()
            .unwrap();

        let a = registry.executor("A").unwrap();
        assert!(a.task("ping").is_some());
        assert!(a.task("greet").is_some());
    }

    #[test]
    fn build_missing_executors() {
        let result = RegistryBuilder::new()
            .executor("A", Arc::new(TickExecutor::new("A")))
            .expect_executors(&["A", "B"])
            .build();
        assert!(matches!(
            result,
            Err(BuildError::MissingExecutors(missing)) if missing == vec!["B".to_string()]
        ));
    }

    #[test]
    fn build_rejects_shape_errors() {
        let result = RegistryBuilder::new()
            .executor("A", Arc::new(TickExecutor::new("A")))
            .worker(worker())
            .build();
        assert!(matches!(
            result,
            Err(BuildError::Bind(errors)) if errors.len() == 1 && errors[0].method().as_str() == "greet"
        ));
    }

    #[test]
    fn build_without_expectations() {
        let registry = RegistryBuilder::new()
            .config(&WeftConfig::default())
            .confine_binding_to_current_thread()
            .build()
            .unwrap();
        assert!(registry.executor_names().is_empty());
        assert!(registry.config().confine_binding);
    }
}
