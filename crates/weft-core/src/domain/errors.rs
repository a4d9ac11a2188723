//! Errors - エラー型と分類
//!
//! - 設定エラー（bind 時）: `BindError`。BindReport に集約され、他の method の bind は続行する
//! - 不正状態 / 未登録: `RegistryError`。呼び出し元へ即座に返す
//! - 実行時の失敗: `TaskError`。Task 境界で捕捉され、cycle は止まらない

use std::fmt;

use thiserror::Error;

use super::names::{ExecutorName, TaskName};

/// ErrorKind はエラーの運用上の分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// bind 時の設定ミス（shape 不一致など）
    Configuration,
    /// プログラミングミス（二重登録、スレッド違反など）
    IllegalState,
    /// 明示的な lookup の失敗
    NotFound,
    /// routed method の実行失敗
    Invocation,
    /// 設定ファイルの読み込み失敗
    Config,
}

/// routed method の実行失敗
#[derive(Debug, Error)]
#[error("{message}")]
pub struct TaskError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl TaskError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// 任意のエラーを包む
    pub fn from_error<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }

    /// `catch_unwind` で捕まえた panic payload から作る
    pub fn panicked(payload: &(dyn std::any::Any + Send)) -> Self {
        let detail = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::new(format!("task panicked: {detail}"))
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// task 本体の中で registry の lookup に `?` を使えるように
impl From<RegistryError> for TaskError {
    fn from(err: RegistryError) -> Self {
        TaskError::from_error(err)
    }
}

/// Registry / executor 操作のエラー
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("executor '{0}' is not registered")]
    ExecutorNotFound(ExecutorName),

    #[error("task '{task}' is not bound on executor '{executor}'")]
    TaskNotFound {
        executor: ExecutorName,
        task: TaskName,
    },

    #[error("executor instance is already registered as '{existing}'")]
    AlreadyRegistered { existing: ExecutorName },

    #[error("binding is confined to thread '{expected}', called from '{actual}'")]
    WrongThread { expected: String, actual: String },

    #[error("executor '{0}' is terminated")]
    Terminated(ExecutorName),

    #[error("failed to start executor '{executor}': {reason}")]
    StartFailed {
        executor: ExecutorName,
        reason: String,
    },

    #[error("result of '{executor}/{task}' is not a {expected}")]
    ResultType {
        executor: ExecutorName,
        task: TaskName,
        expected: &'static str,
    },

    #[error("registry has been dropped")]
    RegistryDropped,
}

impl RegistryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::ExecutorNotFound(_) | RegistryError::TaskNotFound { .. } => {
                ErrorKind::NotFound
            }
            _ => ErrorKind::IllegalState,
        }
    }
}

/// 期待される引数の形
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// worker 引数（MethodArguments の中身）
    Arguments,
    /// TaskContext（registry や cycle 引数へのアクセス）
    Context,
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamKind::Arguments => f.write_str("arguments"),
            ParamKind::Context => f.write_str("context"),
        }
    }
}

/// bind 時の設定エラー（shape check の失敗）
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BindError {
    #[error("{method}(...) parameters count must be {expected}, declared {actual}")]
    ParameterCount {
        method: TaskName,
        expected: usize,
        actual: usize,
    },

    #[error("{method}(...) parameter[{index}] must be {expected}, declared {actual}")]
    ParameterKind {
        method: TaskName,
        index: usize,
        expected: ParamKind,
        actual: ParamKind,
    },

    #[error("{method}(...) parameter[{index}] is not of {expected} type (got {actual})")]
    ParameterType {
        method: TaskName,
        index: usize,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("{method}(...) takes worker arguments but none were supplied to bind")]
    MissingArguments { method: TaskName },
}

impl BindError {
    pub fn method(&self) -> &TaskName {
        match self {
            BindError::ParameterCount { method, .. }
            | BindError::ParameterKind { method, .. }
            | BindError::ParameterType { method, .. }
            | BindError::MissingArguments { method } => method,
        }
    }
}

/// 設定ファイルのエラー
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// crate 全体のエラー
#[derive(Debug, Error)]
pub enum WeftError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Bind(#[from] BindError),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl WeftError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WeftError::Registry(e) => e.kind(),
            WeftError::Bind(_) => ErrorKind::Configuration,
            WeftError::Task(_) => ErrorKind::Invocation,
            WeftError::Config(_) => ErrorKind::Config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_payload_is_described() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("bad input");
        let err = TaskError::panicked(payload.as_ref());
        assert_eq!(err.message(), "task panicked: bad input");
    }

    #[test]
    fn not_found_is_classified() {
        let err = WeftError::from(RegistryError::ExecutorNotFound(ExecutorName::new("x")));
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("'x'"));
    }

    #[test]
    fn bind_error_names_method() {
        let err = BindError::MissingArguments {
            method: TaskName::new("writeMessage"),
        };
        assert_eq!(err.method().as_str(), "writeMessage");
        assert_eq!(WeftError::from(err).kind(), ErrorKind::Configuration);
    }
}
