//! Names - executor と task の識別子
//!
//! 型やクラスではなく、アプリケーションが選んだ文字列で executor を引く。
//! task の名前は routed method の名前と同じ。

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Registry 内で executor を一意に識別する名前
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExecutorName(String);

impl ExecutorName {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExecutorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ExecutorName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ExecutorName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&ExecutorName> for ExecutorName {
    fn from(name: &ExecutorName) -> Self {
        name.clone()
    }
}

impl Borrow<str> for ExecutorName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// executor の task set 内で task を一意に識別する名前
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskName(String);

impl TaskName {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for TaskName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TaskName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for TaskName {
    fn borrow(&self) -> &str {
        &self.0
    }
}
