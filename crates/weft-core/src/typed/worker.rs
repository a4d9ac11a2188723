//! Worker - routed method を公開するオブジェクト
//!
//! worker は自分の method を `RoutingTable` として差し出す。
//! method は `Arc<Self>` を捕まえたクロージャとして組み立てる。
//!
//! # 使用例
//! ```ignore
//! struct Pipeline;
//!
//! impl Worker for Pipeline {
//!     fn routes(self: Arc<Self>) -> RoutingTable {
//!         let this = Arc::clone(&self);
//!         RoutingTable::new()
//!             .route(Method::contextual("produce", move |ctx| this.produce(ctx)), ["A"])
//!     }
//! }
//! ```

use std::sync::Arc;

use super::routing::RoutingTable;

pub trait Worker: Send + Sync + 'static {
    /// ログ用の名前
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn routes(self: Arc<Self>) -> RoutingTable;
}

/// 表をそのまま worker として扱う
pub struct TableWorker {
    name: String,
    table: RoutingTable,
}

impl TableWorker {
    pub fn new(name: impl Into<String>, table: RoutingTable) -> Self {
        Self {
            name: name.into(),
            table,
        }
    }
}

impl Worker for TableWorker {
    fn name(&self) -> &str {
        &self.name
    }

    fn routes(self: Arc<Self>) -> RoutingTable {
        self.table.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Outcome;
    use crate::typed::Method;

    struct Echo;

    impl Worker for Echo {
        fn routes(self: Arc<Self>) -> RoutingTable {
            RoutingTable::new().route(Method::bare("echo", || Ok(Outcome::empty())), ["A", "B"])
        }
    }

    #[test]
    fn default_name_is_the_type_name() {
        assert!(Echo.name().ends_with("Echo"));
        let table = Arc::new(Echo).routes();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn table_worker_hands_out_its_table() {
        let table = RoutingTable::new().route(Method::bare("m", || Ok(Outcome::empty())), ["A"]);
        let worker: Arc<dyn Worker> = Arc::new(TableWorker::new("static", table));
        assert_eq!(worker.name(), "static");
        assert_eq!(Arc::clone(&worker).routes().len(), 1);
        assert_eq!(worker.routes().len(), 1);
    }
}
