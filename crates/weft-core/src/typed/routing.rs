//! RoutingTable - method → executor 名のマッピング
//!
//! annotation による探索の代わりに、起動時に明示的に組み立てる表。
//! core は表を解決済みのデータとして受け取るだけで、探索はしない。
//!
//! # 使用例
//! ```ignore
//! let table = RoutingTable::new()
//!     .route(Method::contextual("produce", produce), ["A"])
//!     .route(Method::contextual("consume", consume), ["B"]);
//! ```

use super::method::Method;
use crate::domain::ExecutorName;
use crate::runtime::task::RunPolicy;

/// 1 つの method と、それを実行すべき executor 名の順序付き集合
#[derive(Debug, Clone)]
pub struct Route {
    method: Method,
    executors: Vec<ExecutorName>,
    policy: RunPolicy,
}

impl Route {
    pub fn new<I, N>(method: Method, executors: I, policy: RunPolicy) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<ExecutorName>,
    {
        let mut names: Vec<ExecutorName> = Vec::new();
        for name in executors {
            let name = name.into();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        Self {
            method,
            executors: names,
            policy,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn executors(&self) -> &[ExecutorName] {
        &self.executors
    }

    pub fn policy(&self) -> RunPolicy {
        self.policy
    }
}

#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    routes: Vec<Route>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// `RunPolicy::Once` で method を登録する
    pub fn route<I, N>(self, method: Method, executors: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<ExecutorName>,
    {
        self.route_with(method, executors, RunPolicy::Once)
    }

    pub fn route_with<I, N>(mut self, method: Method, executors: I, policy: RunPolicy) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<ExecutorName>,
    {
        self.push(Route::new(method, executors, policy));
        self
    }

    pub fn push(&mut self, route: Route) {
        self.routes.push(route);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Outcome;

    fn noop(name: &str) -> Method {
        Method::bare(name, || Ok(Outcome::empty()))
    }

    #[test]
    fn executors_are_an_ordered_set() {
        let route = Route::new(noop("m"), ["B", "A", "B"], RunPolicy::Once);
        let names: Vec<&str> = route.executors().iter().map(|n| n.as_str()).collect();
        assert_eq!(names, vec!["B", "A"]);
    }

    #[test]
    fn builder_collects_routes() {
        let table = RoutingTable::new()
            .route(noop("produce"), ["A"])
            .route_with(noop("render"), ["B"], RunPolicy::EveryCycle);
        assert_eq!(table.len(), 2);
        let policies: Vec<RunPolicy> = table.iter().map(|r| r.policy()).collect();
        assert_eq!(policies, vec![RunPolicy::Once, RunPolicy::EveryCycle]);
    }
}
