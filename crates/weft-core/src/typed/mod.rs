//! Typed - routed method の型付き API
//!
//! - `Method`: クロージャから作る routed method（shape は型から決まる）
//! - `DynMethod`: object-safe な内部表現（型消去）
//! - `RoutingTable`: method → executor 名
//! - `Worker`: routed method を公開するオブジェクト
//! - `MethodArguments`: bind 時に渡す worker 引数

pub mod arguments;
pub mod method;
pub mod routing;
pub mod worker;

pub use self::arguments::MethodArguments;
pub use self::method::{DynMethod, Method, MethodShape, Param, Signature};
pub use self::routing::{Route, RoutingTable};
pub use self::worker::{TableWorker, Worker};
