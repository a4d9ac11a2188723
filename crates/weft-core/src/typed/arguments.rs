//! MethodArguments - worker 引数
//!
//! bind 時に一度だけ渡され、引数を取る全ての routed method に共有される。
//! 型は消去して保持し、bind 時の shape check で宣言型と突き合わせる。

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

#[derive(Clone)]
pub struct MethodArguments {
    value: Arc<dyn Any + Send + Sync>,
    type_id: TypeId,
    type_name: &'static str,
}

impl MethodArguments {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }
}

impl fmt::Debug for MethodArguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodArguments")
            .field("type", &self.type_name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn downcast_to_declared_type() {
        let mut map = HashMap::new();
        map.insert("message".to_string(), "Hello World!".to_string());
        let args = MethodArguments::new(map);

        let map = args.downcast_ref::<HashMap<String, String>>().unwrap();
        assert_eq!(map["message"], "Hello World!");
        assert!(args.downcast_ref::<String>().is_none());
        assert_eq!(args.type_id(), TypeId::of::<HashMap<String, String>>());
    }
}
