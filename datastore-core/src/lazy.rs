//! 延迟引用
//!
//! `Lazy<V>` 有两种状态：
//! - 未解析：持有已存储的键与解析闭包，首次 `get` 时执行查找并记忆结果；
//! - 已解析：值保存在 `OnceLock` 中，之后的访问不再读取存储。
//!
//! 保存时未解析的句柄只回写原始键，不会触发解析或级联保存。
//!
use crate::error::{DatastoreError, DatastoreResult};
use crate::mapping::{EntityRef, Hydrated, Persistent, RelationField, RelationValue};
use crate::template::DatastoreTemplate;
use crate::value::Value;
use std::any::Any;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::trace;

type Resolver<V> = Arc<dyn Fn() -> DatastoreResult<V> + Send + Sync>;

struct Pending<V> {
    keys: Value,
    resolver: Resolver<V>,
}

pub struct Lazy<V> {
    value: OnceLock<V>,
    pending: Option<Pending<V>>,
}

/// 单值延迟引用
pub type LazyRef<T> = Lazy<Option<EntityRef<T>>>;

/// 集合延迟引用
pub type LazyList<T> = Lazy<Vec<EntityRef<T>>>;

impl<V> Lazy<V> {
    pub fn resolved(value: V) -> Self {
        Self {
            value: OnceLock::from(value),
            pending: None,
        }
    }

    pub fn unresolved<F>(keys: Value, resolver: F) -> Self
    where
        F: Fn() -> DatastoreResult<V> + Send + Sync + 'static,
    {
        Self {
            value: OnceLock::new(),
            pending: Some(Pending {
                keys,
                resolver: Arc::new(resolver),
            }),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.value.get().is_some()
    }

    /// 未解析时返回已存储的键
    pub fn stored_keys(&self) -> Option<&Value> {
        match (self.value.get(), &self.pending) {
            (None, Some(pending)) => Some(&pending.keys),
            _ => None,
        }
    }

    /// 取值；未解析时执行一次查找并记忆结果
    pub fn get(&self) -> DatastoreResult<&V> {
        if let Some(value) = self.value.get() {
            return Ok(value);
        }
        let Some(pending) = &self.pending else {
            return Err(DatastoreError::mapping(
                "lazy value has neither a value nor a resolver",
            ));
        };
        trace!(keys = ?pending.keys, "resolving lazy reference");
        let resolved = (pending.resolver)()?;
        Ok(self.value.get_or_init(|| resolved))
    }

    pub fn get_mut(&mut self) -> DatastoreResult<&mut V> {
        self.get()?;
        self.pending = None;
        self.value
            .get_mut()
            .ok_or_else(|| DatastoreError::mapping("lazy value was not resolved"))
    }

    /// 直接替换为已解析的值，丢弃原有键
    pub fn set(&mut self, value: V) {
        self.value = OnceLock::from(value);
        self.pending = None;
    }
}

impl<T: Persistent> Lazy<Option<EntityRef<T>>> {
    pub fn target(&self) -> DatastoreResult<Option<EntityRef<T>>> {
        self.get().map(Clone::clone)
    }
}

impl<T: Persistent> Lazy<Vec<EntityRef<T>>> {
    pub fn items(&self) -> DatastoreResult<&[EntityRef<T>]> {
        self.get().map(Vec::as_slice)
    }

    pub fn push(&mut self, item: EntityRef<T>) -> DatastoreResult<()> {
        self.get_mut()?.push(item);
        Ok(())
    }
}

impl<V: Default> Default for Lazy<V> {
    fn default() -> Self {
        Self::resolved(V::default())
    }
}

impl<V> From<V> for Lazy<V> {
    fn from(value: V) -> Self {
        Self::resolved(value)
    }
}

impl<V: fmt::Debug> fmt::Debug for Lazy<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.value.get(), &self.pending) {
            (Some(value), _) => f.debug_tuple("Lazy").field(value).finish(),
            (None, Some(pending)) => f
                .debug_struct("Lazy")
                .field("unresolved", &pending.keys)
                .finish(),
            (None, None) => f.write_str("Lazy(<empty>)"),
        }
    }
}

impl<V> RelationField for Lazy<V>
where
    V: RelationField + Default,
{
    type Target = V::Target;

    const CARDINALITY: crate::mapping::Cardinality = V::CARDINALITY;

    const LAZY: bool = true;

    fn relation_value(&self) -> RelationValue {
        match (self.value.get(), &self.pending) {
            (Some(value), _) => value.relation_value(),
            (None, Some(pending)) => RelationValue::Unresolved(pending.keys.clone()),
            (None, None) => RelationValue::Absent,
        }
    }

    fn from_hydrated(value: Hydrated) -> DatastoreResult<Self> {
        match value {
            Hydrated::Lazy(handle) => handle
                .downcast::<Self>()
                .map(|handle| *handle)
                .map_err(|_| DatastoreError::type_mismatch::<Self>("a lazy handle of another type")),
            eager => V::from_hydrated(eager).map(Lazy::resolved),
        }
    }

    fn lazy(
        template: DatastoreTemplate,
        stored: Option<Value>,
    ) -> DatastoreResult<Box<dyn Any + Send + Sync>> {
        let Some(keys) = stored.filter(|value| !value.is_null()) else {
            return Ok(Box::new(Self::default()));
        };
        let targets = keys.keys();
        let resolver = move || {
            let objects = template.load_references::<V::Target>(&targets)?;
            V::from_hydrated(Hydrated::from_objects(V::CARDINALITY, objects))
        };
        Ok(Box::new(Self::unresolved(keys, resolver)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::Key;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn resolves_once_and_memoizes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let lazy: Lazy<Vec<i32>> = Lazy::unresolved(Value::from(Key::new("k", 1)), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(vec![1, 2])
        });

        assert!(!lazy.is_resolved());
        assert!(lazy.stored_keys().is_some());
        assert_eq!(lazy.get().unwrap(), &vec![1, 2]);
        assert_eq!(lazy.get().unwrap(), &vec![1, 2]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(lazy.is_resolved());
        assert!(lazy.stored_keys().is_none());
    }

    #[test]
    fn failed_resolution_is_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let lazy: Lazy<Vec<i32>> = Lazy::unresolved(Value::Null, move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(DatastoreError::store("unavailable"))
            } else {
                Ok(vec![7])
            }
        });

        assert!(lazy.get().is_err());
        assert_eq!(lazy.get().unwrap(), &vec![7]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn set_discards_stored_keys() {
        let mut lazy: Lazy<Vec<i32>> =
            Lazy::unresolved(Value::from(Key::new("k", 1)), || Ok(vec![1]));
        lazy.set(vec![3]);
        assert!(lazy.is_resolved());
        assert!(lazy.stored_keys().is_none());
        assert_eq!(lazy.get().unwrap(), &vec![3]);
    }

    #[test]
    fn default_is_resolved_empty() {
        let lazy: Lazy<Vec<i32>> = Lazy::default();
        assert!(lazy.is_resolved());
        assert!(lazy.get().unwrap().is_empty());
        assert_eq!(format!("{lazy:?}"), "Lazy([])");
    }
}
