//! 内存版存储客户端（InMemoryDatastore）
//!
//! 基于 `RwLock<BTreeMap<Key, Entity>>` 的完整 `DatastoreClient` 实现：
//! - kind / 命名空间范围、等值与比较过滤（列表属性按包含匹配）、`HAS_ANCESTOR`；
//! - 排序、offset、limit 与位置游标；
//! - 顺序递增的 id 分配；
//! - 缓冲式事务：回调成功后一次性提交，失败则丢弃。
//!
//! 典型用途：测试环境、示例与本地开发。GQL 文本查询不受支持。
use super::{DatastoreClient, DatastoreReaderWriter, QueryResults, QueryRow};
use crate::entity::Entity;
use crate::error::{DatastoreError, DatastoreResult as Result};
use crate::key::{IncompleteKey, Key};
use crate::query::{
    Cursor, Direction, Filter, KEY_PROPERTY, Operator, OrderBy, PropertyFilter, Query, ResultType,
    StructuredQuery,
};
use crate::value::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::trace;

/// 内存存储，克隆后共享同一份数据
#[derive(Clone, Default)]
pub struct InMemoryDatastore {
    entities: Arc<RwLock<BTreeMap<Key, Entity>>>,
    last_id: Arc<AtomicI64>,
    transaction_lock: Arc<Mutex<()>>,
}

impl InMemoryDatastore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn get(&self, key: &Key) -> Option<Entity> {
        self.read().get(key).cloned()
    }

    /// 当前全部键（按键排序）
    pub fn keys(&self) -> Vec<Key> {
        self.read().keys().cloned().collect()
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<Key, Entity>> {
        self.entities.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<Key, Entity>> {
        self.entities.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn run_structured(&self, query: &StructuredQuery) -> Result<QueryResults> {
        let start = match query.start_cursor() {
            Some(cursor) => decode_cursor(cursor)?,
            None => 0,
        };

        let entities = self.read();
        let mut matched: Vec<&Entity> = entities
            .values()
            .filter(|e| in_scope(e, query))
            .filter(|e| query.filter().is_none_or(|f| matches(f, e)))
            .collect();
        if !query.order_by().is_empty() {
            matched.sort_by(|a, b| compare_entities(a, b, query.order_by()));
        }

        let skip = start.saturating_add(query.offset()).min(matched.len());
        let rows: Vec<QueryRow> = matched
            .into_iter()
            .skip(skip)
            .take(query.limit().unwrap_or(usize::MAX))
            .map(|e| match query.result_type() {
                ResultType::Entity => QueryRow::Entity(e.clone()),
                ResultType::Key => QueryRow::Key(e.key().clone()),
            })
            .collect();

        let end = skip + rows.len();
        trace!(kind = ?query.kind(), rows = rows.len(), end, "in-memory query");
        Ok(QueryResults::new(rows, Some(encode_cursor(end))))
    }

    fn apply(&self, pending: BTreeMap<Key, Option<Entity>>) {
        let mut entities = self.write();
        for (key, entry) in pending {
            match entry {
                Some(entity) => {
                    entities.insert(key, entity);
                }
                None => {
                    entities.remove(&key);
                }
            }
        }
    }
}

impl DatastoreReaderWriter for InMemoryDatastore {
    fn fetch(&self, keys: &[Key]) -> Result<Vec<Option<Entity>>> {
        let entities = self.read();
        Ok(keys.iter().map(|k| entities.get(k).cloned()).collect())
    }

    fn put(&self, entities: &[Entity]) -> Result<()> {
        let mut stored = self.write();
        for entity in entities {
            stored.insert(entity.key().clone(), entity.clone());
        }
        Ok(())
    }

    fn delete(&self, keys: &[Key]) -> Result<()> {
        let mut stored = self.write();
        for key in keys {
            stored.remove(key);
        }
        Ok(())
    }

    fn run(&self, query: &Query) -> Result<QueryResults> {
        match query {
            Query::Structured(q) => self.run_structured(q),
            Query::Gql(_) => Err(DatastoreError::store(
                "GQL queries are not supported by the in-memory datastore",
            )),
        }
    }
}

impl DatastoreClient for InMemoryDatastore {
    fn allocate_id(&self, key: &IncompleteKey) -> Result<Key> {
        let id = self.last_id.fetch_add(1, AtomicOrdering::SeqCst) + 1;
        Ok(key.clone().complete(id))
    }

    fn run_in_transaction(
        &self,
        work: &mut dyn FnMut(Arc<dyn DatastoreReaderWriter>) -> Result<()>,
    ) -> Result<()> {
        let _guard = self
            .transaction_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let transaction = Arc::new(InMemoryTransaction {
            store: self.clone(),
            pending: Mutex::new(BTreeMap::new()),
        });
        work(transaction.clone())?;

        let pending = std::mem::take(&mut *transaction.pending());
        trace!(writes = pending.len(), "in-memory transaction committed");
        self.apply(pending);
        Ok(())
    }
}

/// 事务内的读写视图：写入先缓冲，读取优先看到本事务的写入
struct InMemoryTransaction {
    store: InMemoryDatastore,
    pending: Mutex<BTreeMap<Key, Option<Entity>>>,
}

impl InMemoryTransaction {
    fn pending(&self) -> std::sync::MutexGuard<'_, BTreeMap<Key, Option<Entity>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DatastoreReaderWriter for InMemoryTransaction {
    fn fetch(&self, keys: &[Key]) -> Result<Vec<Option<Entity>>> {
        let pending = self.pending();
        Ok(keys
            .iter()
            .map(|k| match pending.get(k) {
                Some(entry) => entry.clone(),
                None => self.store.get(k),
            })
            .collect())
    }

    fn put(&self, entities: &[Entity]) -> Result<()> {
        let mut pending = self.pending();
        for entity in entities {
            pending.insert(entity.key().clone(), Some(entity.clone()));
        }
        Ok(())
    }

    fn delete(&self, keys: &[Key]) -> Result<()> {
        let mut pending = self.pending();
        for key in keys {
            pending.insert(key.clone(), None);
        }
        Ok(())
    }

    fn run(&self, query: &Query) -> Result<QueryResults> {
        self.store.run(query)
    }
}

fn encode_cursor(position: usize) -> Cursor {
    Cursor::from_bytes((position as u64).to_be_bytes())
}

fn decode_cursor(cursor: &Cursor) -> Result<usize> {
    let bytes: [u8; 8] = cursor
        .as_bytes()
        .try_into()
        .map_err(|_| DatastoreError::store("malformed in-memory cursor"))?;
    usize::try_from(u64::from_be_bytes(bytes))
        .map_err(|_| DatastoreError::store("in-memory cursor out of range"))
}

fn in_scope(entity: &Entity, query: &StructuredQuery) -> bool {
    let key = entity.key();
    query.kind().is_none_or(|kind| key.kind() == kind)
        && query
            .namespace()
            .is_none_or(|ns| key.namespace() == Some(ns))
}

fn property_value(entity: &Entity, name: &str) -> Option<Value> {
    if name == KEY_PROPERTY {
        return Some(Value::Key(entity.key().clone()));
    }
    entity.property(name).cloned()
}

fn matches(filter: &Filter, entity: &Entity) -> bool {
    match filter {
        Filter::And(filters) => filters.iter().all(|f| matches(f, entity)),
        Filter::Property(pf) => matches_property(pf, entity),
    }
}

fn matches_property(filter: &PropertyFilter, entity: &Entity) -> bool {
    if filter.operator() == Operator::HasAncestor {
        let key = entity.key();
        return filter
            .value()
            .as_key()
            .is_some_and(|ancestor| key == ancestor || key.has_ancestor(ancestor));
    }

    let Some(actual) = property_value(entity, filter.property()) else {
        return false;
    };
    match (&actual, filter.value()) {
        (Value::List(_), Value::List(_)) => satisfies(filter.operator(), &actual, filter.value()),
        (Value::List(items), expected) => items
            .iter()
            .any(|item| satisfies(filter.operator(), item, expected)),
        (actual, expected) => satisfies(filter.operator(), actual, expected),
    }
}

fn satisfies(operator: Operator, actual: &Value, expected: &Value) -> bool {
    if operator == Operator::Equal {
        return actual == expected;
    }
    let Some(ordering) = actual.compare(expected) else {
        return false;
    };
    match operator {
        Operator::LessThan => ordering.is_lt(),
        Operator::LessThanOrEqual => ordering.is_le(),
        Operator::GreaterThan => ordering.is_gt(),
        Operator::GreaterThanOrEqual => ordering.is_ge(),
        Operator::Equal | Operator::HasAncestor => false,
    }
}

fn compare_entities(a: &Entity, b: &Entity, order_by: &[OrderBy]) -> Ordering {
    for order in order_by {
        let left = property_value(a, order.property()).unwrap_or(Value::Null);
        let right = property_value(b, order.property()).unwrap_or(Value::Null);
        let ordering = match (&left, &right) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            _ => left.compare(&right).unwrap_or(Ordering::Equal),
        };
        let ordering = match order.direction() {
            Direction::Ascending => ordering,
            Direction::Descending => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}
