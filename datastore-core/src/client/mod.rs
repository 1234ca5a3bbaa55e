//! 存储客户端协议
//!
//! 模板只依赖以下最小读写能力，传输、鉴权、重试均由具体实现负责：
//! - `DatastoreReaderWriter`：fetch/put/delete/run，事务内外通用；
//! - `DatastoreClient`：额外提供键分配与事务执行；
//! - `ClientProvider`：每次模板操作重新解析的客户端来源（可轮询多个区域/命名空间）。
//!
pub mod in_memory;

pub use in_memory::InMemoryDatastore;

use crate::entity::Entity;
use crate::error::DatastoreResult as Result;
use crate::key::{IncompleteKey, Key};
use crate::query::{Cursor, Query};
use std::sync::Arc;

pub trait DatastoreReaderWriter: Send + Sync {
    /// 结果与 `keys` 一一对应，缺失的键为 `None`
    fn fetch(&self, keys: &[Key]) -> Result<Vec<Option<Entity>>>;

    fn put(&self, entities: &[Entity]) -> Result<()>;

    fn delete(&self, keys: &[Key]) -> Result<()>;

    fn run(&self, query: &Query) -> Result<QueryResults>;
}

pub trait DatastoreClient: DatastoreReaderWriter {
    fn allocate_id(&self, key: &IncompleteKey) -> Result<Key>;

    /// 在原子事务中执行 `work`；`work` 返回错误时回滚，否则提交
    fn run_in_transaction(
        &self,
        work: &mut dyn FnMut(Arc<dyn DatastoreReaderWriter>) -> Result<()>,
    ) -> Result<()>;
}

impl<T> DatastoreReaderWriter for Arc<T>
where
    T: DatastoreReaderWriter + ?Sized,
{
    fn fetch(&self, keys: &[Key]) -> Result<Vec<Option<Entity>>> {
        (**self).fetch(keys)
    }

    fn put(&self, entities: &[Entity]) -> Result<()> {
        (**self).put(entities)
    }

    fn delete(&self, keys: &[Key]) -> Result<()> {
        (**self).delete(keys)
    }

    fn run(&self, query: &Query) -> Result<QueryResults> {
        (**self).run(query)
    }
}

impl<T> DatastoreClient for Arc<T>
where
    T: DatastoreClient + ?Sized,
{
    fn allocate_id(&self, key: &IncompleteKey) -> Result<Key> {
        (**self).allocate_id(key)
    }

    fn run_in_transaction(
        &self,
        work: &mut dyn FnMut(Arc<dyn DatastoreReaderWriter>) -> Result<()>,
    ) -> Result<()> {
        (**self).run_in_transaction(work)
    }
}

/// 客户端来源：每次调用返回当前应使用的客户端
pub type ClientProvider = Arc<dyn Fn() -> Arc<dyn DatastoreClient> + Send + Sync>;

/// 固定返回同一个客户端的来源
pub fn single_client(client: Arc<dyn DatastoreClient>) -> ClientProvider {
    Arc::new(move || client.clone())
}

/// 查询结果行
#[derive(Debug, Clone, PartialEq)]
pub enum QueryRow {
    Entity(Entity),
    Key(Key),
}

impl QueryRow {
    pub fn key(&self) -> &Key {
        match self {
            QueryRow::Entity(entity) => entity.key(),
            QueryRow::Key(key) => key,
        }
    }

    pub fn into_key(self) -> Key {
        match self {
            QueryRow::Entity(entity) => entity.key().clone(),
            QueryRow::Key(key) => key,
        }
    }

    pub fn into_entity(self) -> Option<Entity> {
        match self {
            QueryRow::Entity(entity) => Some(entity),
            QueryRow::Key(_) => None,
        }
    }
}

/// 一次查询执行的结果：按序迭代，附带结束游标
#[derive(Debug)]
pub struct QueryResults {
    rows: std::vec::IntoIter<QueryRow>,
    cursor_after: Option<Cursor>,
}

impl QueryResults {
    pub fn new(rows: Vec<QueryRow>, cursor_after: Option<Cursor>) -> Self {
        Self {
            rows: rows.into_iter(),
            cursor_after,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), None)
    }

    pub fn has_next(&self) -> bool {
        !self.rows.as_slice().is_empty()
    }

    /// 最后一行之后的位置
    pub fn cursor_after(&self) -> Option<&Cursor> {
        self.cursor_after.as_ref()
    }
}

impl Iterator for QueryResults {
    type Item = QueryRow;

    fn next(&mut self) -> Option<Self::Item> {
        self.rows.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}
