//! 原始实体（属性包）
//!
//! 键 + 有序属性映射，由转换器从领域对象生成并交给客户端写入，
//! 或由客户端读取后交给转换器还原为领域对象。
//!
use crate::error::{DatastoreError, DatastoreResult};
use crate::key::Key;
use crate::value::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    key: Key,
    properties: BTreeMap<String, Value>,
}

impl Entity {
    pub fn new<I, K>(key: Key, properties: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self {
            key,
            properties: properties
                .into_iter()
                .map(|(k, v)| (k.into(), v))
                .collect(),
        }
    }

    pub fn builder(key: Key) -> EntityBuilder {
        EntityBuilder::new(key)
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn kind(&self) -> &str {
        self.key.kind()
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    /// 鉴别属性的取值：单个字符串，或列表中的首个字符串
    pub fn discriminator(&self, field: &str) -> Option<&str> {
        match self.property(field)? {
            Value::String(value) => Some(value),
            Value::List(items) => items.iter().find_map(Value::as_str),
            _ => None,
        }
    }

    pub fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }
}

/// 实体构建器
///
/// 保存路径上以已解析的键预置；按例查询时的探针使用无键构建器。
#[derive(Debug, Clone, Default)]
pub struct EntityBuilder {
    key: Option<Key>,
    properties: BTreeMap<String, Value>,
}

impl EntityBuilder {
    pub fn new(key: Key) -> Self {
        Self {
            key: Some(key),
            properties: BTreeMap::new(),
        }
    }

    pub fn detached() -> Self {
        Self::default()
    }

    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// 链式写法
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.properties.remove(name)
    }

    pub fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }

    pub fn into_properties(self) -> BTreeMap<String, Value> {
        self.properties
    }

    pub fn build(self) -> DatastoreResult<Entity> {
        let key = self
            .key
            .ok_or_else(|| DatastoreError::illegal_argument("an entity requires a complete key"))?;
        Ok(Entity {
            key,
            properties: self.properties,
        })
    }
}
