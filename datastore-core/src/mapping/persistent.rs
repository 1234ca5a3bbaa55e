//! 可持久化领域对象协议
//!
//! - `Persistent`：类型级协议，提供实体描述、id 读写与关联字段的读写入口；
//! - `PersistentObject`：对象安全的擦除视图，供转换器与键工厂在运行期使用；
//! - `EntityId`：id 字段类型（`Option<Key>` / `Option<String>` / `Option<i64>`）。
//!
use super::descriptor::EntityDescriptor;
use super::relation::{Hydrated, RelationValue};
use crate::error::{DatastoreError, DatastoreResult};
use crate::key::{Key, KeyId};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::any::Any;

/// 对象上携带的 id
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdValue {
    Key(Key),
    Name(String),
    Id(i64),
}

impl From<Key> for IdValue {
    fn from(value: Key) -> Self {
        IdValue::Key(value)
    }
}

impl From<&Key> for IdValue {
    fn from(value: &Key) -> Self {
        IdValue::Key(value.clone())
    }
}

impl From<String> for IdValue {
    fn from(value: String) -> Self {
        IdValue::Name(value)
    }
}

impl From<&str> for IdValue {
    fn from(value: &str) -> Self {
        IdValue::Name(value.to_string())
    }
}

impl From<i64> for IdValue {
    fn from(value: i64) -> Self {
        IdValue::Id(value)
    }
}

/// id 属性的声明类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    Key,
    Name,
    Id,
}

pub trait EntityId: Sized {
    const KIND: IdKind;

    fn id_value(&self) -> Option<IdValue>;

    fn from_key(key: &Key) -> DatastoreResult<Self>;
}

impl EntityId for Option<Key> {
    const KIND: IdKind = IdKind::Key;

    fn id_value(&self) -> Option<IdValue> {
        self.clone().map(IdValue::Key)
    }

    fn from_key(key: &Key) -> DatastoreResult<Self> {
        Ok(Some(key.clone()))
    }
}

impl EntityId for Option<String> {
    const KIND: IdKind = IdKind::Name;

    fn id_value(&self) -> Option<IdValue> {
        self.clone().map(IdValue::Name)
    }

    fn from_key(key: &Key) -> DatastoreResult<Self> {
        match key.id_or_name() {
            KeyId::Name(name) => Ok(Some(name.clone())),
            KeyId::Id(id) => Err(DatastoreError::type_mismatch::<String>(format!(
                "numeric key id {id}"
            ))),
        }
    }
}

impl EntityId for Option<i64> {
    const KIND: IdKind = IdKind::Id;

    fn id_value(&self) -> Option<IdValue> {
        self.map(IdValue::Id)
    }

    fn from_key(key: &Key) -> DatastoreResult<Self> {
        match key.id_or_name() {
            KeyId::Id(id) => Ok(Some(*id)),
            KeyId::Name(name) => Err(DatastoreError::type_mismatch::<i64>(format!(
                "key name {name:?}"
            ))),
        }
    }
}

/// 可持久化领域对象
///
/// 通常由 `#[entity]` 宏生成；关联字段不参与 serde 序列化，
/// 由模板经 `relation_value` / `hydrate` 读写。
pub trait Persistent: Serialize + DeserializeOwned + Send + Sync + 'static {
    fn describe() -> EntityDescriptor;

    fn id_value(&self) -> Option<IdValue>;

    /// 将键写回 id 字段（分配后或读取时）
    fn assign_key(&mut self, key: &Key) -> DatastoreResult<()>;

    fn relation_value(&self, _field: &str) -> RelationValue {
        RelationValue::Absent
    }

    fn hydrate(&mut self, field: &str, _value: Hydrated) -> DatastoreResult<()> {
        Err(DatastoreError::unknown_relation::<Self>(field))
    }
}

/// 对象安全的擦除视图
pub trait PersistentObject: Send + Sync {
    /// serde 层面的文档表示（关联字段与 id 已被跳过）
    fn document(&self) -> DatastoreResult<serde_json::Value>;

    fn object_id(&self) -> Option<IdValue>;

    fn apply_key(&mut self, key: &Key) -> DatastoreResult<()>;

    fn type_name(&self) -> &'static str;

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync>;
}

impl<T: Persistent> PersistentObject for T {
    fn document(&self) -> DatastoreResult<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    fn object_id(&self) -> Option<IdValue> {
        Persistent::id_value(self)
    }

    fn apply_key(&mut self, key: &Key) -> DatastoreResult<()> {
        Persistent::assign_key(self, key)
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync> {
        self
    }
}

/// 文档反序列化为具体类型，供描述符在读取时调用
pub(crate) fn decode_document<T: Persistent>(
    document: serde_json::Value,
) -> DatastoreResult<Box<dyn PersistentObject>> {
    let object: T = serde_json::from_value(document)?;
    Ok(Box::new(object))
}
