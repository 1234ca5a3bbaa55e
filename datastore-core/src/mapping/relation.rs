//! 关联字段与共享实体句柄
//!
//! 图中的边持有 `EntityRef<T>`（`Arc<RwLock<T>>`），
//! 因此环与共享引用在保存/读取之后仍保持对象同一性。
//!
use super::descriptor::{Cardinality, RelationDescriptor, RelationKind};
use super::persistent::Persistent;
use crate::error::{DatastoreError, DatastoreResult};
use crate::key::Key;
use crate::template::DatastoreTemplate;
use crate::template::save::SaveSession;
use crate::value::Value;
use std::any::Any;
use std::collections::{LinkedList, VecDeque};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// 类型擦除后的实体句柄，实际内容为某个 `EntityRef<T>`
pub type ObjectRef = Arc<dyn Any + Send + Sync>;

/// 共享实体句柄，按指针判等
pub struct EntityRef<T>(Arc<RwLock<T>>);

impl<T> EntityRef<T> {
    pub fn new(value: T) -> Self {
        Self(Arc::new(RwLock::new(value)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn identity(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl<T: Persistent> EntityRef<T> {
    pub fn erase(&self) -> ObjectRef {
        Arc::new(self.clone())
    }

    pub fn from_object(object: &ObjectRef) -> DatastoreResult<Self> {
        object
            .downcast_ref::<EntityRef<T>>()
            .cloned()
            .ok_or_else(|| DatastoreError::type_mismatch::<T>("a handle of another entity type"))
    }
}

impl<T> Clone for EntityRef<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> PartialEq for EntityRef<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<T> Eq for EntityRef<T> {}

impl<T> From<T> for EntityRef<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

// 图可能有环，只输出类型与地址
impl<T> fmt::Debug for EntityRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EntityRef<{}>({:p})",
            std::any::type_name::<T>(),
            Arc::as_ptr(&self.0)
        )
    }
}

/// 保存时可递归写入的擦除实体
#[doc(hidden)]
pub trait ErasedEntity: Send + Sync {
    fn save_into(
        &self,
        session: &mut SaveSession<'_>,
        ancestor: Option<&Key>,
    ) -> DatastoreResult<Key>;
}

impl<T: Persistent> ErasedEntity for EntityRef<T> {
    fn save_into(
        &self,
        session: &mut SaveSession<'_>,
        ancestor: Option<&Key>,
    ) -> DatastoreResult<Key> {
        session.save_object(self, ancestor)
    }
}

/// 保存时从关联字段读出的值
pub enum RelationValue {
    /// 空值或空集合，不写属性
    Absent,
    One(Box<dyn ErasedEntity>),
    Many(Vec<Box<dyn ErasedEntity>>),
    /// 未解析的延迟引用，原样回写已存储的键
    Unresolved(Value),
}

impl RelationValue {
    pub fn one<T: Persistent>(entity: &EntityRef<T>) -> Self {
        RelationValue::One(Box::new(entity.clone()))
    }

    pub fn many<'a, T: Persistent>(entities: impl IntoIterator<Item = &'a EntityRef<T>>) -> Self {
        RelationValue::Many(
            entities
                .into_iter()
                .map(|e| Box::new(e.clone()) as Box<dyn ErasedEntity>)
                .collect(),
        )
    }

    pub(crate) fn into_entities(self) -> Vec<Box<dyn ErasedEntity>> {
        match self {
            RelationValue::One(entity) => vec![entity],
            RelationValue::Many(entities) => entities,
            RelationValue::Absent | RelationValue::Unresolved(_) => Vec::new(),
        }
    }
}

/// 读取时交给关联字段的值
pub enum Hydrated {
    One(Option<ObjectRef>),
    Many(Vec<ObjectRef>),
    /// 由 `RelationField::lazy` 构造的未解析句柄
    Lazy(Box<dyn Any + Send + Sync>),
}

impl Hydrated {
    pub(crate) fn from_objects(cardinality: Cardinality, objects: Vec<ObjectRef>) -> Self {
        match cardinality {
            Cardinality::One => Hydrated::One(objects.into_iter().next()),
            Cardinality::Many => Hydrated::Many(objects),
        }
    }
}

/// 可作为后代/引用/延迟引用的字段类型
pub trait RelationField: Sized + Send + Sync + 'static {
    type Target: Persistent;

    const CARDINALITY: Cardinality;

    const LAZY: bool = false;

    fn relation_value(&self) -> RelationValue;

    fn from_hydrated(value: Hydrated) -> DatastoreResult<Self>;

    /// 构造绑定到已存储键的未解析句柄；仅延迟字段支持
    fn lazy(
        _template: DatastoreTemplate,
        _stored: Option<Value>,
    ) -> DatastoreResult<Box<dyn Any + Send + Sync>> {
        Err(DatastoreError::mapping(format!(
            "{} is not a lazy field type",
            std::any::type_name::<Self>()
        )))
    }

    fn describe(field: &str, property: &str, kind: RelationKind) -> RelationDescriptor {
        RelationDescriptor::of::<Self>(field, property, kind)
    }
}

fn unexpected_lazy<F>() -> DatastoreError {
    DatastoreError::mapping(format!(
        "{} received an unresolved lazy value",
        std::any::type_name::<F>()
    ))
}

impl<T: Persistent> RelationField for Option<EntityRef<T>> {
    type Target = T;

    const CARDINALITY: Cardinality = Cardinality::One;

    fn relation_value(&self) -> RelationValue {
        match self {
            Some(entity) => RelationValue::one(entity),
            None => RelationValue::Absent,
        }
    }

    fn from_hydrated(value: Hydrated) -> DatastoreResult<Self> {
        match value {
            Hydrated::One(object) => object.as_ref().map(EntityRef::from_object).transpose(),
            Hydrated::Many(objects) => objects.first().map(EntityRef::from_object).transpose(),
            Hydrated::Lazy(_) => Err(unexpected_lazy::<Self>()),
        }
    }
}

macro_rules! collection_relation {
    ($($collection:ident),* $(,)?) => {
        $(
            impl<T: Persistent> RelationField for $collection<EntityRef<T>> {
                type Target = T;

                const CARDINALITY: Cardinality = Cardinality::Many;

                fn relation_value(&self) -> RelationValue {
                    if self.is_empty() {
                        RelationValue::Absent
                    } else {
                        RelationValue::many(self.iter())
                    }
                }

                fn from_hydrated(value: Hydrated) -> DatastoreResult<Self> {
                    match value {
                        Hydrated::Many(objects) => {
                            objects.iter().map(EntityRef::from_object).collect()
                        }
                        Hydrated::One(object) => {
                            object.iter().map(EntityRef::from_object).collect()
                        }
                        Hydrated::Lazy(_) => Err(unexpected_lazy::<Self>()),
                    }
                }
            }
        )*
    };
}

collection_relation!(Vec, VecDeque, LinkedList);
