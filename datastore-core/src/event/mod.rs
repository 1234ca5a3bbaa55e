//! 生命周期事件
//!
//! 模板在保存、删除、按键查找与查询前后发布事件。未配置发布器时不产生任何开销。
//!
#[cfg(feature = "eventing")]
mod broadcast;

#[cfg(feature = "eventing")]
pub use broadcast::BroadcastEventPublisher;

use crate::entity::Entity;
use crate::key::Key;
use crate::mapping::{EntityRef, IdValue, ObjectRef, Persistent};
use crate::query::Query;
use std::any::TypeId;
use std::sync::Arc;

/// 事件中携带的对象句柄（擦除类型），按需还原为 `EntityRef<T>`
#[derive(Debug, Clone, Default)]
pub struct EventObjects(Vec<ObjectRef>);

impl EventObjects {
    pub fn new(objects: Vec<ObjectRef>) -> Self {
        Self(objects)
    }

    pub fn of<T: Persistent>(entities: &[EntityRef<T>]) -> Self {
        Self(entities.iter().map(EntityRef::erase).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn raw(&self) -> &[ObjectRef] {
        &self.0
    }

    /// 还原为具体类型的句柄；类型不符的对象被跳过
    pub fn downcast<T: Persistent>(&self) -> Vec<EntityRef<T>> {
        self.0
            .iter()
            .filter_map(|object| EntityRef::from_object(object).ok())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityType {
    pub id: TypeId,
    pub name: &'static str,
}

impl EntityType {
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }
}

/// 删除事件负载
///
/// 按 id 删除时携带类型与 id；按对象删除时携带对象，不带类型。
#[derive(Debug, Clone)]
pub struct DeleteEvent {
    pub keys: Vec<Key>,
    pub entity_type: Option<EntityType>,
    pub ids: Option<Vec<IdValue>>,
    pub objects: Option<EventObjects>,
}

#[derive(Debug, Clone)]
pub enum DatastoreEvent {
    BeforeSave {
        objects: EventObjects,
    },
    AfterSave {
        entities: Vec<Entity>,
        objects: EventObjects,
    },
    BeforeDelete(DeleteEvent),
    AfterDelete(DeleteEvent),
    AfterFindByKey {
        objects: EventObjects,
        keys: Vec<Key>,
    },
    AfterQuery {
        objects: EventObjects,
        query: Query,
    },
}

impl DatastoreEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DatastoreEvent::BeforeSave { .. } => "BeforeSave",
            DatastoreEvent::AfterSave { .. } => "AfterSave",
            DatastoreEvent::BeforeDelete(_) => "BeforeDelete",
            DatastoreEvent::AfterDelete(_) => "AfterDelete",
            DatastoreEvent::AfterFindByKey { .. } => "AfterFindByKey",
            DatastoreEvent::AfterQuery { .. } => "AfterQuery",
        }
    }
}

/// 事件发布器
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: &DatastoreEvent);
}

impl<T> EventPublisher for Arc<T>
where
    T: EventPublisher + ?Sized,
{
    fn publish(&self, event: &DatastoreEvent) {
        (**self).publish(event)
    }
}
