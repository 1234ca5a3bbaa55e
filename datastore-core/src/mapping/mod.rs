//! 对象映射
//!
//! 描述符、可持久化协议、关联字段与映射上下文。
//!
mod context;
mod descriptor;
mod persistent;
mod relation;

pub use context::MappingContext;
pub use descriptor::{
    Cardinality, Discrimination, EntityDescriptor, IdProperty, PropertyDescriptor,
    RelationDescriptor, RelationKind,
};
pub use persistent::{EntityId, IdKind, IdValue, Persistent, PersistentObject};
pub use relation::{EntityRef, ErasedEntity, Hydrated, ObjectRef, RelationField, RelationValue};
