//! 实体描述符
//!
//! 每个领域类型一份：id 属性、简单字段（字段名 → 存储属性名）、
//! 后代/引用/延迟引用字段，以及可选的鉴别字段与本类型鉴别值。
//!
use super::persistent::{IdKind, Persistent, PersistentObject, decode_document};
use super::relation::{ObjectRef, RelationField};
use crate::error::{DatastoreError, DatastoreResult};
use crate::key::Key;
use crate::query::KEY_PROPERTY;
use crate::template::DatastoreTemplate;
use crate::template::read::{self, ReadSession};
use crate::value::Value;
use std::any::{Any, TypeId};
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// 以父键为祖先单独存储的子实体
    Descendant,
    /// 存储为键，读取时立即解析
    Reference,
    /// 存储为键，首次访问时解析
    LazyReference,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    One,
    Many,
}

type ReferenceLoader = fn(&mut ReadSession<'_>, &[Key]) -> DatastoreResult<Vec<ObjectRef>>;
type DescendantLoader = fn(&mut ReadSession<'_>, &Key) -> DatastoreResult<Vec<ObjectRef>>;
type LazyFactory =
    fn(DatastoreTemplate, Option<Value>) -> DatastoreResult<Box<dyn Any + Send + Sync>>;
type Decoder = fn(serde_json::Value) -> DatastoreResult<Box<dyn PersistentObject>>;

#[derive(Clone)]
pub struct RelationDescriptor {
    field_name: String,
    property_name: String,
    kind: RelationKind,
    cardinality: Cardinality,
    lazy_field: bool,
    target_type: TypeId,
    target_name: &'static str,
    load_references: ReferenceLoader,
    load_descendants: DescendantLoader,
    make_lazy: LazyFactory,
}

impl RelationDescriptor {
    /// 由字段类型推导目标类型、基数与加载入口
    pub fn of<F: RelationField>(field: &str, property: &str, kind: RelationKind) -> Self {
        Self {
            field_name: field.to_string(),
            property_name: property.to_string(),
            kind,
            cardinality: F::CARDINALITY,
            lazy_field: F::LAZY,
            target_type: TypeId::of::<F::Target>(),
            target_name: std::any::type_name::<F::Target>(),
            load_references: read::load_references::<F::Target>,
            load_descendants: read::load_descendants::<F::Target>,
            make_lazy: F::lazy,
        }
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    pub fn property_name(&self) -> &str {
        &self.property_name
    }

    pub fn kind(&self) -> RelationKind {
        self.kind
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    pub fn target_type(&self) -> TypeId {
        self.target_type
    }

    pub fn target_name(&self) -> &'static str {
        self.target_name
    }

    pub(crate) fn load_references(
        &self,
        session: &mut ReadSession<'_>,
        keys: &[Key],
    ) -> DatastoreResult<Vec<ObjectRef>> {
        (self.load_references)(session, keys)
    }

    pub(crate) fn load_descendants(
        &self,
        session: &mut ReadSession<'_>,
        parent: &Key,
    ) -> DatastoreResult<Vec<ObjectRef>> {
        (self.load_descendants)(session, parent)
    }

    pub(crate) fn make_lazy(
        &self,
        template: DatastoreTemplate,
        stored: Option<Value>,
    ) -> DatastoreResult<Box<dyn Any + Send + Sync>> {
        (self.make_lazy)(template, stored)
    }
}

impl fmt::Debug for RelationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationDescriptor")
            .field("field_name", &self.field_name)
            .field("property_name", &self.property_name)
            .field("kind", &self.kind)
            .field("cardinality", &self.cardinality)
            .field("target", &self.target_name)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDescriptor {
    field_name: String,
    property_name: String,
}

impl PropertyDescriptor {
    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    pub fn property_name(&self) -> &str {
        &self.property_name
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdProperty {
    field_name: String,
    kind: IdKind,
}

impl IdProperty {
    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    pub fn kind(&self) -> IdKind {
        self.kind
    }
}

/// 鉴别元数据：字段名 + 本类型的鉴别值（基类型可以没有值）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discrimination {
    field: String,
    value: Option<String>,
}

impl Discrimination {
    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}

#[derive(Clone)]
pub struct EntityDescriptor {
    type_id: TypeId,
    type_name: &'static str,
    kind: String,
    ids: Vec<IdProperty>,
    properties: Vec<PropertyDescriptor>,
    relations: Vec<RelationDescriptor>,
    discrimination: Option<Discrimination>,
    decode: Decoder,
}

impl EntityDescriptor {
    pub fn new<T: Persistent>(kind: impl Into<String>) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            kind: kind.into(),
            ids: Vec::new(),
            properties: Vec::new(),
            relations: Vec::new(),
            discrimination: None,
            decode: decode_document::<T>,
        }
    }

    pub fn id_property(mut self, field: impl Into<String>, kind: IdKind) -> Self {
        self.ids.push(IdProperty {
            field_name: field.into(),
            kind,
        });
        self
    }

    pub fn property(mut self, field: impl Into<String>, property: impl Into<String>) -> Self {
        self.properties.push(PropertyDescriptor {
            field_name: field.into(),
            property_name: property.into(),
        });
        self
    }

    pub fn relation(mut self, relation: RelationDescriptor) -> Self {
        self.relations.push(relation);
        self
    }

    pub fn discriminator(mut self, field: impl Into<String>, value: Option<&str>) -> Self {
        self.discrimination = Some(Discrimination {
            field: field.into(),
            value: value.map(str::to_string),
        });
        self
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn id(&self) -> Option<&IdProperty> {
        self.ids.first()
    }

    pub fn id_kind(&self) -> Option<IdKind> {
        self.id().map(IdProperty::kind)
    }

    pub fn is_id_field(&self, name: &str) -> bool {
        self.ids.iter().any(|id| id.field_name == name)
    }

    pub fn properties(&self) -> &[PropertyDescriptor] {
        &self.properties
    }

    pub fn relations(&self) -> &[RelationDescriptor] {
        &self.relations
    }

    pub fn discrimination(&self) -> Option<&Discrimination> {
        self.discrimination.as_ref()
    }

    /// 字段名到存储属性名；id 字段映射为键伪属性
    pub fn property_name_for(&self, field: &str) -> Option<&str> {
        if self.is_id_field(field) {
            return Some(KEY_PROPERTY);
        }
        self.properties
            .iter()
            .find(|p| p.field_name == field)
            .map(|p| p.property_name.as_str())
            .or_else(|| {
                self.relations
                    .iter()
                    .find(|r| r.field_name == field)
                    .map(|r| r.property_name.as_str())
            })
    }

    pub(crate) fn decode(
        &self,
        document: serde_json::Value,
    ) -> DatastoreResult<Box<dyn PersistentObject>> {
        (self.decode)(document)
    }

    pub(crate) fn validate(&self) -> DatastoreResult<()> {
        if self.ids.len() != 1 {
            return Err(DatastoreError::mapping(format!(
                "{} must declare exactly one id property, found {}",
                self.type_name,
                self.ids.len()
            )));
        }

        let mut seen = HashSet::new();
        let fields = self
            .ids
            .iter()
            .map(|i| i.field_name.as_str())
            .chain(self.properties.iter().map(|p| p.field_name.as_str()))
            .chain(self.relations.iter().map(|r| r.field_name.as_str()));
        for field in fields {
            if !seen.insert(field) {
                return Err(DatastoreError::mapping(format!(
                    "{} declares field {field} more than once",
                    self.type_name
                )));
            }
        }

        for relation in &self.relations {
            let lazy_kind = relation.kind == RelationKind::LazyReference;
            if lazy_kind != relation.lazy_field {
                return Err(DatastoreError::mapping(format!(
                    "{}.{}: lazy references require a lazy field type and lazy field types require a lazy reference",
                    self.type_name, relation.field_name
                )));
            }
        }

        Ok(())
    }
}

impl fmt::Debug for EntityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityDescriptor")
            .field("type_name", &self.type_name)
            .field("kind", &self.kind)
            .field("ids", &self.ids)
            .field("properties", &self.properties)
            .field("relations", &self.relations)
            .field("discrimination", &self.discrimination)
            .finish()
    }
}
