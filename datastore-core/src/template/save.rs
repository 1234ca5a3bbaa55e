//! 保存路径
//!
//! 深度优先遍历对象图：先解析本对象的键，再保存后代（以本键为祖先）与引用，
//! 最后写入简单属性。已访问的对象按句柄同一性跳过，因此环形图可以终止。
//! 所有产生的实体汇总为一个写入列表，子实体在父实体之前。
//!
use super::DatastoreTemplate;
use crate::entity::{Entity, EntityBuilder};
use crate::error::{DatastoreError, DatastoreResult};
use crate::event::{DatastoreEvent, EventObjects};
use crate::key::Key;
use crate::mapping::{
    EntityDescriptor, EntityRef, IdKind, Persistent, PersistentObject, RelationKind, RelationValue,
};
use crate::value::Value;
use std::collections::HashMap;
use tracing::debug;

/// 一次保存调用的遍历状态
#[doc(hidden)]
pub struct SaveSession<'t> {
    template: &'t DatastoreTemplate,
    visited: HashMap<usize, Key>,
    entities: Vec<Entity>,
}

impl<'t> SaveSession<'t> {
    fn new(template: &'t DatastoreTemplate) -> Self {
        Self {
            template,
            visited: HashMap::new(),
            entities: Vec::new(),
        }
    }

    pub(crate) fn save_object<T: Persistent>(
        &mut self,
        handle: &EntityRef<T>,
        ancestor: Option<&Key>,
    ) -> DatastoreResult<Key> {
        if let Some(key) = self.visited.get(&handle.identity()) {
            return Ok(key.clone());
        }

        let descriptor = self.template.descriptor::<T>()?;
        let key = {
            let mut object = handle.write();
            self.resolve_key(&mut *object, &descriptor, ancestor)?
        };
        self.visited.insert(handle.identity(), key.clone());

        let mut builder = EntityBuilder::new(key.clone());
        for relation in descriptor.relations() {
            let value = handle.read().relation_value(relation.field_name());
            match relation.kind() {
                RelationKind::Descendant => {
                    for child in value.into_entities() {
                        child.save_into(self, Some(&key))?;
                    }
                }
                RelationKind::Reference | RelationKind::LazyReference => {
                    if let Some(stored) = self.save_references(value)? {
                        builder.set(relation.property_name(), stored);
                    }
                }
            }
        }

        self.template
            .converter
            .write(&*handle.read(), &descriptor, &mut builder)?;
        self.entities.push(builder.build()?);
        Ok(key)
    }

    fn resolve_key(
        &self,
        object: &mut dyn PersistentObject,
        descriptor: &EntityDescriptor,
        ancestor: Option<&Key>,
    ) -> DatastoreResult<Key> {
        let factory = &self.template.key_factory;
        let Some(ancestor) = ancestor else {
            return match factory.key_from_object(object, descriptor) {
                Some(key) => Ok(key),
                None => factory.allocate_key_for_object(object, descriptor, None),
            };
        };

        if descriptor.id_kind() != Some(IdKind::Key) {
            return Err(DatastoreError::data_access(
                "Only Key types are allowed for descendants id",
            ));
        }
        match factory.key_from_object(object, descriptor) {
            None => factory.allocate_key_for_object(object, descriptor, Some(ancestor)),
            Some(key) if key.has_ancestor(ancestor) => Ok(key),
            Some(_) => Err(DatastoreError::data_access(
                "Descendant object has a key without current ancestor",
            )),
        }
    }

    /// 保存引用目标并返回应写在父实体上的键值；没有目标时不写属性
    fn save_references(&mut self, value: RelationValue) -> DatastoreResult<Option<Value>> {
        match value {
            RelationValue::Absent => Ok(None),
            RelationValue::Unresolved(stored) => Ok(Some(stored)),
            RelationValue::One(target) => Ok(Some(Value::Key(target.save_into(self, None)?))),
            RelationValue::Many(targets) => {
                let mut keys = Vec::with_capacity(targets.len());
                for target in targets {
                    keys.push(Value::Key(target.save_into(self, None)?));
                }
                Ok((!keys.is_empty()).then_some(Value::List(keys)))
            }
        }
    }
}

impl DatastoreTemplate {
    /// 保存对象图；`ancestor` 给定时对象的键必须位于该祖先之下
    pub fn save<T: Persistent>(
        &self,
        entity: &EntityRef<T>,
        ancestor: Option<&Key>,
    ) -> DatastoreResult<EntityRef<T>> {
        self.write_limit()?;
        let mut session = SaveSession::new(self);
        session.save_object(entity, ancestor)?;
        self.write_entities(
            session.entities,
            EventObjects::of(std::slice::from_ref(entity)),
        )?;
        Ok(entity.clone())
    }

    pub fn save_all<T: Persistent>(
        &self,
        entities: &[EntityRef<T>],
    ) -> DatastoreResult<Vec<EntityRef<T>>> {
        self.write_limit()?;
        let mut session = SaveSession::new(self);
        for entity in entities {
            session.save_object(entity, None)?;
        }
        self.write_entities(session.entities, EventObjects::of(entities))?;
        Ok(entities.to_vec())
    }

    fn write_entities(&self, entities: Vec<Entity>, objects: EventObjects) -> DatastoreResult<()> {
        self.publish_with(|| DatastoreEvent::BeforeSave {
            objects: objects.clone(),
        });
        self.put_chunked(&entities)?;
        self.publish_with(|| DatastoreEvent::AfterSave { entities, objects });
        Ok(())
    }

    fn put_chunked(&self, entities: &[Entity]) -> DatastoreResult<()> {
        if entities.is_empty() {
            return Ok(());
        }
        let chunk_size = self.write_limit()?.unwrap_or(entities.len());
        let writer = self.reader_writer();
        for chunk in entities.chunks(chunk_size) {
            debug!(entities = chunk.len(), total = entities.len(), "put");
            writer.put(chunk)?;
        }
        Ok(())
    }
}
