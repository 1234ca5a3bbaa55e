//! 实体转换器
//!
//! 领域对象 ↔ 属性包 `Entity`。默认实现 `JsonEntityConverter` 以 serde 文档为中介：
//! - 写：对象序列化为 JSON 对象，逐个属性转换为 `Value`，并补写鉴别值；
//! - 读：属性还原为 JSON 文档后反序列化，再把记录键写回 id 字段；
//! - 鉴别：按记录上的鉴别属性在映射上下文中查找具体子类型描述符。
//!
use crate::entity::{Entity, EntityBuilder};
use crate::error::{DatastoreError, DatastoreResult};
use crate::mapping::{EntityDescriptor, MappingContext, PersistentObject};
use crate::value::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

pub trait EntityConverter: Send + Sync {
    /// 写入简单属性；id、关联字段由模板处理
    fn write(
        &self,
        source: &dyn PersistentObject,
        descriptor: &EntityDescriptor,
        sink: &mut EntityBuilder,
    ) -> DatastoreResult<()>;

    /// 以给定描述符还原对象（关联字段保持默认值，由模板随后填充）
    fn read(
        &self,
        descriptor: &EntityDescriptor,
        entity: &Entity,
    ) -> DatastoreResult<Box<dyn PersistentObject>>;

    /// 记录对应的具体描述符；没有鉴别信息时返回 `base`
    fn discriminated_descriptor(
        &self,
        base: &Arc<EntityDescriptor>,
        entity: &Entity,
    ) -> Arc<EntityDescriptor>;

    fn read_as_map(&self, entity: &Entity) -> DatastoreResult<BTreeMap<String, serde_json::Value>>;

    fn convert_on_write(&self, value: serde_json::Value) -> DatastoreResult<Value>;
}

#[derive(Debug, Clone)]
pub struct JsonEntityConverter {
    mapping: Arc<MappingContext>,
}

impl JsonEntityConverter {
    pub fn new(mapping: Arc<MappingContext>) -> Self {
        Self { mapping }
    }

    fn is_relation_property(descriptor: &EntityDescriptor, name: &str) -> bool {
        descriptor
            .relations()
            .iter()
            .any(|r| r.property_name() == name || r.field_name() == name)
    }
}

impl EntityConverter for JsonEntityConverter {
    fn write(
        &self,
        source: &dyn PersistentObject,
        descriptor: &EntityDescriptor,
        sink: &mut EntityBuilder,
    ) -> DatastoreResult<()> {
        let serde_json::Value::Object(fields) = source.document()? else {
            return Err(DatastoreError::data_access(format!(
                "{} does not serialize to a property map",
                source.type_name()
            )));
        };

        for (name, value) in fields {
            if descriptor.is_id_field(&name) || Self::is_relation_property(descriptor, &name) {
                continue;
            }
            sink.set(name, self.convert_on_write(value)?);
        }

        if let Some(discrimination) = descriptor.discrimination() {
            if let Some(value) = discrimination.value() {
                sink.set(discrimination.field(), value);
            }
        }
        Ok(())
    }

    fn read(
        &self,
        descriptor: &EntityDescriptor,
        entity: &Entity,
    ) -> DatastoreResult<Box<dyn PersistentObject>> {
        let mut document = serde_json::Map::new();
        for (name, value) in entity.properties() {
            if Self::is_relation_property(descriptor, name) {
                continue;
            }
            document.insert(name.clone(), value.to_json()?);
        }

        let mut object = descriptor.decode(serde_json::Value::Object(document))?;
        object.apply_key(entity.key())?;
        Ok(object)
    }

    fn discriminated_descriptor(
        &self,
        base: &Arc<EntityDescriptor>,
        entity: &Entity,
    ) -> Arc<EntityDescriptor> {
        let Some(discrimination) = base.discrimination() else {
            return base.clone();
        };
        entity
            .discriminator(discrimination.field())
            .and_then(|value| {
                self.mapping
                    .discriminated(base.kind(), discrimination.field(), value)
            })
            .unwrap_or_else(|| base.clone())
    }

    fn read_as_map(&self, entity: &Entity) -> DatastoreResult<BTreeMap<String, serde_json::Value>> {
        entity
            .properties()
            .iter()
            .map(|(name, value)| Ok((name.clone(), value.to_json()?)))
            .collect()
    }

    fn convert_on_write(&self, value: serde_json::Value) -> DatastoreResult<Value> {
        Value::from_json(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::Key;
    use crate::mapping::{IdKind, IdValue, Persistent};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Shape {
        #[serde(skip)]
        id: Option<String>,
        #[serde(rename = "shape_color")]
        color: String,
        sides: i64,
    }

    impl Persistent for Shape {
        fn describe() -> EntityDescriptor {
            EntityDescriptor::new::<Self>("shape")
                .id_property("id", IdKind::Name)
                .property("color", "shape_color")
                .property("sides", "sides")
                .discriminator("shape_type", Some("polygon"))
        }

        fn id_value(&self) -> Option<IdValue> {
            self.id.clone().map(Into::into)
        }

        fn assign_key(&mut self, key: &Key) -> DatastoreResult<()> {
            self.id = key.name().map(str::to_string);
            Ok(())
        }
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Scalar(i64);

    impl Persistent for Scalar {
        fn describe() -> EntityDescriptor {
            EntityDescriptor::new::<Self>("scalar").id_property("id", IdKind::Id)
        }

        fn id_value(&self) -> Option<IdValue> {
            None
        }

        fn assign_key(&mut self, _key: &Key) -> DatastoreResult<()> {
            Ok(())
        }
    }

    fn converter() -> (Arc<MappingContext>, JsonEntityConverter) {
        let mapping = Arc::new(MappingContext::new());
        (mapping.clone(), JsonEntityConverter::new(mapping))
    }

    #[test]
    fn write_uses_stored_names_and_discriminator() {
        let (mapping, converter) = converter();
        let descriptor = mapping.descriptor::<Shape>().unwrap();
        let shape = Shape {
            id: Some("s1".into()),
            color: "red".into(),
            sides: 3,
        };
        let mut builder = EntityBuilder::new(Key::new("shape", "s1"));
        converter.write(&shape, &descriptor, &mut builder).unwrap();

        let entity = builder.build().unwrap();
        assert_eq!(entity.property("shape_color"), Some(&Value::from("red")));
        assert_eq!(entity.property("sides"), Some(&Value::Integer(3)));
        assert_eq!(entity.property("shape_type"), Some(&Value::from("polygon")));
        assert!(!entity.contains("id"));
    }

    #[test]
    fn read_restores_fields_and_key() {
        let (mapping, converter) = converter();
        let descriptor = mapping.descriptor::<Shape>().unwrap();
        let entity = Entity::new(
            Key::new("shape", "s2"),
            [
                ("shape_color", Value::from("blue")),
                ("sides", Value::Integer(4)),
                ("shape_type", Value::from("polygon")),
            ],
        );
        let object = converter.read(&descriptor, &entity).unwrap();
        let shape = object.into_any().downcast::<Shape>().unwrap();
        assert_eq!(shape.id.as_deref(), Some("s2"));
        assert_eq!(shape.color, "blue");
        assert_eq!(shape.sides, 4);
    }

    #[test]
    fn non_map_document_is_rejected() {
        let (mapping, converter) = converter();
        let descriptor = mapping.descriptor::<Scalar>().unwrap();
        let mut builder = EntityBuilder::new(Key::new("scalar", 1));
        let err = converter
            .write(&Scalar(5), &descriptor, &mut builder)
            .unwrap_err();
        assert!(matches!(err, DatastoreError::DataAccess { .. }));
    }

    #[test]
    fn discriminator_list_uses_first_string() {
        let (mapping, converter) = converter();
        let base = mapping.descriptor::<Shape>().unwrap();
        let entity = Entity::new(
            Key::new("shape", "s3"),
            [(
                "shape_type",
                Value::List(vec![Value::Integer(1), Value::from("polygon")]),
            )],
        );
        let resolved = converter.discriminated_descriptor(&base, &entity);
        assert!(Arc::ptr_eq(&resolved, &base));

        let unknown = Entity::new(Key::new("shape", "s4"), [("shape_type", Value::from("circle"))]);
        let resolved = converter.discriminated_descriptor(&base, &unknown);
        assert!(Arc::ptr_eq(&resolved, &base));
    }

    #[test]
    fn read_as_map_converts_every_property() {
        let (_, converter) = converter();
        let entity = Entity::new(
            Key::new("shape", "s5"),
            [("a", Value::Integer(1)), ("b", Value::from("x"))],
        );
        let map = converter.read_as_map(&entity).unwrap();
        assert_eq!(map["a"], serde_json::json!(1));
        assert_eq!(map["b"], serde_json::json!("x"));
    }
}
