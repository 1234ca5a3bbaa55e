//! 映射上下文
//!
//! 按 `TypeId` 缓存实体描述符，并维护鉴别注册表：
//! `(kind, 鉴别字段)` → 鉴别值 → 描述符。注册表在类型首次使用
//! （或启动期 `register`）时一次性填充，读取时据此解析具体子类型。
//!
use super::descriptor::EntityDescriptor;
use super::persistent::Persistent;
use crate::error::{DatastoreError, DatastoreResult};
use dashmap::DashMap;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

type DiscriminationScope = (String, String);

#[derive(Debug, Default)]
pub struct MappingContext {
    descriptors: DashMap<TypeId, Arc<EntityDescriptor>>,
    discriminations: DashMap<DiscriminationScope, HashMap<String, Arc<EntityDescriptor>>>,
}

impl MappingContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取（必要时推导并校验）类型 `T` 的描述符
    pub fn descriptor<T: Persistent>(&self) -> DatastoreResult<Arc<EntityDescriptor>> {
        let type_id = TypeId::of::<T>();
        if let Some(found) = self.descriptors.get(&type_id) {
            return Ok(found.value().clone());
        }

        let descriptor = T::describe();
        if let Err(err) = descriptor.validate() {
            warn!(entity = descriptor.type_name(), %err, "rejected entity descriptor");
            return Err(err);
        }

        let descriptor = Arc::new(descriptor);
        self.register_discrimination(&descriptor)?;
        debug!(
            entity = descriptor.type_name(),
            kind = descriptor.kind(),
            "registered entity descriptor"
        );
        Ok(self
            .descriptors
            .entry(type_id)
            .or_insert(descriptor)
            .value()
            .clone())
    }

    /// 启动期预注册，提前暴露描述符错误与鉴别值冲突
    pub fn register<T: Persistent>(&self) -> DatastoreResult<()> {
        self.descriptor::<T>().map(|_| ())
    }

    /// 按鉴别值查找已注册的子类型描述符
    pub fn discriminated(
        &self,
        kind: &str,
        field: &str,
        value: &str,
    ) -> Option<Arc<EntityDescriptor>> {
        self.discriminations
            .get(&(kind.to_string(), field.to_string()))
            .and_then(|siblings| siblings.get(value).cloned())
    }

    fn register_discrimination(&self, descriptor: &Arc<EntityDescriptor>) -> DatastoreResult<()> {
        let Some(discrimination) = descriptor.discrimination() else {
            return Ok(());
        };
        let Some(value) = discrimination.value() else {
            return Ok(());
        };

        let scope = (
            descriptor.kind().to_string(),
            discrimination.field().to_string(),
        );
        let mut siblings = self.discriminations.entry(scope).or_default();
        if let Some(existing) = siblings.get(value) {
            if existing.type_id() == descriptor.type_id() {
                return Ok(());
            }
            let err = DatastoreError::mapping(format!(
                "discriminator value {value:?} of {} is already used by {} in kind {}",
                descriptor.type_name(),
                existing.type_name(),
                descriptor.kind()
            ));
            warn!(entity = descriptor.type_name(), %err, "rejected entity descriptor");
            return Err(err);
        }
        siblings.insert(value.to_string(), descriptor.clone());
        Ok(())
    }
}
