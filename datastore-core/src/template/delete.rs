//! 删除路径：按 id、按对象或按类型删除，各发起一次删除调用（不分批）。
//!
use super::DatastoreTemplate;
use crate::error::DatastoreResult;
use crate::event::{DatastoreEvent, DeleteEvent, EntityType, EventObjects};
use crate::mapping::{EntityRef, IdValue, Persistent};
use tracing::debug;

impl DatastoreTemplate {
    pub fn delete_by_id<T: Persistent>(&self, id: impl Into<IdValue>) -> DatastoreResult<()> {
        self.delete_all_by_id::<T>([id.into()])
    }

    pub fn delete_all_by_id<T: Persistent>(
        &self,
        ids: impl IntoIterator<Item = impl Into<IdValue>>,
    ) -> DatastoreResult<()> {
        let descriptor = self.descriptor::<T>()?;
        let ids: Vec<IdValue> = ids.into_iter().map(Into::into).collect();
        let keys = ids
            .iter()
            .map(|id| self.key_factory.key_from_id(id, descriptor.kind()))
            .collect();
        self.delete_keys(DeleteEvent {
            keys,
            entity_type: Some(EntityType::of::<T>()),
            ids: Some(ids),
            objects: None,
        })
    }

    pub fn delete<T: Persistent>(&self, entity: &EntityRef<T>) -> DatastoreResult<()> {
        self.delete_all_objects(std::slice::from_ref(entity))
    }

    /// 按对象删除；尚无 id 的对象被跳过
    pub fn delete_all_objects<T: Persistent>(
        &self,
        entities: &[EntityRef<T>],
    ) -> DatastoreResult<()> {
        let descriptor = self.descriptor::<T>()?;
        let keys = entities
            .iter()
            .filter_map(|entity| {
                self.key_factory
                    .key_from_object(&*entity.read(), &descriptor)
            })
            .collect();
        self.delete_keys(DeleteEvent {
            keys,
            entity_type: None,
            ids: None,
            objects: Some(EventObjects::of(entities)),
        })
    }

    /// 删除 `T` 的全部实体，返回删除数量
    pub fn delete_all<T: Persistent>(&self) -> DatastoreResult<usize> {
        let keys = self.kind_keys::<T>()?;
        let deleted = keys.len();
        self.delete_keys(DeleteEvent {
            keys,
            entity_type: Some(EntityType::of::<T>()),
            ids: None,
            objects: None,
        })?;
        Ok(deleted)
    }

    fn delete_keys(&self, event: DeleteEvent) -> DatastoreResult<()> {
        self.publish_with(|| DatastoreEvent::BeforeDelete(event.clone()));
        self.reader_writer().delete(&event.keys)?;
        debug!(keys = event.keys.len(), "delete");
        self.publish_with(|| DatastoreEvent::AfterDelete(event));
        Ok(())
    }
}
