//! 键工厂
//!
//! 由 id 值、对象或父键得到存储键；对象没有 id 时向客户端申请分配并写回对象。
//!
use crate::client::ClientProvider;
use crate::error::{DatastoreError, DatastoreResult};
use crate::key::{IncompleteKey, Key};
use crate::mapping::{EntityDescriptor, IdKind, IdValue, PersistentObject};
use tracing::debug;

pub trait KeyFactory: Send + Sync {
    fn key_from_id(&self, id: &IdValue, kind: &str) -> Key;

    /// 对象已携带 id 时返回对应键
    fn key_from_object(
        &self,
        object: &dyn PersistentObject,
        descriptor: &EntityDescriptor,
    ) -> Option<Key>;

    /// 分配新键并写回对象的 id 字段
    fn allocate_key_for_object(
        &self,
        object: &mut dyn PersistentObject,
        descriptor: &EntityDescriptor,
        ancestor: Option<&Key>,
    ) -> DatastoreResult<Key>;
}

#[derive(Clone)]
pub struct DatastoreKeyFactory {
    provider: ClientProvider,
    namespace: Option<String>,
}

impl DatastoreKeyFactory {
    pub fn new(provider: ClientProvider) -> Self {
        Self {
            provider,
            namespace: None,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    fn scoped(&self, key: Key) -> Key {
        match &self.namespace {
            Some(namespace) => key.with_namespace(namespace.clone()),
            None => key,
        }
    }
}

impl KeyFactory for DatastoreKeyFactory {
    fn key_from_id(&self, id: &IdValue, kind: &str) -> Key {
        match id {
            IdValue::Key(key) => key.clone(),
            IdValue::Name(name) => self.scoped(Key::new(kind, name.as_str())),
            IdValue::Id(id) => self.scoped(Key::new(kind, *id)),
        }
    }

    fn key_from_object(
        &self,
        object: &dyn PersistentObject,
        descriptor: &EntityDescriptor,
    ) -> Option<Key> {
        object
            .object_id()
            .map(|id| self.key_from_id(&id, descriptor.kind()))
    }

    fn allocate_key_for_object(
        &self,
        object: &mut dyn PersistentObject,
        descriptor: &EntityDescriptor,
        ancestor: Option<&Key>,
    ) -> DatastoreResult<Key> {
        if descriptor.id_kind() == Some(IdKind::Name) {
            return Err(DatastoreError::data_access(
                "ids can only be allocated for integer and key id properties; cannot allocate for String",
            ));
        }

        let incomplete = match ancestor {
            Some(parent) => IncompleteKey::with_parent(descriptor.kind(), parent),
            None => IncompleteKey::new(descriptor.kind()).with_namespace(self.namespace.clone()),
        };
        let key = (self.provider)().allocate_id(&incomplete)?;
        debug!(kind = descriptor.kind(), %key, "allocated key");
        object.apply_key(&key)?;
        Ok(key)
    }
}
