//! 读取路径
//!
//! 每次顶层读取创建一个 `ReadSession`，其缓存以键为索引保存已物化的句柄。
//! 句柄在解析关联之前登记到缓存，因此自引用与 A→B→A 的环会得到同一个实例。
//!
use super::DatastoreTemplate;
use crate::client::{DatastoreReaderWriter, QueryResults, QueryRow};
use crate::entity::Entity;
use crate::error::{DatastoreError, DatastoreResult};
use crate::event::{DatastoreEvent, EventObjects};
use crate::key::Key;
use crate::mapping::{EntityRef, Hydrated, IdValue, ObjectRef, Persistent, RelationKind};
use crate::query::{PageRequest, PropertyFilter, Query, QueryOptions, Slice, StructuredQuery};
use crate::value::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, trace};

/// 一次顶层读取的上下文
#[doc(hidden)]
pub struct ReadSession<'t> {
    template: &'t DatastoreTemplate,
    reader: Arc<dyn DatastoreReaderWriter>,
    cache: HashMap<Key, ObjectRef>,
}

impl<'t> ReadSession<'t> {
    pub(crate) fn new(template: &'t DatastoreTemplate) -> Self {
        Self {
            template,
            reader: template.reader_writer(),
            cache: HashMap::new(),
        }
    }

    /// 按输入顺序返回找到的对象；缺失的键被跳过，已缓存的键不再读取
    pub(crate) fn find_by_keys<T: Persistent>(
        &mut self,
        keys: &[Key],
    ) -> DatastoreResult<Vec<EntityRef<T>>> {
        let mut seen = HashSet::new();
        let missing: Vec<Key> = keys
            .iter()
            .filter(|key| !self.cache.contains_key(*key) && seen.insert(*key))
            .cloned()
            .collect();

        let mut fetched: HashMap<Key, Entity> = HashMap::new();
        if !missing.is_empty() {
            for entity in self.reader.fetch(&missing)?.into_iter().flatten() {
                fetched.insert(entity.key().clone(), entity);
            }
        }

        let mut found = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(object) = self.cache.get(key) {
                trace!(%key, "read cache hit");
                found.push(EntityRef::from_object(object)?);
            } else if let Some(entity) = fetched.remove(key) {
                found.push(self.materialize::<T>(entity)?);
            }
        }
        Ok(found)
    }

    /// 记录 → 对象句柄，并解析其全部关联
    pub(crate) fn materialize<T: Persistent>(
        &mut self,
        entity: Entity,
    ) -> DatastoreResult<EntityRef<T>> {
        if let Some(object) = self.cache.get(entity.key()) {
            return EntityRef::from_object(object);
        }

        let template = self.template;
        let base = template.descriptor::<T>()?;
        // 带鉴别值的类型只接受同值记录，与映射上下文中登记了哪些子类型无关
        if let Some(discrimination) = base.discrimination() {
            if let Some(expected) = discrimination.value() {
                let stored = entity.discriminator(discrimination.field());
                if stored != Some(expected) {
                    let concrete = template.converter.discriminated_descriptor(&base, &entity);
                    let found = if concrete.type_id() != base.type_id() {
                        concrete.type_name().to_string()
                    } else {
                        format!(
                            "{} with {}={}",
                            base.kind(),
                            discrimination.field(),
                            stored.unwrap_or("<none>")
                        )
                    };
                    return Err(DatastoreError::type_mismatch::<T>(found));
                }
            }
        }

        let object = template
            .converter
            .read(&base, &entity)?
            .into_any()
            .downcast::<T>()
            .map_err(|_| DatastoreError::type_mismatch::<T>(base.type_name()))?;
        let handle = EntityRef::new(*object);
        self.cache.insert(entity.key().clone(), handle.erase());

        for relation in base.relations() {
            let stored = entity.property(relation.property_name());
            let hydrated = match relation.kind() {
                RelationKind::Descendant => Hydrated::from_objects(
                    relation.cardinality(),
                    relation.load_descendants(self, entity.key())?,
                ),
                RelationKind::Reference => {
                    let keys = stored.map(Value::keys).unwrap_or_default();
                    Hydrated::from_objects(
                        relation.cardinality(),
                        relation.load_references(self, &keys)?,
                    )
                }
                RelationKind::LazyReference => {
                    Hydrated::Lazy(relation.make_lazy(template.clone(), stored.cloned())?)
                }
            };
            handle.write().hydrate(relation.field_name(), hydrated)?;
        }
        Ok(handle)
    }

    fn run_entities<T: Persistent>(&mut self, query: &Query) -> DatastoreResult<Vec<EntityRef<T>>> {
        let rows = self.reader.run(query)?;
        let mut found = Vec::new();
        for row in rows {
            match row {
                QueryRow::Entity(entity) => found.push(self.materialize::<T>(entity)?),
                QueryRow::Key(key) => {
                    return Err(DatastoreError::data_access(format!(
                        "query returned key {key} where entities were expected"
                    )));
                }
            }
        }
        Ok(found)
    }
}

/// 在当前读取上下文中按键加载 `T`，供描述符上的引用字段调用
pub(crate) fn load_references<T: Persistent>(
    session: &mut ReadSession<'_>,
    keys: &[Key],
) -> DatastoreResult<Vec<ObjectRef>> {
    Ok(session
        .find_by_keys::<T>(keys)?
        .iter()
        .map(EntityRef::erase)
        .collect())
}

/// 查询 `parent` 之下的 `T` 实体（不含父实体本身）
pub(crate) fn load_descendants<T: Persistent>(
    session: &mut ReadSession<'_>,
    parent: &Key,
) -> DatastoreResult<Vec<ObjectRef>> {
    let descriptor = session.template.descriptor::<T>()?;
    let mut builder = StructuredQuery::entity_builder()
        .kind(descriptor.kind())
        .filter(PropertyFilter::has_ancestor(parent.clone()));
    if let Some(namespace) = parent.namespace() {
        builder = builder.namespace(namespace);
    }
    let query = DatastoreTemplate::apply_query_options(builder, None, &descriptor)?.build();

    let rows = session.reader.run(&query.into())?;
    let mut objects = Vec::new();
    for row in rows {
        let Some(entity) = row.into_entity() else {
            continue;
        };
        if entity.key() == parent {
            continue;
        }
        objects.push(session.materialize::<T>(entity)?.erase());
    }
    Ok(objects)
}

/// 可重复执行的仅键查询；每次 `iter` 重新运行查询
pub struct QueryKeys {
    reader: Arc<dyn DatastoreReaderWriter>,
    query: Query,
}

impl QueryKeys {
    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn iter(&self) -> DatastoreResult<KeyIter> {
        Ok(KeyIter(self.reader.run(&self.query)?))
    }
}

#[derive(Debug)]
pub struct KeyIter(QueryResults);

impl Iterator for KeyIter {
    type Item = Key;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(QueryRow::into_key)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

impl DatastoreTemplate {
    pub fn find_by_id<T: Persistent>(
        &self,
        id: impl Into<IdValue>,
    ) -> DatastoreResult<Option<EntityRef<T>>> {
        Ok(self.find_all_by_id::<T>([id.into()])?.into_iter().next())
    }

    /// 按输入顺序返回找到的对象，缺失的 id 被跳过
    pub fn find_all_by_id<T: Persistent>(
        &self,
        ids: impl IntoIterator<Item = impl Into<IdValue>>,
    ) -> DatastoreResult<Vec<EntityRef<T>>> {
        let descriptor = self.descriptor::<T>()?;
        let keys: Vec<Key> = ids
            .into_iter()
            .map(|id| self.key_factory.key_from_id(&id.into(), descriptor.kind()))
            .collect();

        let mut session = ReadSession::new(self);
        let found = session.find_by_keys::<T>(&keys)?;
        debug!(
            kind = descriptor.kind(),
            requested = keys.len(),
            found = found.len(),
            "find by key"
        );
        self.publish_with(|| DatastoreEvent::AfterFindByKey {
            objects: EventObjects::of(&found),
            keys,
        });
        Ok(found)
    }

    pub fn find_all<T: Persistent>(
        &self,
        options: Option<&QueryOptions>,
    ) -> DatastoreResult<Vec<EntityRef<T>>> {
        let descriptor = self.descriptor::<T>()?;
        let builder = Self::apply_query_options(
            StructuredQuery::entity_builder().kind(descriptor.kind()),
            options,
            &descriptor,
        )?;
        self.query::<T>(&builder.build().into())
    }

    /// 执行调用方给定的查询；结果必须是实体
    pub fn query<T: Persistent>(&self, query: &Query) -> DatastoreResult<Vec<EntityRef<T>>> {
        let mut session = ReadSession::new(self);
        let found = session.run_entities::<T>(query)?;
        debug!(rows = found.len(), "query");
        self.publish_with(|| DatastoreEvent::AfterQuery {
            objects: EventObjects::of(&found),
            query: query.clone(),
        });
        Ok(found)
    }

    pub fn query_keys(&self, query: &Query) -> QueryKeys {
        QueryKeys {
            reader: self.reader_writer(),
            query: query.clone(),
        }
    }

    /// 按页读取键；另起一次 limit 1 的探测查询判断是否存在下一页
    pub fn query_keys_slice<T: Persistent>(
        &self,
        query: &StructuredQuery,
        page: &PageRequest,
    ) -> DatastoreResult<Slice<Key>> {
        let descriptor = self.descriptor::<T>()?;
        let query = Self::apply_query_options(
            query.to_builder(),
            Some(&page.to_options()),
            &descriptor,
        )?
        .build();

        let reader = self.reader_writer();
        let results = reader.run(&query.clone().into())?;
        let cursor = results.cursor_after().cloned();
        let keys: Vec<Key> = results.map(QueryRow::into_key).collect();

        let has_next = match cursor {
            Some(cursor) => {
                let probe = query
                    .to_builder()
                    .start_cursor(cursor)
                    .offset(0)
                    .limit(1)
                    .build();
                reader.run(&probe.into())?.has_next()
            }
            None => false,
        };
        debug!(
            page = page.page(),
            keys = keys.len(),
            has_next,
            "query keys slice"
        );
        Ok(Slice::new(keys, page.clone(), has_next))
    }

    pub fn count<T: Persistent>(&self) -> DatastoreResult<usize> {
        Ok(self.kind_keys::<T>()?.len())
    }

    pub fn exists_by_id<T: Persistent>(&self, id: impl Into<IdValue>) -> DatastoreResult<bool> {
        let descriptor = self.descriptor::<T>()?;
        let key = self.key_factory.key_from_id(&id.into(), descriptor.kind());
        let fetched = self.reader_writer().fetch(&[key])?;
        Ok(fetched.into_iter().flatten().next().is_some())
    }

    /// 按键加载 `T`，使用新的读取上下文（延迟引用解析时调用）
    pub(crate) fn load_references<T: Persistent>(
        &self,
        keys: &[Key],
    ) -> DatastoreResult<Vec<ObjectRef>> {
        let mut session = ReadSession::new(self);
        load_references::<T>(&mut session, keys)
    }

    /// `T` 的全部键（已应用鉴别过滤）
    pub(crate) fn kind_keys<T: Persistent>(&self) -> DatastoreResult<Vec<Key>> {
        let descriptor = self.descriptor::<T>()?;
        let query = Self::apply_query_options(
            StructuredQuery::key_builder().kind(descriptor.kind()),
            None,
            &descriptor,
        )?
        .build();
        Ok(self
            .reader_writer()
            .run(&query.into())?
            .map(QueryRow::into_key)
            .collect())
    }
}
