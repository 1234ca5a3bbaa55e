//! 持久化模板（DatastoreTemplate）
//!
//! 编排对象图的保存、查找、删除与查询：
//! - 向映射上下文获取实体描述符；
//! - 向键工厂解析或分配键；
//! - 经转换器读写属性包；
//! - 通过客户端读写存储，并在前后发布生命周期事件。
//!
//! 模板只持有 `Arc`，可自由克隆并跨线程共享；客户端在每次操作开始时解析一次。
//!
mod delete;
mod example;
pub(crate) mod read;
pub(crate) mod save;

pub use read::{KeyIter, QueryKeys};

use crate::client::{ClientProvider, DatastoreClient, DatastoreReaderWriter, single_client};
use crate::convert::{EntityConverter, JsonEntityConverter};
use crate::entity::EntityBuilder;
use crate::error::{DatastoreError, DatastoreResult};
use crate::event::{DatastoreEvent, EventPublisher};
use crate::key::Key;
use crate::key_factory::{DatastoreKeyFactory, KeyFactory};
use crate::mapping::{EntityDescriptor, IdValue, MappingContext, Persistent};
use crate::query::{Filter, OrderBy, PropertyFilter, QueryOptions, StructuredQueryBuilder};
use bon::Builder;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// 模板配置
#[derive(Builder, Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateConfig {
    /// 单次 put 的最大实体数；`None` 表示不分批
    #[serde(default)]
    pub max_write_size: Option<usize>,
}

#[derive(Clone, Builder)]
pub struct DatastoreTemplate {
    client_provider: ClientProvider,
    converter: Arc<dyn EntityConverter>,
    mapping_context: Arc<MappingContext>,
    key_factory: Arc<dyn KeyFactory>,
    event_publisher: Option<Arc<dyn EventPublisher>>,
    #[builder(default)]
    config: TemplateConfig,
    /// 事务内的读写视图；设置后所有读写都经由它
    #[builder(skip)]
    transaction: Option<Arc<dyn DatastoreReaderWriter>>,
}

impl DatastoreTemplate {
    /// 单客户端 + 默认转换器与键工厂
    pub fn from_client(client: Arc<dyn DatastoreClient>) -> Self {
        Self::from_provider(single_client(client))
    }

    pub fn from_provider(provider: ClientProvider) -> Self {
        let mapping = Arc::new(MappingContext::new());
        Self::builder()
            .client_provider(provider.clone())
            .converter(Arc::new(JsonEntityConverter::new(mapping.clone())))
            .mapping_context(mapping)
            .key_factory(Arc::new(DatastoreKeyFactory::new(provider)))
            .build()
    }

    pub fn with_event_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.event_publisher = Some(publisher);
        self
    }

    pub fn with_max_write_size(mut self, max_write_size: usize) -> Self {
        self.config.max_write_size = Some(max_write_size);
        self
    }

    pub fn config(&self) -> &TemplateConfig {
        &self.config
    }

    pub fn mapping_context(&self) -> &Arc<MappingContext> {
        &self.mapping_context
    }

    pub fn converter(&self) -> &Arc<dyn EntityConverter> {
        &self.converter
    }

    pub fn key_factory(&self) -> &Arc<dyn KeyFactory> {
        &self.key_factory
    }

    pub fn in_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    pub fn descriptor<T: Persistent>(&self) -> DatastoreResult<Arc<EntityDescriptor>> {
        self.mapping_context.descriptor::<T>()
    }

    pub fn create_key(&self, kind: &str, id: impl Into<IdValue>) -> Key {
        self.key_factory.key_from_id(&id.into(), kind)
    }

    /// 在事务中执行 `operations`，回调拿到的模板经由事务读写
    ///
    /// 回调返回错误时事务回滚，错误原样返回；已在事务中时直接复用当前事务。
    pub fn perform_transaction<R, F>(&self, operations: F) -> DatastoreResult<R>
    where
        F: FnOnce(&DatastoreTemplate) -> DatastoreResult<R>,
    {
        if self.in_transaction() {
            return operations(self);
        }

        let client = (self.client_provider)();
        let mut operations = Some(operations);
        let mut result = None;
        client.run_in_transaction(&mut |transaction: Arc<dyn DatastoreReaderWriter>| {
            let operations = operations
                .take()
                .ok_or_else(|| DatastoreError::store("transaction callback was already consumed"))?;
            let scoped = DatastoreTemplate {
                transaction: Some(transaction),
                ..self.clone()
            };
            result = Some(operations(&scoped)?);
            Ok(())
        })?;
        debug!("transaction completed");
        result.ok_or_else(|| DatastoreError::store("transaction finished without running the callback"))
    }

    /// 读取单个实体的全部属性
    pub fn find_by_id_as_map<V: DeserializeOwned>(
        &self,
        key: &Key,
    ) -> DatastoreResult<Option<BTreeMap<String, V>>> {
        let fetched = self.reader_writer().fetch(std::slice::from_ref(key))?;
        let Some(entity) = fetched.into_iter().next().flatten() else {
            return Ok(None);
        };
        self.converter
            .read_as_map(&entity)?
            .into_iter()
            .map(|(name, value)| Ok((name, serde_json::from_value(value)?)))
            .collect::<DatastoreResult<_>>()
            .map(Some)
    }

    /// 以映射内容写入一个实体，覆盖原有属性
    pub fn write_map<V: Serialize>(
        &self,
        key: &Key,
        map: &BTreeMap<String, V>,
    ) -> DatastoreResult<()> {
        let mut builder = EntityBuilder::new(key.clone());
        for (name, value) in map {
            builder.set(
                name.clone(),
                self.converter.convert_on_write(serde_json::to_value(value)?)?,
            );
        }
        self.reader_writer().put(&[builder.build()?])
    }

    /// 将 limit/offset/排序与鉴别过滤应用到查询构建器
    ///
    /// 排序字段按领域字段名给出，映射为存储属性名；未知字段返回数据访问错误。
    pub fn apply_query_options(
        mut builder: StructuredQueryBuilder,
        options: Option<&QueryOptions>,
        descriptor: &EntityDescriptor,
    ) -> DatastoreResult<StructuredQueryBuilder> {
        if let Some(options) = options {
            if let Some(limit) = options.limit() {
                builder = builder.limit(limit);
            }
            if let Some(offset) = options.offset() {
                builder = builder.offset(offset);
            }
            if let Some(sort) = options.sort() {
                for order in sort.orders() {
                    let property = descriptor.property_name_for(order.property()).ok_or_else(|| {
                        DatastoreError::data_access(format!(
                            "No property {} found on {}",
                            order.property(),
                            descriptor.type_name()
                        ))
                    })?;
                    builder = builder.order_by(OrderBy::new(property, order.direction()));
                }
            }
        }

        if let Some(discrimination) = descriptor.discrimination() {
            if let Some(value) = discrimination.value() {
                let discriminator: Filter = PropertyFilter::eq(discrimination.field(), value).into();
                builder = match builder.current_filter().cloned() {
                    Some(existing) => builder.filter(Filter::and([existing, discriminator])),
                    None => builder.filter(discriminator),
                };
            }
        }
        Ok(builder)
    }

    /// 当前操作使用的读写视图：事务内为事务句柄，否则重新解析一次客户端
    pub(crate) fn reader_writer(&self) -> Arc<dyn DatastoreReaderWriter> {
        match &self.transaction {
            Some(transaction) => transaction.clone(),
            None => Arc::new((self.client_provider)()),
        }
    }

    pub(crate) fn publish_with(&self, event: impl FnOnce() -> DatastoreEvent) {
        if let Some(publisher) = &self.event_publisher {
            let event = event();
            trace!(event = event.name(), "publishing datastore event");
            publisher.publish(&event);
        }
    }

    fn write_limit(&self) -> DatastoreResult<Option<usize>> {
        match self.config.max_write_size {
            Some(0) => Err(DatastoreError::illegal_argument(
                "max write size must be at least 1",
            )),
            limit => Ok(limit),
        }
    }
}

impl fmt::Debug for DatastoreTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatastoreTemplate")
            .field("config", &self.config)
            .field("event_publisher", &self.event_publisher.is_some())
            .field("in_transaction", &self.in_transaction())
            .finish()
    }
}
