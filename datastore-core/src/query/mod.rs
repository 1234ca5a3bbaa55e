//! 查询模型
//!
//! - `StructuredQuery`：kind/过滤/排序/分页/游标组成的结构化查询，支持实体或仅键结果；
//! - `GqlQuery`：调用方提供的文本查询，按原样交给客户端；
//! - `options`：limit/offset/sort 等查询选项与分页切片；
//! - `example`：按例查询的探针与匹配器。
//!
pub mod example;
pub mod options;

pub use example::{Example, ExampleMatcher, MatchMode, NullHandler, PropertyMatcher, StringMatcher};
pub use options::{Order, PageRequest, QueryOptions, Slice, Sort};

use crate::key::Key;
use crate::value::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultType {
    Entity,
    Key,
}

/// 不透明游标，由客户端生成与解释
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cursor(Vec<u8>);

impl Cursor {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equal,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    HasAncestor,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyFilter {
    property: String,
    operator: Operator,
    value: Value,
}

impl PropertyFilter {
    pub fn new(property: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            property: property.into(),
            operator,
            value: value.into(),
        }
    }

    pub fn eq(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(property, Operator::Equal, value)
    }

    pub fn lt(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(property, Operator::LessThan, value)
    }

    pub fn le(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(property, Operator::LessThanOrEqual, value)
    }

    pub fn gt(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(property, Operator::GreaterThan, value)
    }

    pub fn ge(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(property, Operator::GreaterThanOrEqual, value)
    }

    /// 键路径以 `ancestor` 为前缀（含其自身）
    pub fn has_ancestor(ancestor: Key) -> Self {
        Self::new(KEY_PROPERTY, Operator::HasAncestor, Value::Key(ancestor))
    }

    pub fn property(&self) -> &str {
        &self.property
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

/// 键的伪属性名
pub const KEY_PROPERTY: &str = "__key__";

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Property(PropertyFilter),
    /// 全部子过滤条件同时成立
    And(Vec<Filter>),
}

impl Filter {
    pub fn and(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::And(filters.into_iter().collect())
    }
}

impl From<PropertyFilter> for Filter {
    fn from(value: PropertyFilter) -> Self {
        Filter::Property(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    property: String,
    direction: Direction,
}

impl OrderBy {
    pub fn new(property: impl Into<String>, direction: Direction) -> Self {
        Self {
            property: property.into(),
            direction,
        }
    }

    pub fn asc(property: impl Into<String>) -> Self {
        Self::new(property, Direction::Ascending)
    }

    pub fn desc(property: impl Into<String>) -> Self {
        Self::new(property, Direction::Descending)
    }

    pub fn property(&self) -> &str {
        &self.property
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructuredQuery {
    result_type: ResultType,
    namespace: Option<String>,
    kind: Option<String>,
    filter: Option<Filter>,
    order_by: Vec<OrderBy>,
    limit: Option<usize>,
    offset: usize,
    start_cursor: Option<Cursor>,
}

impl StructuredQuery {
    fn empty(result_type: ResultType) -> Self {
        Self {
            result_type,
            namespace: None,
            kind: None,
            filter: None,
            order_by: Vec::new(),
            limit: None,
            offset: 0,
            start_cursor: None,
        }
    }

    /// 实体查询构建器
    pub fn entity_builder() -> StructuredQueryBuilder {
        StructuredQueryBuilder {
            query: Self::empty(ResultType::Entity),
        }
    }

    /// 仅键查询构建器
    pub fn key_builder() -> StructuredQueryBuilder {
        StructuredQueryBuilder {
            query: Self::empty(ResultType::Key),
        }
    }

    pub fn to_builder(&self) -> StructuredQueryBuilder {
        StructuredQueryBuilder {
            query: self.clone(),
        }
    }

    pub fn result_type(&self) -> ResultType {
        self.result_type
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn kind(&self) -> Option<&str> {
        self.kind.as_deref()
    }

    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    pub fn order_by(&self) -> &[OrderBy] {
        &self.order_by
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn start_cursor(&self) -> Option<&Cursor> {
        self.start_cursor.as_ref()
    }
}

#[derive(Debug, Clone)]
pub struct StructuredQueryBuilder {
    query: StructuredQuery,
}

impl StructuredQueryBuilder {
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.query.namespace = Some(namespace.into());
        self
    }

    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.query.kind = Some(kind.into());
        self
    }

    /// 覆盖当前过滤条件
    pub fn filter(mut self, filter: impl Into<Filter>) -> Self {
        self.query.filter = Some(filter.into());
        self
    }

    pub fn current_filter(&self) -> Option<&Filter> {
        self.query.filter.as_ref()
    }

    /// 追加一个排序条件
    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.query.order_by.push(order);
        self
    }

    pub fn clear_order_by(mut self) -> Self {
        self.query.order_by.clear();
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.query.offset = offset;
        self
    }

    pub fn start_cursor(mut self, cursor: Cursor) -> Self {
        self.query.start_cursor = Some(cursor);
        self
    }

    pub fn build(self) -> StructuredQuery {
        self.query
    }
}

/// 文本查询（GQL），命名绑定按原样传递
#[derive(Debug, Clone, PartialEq)]
pub struct GqlQuery {
    query_string: String,
    result_type: ResultType,
    named_bindings: BTreeMap<String, Value>,
}

impl GqlQuery {
    pub fn new(query_string: impl Into<String>) -> Self {
        Self {
            query_string: query_string.into(),
            result_type: ResultType::Entity,
            named_bindings: BTreeMap::new(),
        }
    }

    pub fn keys_only(mut self) -> Self {
        self.result_type = ResultType::Key;
        self
    }

    pub fn bind(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.named_bindings.insert(name.into(), value.into());
        self
    }

    pub fn query_string(&self) -> &str {
        &self.query_string
    }

    pub fn result_type(&self) -> ResultType {
        self.result_type
    }

    pub fn named_bindings(&self) -> &BTreeMap<String, Value> {
        &self.named_bindings
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Structured(StructuredQuery),
    Gql(GqlQuery),
}

impl Query {
    pub fn result_type(&self) -> ResultType {
        match self {
            Query::Structured(q) => q.result_type(),
            Query::Gql(q) => q.result_type(),
        }
    }
}

impl From<StructuredQuery> for Query {
    fn from(value: StructuredQuery) -> Self {
        Query::Structured(value)
    }
}

impl From<GqlQuery> for Query {
    fn from(value: GqlQuery) -> Self {
        Query::Gql(value)
    }
}
