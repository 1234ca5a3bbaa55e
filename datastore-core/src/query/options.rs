//! 查询选项与分页
//!
//! - `QueryOptions`：limit/offset/sort，排序按字段名声明，由模板映射为存储属性名；
//! - `PageRequest` / `Slice`：按页切片读取键，附带是否存在下一页。
//!
use super::Direction;
use crate::error::{DatastoreError, DatastoreResult};
use bon::Builder;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    property: String,
    direction: Direction,
}

impl Order {
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

    /// 领域字段名
    pub fn property(&self) -> &str {
        &self.property
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sort {
    orders: Vec<Order>,
}

impl Sort {
    pub fn unsorted() -> Self {
        Self::default()
    }

    pub fn by<I, S>(properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::by_direction(Direction::Ascending, properties)
    }

    pub fn by_direction<I, S>(direction: Direction, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            orders: properties
                .into_iter()
                .map(|p| Order::new(p, direction))
                .collect(),
        }
    }

    pub fn by_orders(orders: impl IntoIterator<Item = Order>) -> Self {
        Self {
            orders: orders.into_iter().collect(),
        }
    }

    pub fn and(mut self, other: Sort) -> Self {
        self.orders.extend(other.orders);
        self
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn is_unsorted(&self) -> bool {
        self.orders.is_empty()
    }
}

/// 查询选项
#[derive(Builder, Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    limit: Option<usize>,
    offset: Option<usize>,
    sort: Option<Sort>,
}

impl QueryOptions {
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn offset(&self) -> Option<usize> {
        self.offset
    }

    pub fn sort(&self) -> Option<&Sort> {
        self.sort.as_ref()
    }
}

/// 页请求：页号从 0 开始
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    page: usize,
    size: usize,
    sort: Sort,
}

impl PageRequest {
    pub fn of(page: usize, size: usize) -> DatastoreResult<Self> {
        if size == 0 {
            return Err(DatastoreError::illegal_argument(
                "Page size must not be less than one",
            ));
        }
        if page.checked_mul(size).is_none() {
            return Err(DatastoreError::illegal_argument(format!(
                "Page {page} of size {size} overflows the row offset"
            )));
        }
        Ok(Self {
            page,
            size,
            sort: Sort::unsorted(),
        })
    }

    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort = sort;
        self
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn offset(&self) -> usize {
        self.page.saturating_mul(self.size)
    }

    pub fn sort(&self) -> &Sort {
        &self.sort
    }

    pub fn next(&self) -> DatastoreResult<Self> {
        let page = self
            .page
            .checked_add(1)
            .ok_or_else(|| DatastoreError::illegal_argument("Page number overflows"))?;
        Ok(Self::of(page, self.size)?.with_sort(self.sort.clone()))
    }

    pub(crate) fn to_options(&self) -> QueryOptions {
        let sort = (!self.sort.is_unsorted()).then(|| self.sort.clone());
        QueryOptions::builder()
            .limit(self.size)
            .offset(self.offset())
            .maybe_sort(sort)
            .build()
    }
}

/// 一页结果与是否存在下一页
#[derive(Debug, Clone, PartialEq)]
pub struct Slice<T> {
    content: Vec<T>,
    page: PageRequest,
    has_next: bool,
}

impl<T> Slice<T> {
    pub fn new(content: Vec<T>, page: PageRequest, has_next: bool) -> Self {
        Self {
            content,
            page,
            has_next,
        }
    }

    pub fn content(&self) -> &[T] {
        &self.content
    }

    pub fn into_content(self) -> Vec<T> {
        self.content
    }

    pub fn page(&self) -> &PageRequest {
        &self.page
    }

    pub fn has_next(&self) -> bool {
        self.has_next
    }

    pub fn next_page(&self) -> Option<PageRequest> {
        self.has_next.then(|| self.page.next().ok()).flatten()
    }
}
