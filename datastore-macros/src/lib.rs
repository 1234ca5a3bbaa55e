//! 实体映射过程宏（datastore-macros）
//!
//! `#[entity]` 为领域结构体生成 `::datastore_core::mapping::Persistent` 实现。
//!
use proc_macro::TokenStream;

mod derive_utils;
mod entity;
mod field_utils;

/// 实体宏
/// - 生成实体描述符：kind、id 属性、简单字段（存储名）、后代/引用/延迟引用字段与鉴别信息
/// - id 与关联字段不参与 serde 序列化，由持久化模板读写
/// - 支持参数：`#[entity(kind = "..", discriminator_field = "..", discriminator_value = "..", debug = true|false)]`
///
/// ```ignore
/// #[entity(kind = "order")]
/// struct Order {
///     id: Option<i64>,
///     #[field(name = "order_no")]
///     number: String,
///     #[descendants]
///     lines: Vec<EntityRef<OrderLine>>,
///     #[lazy_reference]
///     customer: LazyRef<Customer>,
/// }
/// ```
#[proc_macro_attribute]
pub fn entity(attr: TokenStream, item: TokenStream) -> TokenStream {
    entity::expand(attr, item)
}
