//! 实体图持久化模板（datastore-core）
//!
//! 在普通领域对象与无模式键值实体存储之间进行映射与持久化：
//! - 键模型（`key`）、属性值（`value`）与属性包实体（`entity`）
//! - 存储客户端协议与内存实现（`client`）
//! - 实体描述符、关联字段与映射上下文（`mapping`），延迟引用（`lazy`）
//! - 实体转换器（`convert`）与键工厂（`key_factory`）
//! - 结构化查询、查询选项与按例查询（`query`）
//! - 编排保存/查找/删除/查询的持久化模板（`template`）
//! - 生命周期事件与广播发布器（`event`）
//!
//! 本 crate 不涉及传输、鉴权与重试，具体存储通过 `DatastoreClient` 注入。
//!
//! 典型用法：
//! 1. 以 `#[entity]` 标注领域结构体，声明 id、字段与关联；
//! 2. 由客户端（或客户端来源）构建 `DatastoreTemplate`；
//! 3. 用 `EntityRef` 组织对象图，调用 `save`/`find_by_id`/`query_by_example` 等操作。
//!
pub mod client;
pub mod convert;
pub mod entity;
pub mod error;
pub mod event;
pub mod key;
pub mod key_factory;
pub mod lazy;
pub mod mapping;
pub mod query;
pub mod template;
pub mod value;

// 允许在本 crate 内部通过 ::datastore_core 进行自引用，
// 以便过程宏在本 crate 的测试中也能解析到 ::datastore_core 路径。
extern crate self as datastore_core;
