//! 存储键
//!
//! 键由可选命名空间与非空路径构成，路径元素为 `(kind, id|name)`：
//! - 末尾元素是键自身的 kind 与标识；
//! - 之前的元素是祖先链，后代实体的键必须包含父键的完整路径。
//!
use serde::{Deserialize, Serialize};
use std::fmt;

/// 路径元素上的标识：数值 id 或字符串 name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum KeyId {
    Id(i64),
    Name(String),
}

impl From<i64> for KeyId {
    fn from(value: i64) -> Self {
        KeyId::Id(value)
    }
}

impl From<&str> for KeyId {
    fn from(value: &str) -> Self {
        KeyId::Name(value.to_string())
    }
}

impl From<String> for KeyId {
    fn from(value: String) -> Self {
        KeyId::Name(value)
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyId::Id(id) => write!(f, "{id}"),
            KeyId::Name(name) => write!(f, "{name:?}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PathElement {
    kind: String,
    id: KeyId,
}

impl PathElement {
    pub fn new(kind: impl Into<String>, id: impl Into<KeyId>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn id(&self) -> &KeyId {
        &self.id
    }
}

/// 完整键（带标识）
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Key {
    namespace: Option<String>,
    path: Vec<PathElement>,
}

impl Key {
    pub fn new(kind: impl Into<String>, id: impl Into<KeyId>) -> Self {
        Self {
            namespace: None,
            path: vec![PathElement::new(kind, id)],
        }
    }

    /// 以当前键为父，构造一个后代键
    pub fn child(&self, kind: impl Into<String>, id: impl Into<KeyId>) -> Self {
        let mut path = self.path.clone();
        path.push(PathElement::new(kind, id));
        Self {
            namespace: self.namespace.clone(),
            path,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn path(&self) -> &[PathElement] {
        &self.path
    }

    fn leaf(&self) -> &PathElement {
        // 路径在所有构造入口上均非空
        &self.path[self.path.len() - 1]
    }

    pub fn kind(&self) -> &str {
        self.leaf().kind()
    }

    pub fn id_or_name(&self) -> &KeyId {
        self.leaf().id()
    }

    pub fn id(&self) -> Option<i64> {
        match self.id_or_name() {
            KeyId::Id(id) => Some(*id),
            KeyId::Name(_) => None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self.id_or_name() {
            KeyId::Name(name) => Some(name),
            KeyId::Id(_) => None,
        }
    }

    /// 祖先链（不含自身）
    pub fn ancestors(&self) -> &[PathElement] {
        &self.path[..self.path.len() - 1]
    }

    pub fn parent(&self) -> Option<Key> {
        if self.path.len() < 2 {
            return None;
        }
        Some(Self {
            namespace: self.namespace.clone(),
            path: self.ancestors().to_vec(),
        })
    }

    /// `ancestor` 的完整路径是否为本键祖先链的前缀
    pub fn has_ancestor(&self, ancestor: &Key) -> bool {
        self.namespace == ancestor.namespace && self.ancestors().starts_with(&ancestor.path)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ns) = &self.namespace {
            write!(f, "[{ns}]")?;
        }
        for (i, element) in self.path.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{}({})", element.kind, element.id)?;
        }
        Ok(())
    }
}

/// 尚未分配标识的键：祖先链 + kind，由客户端补全
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IncompleteKey {
    namespace: Option<String>,
    ancestors: Vec<PathElement>,
    kind: String,
}

impl IncompleteKey {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            namespace: None,
            ancestors: Vec::new(),
            kind: kind.into(),
        }
    }

    /// 在 `parent` 之下分配
    pub fn with_parent(kind: impl Into<String>, parent: &Key) -> Self {
        Self {
            namespace: parent.namespace.clone(),
            ancestors: parent.path.clone(),
            kind: kind.into(),
        }
    }

    pub fn with_namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace;
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn ancestors(&self) -> &[PathElement] {
        &self.ancestors
    }

    pub fn complete(self, id: impl Into<KeyId>) -> Key {
        let mut path = self.ancestors;
        path.push(PathElement::new(self.kind, id));
        Key {
            namespace: self.namespace,
            path,
        }
    }
}
