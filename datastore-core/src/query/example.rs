//! 按例查询（Query by Example）
//!
//! 探针对象 + 匹配器。存储只支持等值匹配，模板在执行前校验匹配器，
//! 不支持的配置以数据访问错误拒绝。
//!
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StringMatcher {
    #[default]
    Default,
    Exact,
    Starting,
    Ending,
    Containing,
    Regex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    #[default]
    All,
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NullHandler {
    #[default]
    Ignore,
    Include,
}

/// 针对单个属性的匹配配置
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyMatcher {
    string_matcher: Option<StringMatcher>,
    ignore_case: bool,
}

impl PropertyMatcher {
    pub fn exact() -> Self {
        Self {
            string_matcher: Some(StringMatcher::Exact),
            ignore_case: false,
        }
    }

    pub fn ignore_case(mut self) -> Self {
        self.ignore_case = true;
        self
    }

    pub fn string_matcher(&self) -> Option<StringMatcher> {
        self.string_matcher
    }

    pub fn is_ignore_case(&self) -> bool {
        self.ignore_case
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExampleMatcher {
    ignored_paths: Vec<String>,
    string_matcher: StringMatcher,
    ignore_case: bool,
    match_mode: MatchMode,
    null_handler: NullHandler,
    property_matchers: BTreeMap<String, PropertyMatcher>,
}

impl ExampleMatcher {
    /// 全部属性同时匹配
    pub fn matching() -> Self {
        Self::default()
    }

    pub fn matching_all() -> Self {
        Self::default()
    }

    pub fn matching_any() -> Self {
        Self {
            match_mode: MatchMode::Any,
            ..Self::default()
        }
    }

    pub fn with_ignore_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored_paths.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn with_string_matcher(mut self, matcher: StringMatcher) -> Self {
        self.string_matcher = matcher;
        self
    }

    pub fn with_ignore_case(mut self) -> Self {
        self.ignore_case = true;
        self
    }

    pub fn with_include_null_values(mut self) -> Self {
        self.null_handler = NullHandler::Include;
        self
    }

    pub fn with_ignore_null_values(mut self) -> Self {
        self.null_handler = NullHandler::Ignore;
        self
    }

    pub fn with_matcher(mut self, path: impl Into<String>, matcher: PropertyMatcher) -> Self {
        self.property_matchers.insert(path.into(), matcher);
        self
    }

    pub fn ignored_paths(&self) -> &[String] {
        &self.ignored_paths
    }

    pub fn string_matcher(&self) -> StringMatcher {
        self.string_matcher
    }

    pub fn is_ignore_case(&self) -> bool {
        self.ignore_case
    }

    pub fn match_mode(&self) -> MatchMode {
        self.match_mode
    }

    pub fn null_handler(&self) -> NullHandler {
        self.null_handler
    }

    pub fn includes_nulls(&self) -> bool {
        self.null_handler == NullHandler::Include
    }

    pub fn property_matchers(&self) -> &BTreeMap<String, PropertyMatcher> {
        &self.property_matchers
    }
}

/// 探针对象与匹配器
#[derive(Debug, Clone)]
pub struct Example<T> {
    probe: T,
    matcher: ExampleMatcher,
}

impl<T> Example<T> {
    pub fn of(probe: T) -> Self {
        Self {
            probe,
            matcher: ExampleMatcher::matching(),
        }
    }

    pub fn with_matcher(probe: T, matcher: ExampleMatcher) -> Self {
        Self { probe, matcher }
    }

    pub fn probe(&self) -> &T {
        &self.probe
    }

    pub fn matcher(&self) -> &ExampleMatcher {
        &self.matcher
    }
}
