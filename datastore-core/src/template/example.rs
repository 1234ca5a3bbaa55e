//! 按例查询
//!
//! 只支持全部属性等值匹配。匹配器在任何存储调用之前校验，
//! 探针经转换器写入无键构建器后逐属性转为等值过滤。
//!
use super::DatastoreTemplate;
use crate::entity::EntityBuilder;
use crate::error::{DatastoreError, DatastoreResult};
use crate::mapping::{EntityDescriptor, EntityRef, Persistent};
use crate::query::{
    Example, ExampleMatcher, Filter, MatchMode, PropertyFilter, QueryOptions, StringMatcher,
    StructuredQuery,
};

fn validate_matcher(matcher: &ExampleMatcher) -> DatastoreResult<()> {
    if matcher.match_mode() == MatchMode::Any {
        return Err(DatastoreError::data_access(
            "Unsupported MatchMode. Only MatchMode.ALL is supported",
        ));
    }
    if matcher.is_ignore_case() {
        return Err(DatastoreError::data_access(
            "Ignore case matching is not supported",
        ));
    }
    if !matches!(
        matcher.string_matcher(),
        StringMatcher::Default | StringMatcher::Exact
    ) {
        return Err(DatastoreError::data_access(
            "Unsupported StringMatcher. Only EXACT and DEFAULT are supported",
        ));
    }
    if !matcher.property_matchers().is_empty() {
        return Err(DatastoreError::data_access(
            "Property matchers are not supported",
        ));
    }
    if matcher.ignored_paths().iter().any(|path| path.contains('.')) {
        return Err(DatastoreError::data_access(
            "Ignored paths deeper than 1 are not supported",
        ));
    }
    Ok(())
}

impl DatastoreTemplate {
    pub fn query_by_example<T: Persistent>(
        &self,
        example: Option<&Example<T>>,
        options: Option<&QueryOptions>,
    ) -> DatastoreResult<Vec<EntityRef<T>>> {
        let example = example
            .ok_or_else(|| DatastoreError::illegal_argument("A non-null example is expected"))?;
        validate_matcher(example.matcher())?;

        let descriptor = self.descriptor::<T>()?;
        let mut builder = StructuredQuery::entity_builder().kind(descriptor.kind());
        if let Some(filter) = self.example_filter(example, &descriptor)? {
            builder = builder.filter(filter);
        }
        let builder = Self::apply_query_options(builder, options, &descriptor)?;
        self.query::<T>(&builder.build().into())
    }

    fn example_filter<T: Persistent>(
        &self,
        example: &Example<T>,
        descriptor: &EntityDescriptor,
    ) -> DatastoreResult<Option<Filter>> {
        let matcher = example.matcher();
        let mut probe = EntityBuilder::detached();
        self.converter
            .write(example.probe(), descriptor, &mut probe)?;

        if let Some(id) = descriptor.id() {
            probe.remove(id.field_name());
        }
        for path in matcher.ignored_paths() {
            let property = descriptor.property_name_for(path).unwrap_or(path);
            probe.remove(property);
        }
        if let Some(discrimination) = descriptor.discrimination() {
            probe.remove(discrimination.field());
        }

        let filters: Vec<Filter> = probe
            .into_properties()
            .into_iter()
            .filter(|(_, value)| matcher.includes_nulls() || !value.is_null())
            .map(|(name, value)| PropertyFilter::eq(name, value).into())
            .collect();
        Ok((!filters.is_empty()).then(|| Filter::and(filters)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matcher_checks_run_in_order() {
        let any = ExampleMatcher::matching_any().with_ignore_case();
        assert!(
            validate_matcher(&any)
                .unwrap_err()
                .to_string()
                .contains("MatchMode")
        );

        let ignore_case = ExampleMatcher::matching()
            .with_ignore_case()
            .with_string_matcher(StringMatcher::Regex);
        assert!(
            validate_matcher(&ignore_case)
                .unwrap_err()
                .to_string()
                .contains("Ignore case")
        );

        let deep = ExampleMatcher::matching().with_ignore_paths(["a.b"]);
        assert!(
            validate_matcher(&deep)
                .unwrap_err()
                .to_string()
                .contains("deeper than 1")
        );

        let exact = ExampleMatcher::matching()
            .with_string_matcher(StringMatcher::Exact)
            .with_ignore_paths(["color"]);
        assert!(validate_matcher(&exact).is_ok());
    }
}
