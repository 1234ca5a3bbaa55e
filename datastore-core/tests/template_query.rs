mod common;

use common::{SimpleDiscriminationTestEntity, TestEntity, fixture, test_key};
use datastore_core::client::DatastoreReaderWriter;
use datastore_core::entity::Entity;
use datastore_core::error::DatastoreError;
use datastore_core::event::DatastoreEvent;
use datastore_core::key::Key;
use datastore_core::query::{
    Direction, Example, ExampleMatcher, Filter, PageRequest, PropertyFilter, Query, QueryOptions,
    Sort, StringMatcher, StructuredQuery,
};
use datastore_core::value::Value;

fn seed(fx: &common::Fixture) {
    let entities = vec![
        TestEntity::new("key0", "red", 10, 3),
        TestEntity::new("key1", "blue", 20, 1),
        TestEntity::new("key2", "red", 30, 2),
        TestEntity::new("key3", "green", 40, 5),
        TestEntity::new("key4", "red", 50, 4),
    ];
    fx.template.save_all(&entities).unwrap();
    fx.client.reset();
    fx.events.clear();
}

fn ids(found: &[datastore_core::mapping::EntityRef<TestEntity>]) -> Vec<String> {
    found
        .iter()
        .map(|e| e.read().id.clone().unwrap_or_default())
        .collect()
}

#[test]
fn find_all_applies_sort_limit_and_offset() {
    let fx = fixture();
    seed(&fx);

    let options = QueryOptions::builder()
        .sort(Sort::by_direction(Direction::Descending, ["sort_property"]))
        .limit(2)
        .offset(1)
        .build();
    let found = fx.template.find_all::<TestEntity>(Some(&options)).unwrap();

    assert_eq!(ids(&found), vec!["key4", "key0"]);
    assert_eq!(fx.events.names(), vec!["AfterQuery"]);
}

#[test]
fn sorting_on_an_unknown_field_is_rejected() {
    let fx = fixture();
    let options = QueryOptions::builder().sort(Sort::by(["weight"])).build();

    match fx.template.find_all::<TestEntity>(Some(&options)).unwrap_err() {
        DatastoreError::DataAccess { reason } => assert!(reason.starts_with("No property weight found on")),
        other => panic!("unexpected {other:?}"),
    }
    assert!(fx.client.runs().is_empty());
}

#[test]
fn query_by_example_matches_non_null_properties() {
    let fx = fixture();
    seed(&fx);

    let probe = TestEntity {
        color: "red".into(),
        ..Default::default()
    };
    let matcher = ExampleMatcher::matching()
        .with_string_matcher(StringMatcher::Exact)
        .with_ignore_paths(["int_field", "sort_property"]);
    let options = QueryOptions::builder().sort(Sort::by(["int_field"])).build();

    let found = fx
        .template
        .query_by_example(Some(&Example::with_matcher(probe, matcher)), Some(&options))
        .unwrap();

    assert_eq!(ids(&found), vec!["key0", "key2", "key4"]);
    match &fx.events.events()[..] {
        [DatastoreEvent::AfterQuery { query: Query::Structured(query), .. }] => {
            assert_eq!(query.kind(), Some("custom_test_kind"));
            assert_eq!(
                query.filter(),
                Some(&Filter::and([PropertyFilter::eq("color", "red").into()]))
            );
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn query_by_example_without_probe_is_illegal() {
    let fx = fixture();
    match fx
        .template
        .query_by_example::<TestEntity>(None, None)
        .unwrap_err()
    {
        DatastoreError::IllegalArgument { reason } => {
            assert_eq!(reason, "A non-null example is expected")
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn unsupported_matchers_fail_before_any_query() {
    let fx = fixture();
    let cases = [
        (
            ExampleMatcher::matching_any(),
            "Unsupported MatchMode. Only MatchMode.ALL is supported",
        ),
        (
            ExampleMatcher::matching().with_ignore_case(),
            "Ignore case matching is not supported",
        ),
        (
            ExampleMatcher::matching().with_string_matcher(StringMatcher::Containing),
            "Unsupported StringMatcher. Only EXACT and DEFAULT are supported",
        ),
        (
            ExampleMatcher::matching()
                .with_matcher("color", datastore_core::query::PropertyMatcher::exact()),
            "Property matchers are not supported",
        ),
        (
            ExampleMatcher::matching().with_ignore_paths(["child.name"]),
            "Ignored paths deeper than 1 are not supported",
        ),
    ];

    for (matcher, expected) in cases {
        let example = Example::with_matcher(TestEntity::default(), matcher);
        match fx
            .template
            .query_by_example(Some(&example), None)
            .unwrap_err()
        {
            DatastoreError::DataAccess { reason } => assert_eq!(reason, expected),
            other => panic!("unexpected {other:?}"),
        }
    }
    assert!(fx.client.runs().is_empty());
}

#[test]
fn query_keys_runs_on_every_iteration() {
    let fx = fixture();
    seed(&fx);
    let query: Query = StructuredQuery::key_builder()
        .kind("custom_test_kind")
        .filter(PropertyFilter::eq("color", "red"))
        .build()
        .into();

    let keys = fx.template.query_keys(&query);
    let first: Vec<Key> = keys.iter().unwrap().collect();
    let second: Vec<Key> = keys.iter().unwrap().collect();

    assert_eq!(first, vec![test_key("key0"), test_key("key2"), test_key("key4")]);
    assert_eq!(first, second);
    assert_eq!(fx.client.runs().len(), 2);
}

#[test]
fn query_keys_slice_reports_next_page() {
    let fx = fixture();
    seed(&fx);
    let query = StructuredQuery::key_builder().kind("custom_test_kind").build();
    let page = PageRequest::of(0, 2)
        .unwrap()
        .with_sort(Sort::by(["sort_property"]));

    let first = fx
        .template
        .query_keys_slice::<TestEntity>(&query, &page)
        .unwrap();
    assert_eq!(first.content(), &[test_key("key1"), test_key("key2")]);
    assert!(first.has_next());

    let second = fx
        .template
        .query_keys_slice::<TestEntity>(&query, &first.next_page().unwrap())
        .unwrap();
    assert_eq!(second.content(), &[test_key("key0"), test_key("key4")]);
    assert!(second.has_next());

    let last = fx
        .template
        .query_keys_slice::<TestEntity>(&query, &second.next_page().unwrap())
        .unwrap();
    assert_eq!(last.content(), &[test_key("key3")]);
    assert!(!last.has_next());
    assert!(last.next_page().is_none());
}

#[test]
fn count_and_delete_all_cover_the_kind() {
    let fx = fixture();
    seed(&fx);

    assert_eq!(fx.template.count::<TestEntity>().unwrap(), 5);
    assert!(fx.template.exists_by_id::<TestEntity>("key3").unwrap());

    assert_eq!(fx.template.delete_all::<TestEntity>().unwrap(), 5);
    assert_eq!(fx.template.count::<TestEntity>().unwrap(), 0);
    assert!(!fx.template.exists_by_id::<TestEntity>("key3").unwrap());
}

#[test]
fn discriminated_types_only_see_their_own_rows() {
    let fx = fixture();
    let mine = datastore_core::mapping::EntityRef::new(SimpleDiscriminationTestEntity {
        id: Some(1),
        int_field: 7,
    });
    fx.template.save(&mine, None).unwrap();
    fx.client
        .store
        .put(&[
            Entity::new(
                Key::new("test_kind", 2),
                [
                    ("discrimination_field", Value::from("B")),
                    ("int_field", Value::Integer(8)),
                ],
            ),
            Entity::new(Key::new("test_kind", 3), [("int_field", Value::Integer(9))]),
        ])
        .unwrap();

    let stored = fx.client.store.get(&Key::new("test_kind", 1)).unwrap();
    assert_eq!(
        stored.property("discrimination_field"),
        Some(&Value::from("A"))
    );

    let found = fx
        .template
        .find_all::<SimpleDiscriminationTestEntity>(None)
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].read().int_field, 7);
    assert_eq!(
        fx.template.count::<SimpleDiscriminationTestEntity>().unwrap(),
        1
    );
}
