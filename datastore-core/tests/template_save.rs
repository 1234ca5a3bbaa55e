mod common;

use common::{ChildEntity, ReferenceTestEntity, TestEntity, fixture, test_key};
use datastore_core::error::DatastoreError;
use datastore_core::event::DatastoreEvent;
use datastore_core::key::Key;
use datastore_core::mapping::EntityRef;
use datastore_core::value::Value;
use datastore_macros::entity;
use std::collections::BTreeSet;

#[entity(kind = "leaf")]
struct Leaf {
    id: Option<i64>,
}

#[entity(kind = "tree")]
struct Tree {
    id: Option<String>,
    #[descendants]
    leaves: Vec<EntityRef<Leaf>>,
}

#[entity(kind = "counter")]
struct Counter {
    id: Option<String>,
    hits: u64,
}

#[test]
fn save_writes_simple_properties_under_stored_names() {
    let fx = fixture();
    let entity = TestEntity::new("key0", "simple_test_color", 3, 1);

    let saved = fx.template.save(&entity, None).unwrap();
    assert!(saved.ptr_eq(&entity));

    let stored = fx.client.store.get(&test_key("key0")).unwrap();
    assert_eq!(stored.property("color"), Some(&Value::from("simple_test_color")));
    assert_eq!(stored.property("int_field"), Some(&Value::Integer(3)));
    assert_eq!(stored.property("prop"), Some(&Value::Integer(1)));
    assert!(!stored.contains("sort_property"));
    assert!(!stored.contains("id"));
    // 空关联不写属性
    assert!(!stored.contains("singular_reference"));
    assert!(!stored.contains("multiple_reference"));
    assert!(!stored.contains("lazy_multiple_reference"));
}

#[test]
fn integer_ids_are_allocated_and_written_back() {
    let fx = fixture();
    let entity = ReferenceTestEntity::labeled("first");

    fx.template.save(&entity, None).unwrap();

    let id = entity.read().id.unwrap();
    let key = Key::new("referenceTestEntity", id);
    assert!(fx.client.store.get(&key).is_some());
}

#[test]
fn allocated_ids_are_reused_on_resave() -> anyhow::Result<()> {
    let fx = fixture();
    let entity = ReferenceTestEntity::labeled("first");

    fx.template.save(&entity, None)?;
    let id = entity.read().id;
    entity.write().label = "renamed".into();
    fx.template.save(&entity, None)?;

    assert_eq!(entity.read().id, id);
    assert_eq!(fx.client.store.len(), 1);
    Ok(())
}

#[test]
fn string_ids_cannot_be_allocated() {
    let fx = fixture();
    let entity = EntityRef::new(TestEntity::default());

    let err = fx.template.save(&entity, None).unwrap_err();
    assert!(matches!(err, DatastoreError::DataAccess { .. }));
    assert!(fx.client.puts().is_empty());
}

#[test]
fn descendants_are_keyed_under_their_parent() {
    let fx = fixture();
    let parent = TestEntity::new("key0", "red", 1, 1);
    {
        let mut p = parent.write();
        p.child_entities.push_back(ChildEntity::named("a"));
        p.child_entities.push_back(ChildEntity::named("b"));
    }

    fx.template.save(&parent, None).unwrap();

    let parent_key = test_key("key0");
    for child in parent.read().child_entities.iter() {
        let key = child.read().id.clone().unwrap();
        assert_eq!(key.kind(), "child_entity");
        assert!(key.has_ancestor(&parent_key));
        assert!(fx.client.store.get(&key).is_some());
    }

    // 一次写入，子实体在父实体之前
    let puts = fx.client.puts();
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0].len(), 3);
    assert_eq!(puts[0].last(), Some(&parent_key));
}

#[test]
fn descendant_ids_must_be_keys() {
    let fx = fixture();
    let tree = EntityRef::new(Tree {
        id: Some("oak".into()),
        leaves: vec![EntityRef::new(Leaf { id: None })],
    });

    match fx.template.save(&tree, None).unwrap_err() {
        DatastoreError::DataAccess { reason } => {
            assert_eq!(reason, "Only Key types are allowed for descendants id")
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(fx.client.puts().is_empty());
}

#[test]
fn descendant_key_outside_the_parent_is_rejected() {
    let fx = fixture();
    let parent = TestEntity::new("key0", "red", 1, 1);
    let stray = EntityRef::new(ChildEntity {
        id: Some(Key::new("child_entity", 5)),
        name: "stray".into(),
    });
    parent.write().child_entities.push_back(stray);

    match fx.template.save(&parent, None).unwrap_err() {
        DatastoreError::DataAccess { reason } => {
            assert_eq!(reason, "Descendant object has a key without current ancestor")
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn explicit_ancestor_is_applied_to_the_root() {
    let fx = fixture();
    let owner = test_key("owner");
    let child = ChildEntity::named("orphan");

    fx.template.save(&child, Some(&owner)).unwrap();

    let key = child.read().id.clone().unwrap();
    assert!(key.has_ancestor(&owner));
}

#[test]
fn references_are_saved_and_stored_as_keys() {
    let fx = fixture();
    let a = TestEntity::new("a", "red", 1, 1);
    let b = TestEntity::new("b", "blue", 2, 2);
    let c = TestEntity::new("c", "green", 3, 3);
    a.write().singular_reference = Some(b.clone());
    a.write().multiple_reference = vec![b.clone(), c.clone()];

    fx.template.save(&a, None).unwrap();

    let stored = fx.client.store.get(&test_key("a")).unwrap();
    assert_eq!(
        stored.property("singular_reference"),
        Some(&Value::Key(test_key("b")))
    );
    assert_eq!(
        stored.property("multiple_reference"),
        Some(&Value::List(vec![
            Value::Key(test_key("b")),
            Value::Key(test_key("c")),
        ]))
    );
    // b 只写入一次
    assert_eq!(fx.client.puts(), vec![vec![test_key("b"), test_key("c"), test_key("a")]]);
}

#[test]
fn parent_descendants_and_reference_share_one_put() {
    let fx = fixture();
    let parent = TestEntity::new("parent", "red", 1, 1);
    let referenced = TestEntity::new("referenced", "blue", 2, 2);
    {
        let mut p = parent.write();
        p.child_entities.push_back(ChildEntity::named("first"));
        p.child_entities.push_back(ChildEntity::named("second"));
        p.singular_reference = Some(referenced.clone());
    }

    fx.template.save(&parent, None).unwrap();

    let puts = fx.client.puts();
    assert_eq!(puts.len(), 1);
    let mut expected: BTreeSet<Key> = parent
        .read()
        .child_entities
        .iter()
        .map(|child| child.read().id.clone().unwrap())
        .collect();
    expected.insert(test_key("parent"));
    expected.insert(test_key("referenced"));
    assert_eq!(puts[0].len(), 4);
    assert_eq!(puts[0].iter().cloned().collect::<BTreeSet<_>>(), expected);
    assert_eq!(fx.client.store.len(), 4);

    let stored = fx.client.store.get(&test_key("parent")).unwrap();
    assert_eq!(
        stored.property("singular_reference"),
        Some(&Value::Key(test_key("referenced")))
    );
}

#[test]
fn cyclic_graphs_terminate() {
    let fx = fixture();
    let a = TestEntity::new("a", "red", 1, 1);
    let b = TestEntity::new("b", "blue", 2, 2);
    a.write().singular_reference = Some(b.clone());
    b.write().singular_reference = Some(a.clone());
    a.write().multiple_reference = vec![a.clone()];

    fx.template.save(&a, None).unwrap();

    assert_eq!(fx.client.store.len(), 2);
    let stored_b = fx.client.store.get(&test_key("b")).unwrap();
    assert_eq!(
        stored_b.property("singular_reference"),
        Some(&Value::Key(test_key("a")))
    );
    let stored_a = fx.client.store.get(&test_key("a")).unwrap();
    assert_eq!(
        stored_a.property("multiple_reference"),
        Some(&Value::List(vec![Value::Key(test_key("a"))]))
    );
}

#[test]
fn writes_are_split_by_max_write_size() {
    let fx = fixture();
    let template = fx.template.clone().with_max_write_size(2);
    let entities: Vec<_> = (0..5)
        .map(|i| TestEntity::new(&format!("key{i}"), "red", i, i))
        .collect();

    template.save_all(&entities).unwrap();

    let sizes: Vec<usize> = fx.client.puts().iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![2, 2, 1]);
    assert_eq!(fx.client.store.len(), 5);
}

#[test]
fn zero_max_write_size_fails_before_any_write() {
    let fx = fixture();
    let template = fx.template.clone().with_max_write_size(0);

    let err = template
        .save(&TestEntity::new("key0", "red", 1, 1), None)
        .unwrap_err();
    assert!(matches!(err, DatastoreError::IllegalArgument { .. }));
    assert!(fx.client.puts().is_empty());
}

#[test]
fn unsigned_values_beyond_i64_fail_before_any_write() -> anyhow::Result<()> {
    let fx = fixture();
    let overflow = EntityRef::new(Counter {
        id: Some("overflow".into()),
        hits: u64::MAX,
    });

    let err = fx.template.save(&overflow, None).unwrap_err();
    assert!(matches!(err, DatastoreError::DataAccess { .. }));
    assert!(fx.client.puts().is_empty());
    assert_eq!(fx.client.store.len(), 0);

    let edge = EntityRef::new(Counter {
        id: Some("edge".into()),
        hits: i64::MAX as u64,
    });
    fx.template.save(&edge, None)?;
    let loaded = fx
        .template
        .find_by_id::<Counter>("edge")?
        .expect("saved counter");
    assert_eq!(loaded.read().hits, i64::MAX as u64);
    Ok(())
}

#[test]
fn unresolved_lazy_references_keep_their_keys() {
    let fx = fixture();
    let c = TestEntity::new("c", "red", 1, 1);
    let d = TestEntity::new("d", "blue", 2, 2);
    c.write().lazy_multiple_reference.set(vec![d.clone()]);
    fx.template.save(&c, None).unwrap();

    let loaded = fx
        .template
        .find_by_id::<TestEntity>("c")
        .unwrap()
        .unwrap();
    assert!(!loaded.read().lazy_multiple_reference.is_resolved());
    fx.client.reset();

    fx.template.save(&loaded, None).unwrap();

    // 只写回 c 自身，且不读取 d
    assert_eq!(fx.client.puts(), vec![vec![test_key("c")]]);
    assert!(fx.client.fetches().is_empty());
    assert!(!loaded.read().lazy_multiple_reference.is_resolved());
    let stored = fx.client.store.get(&test_key("c")).unwrap();
    assert_eq!(
        stored.property("lazy_multiple_reference"),
        Some(&Value::List(vec![Value::Key(test_key("d"))]))
    );

    // 解析之后目标参与级联保存
    loaded.read().lazy_multiple_reference.items().unwrap();
    fx.client.reset();
    fx.template.save(&loaded, None).unwrap();
    assert_eq!(fx.client.puts(), vec![vec![test_key("d"), test_key("c")]]);
}

#[test]
fn save_publishes_before_and_after_events() {
    let fx = fixture();
    let entity = TestEntity::new("key0", "red", 1, 1);
    entity
        .write()
        .child_entities
        .push_back(ChildEntity::named("kid"));

    fx.template.save(&entity, None).unwrap();

    let events = fx.events.events();
    assert_eq!(fx.events.names(), vec!["BeforeSave", "AfterSave"]);
    match &events[1] {
        DatastoreEvent::AfterSave { entities, objects } => {
            assert_eq!(entities.len(), 2);
            assert_eq!(objects.len(), 1);
            assert!(objects.downcast::<TestEntity>()[0].ptr_eq(&entity));
        }
        other => panic!("unexpected {other:?}"),
    }
}
