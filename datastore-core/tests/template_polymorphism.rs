mod common;

use common::fixture;
use datastore_core::error::DatastoreError;
use datastore_core::mapping::EntityRef;
use datastore_core::template::DatastoreTemplate;
use datastore_macros::entity;

#[entity(kind = "pet", discriminator_field = "pet_type")]
struct AnyPet {
    id: Option<i64>,
    name: String,
}

#[entity(kind = "pet", discriminator_field = "pet_type", discriminator_value = "dog")]
struct Dog {
    id: Option<i64>,
    name: String,
    good: bool,
}

#[entity(kind = "pet", discriminator_field = "pet_type", discriminator_value = "cat")]
struct Cat {
    id: Option<i64>,
    name: String,
    lives: i64,
}

fn seed(fx: &common::Fixture) -> (i64, i64) {
    let dog = EntityRef::new(Dog {
        id: None,
        name: "rex".into(),
        good: true,
    });
    let cat = EntityRef::new(Cat {
        id: None,
        name: "tom".into(),
        lives: 9,
    });
    fx.template.save(&dog, None).unwrap();
    fx.template.save(&cat, None).unwrap();
    let dog_id = dog.read().id.unwrap();
    let cat_id = cat.read().id.unwrap();
    (dog_id, cat_id)
}

#[test]
fn subtype_queries_filter_on_their_discriminator() {
    let fx = fixture();
    seed(&fx);

    let dogs = fx.template.find_all::<Dog>(None).unwrap();
    assert_eq!(dogs.len(), 1);
    assert_eq!(dogs[0].read().name, "rex");
    assert!(dogs[0].read().good);

    let cats = fx.template.find_all::<Cat>(None).unwrap();
    assert_eq!(cats.len(), 1);
    assert_eq!(cats[0].read().lives, 9);
    assert_eq!(fx.template.count::<Cat>().unwrap(), 1);
}

#[test]
fn base_type_reads_every_subtype() {
    let fx = fixture();
    seed(&fx);

    let mut names: Vec<_> = fx
        .template
        .find_all::<AnyPet>(None)
        .unwrap()
        .iter()
        .map(|p| p.read().name.clone())
        .collect();
    names.sort();
    assert_eq!(names, vec!["rex", "tom"]);
}

#[test]
fn reading_a_sibling_subtype_is_a_type_mismatch() {
    let fx = fixture();
    let (dog_id, cat_id) = seed(&fx);

    assert!(fx.template.find_by_id::<Dog>(dog_id).unwrap().is_some());
    let err = fx.template.find_by_id::<Dog>(cat_id).unwrap_err();
    assert!(matches!(err, DatastoreError::TypeMismatch { .. }));
}

#[test]
fn sibling_mismatch_does_not_depend_on_registered_types() {
    let fx = fixture();
    let (dog_id, cat_id) = seed(&fx);

    // 新模板的映射上下文从未见过 Cat
    let fresh = DatastoreTemplate::from_client(fx.client.clone());
    let err = fresh.find_by_id::<Dog>(cat_id).unwrap_err();
    match err {
        DatastoreError::TypeMismatch { found, .. } => assert_eq!(found, "pet with pet_type=cat"),
        other => panic!("unexpected {other:?}"),
    }
    assert!(fresh.find_all_by_id::<Dog>([cat_id]).is_err());
    assert_eq!(fresh.find_by_id::<Dog>(dog_id).unwrap().unwrap().read().name, "rex");

    // 登记之后报告具体子类型
    fresh.mapping_context().register::<Cat>().unwrap();
    match fresh.find_by_id::<Dog>(cat_id).unwrap_err() {
        DatastoreError::TypeMismatch { found, .. } => assert!(found.ends_with("Cat")),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn conflicting_discriminator_values_are_rejected() {
    #[entity(kind = "pet", discriminator_field = "pet_type", discriminator_value = "dog")]
    struct Wolf {
        id: Option<i64>,
    }

    let fx = fixture();
    fx.template.mapping_context().register::<Dog>().unwrap();
    let err = fx.template.mapping_context().register::<Wolf>().unwrap_err();
    assert!(matches!(err, DatastoreError::Mapping { .. }));
}
