use datastore_core::mapping::{IdKind, IdValue, Persistent};
use datastore_macros::entity;

#[entity(kind = "fruit")]
struct Fruit {
    id: Option<i64>,
    color: String,
    weight: f64,
}

fn main() {
    let descriptor = Fruit::describe();
    assert_eq!(descriptor.kind(), "fruit");
    assert_eq!(descriptor.id_kind(), Some(IdKind::Id));
    assert_eq!(descriptor.properties().len(), 2);

    let fruit = Fruit {
        id: Some(3),
        ..Default::default()
    };
    assert_eq!(fruit.id_value(), Some(IdValue::Id(3)));
    let _ = format!("{fruit:?}");
}
