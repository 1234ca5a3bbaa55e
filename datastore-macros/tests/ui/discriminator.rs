use datastore_core::mapping::Persistent;
use datastore_macros::entity;

#[entity(kind = "pet", discriminator_field = "pet_type", discriminator_value = "dog")]
struct Dog {
    id: Option<i64>,
    name: String,
}

fn main() {
    let descriptor = Dog::describe();
    let discrimination = descriptor.discrimination().unwrap();
    assert_eq!(discrimination.field(), "pet_type");
    assert_eq!(discrimination.value(), Some("dog"));
}
