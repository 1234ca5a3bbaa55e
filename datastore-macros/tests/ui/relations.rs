use datastore_core::key::Key;
use datastore_core::lazy::LazyList;
use datastore_core::mapping::{EntityRef, Persistent, RelationKind};
use datastore_macros::entity;

#[entity(kind = "order_line")]
struct OrderLine {
    id: Option<Key>,
    sku: String,
}

#[entity]
struct Customer {
    #[id]
    name: Option<String>,
}

#[entity(kind = "order")]
struct Order {
    id: Option<i64>,
    #[field(name = "order_no")]
    number: String,
    #[descendants]
    lines: Vec<EntityRef<OrderLine>>,
    #[reference(name = "buyer")]
    customer: Option<EntityRef<Customer>>,
    #[lazy_reference]
    previous: LazyList<Order>,
}

fn main() {
    let descriptor = Order::describe();
    assert_eq!(descriptor.property_name_for("number"), Some("order_no"));
    assert_eq!(descriptor.property_name_for("customer"), Some("buyer"));

    let kinds: Vec<RelationKind> = descriptor.relations().iter().map(|r| r.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            RelationKind::Descendant,
            RelationKind::Reference,
            RelationKind::LazyReference,
        ]
    );
    assert_eq!(Customer::describe().kind(), "customer");
}
