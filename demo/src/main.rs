use datastore_core::client::InMemoryDatastore;
use datastore_core::error::DatastoreResult;
use datastore_core::event::BroadcastEventPublisher;
use datastore_core::key::Key;
use datastore_core::lazy::LazyRef;
use datastore_core::mapping::EntityRef;
use datastore_core::query::{Example, ExampleMatcher, QueryOptions, Sort};
use datastore_core::template::DatastoreTemplate;
use datastore_macros::entity;
use futures_util::{FutureExt, StreamExt};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use ulid::Ulid;

#[entity(kind = "customer")]
struct Customer {
    id: Option<String>,
    name: String,
    tier: String,
}

#[entity(kind = "order_line")]
struct OrderLine {
    id: Option<Key>,
    sku: String,
    quantity: i64,
}

#[entity(kind = "order")]
struct Order {
    id: Option<i64>,
    #[field(name = "order_no")]
    number: String,
    total_cents: i64,
    #[descendants]
    lines: Vec<EntityRef<OrderLine>>,
    #[reference]
    customer: Option<EntityRef<Customer>>,
    #[lazy_reference]
    previous: LazyRef<Order>,
}

fn line(sku: &str, quantity: i64) -> EntityRef<OrderLine> {
    EntityRef::new(OrderLine {
        id: None,
        sku: sku.to_string(),
        quantity,
    })
}

fn run(template: &DatastoreTemplate) -> DatastoreResult<()> {
    let customer = EntityRef::new(Customer {
        id: Some(Ulid::new().to_string()),
        name: "Ada".into(),
        tier: "gold".into(),
    });

    let first = EntityRef::new(Order {
        number: "A-1".into(),
        total_cents: 1_250,
        lines: vec![line("pencil", 5), line("paper", 1)],
        customer: Some(customer.clone()),
        ..Default::default()
    });
    template.save(&first, None)?;

    let second = EntityRef::new(Order {
        number: "A-2".into(),
        total_cents: 4_000,
        lines: vec![line("stapler", 1)],
        customer: Some(customer.clone()),
        previous: Some(first.clone()).into(),
        ..Default::default()
    });
    template.save(&second, None)?;

    let Some(id) = second.read().id else {
        return Ok(());
    };
    let Some(loaded) = template.find_by_id::<Order>(id)? else {
        return Ok(());
    };
    {
        let order = loaded.read();
        info!(
            number = %order.number,
            lines = order.lines.len(),
            customer = ?order.customer.as_ref().map(|c| c.read().name.clone()),
            previous_resolved = order.previous.is_resolved(),
            "loaded order"
        );
        if let Some(previous) = order.previous.target()? {
            info!(number = %previous.read().number, "previous order");
        }
    }

    let options = QueryOptions::builder()
        .sort(Sort::by(["total_cents"]))
        .build();
    for order in template.find_all::<Order>(Some(&options))? {
        let order = order.read();
        info!(number = %order.number, total_cents = order.total_cents, "order");
    }

    let probe = Customer {
        tier: "gold".into(),
        ..Default::default()
    };
    let matcher = ExampleMatcher::matching().with_ignore_paths(["name"]);
    let gold = template.query_by_example(Some(&Example::with_matcher(probe, matcher)), None)?;
    info!(count = gold.len(), "gold customers");

    let removed = template.delete_all::<Order>()?;
    info!(removed, remaining = template.count::<Order>()?, "orders deleted");
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    let publisher = Arc::new(BroadcastEventPublisher::new(64));
    let mut events = publisher.subscribe();
    let template = DatastoreTemplate::from_client(Arc::new(InMemoryDatastore::new()))
        .with_event_publisher(publisher.clone());

    if let Err(err) = run(&template) {
        eprintln!("demo failed: {err}");
        return;
    }

    // 事件已全部缓冲在广播通道中，逐个取出直到没有就绪事件
    let mut published = 0;
    while let Some(Some(event)) = events.next().now_or_never() {
        match event {
            Ok(event) => {
                published += 1;
                info!(event = event.name(), "lifecycle event");
            }
            Err(err) => eprintln!("event stream: {err}"),
        }
    }
    info!(published, "done");
}
