#![allow(dead_code)]

use datastore_core::client::{DatastoreClient, DatastoreReaderWriter, InMemoryDatastore, QueryResults};
use datastore_core::entity::Entity;
use datastore_core::error::DatastoreResult;
use datastore_core::event::{DatastoreEvent, EventPublisher};
use datastore_core::key::{IncompleteKey, Key};
use datastore_core::lazy::{LazyList, LazyRef};
use datastore_core::mapping::EntityRef;
use datastore_core::query::Query;
use datastore_core::template::DatastoreTemplate;
use datastore_macros::entity;
use std::collections::LinkedList;
use std::sync::{Arc, Mutex};

#[entity(kind = "custom_test_kind")]
pub struct TestEntity {
    pub id: Option<String>,
    pub color: String,
    pub int_field: i64,
    #[field(name = "prop")]
    pub sort_property: i64,
    #[descendants]
    pub child_entities: LinkedList<EntityRef<ChildEntity>>,
    #[reference]
    pub singular_reference: Option<EntityRef<TestEntity>>,
    #[reference]
    pub multiple_reference: Vec<EntityRef<TestEntity>>,
    #[lazy_reference]
    pub lazy_multiple_reference: LazyList<TestEntity>,
}

impl TestEntity {
    pub fn new(id: &str, color: &str, int_field: i64, sort_property: i64) -> EntityRef<Self> {
        EntityRef::new(Self {
            id: Some(id.to_string()),
            color: color.to_string(),
            int_field,
            sort_property,
            ..Default::default()
        })
    }
}

#[entity(kind = "child_entity")]
pub struct ChildEntity {
    pub id: Option<Key>,
    pub name: String,
}

impl ChildEntity {
    pub fn named(name: &str) -> EntityRef<Self> {
        EntityRef::new(Self {
            id: None,
            name: name.to_string(),
        })
    }
}

#[entity(
    kind = "test_kind",
    discriminator_field = "discrimination_field",
    discriminator_value = "A"
)]
pub struct SimpleDiscriminationTestEntity {
    pub id: Option<i64>,
    pub int_field: i64,
}

#[entity]
pub struct ReferenceTestEntity {
    pub id: Option<i64>,
    pub label: String,
    #[reference]
    pub sibling: Option<EntityRef<ReferenceTestEntity>>,
    #[lazy_reference]
    pub lazy_children: LazyList<ReferenceTestEntity>,
    #[lazy_reference]
    pub lazy_child: LazyRef<ReferenceTestEntity>,
}

impl ReferenceTestEntity {
    pub fn labeled(label: &str) -> EntityRef<Self> {
        EntityRef::new(Self {
            label: label.to_string(),
            ..Default::default()
        })
    }
}

/// 记录每次存储调用的客户端
#[derive(Default)]
pub struct RecordingClient {
    pub store: InMemoryDatastore,
    puts: Mutex<Vec<Vec<Key>>>,
    fetches: Mutex<Vec<Vec<Key>>>,
    runs: Mutex<Vec<Query>>,
    deletes: Mutex<Vec<Vec<Key>>>,
}

impl RecordingClient {
    pub fn puts(&self) -> Vec<Vec<Key>> {
        self.puts.lock().unwrap().clone()
    }

    pub fn fetches(&self) -> Vec<Vec<Key>> {
        self.fetches.lock().unwrap().clone()
    }

    pub fn runs(&self) -> Vec<Query> {
        self.runs.lock().unwrap().clone()
    }

    pub fn deletes(&self) -> Vec<Vec<Key>> {
        self.deletes.lock().unwrap().clone()
    }

    pub fn reset(&self) {
        self.puts.lock().unwrap().clear();
        self.fetches.lock().unwrap().clear();
        self.runs.lock().unwrap().clear();
        self.deletes.lock().unwrap().clear();
    }
}

impl DatastoreReaderWriter for RecordingClient {
    fn fetch(&self, keys: &[Key]) -> DatastoreResult<Vec<Option<Entity>>> {
        self.fetches.lock().unwrap().push(keys.to_vec());
        self.store.fetch(keys)
    }

    fn put(&self, entities: &[Entity]) -> DatastoreResult<()> {
        self.puts
            .lock()
            .unwrap()
            .push(entities.iter().map(|e| e.key().clone()).collect());
        self.store.put(entities)
    }

    fn delete(&self, keys: &[Key]) -> DatastoreResult<()> {
        self.deletes.lock().unwrap().push(keys.to_vec());
        self.store.delete(keys)
    }

    fn run(&self, query: &Query) -> DatastoreResult<QueryResults> {
        self.runs.lock().unwrap().push(query.clone());
        self.store.run(query)
    }
}

impl DatastoreClient for RecordingClient {
    fn allocate_id(&self, key: &IncompleteKey) -> DatastoreResult<Key> {
        self.store.allocate_id(key)
    }

    fn run_in_transaction(
        &self,
        work: &mut dyn FnMut(Arc<dyn DatastoreReaderWriter>) -> DatastoreResult<()>,
    ) -> DatastoreResult<()> {
        self.store.run_in_transaction(work)
    }
}

#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<DatastoreEvent>>,
}

impl RecordingPublisher {
    pub fn events(&self) -> Vec<DatastoreEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(DatastoreEvent::name).collect()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl EventPublisher for RecordingPublisher {
    fn publish(&self, event: &DatastoreEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

pub struct Fixture {
    pub client: Arc<RecordingClient>,
    pub events: Arc<RecordingPublisher>,
    pub template: DatastoreTemplate,
}

pub fn fixture() -> Fixture {
    let client = Arc::new(RecordingClient::default());
    let events = Arc::new(RecordingPublisher::default());
    let template =
        DatastoreTemplate::from_client(client.clone()).with_event_publisher(events.clone());
    Fixture {
        client,
        events,
        template,
    }
}

pub fn test_key(name: &str) -> Key {
    Key::new("custom_test_kind", name)
}
