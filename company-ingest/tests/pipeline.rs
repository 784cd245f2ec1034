use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert_json_diff::assert_json_eq;
use async_trait::async_trait;
use company_common::health::HealthRegistry;
use company_common::kafka::{OffsetErr, RecvErr};
use company_common::store::{DocumentStore, MemoryStore, StoreCall, StoreError, WriteResult};
use company_ingest::consumer::{self, MessageSource};
use company_ingest::identifier::DocumentId;
use company_ingest::merge::merge;
use company_ingest::normalize::normalize;
use company_ingest::pipeline::{Outcome, Pipeline};
use company_ingest::reference::ReferenceData;
use company_ingest::upsert::{UpsertOutcome, Upserter};
use rdkafka::error::KafkaError;
use serde_json::{json, Value};
use tokio::sync::Notify;

const INDEX: &str = "company";

const REFERENCE: &str = "\
domain,company_commercial_name,company_legal_name,company_all_available_names
acme.com,Acme,Acme Inc,Acme | Acme Inc
globex.com,Globex,Globex Corporation,Globex
";

fn reference() -> Arc<ReferenceData> {
    Arc::new(ReferenceData::from_reader(REFERENCE.as_bytes()).unwrap())
}

fn pipeline(store: &MemoryStore) -> Pipeline {
    Pipeline::new(
        reference(),
        Upserter::new(Arc::new(store.clone()), INDEX, true),
    )
}

fn acme_id() -> String {
    DocumentId::from_domain("acme.com").to_string()
}

#[tokio::test]
async fn scenario_a_event_enriched_with_reference() -> anyhow::Result<()> {
    let store = MemoryStore::new();

    let outcome = pipeline(&store)
        .process(br#"{"domain": "acme.com", "phone_number": "555-1234"}"#)
        .await;

    assert!(matches!(outcome, Outcome::Upserted { .. }));
    let stored = store
        .document(INDEX, &acme_id())
        .ok_or_else(|| anyhow::anyhow!("acme.com was not stored"))?;
    assert_json_eq!(
        stored,
        json!({
            "domain": "acme.com",
            "commercialName": "Acme",
            "legalName": "Acme Inc",
            "availableNames": ["Acme", "Acme Inc"],
            "phoneNumber": "555-1234",
        })
    );
    Ok(())
}

#[tokio::test]
async fn scenario_b_empty_phone_leaves_stored_value() {
    let store = MemoryStore::new();
    let pipeline = pipeline(&store);

    pipeline
        .process(br#"{"domain": "acme.com", "phone_number": "555-1234"}"#)
        .await;
    for phone in [r#""""#, r#""  ""#, "null"] {
        let payload = format!(r#"{{"domain": "acme.com", "phone_number": {phone}}}"#);
        pipeline.process(payload.as_bytes()).await;
    }

    let stored = store.document(INDEX, &acme_id()).unwrap();
    assert_eq!(stored["phoneNumber"], json!("555-1234"));
    for call in store.writes().iter().skip(1) {
        let StoreCall::Update { partial, .. } = call else {
            panic!("unexpected write {call:?}");
        };
        assert!(partial.get("phoneNumber").is_none());
    }
}

#[tokio::test]
async fn scenario_c_unparsable_payload_is_skipped() {
    let store = MemoryStore::new();

    let outcome = pipeline(&store).process(b"{\"domain\": \"acme.com\"").await;

    assert!(matches!(outcome, Outcome::Dropped(_)));
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn scenario_d_not_found_update_creates_full_document() {
    let store = MemoryStore::new().without_upsert();
    let pipeline = Pipeline::new(
        reference(),
        Upserter::new(Arc::new(store.clone()), INDEX, true),
    );

    let outcome = pipeline
        .process(br#"{"domain": "acme.com", "facebook_url": "", "website": "https://acme.com"}"#)
        .await;

    assert!(matches!(
        outcome,
        Outcome::Upserted {
            outcome: UpsertOutcome::CreatedAfterNotFound,
            ..
        }
    ));
    let writes = store.writes();
    assert_eq!(writes.len(), 2);
    let StoreCall::Create { id, document, .. } = &writes[1] else {
        panic!("expected a create, got {:?}", writes[1]);
    };
    assert_eq!(id, &acme_id());
    assert_json_eq!(
        document,
        json!({
            "domain": "acme.com",
            "commercialName": "Acme",
            "legalName": "Acme Inc",
            "availableNames": ["Acme", "Acme Inc"],
            "facebook": "",
            "website": "https://acme.com",
        })
    );
}

#[tokio::test]
async fn unknown_domains_are_never_written() {
    let store = MemoryStore::new();

    let outcome = pipeline(&store)
        .process(br#"{"domain": "initech.com", "phone_number": "555-0000"}"#)
        .await;

    assert!(matches!(outcome, Outcome::Dropped(_)));
    assert!(store.is_empty());
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn replaying_an_event_is_idempotent() {
    let store = MemoryStore::new();
    let pipeline = pipeline(&store);
    let payload = br#"{"domain": "globex.com", "address": "1 Globex Way", "website": "https://globex.com"}"#;

    pipeline.process(payload).await;
    let once = store.document(INDEX, &DocumentId::from_domain("globex.com").to_string());
    let again = pipeline.process(payload).await;
    let twice = store.document(INDEX, &DocumentId::from_domain("globex.com").to_string());

    assert!(once.is_some());
    assert_eq!(once, twice);
    match again {
        Outcome::Upserted { outcome, .. } => assert_eq!(outcome.result(), WriteResult::Unchanged),
        other => panic!("expected an upsert, got {other:?}"),
    }
}

#[tokio::test]
async fn later_events_keep_fields_they_do_not_carry() {
    let store = MemoryStore::new();
    let pipeline = pipeline(&store);

    pipeline
        .process(br#"{"domain": "acme.com", "phone_number": "555-1234", "address": "Main St"}"#)
        .await;
    pipeline
        .process(br#"{"domain": "acme.com", "website": "https://acme.com", "address": "Side St"}"#)
        .await;

    let stored = store.document(INDEX, &acme_id()).unwrap();
    assert_eq!(stored["phoneNumber"], json!("555-1234"));
    assert_eq!(stored["website"], json!("https://acme.com"));
    assert_eq!(stored["address"], json!("Side St"));
    assert_eq!(stored["legalName"], json!("Acme Inc"));
}

#[test]
fn empty_facebook_url_replaces_facebook_in_merged_record() {
    let reference = reference();
    let event = normalize(br#"{"domain": "acme.com", "facebook_url": ""}"#).unwrap();

    let merged = merge(reference.get("acme.com"), event).unwrap();

    assert_eq!(merged.facebook.as_deref(), Some(""));
    // Partial updates never carry it, so a stored value survives
    assert!(merged.to_update_document().get("facebook").is_none());
}

/// A source fed from a queue of canned receive results. Offsets are the
/// positions of the messages in the queue.
#[derive(Default)]
struct VecSource {
    messages: Mutex<VecDeque<Result<Vec<u8>, RecvErr>>>,
    next_offset: Mutex<usize>,
    stored: Mutex<Vec<usize>>,
}

impl VecSource {
    fn new(messages: Vec<Result<&str, RecvErr>>) -> Self {
        let messages = messages
            .into_iter()
            .map(|message| message.map(|payload| payload.as_bytes().to_vec()))
            .collect();
        Self {
            messages: Mutex::new(messages),
            ..Default::default()
        }
    }

    fn stored(&self) -> Vec<usize> {
        self.stored.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageSource for VecSource {
    type Offset = usize;

    async fn recv(&self) -> Result<Option<(Vec<u8>, usize)>, RecvErr> {
        let Some(message) = self.messages.lock().unwrap().pop_front() else {
            return Ok(None);
        };
        let mut next_offset = self.next_offset.lock().unwrap();
        let offset = *next_offset;
        *next_offset += 1;
        message.map(|payload| Some((payload, offset)))
    }

    fn store_offset(&self, offset: usize) -> Result<(), OffsetErr> {
        self.stored.lock().unwrap().push(offset);
        Ok(())
    }
}

#[tokio::test]
async fn loop_continues_past_bad_messages() {
    let store = MemoryStore::new();
    let pipeline = pipeline(&store);
    let registry = HealthRegistry::new("liveness");
    let liveness = registry.register("worker", time::Duration::seconds(30));
    let source = VecSource::new(vec![
        Ok("garbage"),
        Err(RecvErr::Empty {
            partition: 0,
            offset: 1,
        }),
        Ok(r#"{"domain": "initech.com"}"#),
        Ok(r#"{"domain": "acme.com", "phone_number": "555-1234"}"#),
    ]);

    consumer::run(
        &source,
        &pipeline,
        &liveness,
        Duration::from_secs(10),
        std::future::pending(),
    )
    .await
    .unwrap();

    // Processed messages have their offsets stored, failures included
    assert_eq!(source.stored(), vec![0, 2, 3]);
    assert_eq!(store.len(), 1);
    assert!(registry.get_status().healthy);
}

#[tokio::test]
async fn transport_errors_stop_the_loop() {
    let store = MemoryStore::new();
    let pipeline = pipeline(&store);
    let registry = HealthRegistry::new("liveness");
    let liveness = registry.register("worker", time::Duration::seconds(30));
    let source = VecSource::new(vec![
        Err(RecvErr::Kafka(KafkaError::NoMessageReceived)),
        Ok(r#"{"domain": "acme.com"}"#),
    ]);

    let result = consumer::run(
        &source,
        &pipeline,
        &liveness,
        Duration::from_secs(10),
        std::future::pending(),
    )
    .await;

    assert!(matches!(result, Err(RecvErr::Kafka(_))));
    assert!(store.is_empty());
    assert!(source.stored().is_empty());
}

#[tokio::test]
async fn shutdown_stops_before_the_next_message() {
    let store = MemoryStore::new();
    let pipeline = pipeline(&store);
    let registry = HealthRegistry::new("liveness");
    let liveness = registry.register("worker", time::Duration::seconds(30));
    let source = VecSource::new(vec![Ok(r#"{"domain": "acme.com"}"#)]);

    consumer::run(
        &source,
        &pipeline,
        &liveness,
        Duration::from_secs(10),
        std::future::ready(()),
    )
    .await
    .unwrap();

    assert!(store.calls().is_empty());
    assert!(source.stored().is_empty());
}

/// Forwards to a [`MemoryStore`] and signals once each update has landed.
struct SignallingStore {
    inner: MemoryStore,
    updated: Arc<Notify>,
}

#[async_trait]
impl DocumentStore for SignallingStore {
    async fn update(
        &self,
        index: &str,
        id: &str,
        partial: &Value,
        upsert: Option<&Value>,
    ) -> Result<WriteResult, StoreError> {
        let result = self.inner.update(index, id, partial, upsert).await;
        self.updated.notify_one();
        result
    }

    async fn create(&self, index: &str, id: &str, document: &Value) -> Result<(), StoreError> {
        self.inner.create(index, id, document).await
    }

    async fn get(&self, index: &str, id: &str) -> Result<Option<Value>, StoreError> {
        self.inner.get(index, id).await
    }

    async fn search(
        &self,
        index: &str,
        query: &Value,
        size: usize,
    ) -> Result<Vec<Value>, StoreError> {
        self.inner.search(index, query, size).await
    }
}

#[tokio::test]
async fn shutdown_lets_the_current_message_finish() {
    let store = MemoryStore::new();
    let updated = Arc::new(Notify::new());
    let pipeline = Pipeline::new(
        reference(),
        Upserter::new(
            Arc::new(SignallingStore {
                inner: store.clone(),
                updated: updated.clone(),
            }),
            INDEX,
            true,
        ),
    );
    let registry = HealthRegistry::new("liveness");
    let liveness = registry.register("worker", time::Duration::seconds(30));
    let source = VecSource::new(vec![
        Ok(r#"{"domain": "acme.com", "phone_number": "555-1234"}"#),
        Ok(r#"{"domain": "globex.com", "phone_number": "212-0000"}"#),
    ]);

    // Shutdown is requested while the first message is being written
    consumer::run(
        &source,
        &pipeline,
        &liveness,
        Duration::from_secs(10),
        async move { updated.notified().await },
    )
    .await
    .unwrap();

    assert_eq!(source.stored(), vec![0]);
    assert_eq!(store.len(), 1);
    assert_eq!(
        store.document(INDEX, &acme_id()).unwrap()["phoneNumber"],
        json!("555-1234")
    );
}
