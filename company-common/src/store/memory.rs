use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{DocumentStore, StoreError, WriteResult};

/// A request received by a [`MemoryStore`], in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    Update {
        index: String,
        id: String,
        partial: Value,
        upsert: Option<Value>,
    },
    Create {
        index: String,
        id: String,
        document: Value,
    },
    Get {
        index: String,
        id: String,
    },
    Search {
        index: String,
        query: Value,
    },
}

#[derive(Default)]
struct State {
    documents: BTreeMap<(String, String), Map<String, Value>>,
    calls: Vec<StoreCall>,
    ignore_upsert: bool,
    fail_with: Option<u16>,
}

/// An in-process document store with the same update, create and lookup
/// semantics as the real one, recording every call it receives.
///
/// `search` understands the subset of the query DSL the lookup API emits:
/// `bool` with `must`/`should`/`minimum_should_match`, `match` and `match_all`.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Behave like a store without upsert support: updates on a missing
    /// document are always reported as not found, upsert body or not.
    pub fn without_upsert(self) -> Self {
        self.lock().ignore_upsert = true;
        self
    }

    /// Reject every subsequent request with the given status.
    pub fn fail_with_status(&self, status: u16) {
        self.lock().fail_with = Some(status);
    }

    pub fn insert(&self, index: &str, id: &str, document: Value) {
        let fields = match document {
            Value::Object(fields) => fields,
            _ => Map::new(),
        };
        self.lock()
            .documents
            .insert((index.to_owned(), id.to_owned()), fields);
    }

    pub fn document(&self, index: &str, id: &str) -> Option<Value> {
        self.lock()
            .documents
            .get(&(index.to_owned(), id.to_owned()))
            .cloned()
            .map(Value::Object)
    }

    pub fn len(&self) -> usize {
        self.lock().documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().calls.clone()
    }

    /// Calls that could have changed stored state.
    pub fn writes(&self) -> Vec<StoreCall> {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call, StoreCall::Update { .. } | StoreCall::Create { .. }))
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // A panicking test thread is the only way to poison this lock
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn rejection(status: u16) -> StoreError {
    StoreError::Rejected {
        status,
        body: "injected failure".to_owned(),
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn update(
        &self,
        index: &str,
        id: &str,
        partial: &Value,
        upsert: Option<&Value>,
    ) -> Result<WriteResult, StoreError> {
        let mut state = self.lock();
        state.calls.push(StoreCall::Update {
            index: index.to_owned(),
            id: id.to_owned(),
            partial: partial.clone(),
            upsert: upsert.cloned(),
        });
        if let Some(status) = state.fail_with {
            return Err(rejection(status));
        }

        let upsert = upsert.filter(|_| !state.ignore_upsert);
        let fields = partial.as_object().cloned().unwrap_or_default();
        let key = (index.to_owned(), id.to_owned());

        match state.documents.get_mut(&key) {
            Some(existing) => {
                let mut changed = false;
                for (field, value) in fields {
                    if existing.get(&field) != Some(&value) {
                        existing.insert(field, value);
                        changed = true;
                    }
                }
                Ok(if changed {
                    WriteResult::Updated
                } else {
                    WriteResult::Unchanged
                })
            }
            None => match upsert {
                Some(document) => {
                    let created = document.as_object().cloned().unwrap_or_default();
                    state.documents.insert(key, created);
                    Ok(WriteResult::Created)
                }
                None => Err(StoreError::NotFound {
                    index: index.to_owned(),
                    id: id.to_owned(),
                }),
            },
        }
    }

    async fn create(&self, index: &str, id: &str, document: &Value) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.calls.push(StoreCall::Create {
            index: index.to_owned(),
            id: id.to_owned(),
            document: document.clone(),
        });
        if let Some(status) = state.fail_with {
            return Err(rejection(status));
        }

        let key = (index.to_owned(), id.to_owned());
        if state.documents.contains_key(&key) {
            return Err(StoreError::Conflict {
                index: index.to_owned(),
                id: id.to_owned(),
            });
        }
        state
            .documents
            .insert(key, document.as_object().cloned().unwrap_or_default());
        Ok(())
    }

    async fn get(&self, index: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let mut state = self.lock();
        state.calls.push(StoreCall::Get {
            index: index.to_owned(),
            id: id.to_owned(),
        });
        if let Some(status) = state.fail_with {
            return Err(rejection(status));
        }

        Ok(state
            .documents
            .get(&(index.to_owned(), id.to_owned()))
            .cloned()
            .map(Value::Object))
    }

    async fn search(
        &self,
        index: &str,
        query: &Value,
        size: usize,
    ) -> Result<Vec<Value>, StoreError> {
        let mut state = self.lock();
        state.calls.push(StoreCall::Search {
            index: index.to_owned(),
            query: query.clone(),
        });
        if let Some(status) = state.fail_with {
            return Err(rejection(status));
        }

        Ok(state
            .documents
            .iter()
            .filter(|((doc_index, _), _)| doc_index == index)
            .filter(|(_, fields)| matches_query(query, fields))
            .take(size)
            .map(|(_, fields)| Value::Object(fields.clone()))
            .collect())
    }
}

fn clauses(value: Option<&Value>) -> Vec<&Value> {
    match value {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(clause @ Value::Object(_)) => vec![clause],
        _ => vec![],
    }
}

fn matches_query(query: &Value, document: &Map<String, Value>) -> bool {
    if let Some(bool_query) = query.get("bool") {
        let must = clauses(bool_query.get("must"));
        let should = clauses(bool_query.get("should"));
        let default_minimum = if must.is_empty() && !should.is_empty() {
            1
        } else {
            0
        };
        let minimum = bool_query
            .get("minimum_should_match")
            .and_then(Value::as_u64)
            .unwrap_or(default_minimum) as usize;

        let should_matched = should
            .iter()
            .filter(|clause| matches_query(clause, document))
            .count();

        return must.iter().all(|clause| matches_query(clause, document))
            && should_matched >= minimum;
    }

    if let Some(Value::Object(fields)) = query.get("match") {
        return fields.iter().all(|(field, expected)| {
            let expected = match expected {
                Value::Object(options) => options.get("query"),
                other => Some(other),
            };
            match (document.get(field), expected.and_then(Value::as_str)) {
                (Some(actual), Some(expected)) => field_matches(actual, expected),
                _ => false,
            }
        });
    }

    query.get("match_all").is_some()
}

fn tokens(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Full-text match: any query token appearing in the field is a hit.
fn field_matches(actual: &Value, expected: &str) -> bool {
    let wanted = tokens(expected);
    match actual {
        Value::String(text) => !tokens(text).is_disjoint(&wanted),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .any(|text| !tokens(text).is_disjoint(&wanted)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn update_merges_fields() {
        let store = MemoryStore::new();
        store.insert("company", "a", json!({"domain": "acme.com", "phoneNumber": "1"}));

        let result = store
            .update("company", "a", &json!({"website": "acme.com"}), None)
            .await
            .unwrap();

        assert_eq!(result, WriteResult::Updated);
        assert_eq!(
            store.document("company", "a"),
            Some(json!({"domain": "acme.com", "phoneNumber": "1", "website": "acme.com"}))
        );
    }

    #[tokio::test]
    async fn update_without_upsert_reports_missing() {
        let store = MemoryStore::new();

        let err = store
            .update("company", "a", &json!({"website": "acme.com"}), None)
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn store_without_upsert_ignores_the_flag() {
        let store = MemoryStore::new().without_upsert();

        let err = store
            .update(
                "company",
                "a",
                &json!({"website": "acme.com"}),
                Some(&json!({"website": "acme.com"})),
            )
            .await
            .unwrap_err();

        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn upsert_creates_from_the_upsert_body() {
        let store = MemoryStore::new();

        let result = store
            .update(
                "company",
                "a",
                &json!({"domain": "acme.com"}),
                Some(&json!({"domain": "acme.com", "legalName": ""})),
            )
            .await
            .unwrap();

        assert_eq!(result, WriteResult::Created);
        assert_eq!(
            store.document("company", "a"),
            Some(json!({"domain": "acme.com", "legalName": ""}))
        );
    }

    #[tokio::test]
    async fn create_conflicts_with_existing() {
        let store = MemoryStore::new();
        store.create("company", "a", &json!({})).await.unwrap();

        let err = store.create("company", "a", &json!({})).await.unwrap_err();

        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn search_matches_tokens_across_arrays() {
        let store = MemoryStore::new();
        store.insert(
            "company",
            "a",
            json!({"availableNames": ["Acme", "Acme Holdings"], "website": "acme.com"}),
        );
        store.insert("company", "b", json!({"availableNames": ["Globex"]}));

        let query = json!({"bool": {"must": [
            {"bool": {"should": [
                {"match": {"legalName": "holdings"}},
                {"match": {"availableNames": "holdings"}}
            ], "minimum_should_match": 1}},
            {"match": {"website": "acme.com"}}
        ]}});
        let hits = store.search("company", &query, 10).await.unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0]["website"], "acme.com");
    }

    #[tokio::test]
    async fn injected_failures_are_recorded() {
        let store = MemoryStore::new();
        store.fail_with_status(503);

        let err = store.get("company", "a").await.unwrap_err();

        assert!(matches!(err, StoreError::Rejected { status: 503, .. }));
        assert_eq!(store.calls().len(), 1);
    }
}
