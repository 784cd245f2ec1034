use std::sync::Arc;

use company_common::store::WriteResult;
use tracing::{error, info, warn};

use crate::identifier::DocumentId;
use crate::merge::{merge, MergeError};
use crate::metrics_consts::{EVENTS_DROPPED, EVENTS_FAILED, EVENTS_UPSERTED};
use crate::normalize::{normalize, NormalizeError};
use crate::reference::ReferenceData;
use crate::upsert::{UpsertError, UpsertOutcome, Upserter};

#[derive(Debug)]
pub enum DropReason {
    Invalid(NormalizeError),
    Unmatched(MergeError),
}

impl DropReason {
    pub fn cause(&self) -> &'static str {
        match self {
            DropReason::Invalid(e) => e.cause(),
            DropReason::Unmatched(MergeError::UnknownDomain(_)) => "unknown_domain",
        }
    }
}

/// Terminal state of one message.
#[derive(Debug)]
pub enum Outcome {
    Upserted {
        id: DocumentId,
        outcome: UpsertOutcome,
    },
    Dropped(DropReason),
    Failed {
        id: DocumentId,
        error: UpsertError,
    },
}

/// Normalize, merge and upsert, one message at a time.
pub struct Pipeline {
    reference: Arc<ReferenceData>,
    upserter: Upserter,
}

impl Pipeline {
    pub fn new(reference: Arc<ReferenceData>, upserter: Upserter) -> Self {
        Self {
            reference,
            upserter,
        }
    }

    /// Every failure is logged and counted here and returned as an [`Outcome`];
    /// nothing a single message contains can stop the caller.
    pub async fn process(&self, payload: &[u8]) -> Outcome {
        let event = match normalize(payload) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "dropping invalid event");
                return dropped(DropReason::Invalid(e));
            }
        };

        let domain = event.domain.clone();
        let id = DocumentId::from_domain(&domain);

        let document = match merge(self.reference.get(&domain), event) {
            Ok(document) => document,
            Err(e) => {
                info!(domain = %domain, document_id = %id, error = %e, "dropping event");
                return dropped(DropReason::Unmatched(e));
            }
        };

        match self.upserter.apply(&id, &document).await {
            Ok(outcome) => {
                let result = match outcome.result() {
                    WriteResult::Created => "created",
                    WriteResult::Updated => "updated",
                    WriteResult::Unchanged => "unchanged",
                };
                metrics::counter!(EVENTS_UPSERTED, "result" => result).increment(1);
                info!(domain = %domain, document_id = %id, result, "company upserted");
                Outcome::Upserted { id, outcome }
            }
            Err(e) => {
                metrics::counter!(EVENTS_FAILED).increment(1);
                error!(
                    domain = %domain,
                    document_id = %id,
                    index = self.upserter.index(),
                    error = %e,
                    "failed to write company"
                );
                Outcome::Failed { id, error: e }
            }
        }
    }
}

fn dropped(reason: DropReason) -> Outcome {
    metrics::counter!(EVENTS_DROPPED, "cause" => reason.cause()).increment(1);
    Outcome::Dropped(reason)
}

#[cfg(test)]
mod tests {
    use company_common::store::MemoryStore;

    use super::*;
    use crate::reference::ReferenceRecord;

    fn pipeline(store: &MemoryStore) -> Pipeline {
        let reference = [ReferenceRecord {
            domain: "acme.com".to_owned(),
            commercial_name: "Acme".to_owned(),
            legal_name: "Acme Inc".to_owned(),
            available_names: vec!["Acme".to_owned()],
        }]
        .into_iter()
        .collect();
        Pipeline::new(
            Arc::new(reference),
            Upserter::new(Arc::new(store.clone()), "company", true),
        )
    }

    #[tokio::test]
    async fn upserts_known_domains() {
        let store = MemoryStore::new();

        let outcome = pipeline(&store)
            .process(br#"{"domain": "acme.com", "website": "https://acme.com"}"#)
            .await;

        match outcome {
            Outcome::Upserted { id, outcome } => {
                assert_eq!(id, DocumentId::from_domain("acme.com"));
                assert_eq!(outcome.result(), WriteResult::Created);
            }
            other => panic!("expected an upsert, got {other:?}"),
        }
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn drops_without_writing() {
        let store = MemoryStore::new();
        let pipeline = pipeline(&store);

        for (payload, cause) in [
            ("not json", "malformed"),
            (r#"["acme.com"]"#, "not_an_object"),
            (r#"{"website": "https://acme.com"}"#, "missing_domain"),
            (r#"{"domain": "initech.com"}"#, "unknown_domain"),
        ] {
            match pipeline.process(payload.as_bytes()).await {
                Outcome::Dropped(reason) => assert_eq!(reason.cause(), cause),
                other => panic!("expected a drop, got {other:?}"),
            }
        }
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn store_failures_are_outcomes() {
        let store = MemoryStore::new();
        store.fail_with_status(500);

        let outcome = pipeline(&store).process(br#"{"domain": "acme.com"}"#).await;

        assert!(matches!(outcome, Outcome::Failed { .. }));
    }
}
