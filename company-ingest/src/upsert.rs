use std::sync::Arc;
use std::time::Instant;

use company_common::company::CompanyDocument;
use company_common::store::{DocumentStore, StoreError, WriteResult};
use thiserror::Error;
use tracing::{debug, warn};

use crate::identifier::DocumentId;
use crate::metrics_consts::{CREATE_CONFLICTS, FALLBACK_CREATES, UPSERT_TIME};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The primary update went through.
    Updated(WriteResult),
    /// The update found nothing and the document was created instead.
    CreatedAfterNotFound,
    /// Someone else created the document between our update and create.
    UpdatedAfterConflict(WriteResult),
}

impl UpsertOutcome {
    pub fn result(&self) -> WriteResult {
        match self {
            UpsertOutcome::Updated(result) | UpsertOutcome::UpdatedAfterConflict(result) => {
                *result
            }
            UpsertOutcome::CreatedAfterNotFound => WriteResult::Created,
        }
    }
}

#[derive(Error, Debug)]
pub enum UpsertError {
    #[error("update failed: {0}")]
    Update(#[source] StoreError),
    #[error("create after not found failed: {0}")]
    Create(#[source] StoreError),
    #[error("update after create conflict failed: {0}")]
    UpdateAfterConflict(#[source] StoreError),
}

impl UpsertError {
    pub fn store_error(&self) -> &StoreError {
        match self {
            UpsertError::Update(e) | UpsertError::Create(e) | UpsertError::UpdateAfterConflict(e) => e,
        }
    }
}

/// Writes merged documents to one index of the store.
#[derive(Clone)]
pub struct Upserter {
    store: Arc<dyn DocumentStore>,
    index: String,
    doc_as_upsert: bool,
}

impl Upserter {
    pub fn new(store: Arc<dyn DocumentStore>, index: &str, doc_as_upsert: bool) -> Self {
        Self {
            store,
            index: index.to_owned(),
            doc_as_upsert,
        }
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    /// Partial update first, with upsert when enabled. Whichever path creates
    /// the document writes the full document. A not-found update falls back to
    /// create; a create that loses a race with another writer is followed by
    /// exactly one plain update.
    pub async fn apply(
        &self,
        id: &DocumentId,
        document: &CompanyDocument,
    ) -> Result<UpsertOutcome, UpsertError> {
        let start = Instant::now();
        let outcome = self.write(id, document).await;
        metrics::histogram!(UPSERT_TIME).record(start.elapsed().as_millis() as f64);
        outcome
    }

    async fn write(
        &self,
        id: &DocumentId,
        document: &CompanyDocument,
    ) -> Result<UpsertOutcome, UpsertError> {
        let partial = document.to_update_document();
        let full = document.to_document();
        let upsert = self.doc_as_upsert.then_some(&full);

        match self
            .store
            .update(&self.index, id.as_str(), &partial, upsert)
            .await
        {
            Ok(result) => return Ok(UpsertOutcome::Updated(result)),
            Err(e) if e.is_not_found() => {
                debug!(document_id = %id, "update found no document, creating it");
            }
            Err(e) => return Err(UpsertError::Update(e)),
        }

        metrics::counter!(FALLBACK_CREATES).increment(1);
        match self
            .store
            .create(&self.index, id.as_str(), &full)
            .await
        {
            Ok(()) => return Ok(UpsertOutcome::CreatedAfterNotFound),
            Err(StoreError::Conflict { .. }) => {
                warn!(document_id = %id, "document created concurrently, updating it instead");
            }
            Err(e) => return Err(UpsertError::Create(e)),
        }

        metrics::counter!(CREATE_CONFLICTS).increment(1);
        self.store
            .update(&self.index, id.as_str(), &partial, None)
            .await
            .map(UpsertOutcome::UpdatedAfterConflict)
            .map_err(UpsertError::UpdateAfterConflict)
    }
}
