use company_common::company::CompanyDocument;
use thiserror::Error;

use crate::normalize::EventPayload;
use crate::reference::ReferenceRecord;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum MergeError {
    #[error("no reference record for domain {0}")]
    UnknownDomain(String),
}

/// Layer the fields present in `event` over the reference record for its domain.
///
/// Only fields the event carries are set from it; everything else comes from
/// the reference record. Reconciling with what is already stored is left to
/// the store update, which never clears a field it is not sent.
pub fn merge(
    reference: Option<&ReferenceRecord>,
    event: EventPayload,
) -> Result<CompanyDocument, MergeError> {
    let Some(reference) = reference else {
        return Err(MergeError::UnknownDomain(event.domain));
    };

    Ok(CompanyDocument {
        domain: Some(reference.domain.clone()),
        commercial_name: Some(reference.commercial_name.clone()),
        legal_name: Some(reference.legal_name.clone()),
        available_names: Some(reference.available_names.clone()),
        phone_number: event.phone_number,
        facebook: event.facebook,
        address: event.address,
        website: event.website,
    })
}
