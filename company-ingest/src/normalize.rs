//! Turns raw event payloads into [`EventPayload`]s.
//!
//! Source field names are mapped to canonical ones through [`FIELD_RULES`].
//! Each rule decides whether a present, non-null value is worth keeping; a
//! value that is not kept is treated exactly like an absent one.
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventField {
    PhoneNumber,
    Facebook,
    Address,
    Website,
}

pub struct FieldRule {
    pub source: &'static str,
    pub target: EventField,
    pub canonicalize: fn(&str) -> Option<String>,
}

pub const FIELD_RULES: [FieldRule; 4] = [
    FieldRule {
        source: "phone_number",
        target: EventField::PhoneNumber,
        canonicalize: trimmed_non_empty,
    },
    // Kept even when empty, unlike the phone number
    FieldRule {
        source: "facebook_url",
        target: EventField::Facebook,
        canonicalize: verbatim,
    },
    FieldRule {
        source: "address",
        target: EventField::Address,
        canonicalize: verbatim,
    },
    FieldRule {
        source: "website",
        target: EventField::Website,
        canonicalize: verbatim,
    },
];

fn trimmed_non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_owned())
}

fn verbatim(value: &str) -> Option<String> {
    Some(value.to_owned())
}

/// One event, reduced to the fields the pipeline understands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventPayload {
    pub domain: String,
    pub phone_number: Option<String>,
    pub facebook: Option<String>,
    pub address: Option<String>,
    pub website: Option<String>,
}

impl EventPayload {
    pub fn new(domain: &str) -> Self {
        EventPayload {
            domain: domain.to_owned(),
            ..Default::default()
        }
    }

    pub fn field(&self, field: EventField) -> Option<&str> {
        match field {
            EventField::PhoneNumber => self.phone_number.as_deref(),
            EventField::Facebook => self.facebook.as_deref(),
            EventField::Address => self.address.as_deref(),
            EventField::Website => self.website.as_deref(),
        }
    }

    fn field_mut(&mut self, field: EventField) -> &mut Option<String> {
        match field {
            EventField::PhoneNumber => &mut self.phone_number,
            EventField::Facebook => &mut self.facebook,
            EventField::Address => &mut self.address,
            EventField::Website => &mut self.website,
        }
    }
}

#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("payload is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("payload is not a JSON object")]
    NotAnObject,
    #[error("payload has no domain")]
    MissingDomain,
}

impl NormalizeError {
    /// Short label used for metrics.
    pub fn cause(&self) -> &'static str {
        match self {
            NormalizeError::Malformed(_) => "malformed",
            NormalizeError::NotAnObject => "not_an_object",
            NormalizeError::MissingDomain => "missing_domain",
        }
    }
}

pub fn normalize(payload: &[u8]) -> Result<EventPayload, NormalizeError> {
    let Value::Object(fields) = serde_json::from_slice::<Value>(payload)? else {
        return Err(NormalizeError::NotAnObject);
    };

    let domain = match fields.get("domain") {
        Some(Value::String(domain)) if !domain.is_empty() => domain,
        _ => return Err(NormalizeError::MissingDomain),
    };

    let mut event = EventPayload::new(domain);
    for rule in &FIELD_RULES {
        if let Some(value) = source_value(&fields, rule.source) {
            *event.field_mut(rule.target) = (rule.canonicalize)(&value);
        }
    }

    Ok(event)
}

/// The textual value of a source field. Null and missing fields have none;
/// numbers are rendered as text; other JSON types are ignored.
fn source_value(fields: &Map<String, Value>, name: &str) -> Option<String> {
    match fields.get(name)? {
        Value::String(value) => Some(value.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Null => None,
        other => {
            debug!(field = name, value = %other, "ignoring non-text event field");
            None
        }
    }
}
