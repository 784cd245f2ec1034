use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DOMAIN: &str = "domain";
pub const COMMERCIAL_NAME: &str = "commercialName";
pub const LEGAL_NAME: &str = "legalName";
pub const AVAILABLE_NAMES: &str = "availableNames";
pub const PHONE_NUMBER: &str = "phoneNumber";
pub const FACEBOOK: &str = "facebook";
pub const ADDRESS: &str = "address";
pub const WEBSITE: &str = "website";

/// Fields a `name` lookup is matched against.
pub const NAME_FIELDS: [&str; 3] = [COMMERCIAL_NAME, LEGAL_NAME, AVAILABLE_NAMES];

/// A company profile as it is stored in the search index.
///
/// Every field is optional: documents written by older pipelines, or
/// created before any event arrived for a domain, may be missing any of them.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CompanyDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commercial_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legal_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_names: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facebook: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

impl CompanyDocument {
    /// The complete document body, used when the document is created from scratch.
    /// Present-but-empty values are kept.
    pub fn to_document(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Map::new()))
    }

    /// The partial body sent on update. Empty strings and empty name lists are
    /// left out, so they never replace a value already stored for that field.
    pub fn to_update_document(&self) -> Value {
        let Value::Object(fields) = self.to_document() else {
            return Value::Object(Map::new());
        };

        let fields = fields
            .into_iter()
            .filter(|(_, value)| !is_empty_value(value))
            .collect();

        Value::Object(fields)
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}
