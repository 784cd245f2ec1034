//! Company lookup: query parameter validation and the store query built from it.
use std::sync::LazyLock;

use company_common::company::{FACEBOOK, NAME_FIELDS, PHONE_NUMBER, WEBSITE};
use company_common::store::DocumentStore;
use regex::Regex;
use serde_json::{json, Value};

use crate::errors::ApiError;

pub const MAX_NAME_LENGTH: usize = 250;

static PHONE_NUMBER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9+\-() ]+$").expect("phone number pattern is valid"));

static FACEBOOK_URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://www\.facebook\.com/.+$").expect("facebook url pattern is valid")
});

/// Validated lookup filters. At least one is always set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompanyFilters {
    pub name: Option<String>,
    pub website: Option<String>,
    pub phone_number: Option<String>,
    pub facebook: Option<String>,
}

impl CompanyFilters {
    /// Validate raw query parameters. Unknown parameters are rejected before
    /// anything else; a repeated parameter keeps its last value.
    pub fn from_params(params: Vec<(String, String)>) -> Result<Self, ApiError> {
        let mut filters = CompanyFilters::default();

        for (key, value) in params {
            let slot = match key.as_str() {
                "name" => &mut filters.name,
                "website" => &mut filters.website,
                "phoneNumber" => &mut filters.phone_number,
                // facebookURI is what older clients send
                "facebook" | "facebookURI" => &mut filters.facebook,
                _ => return Err(ApiError::InvalidParameter(key)),
            };
            *slot = Some(value);
        }

        if filters == CompanyFilters::default() {
            return Err(ApiError::MissingParameters);
        }

        if let Some(name) = &filters.name {
            let length = name.chars().count();
            if length == 0 || length > MAX_NAME_LENGTH {
                return Err(ApiError::InvalidCompanyName);
            }
        }
        if let Some(phone_number) = &filters.phone_number {
            if !PHONE_NUMBER_PATTERN.is_match(phone_number) {
                return Err(ApiError::InvalidPhoneNumber);
            }
        }
        if let Some(facebook) = &filters.facebook {
            if !FACEBOOK_URL_PATTERN.is_match(facebook) {
                return Err(ApiError::InvalidFacebookUrl);
            }
        }
        if let Some(website) = &filters.website {
            if website.trim().is_empty() {
                return Err(ApiError::InvalidWebsite);
            }
        }

        Ok(filters)
    }

    /// One `match` per filter, all required. The name may match any of the
    /// name fields.
    pub fn to_query(&self) -> Value {
        let mut must = Vec::new();

        if let Some(name) = &self.name {
            let should: Vec<Value> = NAME_FIELDS
                .iter()
                .map(|field| json!({ "match": { *field: name } }))
                .collect();
            must.push(json!({
                "bool": {
                    "should": should,
                    "minimum_should_match": 1,
                }
            }));
        }
        for (field, value) in [
            (WEBSITE, &self.website),
            (PHONE_NUMBER, &self.phone_number),
            (FACEBOOK, &self.facebook),
        ] {
            if let Some(value) = value {
                must.push(json!({ "match": { field: value } }));
            }
        }

        json!({ "bool": { "must": must } })
    }
}

/// The best matching company document, if any.
pub async fn find_company(
    store: &dyn DocumentStore,
    index: &str,
    filters: &CompanyFilters,
) -> Result<Option<Value>, ApiError> {
    let hits = store.search(index, &filters.to_query(), 1).await?;
    Ok(hits.into_iter().next())
}
