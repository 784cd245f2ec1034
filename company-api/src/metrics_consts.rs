pub const LOOKUPS: &str = "company_api_lookups";
pub const LOOKUP_TIME: &str = "company_api_lookup_time_ms";
