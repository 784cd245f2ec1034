pub const EVENTS_RECEIVED: &str = "company_ingest_events_received";
pub const EMPTY_EVENTS: &str = "company_ingest_empty_events";
pub const EVENTS_DROPPED: &str = "company_ingest_events_dropped";
pub const EVENTS_UPSERTED: &str = "company_ingest_events_upserted";
pub const EVENTS_FAILED: &str = "company_ingest_events_failed";
pub const FALLBACK_CREATES: &str = "company_ingest_fallback_creates";
pub const CREATE_CONFLICTS: &str = "company_ingest_create_conflicts";
pub const UPSERT_TIME: &str = "company_ingest_upsert_time_ms";
pub const OFFSET_STORE_FAILED: &str = "company_ingest_offset_store_failed";
pub const REFERENCE_RECORDS: &str = "company_ingest_reference_records";
pub const REFERENCE_ROWS_SKIPPED: &str = "company_ingest_reference_rows_skipped";
