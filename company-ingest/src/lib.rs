pub mod app_context;
pub mod config;
pub mod consumer;
pub mod error;
pub mod identifier;
pub mod merge;
pub mod metrics_consts;
pub mod normalize;
pub mod pipeline;
pub mod reference;
pub mod upsert;
