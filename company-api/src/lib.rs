pub mod config;
pub mod endpoint;
pub mod errors;
pub mod lookup;
pub mod metrics_consts;
pub mod router;
pub mod server;
