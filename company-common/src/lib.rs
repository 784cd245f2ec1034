pub mod company;
pub mod health;
pub mod kafka;
pub mod metrics;
pub mod shutdown;
pub mod store;
