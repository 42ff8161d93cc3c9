pub mod config;
pub mod error;
pub mod event;
pub mod ingest;
pub mod metrics;
pub mod period;
pub mod store;
pub mod traffic;
