pub mod backend;
pub mod events;
pub mod schema;
pub mod session;
mod store_impl;

pub use backend::DuckDbBackend;

/// Re-export the `duckdb` crate so consumers (especially tests) can use
/// `siteview_duckdb::duckdb::params!` without an extra dependency.
pub use duckdb;
