pub mod analytics;
pub mod health;
pub mod query;
pub mod track;
