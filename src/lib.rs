pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod external;
pub mod geo;
pub mod models;
pub mod observability;
pub mod query;
pub mod session;
pub mod transport;
