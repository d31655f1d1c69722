pub mod driver;
pub mod ingest;
pub mod order;
