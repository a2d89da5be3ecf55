pub mod dataset;
pub mod fetch;
pub mod geo;
pub mod ingest;
pub mod metrics;
pub mod output;
pub mod parser;
pub mod store;
