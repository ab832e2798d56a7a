pub mod config;
pub mod fetch;
pub mod ingest;
pub mod loader;
pub mod model;
pub mod pipeline;
pub mod sink;
