pub mod ingest;
pub mod writer;
