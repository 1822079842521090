//! Client-side tabular dataset manager: batched remote ingestion, an
//! in-memory row store mirrored write-through to SQLite, runtime schema
//! extension with backfill, delimited-text exchange, and viewport-windowed
//! projections for rendering large tables.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod exchange;
pub mod ingest;
pub mod progress;
pub mod row;
pub mod schema;
pub mod store;
pub mod view;

#[cfg(test)]
mod tests;
