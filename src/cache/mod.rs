//! Durable per-origin cache for rows and the column-schema blob.
//!
//! The store treats this as a write-through mirror: it writes on every
//! mutation and reads exactly once, at cold start. No business logic
//! belongs here.

use crate::{row::Row, schema::Column};

pub mod sqlite;

pub use sqlite::SqliteCache;

pub trait RowCache {
    type Error: std::error::Error + Send + Sync + 'static;

    /// All cached rows in insertion order.
    fn load_rows(&self) -> impl Future<Output = Result<Vec<Row>, Self::Error>>;

    fn put_row(&self, row: &Row) -> impl Future<Output = Result<(), Self::Error>>;

    /// Bulk write. Best-effort atomic: a single transaction where the
    /// backend supports one, but callers must not rely on it.
    fn put_rows(&self, rows: &[Row]) -> impl Future<Output = Result<(), Self::Error>>;

    fn clear_rows(&self) -> impl Future<Output = Result<(), Self::Error>>;

    /// The singleton column-schema blob; empty when never written.
    fn load_columns(&self) -> impl Future<Output = Result<Vec<Column>, Self::Error>>;

    fn put_columns(&self, columns: &[Column]) -> impl Future<Output = Result<(), Self::Error>>;
}

impl<T: RowCache> RowCache for &T {
    type Error = T::Error;

    fn load_rows(&self) -> impl Future<Output = Result<Vec<Row>, Self::Error>> {
        (**self).load_rows()
    }

    fn put_row(&self, row: &Row) -> impl Future<Output = Result<(), Self::Error>> {
        (**self).put_row(row)
    }

    fn put_rows(&self, rows: &[Row]) -> impl Future<Output = Result<(), Self::Error>> {
        (**self).put_rows(rows)
    }

    fn clear_rows(&self) -> impl Future<Output = Result<(), Self::Error>> {
        (**self).clear_rows()
    }

    fn load_columns(&self) -> impl Future<Output = Result<Vec<Column>, Self::Error>> {
        (**self).load_columns()
    }

    fn put_columns(&self, columns: &[Column]) -> impl Future<Output = Result<(), Self::Error>> {
        (**self).put_columns(columns)
    }
}
