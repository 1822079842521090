use std::str::FromStr;

use sqlx::Row as _;

use crate::{cache::RowCache, row::Row, schema::Column};

const COLUMNS_KEY: &str = "columns";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] sqlx::Error),
    #[error("corrupt cache entry: {0}")]
    Codec(#[from] serde_json::Error),
}

/// SQLite-backed cache. Rows live as JSON blobs keyed by row id; the
/// column schema is one JSON blob in the meta table.
pub struct SqliteCache {
    pool: sqlx::SqlitePool,
}

impl SqliteCache {
    pub async fn open(url: &str) -> Result<Self, Error> {
        let options = sqlx::sqlite::SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        // One persistent connection: the store is the only writer, and an
        // in-memory database exists per connection, not per pool.
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        sqlx::query("CREATE TABLE IF NOT EXISTS rows (id TEXT PRIMARY KEY, body TEXT NOT NULL)")
            .execute(&pool)
            .await?;
        sqlx::query("CREATE TABLE IF NOT EXISTS meta (key TEXT PRIMARY KEY, body TEXT NOT NULL)")
            .execute(&pool)
            .await?;
        Ok(Self { pool })
    }

    async fn put_row_on(conn: &mut sqlx::SqliteConnection, row: &Row) -> Result<(), Error> {
        let body = serde_json::to_string(row)?;
        // ON CONFLICT DO UPDATE keeps the original rowid, so ordering by
        // rowid reproduces insertion order across replacements.
        sqlx::query(
            "INSERT INTO rows (id, body) VALUES (?, ?) \
             ON CONFLICT (id) DO UPDATE SET body = excluded.body",
        )
        .bind(&row.id)
        .bind(body)
        .execute(conn)
        .await?;
        Ok(())
    }
}

impl RowCache for SqliteCache {
    type Error = Error;

    async fn load_rows(&self) -> Result<Vec<Row>, Error> {
        let records = sqlx::query("SELECT body FROM rows ORDER BY rowid ASC")
            .fetch_all(&self.pool)
            .await?;
        records
            .into_iter()
            .map(|record| {
                let body: String = record.get(0);
                serde_json::from_str(&body).map_err(Error::Codec)
            })
            .collect()
    }

    async fn put_row(&self, row: &Row) -> Result<(), Error> {
        let mut conn = self.pool.acquire().await?;
        Self::put_row_on(&mut conn, row).await
    }

    async fn put_rows(&self, rows: &[Row]) -> Result<(), Error> {
        let mut tx = self.pool.begin().await?;
        for row in rows {
            Self::put_row_on(&mut tx, row).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn clear_rows(&self) -> Result<(), Error> {
        sqlx::query("DELETE FROM rows").execute(&self.pool).await?;
        Ok(())
    }

    async fn load_columns(&self) -> Result<Vec<Column>, Error> {
        let record = sqlx::query("SELECT body FROM meta WHERE key = ?")
            .bind(COLUMNS_KEY)
            .fetch_optional(&self.pool)
            .await?;
        match record {
            Some(record) => {
                let body: String = record.get(0);
                Ok(serde_json::from_str(&body)?)
            }
            None => Ok(Vec::new()),
        }
    }

    async fn put_columns(&self, columns: &[Column]) -> Result<(), Error> {
        let body = serde_json::to_string(columns)?;
        sqlx::query(
            "INSERT INTO meta (key, body) VALUES (?, ?) \
             ON CONFLICT (key) DO UPDATE SET body = excluded.body",
        )
        .bind(COLUMNS_KEY)
        .bind(body)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
