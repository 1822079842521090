//! The authoritative in-memory table and its write-through mirror.
//!
//! Every mutation commits to memory synchronously and then writes through
//! to the cache. Durable failures are logged and never roll the in-memory
//! state back: within a running process the table is the source of truth,
//! durability is best-effort per operation.

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::{
    cache::RowCache,
    ingest::BatchSink,
    row::{CellValue, Row},
    schema::Column,
};

/// Lifecycle state of the whole pipeline. `Migrating` is reserved for a
/// future schema-versioning step and currently unused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppStatus {
    Idle,
    Fetching,
    Migrating,
    Ready,
    Error,
}

/// What a cold start found in the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The cache was empty; the caller must run ingestion.
    NeedsIngest,
    /// The cached table was adopted as the initial in-memory state.
    Ready,
}

pub struct RowStore<C> {
    cache: C,
    rows: IndexMap<String, Row>,
    columns: Vec<Column>,
    status: AppStatus,
    progress: u8,
    revision: u64,
}

impl<C: RowCache> RowStore<C> {
    pub fn new(cache: C) -> Self {
        Self {
            cache,
            rows: IndexMap::new(),
            columns: Vec::new(),
            status: AppStatus::Idle,
            progress: 0,
            revision: 0,
        }
    }

    pub fn rows(&self) -> &IndexMap<String, Row> {
        &self.rows
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn status(&self) -> AppStatus {
        self.status
    }

    pub fn set_status(&mut self, status: AppStatus) {
        self.status = status;
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn set_progress(&mut self, progress: u8) {
        self.progress = progress.min(100);
    }

    /// Bumped on every change to rows or columns; lets readers detect
    /// staleness without diffing the table.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Cold start: adopt whatever the cache holds. An empty cache means
    /// ingestion must run; a populated one means it must not.
    pub async fn load(&mut self) -> Result<LoadOutcome, C::Error> {
        let rows = match self.cache.load_rows().await {
            Ok(rows) => rows,
            Err(error) => {
                self.status = AppStatus::Error;
                return Err(error);
            }
        };
        let columns = match self.cache.load_columns().await {
            Ok(columns) => columns,
            Err(error) => {
                self.status = AppStatus::Error;
                return Err(error);
            }
        };
        // The schema outlives the rows: adopt it even when the row set is
        // empty so a later column addition cannot clobber the blob.
        self.columns = columns;
        if rows.is_empty() {
            self.status = AppStatus::Idle;
            return Ok(LoadOutcome::NeedsIngest);
        }
        self.rows = rows
            .into_iter()
            .map(|mut row| {
                backfill(&mut row, &self.columns);
                (row.id.clone(), row)
            })
            .collect();
        self.revision += 1;
        self.status = AppStatus::Ready;
        Ok(LoadOutcome::Ready)
    }

    /// In-memory half of [`upsert`](Self::upsert): merge the batch and
    /// return the rows that need persisting. Split out so the gap between
    /// visible effect and durability stays observable.
    pub fn apply_upsert(&mut self, rows: Vec<Row>) -> Vec<Row> {
        let rows: Vec<Row> = rows
            .into_iter()
            .map(|mut row| {
                backfill(&mut row, &self.columns);
                row
            })
            .collect();
        for row in &rows {
            // IndexMap keeps the original slot on replacement; new ids
            // append in input order.
            self.rows.insert(row.id.clone(), row.clone());
        }
        self.revision += 1;
        rows
    }

    /// Insert-or-replace by id. Replacement is whole-row, not a field
    /// merge. Only the incoming batch is written through.
    pub async fn upsert(&mut self, rows: Vec<Row>) {
        let batch = self.apply_upsert(rows);
        if let Err(error) = self.cache.put_rows(&batch).await {
            warn!(%error, batch = batch.len(), "write-through failed, keeping in-memory state");
        }
    }

    /// Field-level merge onto one existing row. An unknown id is a no-op
    /// and touches nothing durable.
    pub async fn update_row(&mut self, id: &str, patch: &IndexMap<String, CellValue>) {
        let Some(row) = self.rows.get_mut(id) else {
            debug!(id, "update for unknown row id ignored");
            return;
        };
        row.apply_patch(patch);
        let row = row.clone();
        self.revision += 1;
        if let Err(error) = self.cache.put_row(&row).await {
            warn!(%error, id, "write-through failed, keeping in-memory state");
        }
    }

    /// In-memory half of [`add_column`](Self::add_column). Returns `false`
    /// on a duplicate column id.
    pub fn apply_add_column(&mut self, column: Column) -> bool {
        if self.columns.iter().any(|existing| existing.id == column.id) {
            debug!(id = %column.id, "duplicate column id ignored");
            return false;
        }
        for row in self.rows.values_mut() {
            row.extra
                .entry(column.id.clone())
                .or_insert_with(|| column.default.clone());
        }
        self.columns.push(column);
        self.revision += 1;
        true
    }

    /// Register a dynamic column and backfill it onto every row. The
    /// backfill is synchronous, so no reader observes a half-filled table.
    /// Every row changed, so the whole table is written through.
    pub async fn add_column(&mut self, column: Column) {
        if !self.apply_add_column(column) {
            return;
        }
        if let Err(error) = self.cache.put_columns(&self.columns).await {
            warn!(%error, "schema write-through failed, keeping in-memory state");
        }
        let rows: Vec<Row> = self.rows.values().cloned().collect();
        if let Err(error) = self.cache.put_rows(&rows).await {
            warn!(%error, "backfill write-through failed, keeping in-memory state");
        }
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }
}

/// Insert-time backfill: every registered column gets a value on every
/// row, user-set or default.
fn backfill(row: &mut Row, columns: &[Column]) {
    for column in columns {
        if !row.extra.contains_key(&column.id) {
            row.extra
                .insert(column.id.clone(), column.default.clone());
        }
    }
}

impl<C: RowCache> BatchSink for RowStore<C> {
    async fn deliver(&mut self, rows: Vec<Row>) {
        self.upsert(rows).await;
    }
}
