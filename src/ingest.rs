//! Batched ingestion from the remote catalog.
//!
//! The index is fetched once; work is then sliced into fixed-size batches.
//! Detail fetches fan out concurrently within one batch and are all
//! awaited before the batch is delivered, so batches reach the sink in
//! index order while rows inside a batch may arrive in any order.

use futures::future::join_all;
use tracing::warn;

use crate::{
    catalog::{CatalogClient, normalize},
    progress::{IngestPhase, ProgressReporter},
    row::Row,
};

/// Safe cap on the expected total item count. Tuning constant, not a
/// correctness parameter.
pub const DEFAULT_INDEX_CAP: usize = 1025;
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// Only an index failure crosses this boundary; per-item failures are
/// dropped inside the batch.
#[derive(Debug, thiserror::Error)]
#[error("catalog index fetch failed: {0}")]
pub struct IndexError<E: std::error::Error>(#[source] pub E);

/// Receives each batch of successfully normalized rows, in index order.
pub trait BatchSink {
    fn deliver(&mut self, rows: Vec<Row>) -> impl Future<Output = ()>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    /// Items attempted, successful or not.
    pub attempted: usize,
    /// Rows actually delivered to the sink.
    pub delivered: usize,
    pub total: usize,
}

/// Drive a full ingestion run. Progress counts attempted (not just
/// successful) items so it always reaches 100 even with drops; it is
/// reported once per batch, after the batch has been delivered.
pub async fn ingest_all<C: CatalogClient, S: BatchSink>(
    client: &C,
    batch_size: usize,
    index_cap: usize,
    sink: &mut S,
    reporter: &dyn ProgressReporter,
) -> Result<IngestSummary, IndexError<C::Error>> {
    reporter.set_phase(IngestPhase::LoadingIndex);
    let index = client.fetch_index(index_cap).await.map_err(IndexError)?;
    let total = index.len();

    reporter.set_phase(IngestPhase::FetchingDetails);
    let mut summary = IngestSummary {
        total,
        ..Default::default()
    };
    for batch in index.chunks(batch_size.max(1)) {
        let fetched = join_all(batch.iter().map(|entry| async move {
            match client.fetch_detail(entry).await {
                Ok(raw) => Some(normalize(raw)),
                Err(error) => {
                    warn!(name = %entry.name, %error, "dropping item, detail fetch failed");
                    None
                }
            }
        }))
        .await;
        let rows: Vec<Row> = fetched.into_iter().flatten().collect();

        summary.attempted += batch.len();
        summary.delivered += rows.len();
        reporter.note_batch(rows.len(), batch.len() - rows.len());

        sink.deliver(rows).await;

        let percent = (summary.attempted as f64 / total as f64 * 100.0).min(100.0);
        reporter.set_percent(percent as u8);
    }
    Ok(summary)
}
