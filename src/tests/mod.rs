use indexmap::{IndexMap, indexmap};

use crate::{
    cache::{RowCache, SqliteCache},
    catalog::{CatalogClient, IndexEntry, RawRecord, RawStat},
    exchange, ingest,
    progress::NullReporter,
    row::{CellValue, Row, Stats},
    schema::{Column, ColumnType},
    store::{AppStatus, LoadOutcome, RowStore},
    view::{SortDirection, SortSpec, ViewState},
};

fn sample_row(id: &str, key: i64, name: &str) -> Row {
    Row {
        id: id.to_string(),
        source_key: key,
        name: name.to_string(),
        sprite: None,
        categories: vec!["Grass".into()],
        generation: 1,
        abilities: vec!["overgrow".into()],
        stats: Stats {
            hp: 45,
            attack: 49,
            defense: 49,
            special_attack: 65,
            special_defense: 65,
            speed: 45,
        },
        extra: IndexMap::new(),
    }
}

async fn memory_cache() -> SqliteCache {
    SqliteCache::open("sqlite::memory:").await.unwrap()
}

#[tokio::test]
async fn upsert_keeps_ids_unique_and_replaces_whole_rows() {
    let cache = memory_cache().await;
    let mut store = RowStore::new(&cache);

    let mut first = sample_row("x", 1, "first");
    first
        .extra
        .insert("note".into(), CellValue::Text("keep?".into()));
    store.upsert(vec![first]).await;
    store.upsert(vec![sample_row("x", 1, "second")]).await;

    assert_eq!(store.rows().len(), 1);
    let row = store.rows().get("x").unwrap();
    assert_eq!(row.name, "second");
    // Replacement, not a field merge: the unregistered dynamic field from
    // the first insert is gone.
    assert!(row.extra.get("note").is_none());
}

#[tokio::test]
async fn replaced_rows_keep_position_new_rows_append() {
    let cache = memory_cache().await;
    let mut store = RowStore::new(&cache);
    store
        .upsert(vec![
            sample_row("a", 1, "a"),
            sample_row("b", 2, "b"),
            sample_row("c", 3, "c"),
        ])
        .await;
    store
        .upsert(vec![sample_row("b", 2, "b2"), sample_row("d", 4, "d")])
        .await;

    let order: Vec<&str> = store.rows().keys().map(String::as_str).collect();
    assert_eq!(order, vec!["a", "b", "c", "d"]);
    assert_eq!(store.rows().get("b").unwrap().name, "b2");

    // The durable mirror preserves the same order.
    let mut reloaded = RowStore::new(&cache);
    assert_eq!(reloaded.load().await.unwrap(), LoadOutcome::Ready);
    let order: Vec<&str> = reloaded.rows().keys().map(String::as_str).collect();
    assert_eq!(order, vec!["a", "b", "c", "d"]);
}

#[tokio::test]
async fn backfill_covers_existing_and_future_rows() {
    let cache = memory_cache().await;
    let mut store = RowStore::new(&cache);
    store
        .upsert(vec![sample_row("a", 1, "a"), sample_row("b", 2, "b")])
        .await;

    store
        .add_column(
            Column::new("c1", "C1", ColumnType::Number).with_default(CellValue::Number(0.0)),
        )
        .await;
    for row in store.rows().values() {
        assert_eq!(row.extra.get("c1"), Some(&CellValue::Number(0.0)));
    }

    // A row upserted later without the field is backfilled at insert time.
    store.upsert(vec![sample_row("c", 3, "c")]).await;
    assert_eq!(
        store.rows().get("c").unwrap().extra.get("c1"),
        Some(&CellValue::Number(0.0))
    );

    // An explicit value wins over the default.
    let mut with_value = sample_row("d", 4, "d");
    with_value
        .extra
        .insert("c1".into(), CellValue::Number(7.0));
    store.upsert(vec![with_value]).await;
    assert_eq!(
        store.rows().get("d").unwrap().extra.get("c1"),
        Some(&CellValue::Number(7.0))
    );
}

#[tokio::test]
async fn duplicate_column_id_is_a_no_op() {
    let cache = memory_cache().await;
    let mut store = RowStore::new(&cache);
    store.upsert(vec![sample_row("a", 1, "a")]).await;
    store
        .add_column(
            Column::new("c1", "C1", ColumnType::Number).with_default(CellValue::Number(1.0)),
        )
        .await;
    store
        .add_column(
            Column::new("c1", "Other", ColumnType::Text)
                .with_default(CellValue::Text("x".into())),
        )
        .await;

    assert_eq!(store.columns().len(), 1);
    assert_eq!(store.columns()[0].label, "C1");
    assert_eq!(
        store.rows().get("a").unwrap().extra.get("c1"),
        Some(&CellValue::Number(1.0))
    );
}

#[tokio::test]
async fn update_row_merges_fields_and_ignores_unknown_ids() {
    let cache = memory_cache().await;
    let mut store = RowStore::new(&cache);
    store.upsert(vec![sample_row("a", 1, "a")]).await;

    store
        .update_row(
            "a",
            &indexmap! {
                "hp".to_string() => CellValue::Number(60.0),
                "nickname".to_string() => CellValue::Text("al".into()),
            },
        )
        .await;
    let row = store.rows().get("a").unwrap();
    assert_eq!(row.stats.hp, 60);
    assert_eq!(row.name, "a");
    assert_eq!(row.extra.get("nickname"), Some(&CellValue::Text("al".into())));

    let before = store.revision();
    store
        .update_row("missing", &indexmap! { "hp".to_string() => CellValue::Number(1.0) })
        .await;
    assert_eq!(store.revision(), before);

    // The merged row, and only it, reached the cache.
    let mut reloaded = RowStore::new(&cache);
    reloaded.load().await.unwrap();
    assert_eq!(reloaded.rows().get("a").unwrap().stats.hp, 60);
    assert_eq!(reloaded.rows().len(), 1);
}

#[tokio::test]
async fn cold_start_adopts_populated_cache() {
    let cache = memory_cache().await;
    let mut store = RowStore::new(&cache);
    store.upsert(vec![sample_row("a", 1, "a")]).await;
    store
        .add_column(Column::new("c1", "C1", ColumnType::Text))
        .await;

    let mut fresh = RowStore::new(&cache);
    assert_eq!(fresh.load().await.unwrap(), LoadOutcome::Ready);
    assert_eq!(fresh.status(), AppStatus::Ready);
    assert_eq!(fresh.rows().len(), 1);
    assert_eq!(fresh.columns().len(), 1);
}

#[tokio::test]
async fn cold_start_with_empty_cache_needs_ingestion() {
    let cache = memory_cache().await;
    let mut store = RowStore::new(&cache);
    assert_eq!(store.load().await.unwrap(), LoadOutcome::NeedsIngest);
    assert_eq!(store.status(), AppStatus::Idle);
}

#[derive(Debug, thiserror::Error)]
#[error("cache offline")]
struct Offline;

/// A cache whose every operation fails, for observing that durability is
/// best-effort and memory never rolls back.
struct FailingCache;

impl RowCache for FailingCache {
    type Error = Offline;

    async fn load_rows(&self) -> Result<Vec<Row>, Offline> {
        Err(Offline)
    }

    async fn put_row(&self, _row: &Row) -> Result<(), Offline> {
        Err(Offline)
    }

    async fn put_rows(&self, _rows: &[Row]) -> Result<(), Offline> {
        Err(Offline)
    }

    async fn clear_rows(&self) -> Result<(), Offline> {
        Err(Offline)
    }

    async fn load_columns(&self) -> Result<Vec<Column>, Offline> {
        Err(Offline)
    }

    async fn put_columns(&self, _columns: &[Column]) -> Result<(), Offline> {
        Err(Offline)
    }
}

#[tokio::test]
async fn durable_write_failure_keeps_in_memory_state() {
    let mut store = RowStore::new(FailingCache);
    store.upsert(vec![sample_row("a", 1, "a")]).await;
    store
        .add_column(Column::new("c1", "C1", ColumnType::Boolean))
        .await;
    store
        .update_row("a", &indexmap! { "hp".to_string() => CellValue::Number(80.0) })
        .await;

    assert_eq!(store.rows().len(), 1);
    assert_eq!(store.rows().get("a").unwrap().stats.hp, 80);
    assert_eq!(store.columns().len(), 1);
}

#[tokio::test]
async fn in_memory_effect_precedes_durability() {
    let cache = memory_cache().await;
    let mut store = RowStore::new(&cache);

    // The synchronous half commits the visible effect; nothing durable yet.
    let batch = store.apply_upsert(vec![sample_row("a", 1, "a")]);
    assert_eq!(store.rows().len(), 1);
    assert!(cache.load_rows().await.unwrap().is_empty());

    // Completing the write-through closes the gap.
    cache.put_rows(&batch).await.unwrap();
    assert_eq!(cache.load_rows().await.unwrap().len(), 1);
}

#[tokio::test]
async fn export_then_import_round_trips() {
    let cache = memory_cache().await;
    let mut store = RowStore::new(&cache);
    store
        .add_column(Column::new("habitat", "Habitat", ColumnType::Text))
        .await;
    let mut row = sample_row("a", 1, "bulbasaur");
    row.extra
        .insert("habitat".into(), CellValue::Text("forest".into()));
    store.upsert(vec![row, sample_row("b", 4, "charmander")]).await;

    let mut buffer = Vec::new();
    exchange::export_from(&store, &mut buffer).unwrap();

    let other_cache = memory_cache().await;
    let mut imported = RowStore::new(&other_cache);
    let summary = exchange::import_into(&mut imported, buffer.as_slice())
        .await
        .unwrap();
    assert_eq!(summary.rows, 2);

    assert_eq!(
        imported.rows().keys().collect::<Vec<_>>(),
        store.rows().keys().collect::<Vec<_>>()
    );
    for (id, original) in store.rows() {
        let copy = imported.rows().get(id).unwrap();
        assert_eq!(copy.name, original.name);
        assert_eq!(copy.source_key, original.source_key);
        assert_eq!(copy.categories, original.categories);
        assert_eq!(copy.abilities, original.abilities);
        assert_eq!(copy.generation, original.generation);
        assert_eq!(copy.stats, original.stats);
    }
    assert_eq!(
        imported.rows().get("a").unwrap().extra.get("habitat"),
        Some(&CellValue::Text("forest".into()))
    );
}

struct TinyCatalog;

impl CatalogClient for TinyCatalog {
    type Error = std::convert::Infallible;

    async fn fetch_index(&self, cap: usize) -> Result<Vec<IndexEntry>, Self::Error> {
        Ok((1..=3.min(cap as i64))
            .map(|key| IndexEntry {
                name: format!("item-{key}"),
                url: format!("http://catalog.test/{key}").parse().unwrap(),
            })
            .collect())
    }

    async fn fetch_detail(&self, entry: &IndexEntry) -> Result<RawRecord, Self::Error> {
        let key: i64 = entry.url.path()[1..].parse().unwrap();
        Ok(RawRecord {
            id: key,
            name: entry.name.clone(),
            sprite: None,
            categories: vec!["test".into()],
            abilities: vec![],
            stats: vec![RawStat {
                name: "speed".into(),
                base_value: key * 10,
            }],
        })
    }
}

#[tokio::test]
async fn ingestion_populates_store_and_cache_for_next_start() {
    let cache = memory_cache().await;
    let mut store = RowStore::new(&cache);
    assert_eq!(store.load().await.unwrap(), LoadOutcome::NeedsIngest);

    let summary = ingest::ingest_all(&TinyCatalog, 2, 1025, &mut store, &NullReporter)
        .await
        .unwrap();
    assert_eq!(summary.delivered, 3);
    assert_eq!(store.rows().len(), 3);

    // The next cold start adopts the cache and never re-ingests.
    let mut next = RowStore::new(&cache);
    assert_eq!(next.load().await.unwrap(), LoadOutcome::Ready);
    assert_eq!(next.rows().len(), 3);
}

#[tokio::test]
async fn projection_tracks_store_revisions() {
    let cache = memory_cache().await;
    let mut store = RowStore::new(&cache);
    store
        .upsert(vec![sample_row("a", 1, "ada"), sample_row("b", 2, "bab")])
        .await;

    let mut view = ViewState::new();
    view.set_query("ad");
    assert!(view.refresh(store.rows(), store.revision()));
    assert_eq!(view.len(), 1);

    // Scrolling alone never recomputes.
    assert!(!view.refresh(store.rows(), store.revision()));

    store.upsert(vec![sample_row("c", 3, "adamant")]).await;
    assert!(view.refresh(store.rows(), store.revision()));
    assert_eq!(view.len(), 2);

    view.set_sort(Some(SortSpec {
        column_id: "name".into(),
        direction: SortDirection::Descending,
    }));
    assert!(view.refresh(store.rows(), store.revision()));
    let window = view.window(store.rows(), 0, 100, 10);
    assert_eq!(window.rows[0].row.name, "adamant");
}
