//! Delimited-text bulk exchange.
//!
//! Import infers a column definition for every header outside the fixed
//! schema (from the first data row: numeric, boolean, else text),
//! registers it, then upserts the rows. Export flattens the table back
//! out: fixed fields first, then every registered dynamic column.

use std::io::{Read, Write};

use indexmap::IndexMap;

use crate::{
    cache::RowCache,
    row::{CellValue, Row, STAT_NAMES, Stats},
    schema::{Column, ColumnType},
    store::RowStore,
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("delimited-text error: {0}")]
    Csv(#[from] csv::Error),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub rows: usize,
    pub new_columns: usize,
}

const FIXED_HEADERS: [&str; 13] = [
    "id",
    "source_key",
    "name",
    "sprite",
    "categories",
    "generation",
    "abilities",
    "hp",
    "attack",
    "defense",
    "special_attack",
    "special_defense",
    "speed",
];

/// Cell-level coercion applied on import: numeric strings become numbers,
/// `true`/`false` become booleans, everything else stays text.
fn coerce(cell: &str) -> CellValue {
    if cell.is_empty() {
        return CellValue::Null;
    }
    if let Ok(n) = cell.parse::<f64>() {
        return CellValue::Number(n);
    }
    match cell {
        "true" => CellValue::Bool(true),
        "false" => CellValue::Bool(false),
        _ => CellValue::Text(cell.to_string()),
    }
}

fn infer_column(header: &str, sample: &str) -> Column {
    let ty = match coerce(sample) {
        CellValue::Number(_) => ColumnType::Number,
        CellValue::Bool(_) => ColumnType::Boolean,
        _ => ColumnType::Text,
    };
    Column::new(header, header, ty)
}

/// List-valued fields arrive either comma-joined or already split; the
/// exporter writes them comma-joined.
fn split_list(cell: &str) -> Vec<String> {
    if cell.is_empty() {
        return Vec::new();
    }
    cell.split(',').map(|item| item.trim().to_string()).collect()
}

fn parse_row(headers: &[String], record: &csv::StringRecord) -> Row {
    let mut row = Row {
        id: String::new(),
        source_key: 0,
        name: String::new(),
        sprite: None,
        categories: Vec::new(),
        generation: 0,
        abilities: Vec::new(),
        stats: Stats::default(),
        extra: IndexMap::new(),
    };
    for (header, cell) in headers.iter().zip(record.iter()) {
        match header.as_str() {
            "id" => row.id = cell.to_string(),
            "source_key" => row.source_key = cell.parse().unwrap_or(0),
            "name" => row.name = cell.to_string(),
            "sprite" => row.sprite = (!cell.is_empty()).then(|| cell.to_string()),
            "categories" => row.categories = split_list(cell),
            "abilities" => row.abilities = split_list(cell),
            "generation" => row.generation = cell.parse().unwrap_or(0),
            stat if STAT_NAMES.contains(&stat) => {
                row.stats.set(stat, cell.parse().unwrap_or(0));
            }
            dynamic => {
                // Empty cells stay absent; insert-time backfill supplies
                // the column default.
                match coerce(cell) {
                    CellValue::Null => {}
                    value => {
                        row.extra.insert(dynamic.to_string(), value);
                    }
                }
            }
        }
    }
    if row.id.is_empty() {
        row.id = Row::fresh_id();
    }
    row
}

/// Parse a delimited-text source into rows plus the columns that must be
/// registered before the rows are upserted.
pub fn parse_delimited<R: Read>(
    reader: R,
    known: &[Column],
) -> Result<(Vec<Column>, Vec<Row>), Error> {
    let mut reader = csv::Reader::from_reader(reader);
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(parse_row(&headers, &record?));
    }

    let first = rows.first();
    let new_columns = headers
        .iter()
        .filter(|header| !FIXED_HEADERS.contains(&header.as_str()))
        .filter(|header| !known.iter().any(|column| &column.id == *header))
        .map(|header| {
            let sample = first
                .and_then(|row| row.extra.get(header))
                .map(CellValue::render)
                .unwrap_or_default();
            infer_column(header, &sample)
        })
        .collect();
    Ok((new_columns, rows))
}

/// Full import path: register inferred columns, then upsert every parsed
/// row through the store.
pub async fn import_into<C: RowCache, R: Read>(
    store: &mut RowStore<C>,
    reader: R,
) -> Result<ImportSummary, Error> {
    let (columns, rows) = parse_delimited(reader, store.columns())?;
    let summary = ImportSummary {
        rows: rows.len(),
        new_columns: columns.len(),
    };
    for column in columns {
        store.add_column(column).await;
    }
    store.upsert(rows).await;
    Ok(summary)
}

/// Flatten the table to delimited text: one header line, one record per
/// row, lists comma-joined, dynamic columns in registration order.
pub fn export_from<C: RowCache, W: Write>(store: &RowStore<C>, writer: W) -> Result<(), Error> {
    let mut writer = csv::Writer::from_writer(writer);
    let columns = store.columns();

    let header: Vec<&str> = FIXED_HEADERS
        .iter()
        .copied()
        .chain(columns.iter().map(|column| column.id.as_str()))
        .collect();
    writer.write_record(&header)?;

    for row in store.rows().values() {
        let mut record: Vec<String> = vec![
            row.id.clone(),
            row.source_key.to_string(),
            row.name.clone(),
            row.sprite.clone().unwrap_or_default(),
            row.categories.join(","),
            row.generation.to_string(),
            row.abilities.join(","),
        ];
        for stat in STAT_NAMES {
            record.push(row.stats.get(stat).unwrap_or(0).to_string());
        }
        for column in columns {
            let cell = row
                .extra
                .get(&column.id)
                .map(CellValue::render)
                .unwrap_or_default();
            record.push(cell);
        }
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}
