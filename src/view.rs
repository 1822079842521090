//! Filtered/sorted projection of the table plus viewport windowing.
//!
//! The projection is cached and recomputed only when rows, the query, or
//! the sort spec change; a viewport query (scroll) merely slices the
//! cache. That separation is the performance property everything here
//! serves: scrolling a large table must not re-sort it.

use std::cmp::Ordering;

use indexmap::IndexMap;

use crate::row::{CellValue, Row, STAT_NAMES};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Single-column sort. The column is either one of the fixed scalar
/// fields or a registered dynamic column id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub column_id: String,
    pub direction: SortDirection,
}

/// List-valued fields have no defined order and are not sortable.
pub fn sortable(column_id: &str) -> bool {
    !matches!(column_id, "categories" | "abilities")
}

enum SortValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl SortValue {
    fn rank(&self) -> u8 {
        match self {
            SortValue::Bool(_) => 0,
            SortValue::Number(_) => 1,
            SortValue::Text(_) => 2,
        }
    }

    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortValue::Bool(a), SortValue::Bool(b)) => a.cmp(b),
            (SortValue::Number(a), SortValue::Number(b)) => a.total_cmp(b),
            (SortValue::Text(a), SortValue::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

fn sort_value(row: &Row, column_id: &str) -> Option<SortValue> {
    if let Some(stat) = STAT_NAMES
        .contains(&column_id)
        .then(|| row.stats.get(column_id))
        .flatten()
    {
        return Some(SortValue::Number(stat as f64));
    }
    match column_id {
        "source_key" => Some(SortValue::Number(row.source_key as f64)),
        "name" => Some(SortValue::Text(row.name.to_lowercase())),
        "generation" => Some(SortValue::Number(row.generation as f64)),
        _ => match row.extra.get(column_id) {
            Some(CellValue::Number(n)) => Some(SortValue::Number(*n)),
            Some(CellValue::Text(s)) => Some(SortValue::Text(s.to_lowercase())),
            Some(CellValue::Bool(b)) => Some(SortValue::Bool(*b)),
            Some(CellValue::List(_)) | Some(CellValue::Null) | None => None,
        },
    }
}

/// A row matches if its name, any category tag, or the decimal form of
/// its source key contains the query substring, case-insensitively.
fn matches(row: &Row, query: &str) -> bool {
    if query.is_empty() {
        return true;
    }
    row.name.to_lowercase().contains(query)
        || row
            .categories
            .iter()
            .any(|category| category.to_lowercase().contains(query))
        || row.source_key.to_string().contains(query)
}

/// One materialized row of a viewport window, with its absolute pixel
/// offset in the scroll track.
pub struct WindowRow<'a> {
    pub index: usize,
    pub offset: usize,
    pub row: &'a Row,
}

pub struct Window<'a> {
    /// Projection index of the first returned row.
    pub start: usize,
    pub rows: Vec<WindowRow<'a>>,
    /// Full scroll-track size: projected count times row height.
    pub total_extent: usize,
}

/// Cached filtered/sorted view of the table for one query + sort state.
#[derive(Default)]
pub struct ViewState {
    query: String,
    sort: Option<SortSpec>,
    projection: Vec<usize>,
    seen_revision: Option<u64>,
}

impl ViewState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn sort(&self) -> Option<&SortSpec> {
        self.sort.as_ref()
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        let query = query.into();
        if self.query != query {
            self.query = query;
            self.seen_revision = None;
        }
    }

    /// `None` clears the sort; a spec naming an unsortable column is
    /// ignored.
    pub fn set_sort(&mut self, sort: Option<SortSpec>) {
        if let Some(spec) = &sort {
            if !sortable(&spec.column_id) {
                return;
            }
        }
        if self.sort != sort {
            self.sort = sort;
            self.seen_revision = None;
        }
    }

    /// Recompute the projection if rows, query, or sort changed since the
    /// last refresh. Returns whether a recompute happened.
    pub fn refresh(&mut self, rows: &IndexMap<String, Row>, revision: u64) -> bool {
        if self.seen_revision == Some(revision) {
            return false;
        }
        let query = self.query.to_lowercase();
        let mut projection: Vec<usize> = rows
            .values()
            .enumerate()
            .filter(|(_, row)| matches(row, &query))
            .map(|(index, _)| index)
            .collect();
        if let Some(spec) = &self.sort {
            // sort_by is stable: ties keep their filtered order. Rows
            // without a comparable value sort last either direction.
            projection.sort_by(|&a, &b| {
                let left = rows.get_index(a).and_then(|(_, row)| sort_value(row, &spec.column_id));
                let right = rows.get_index(b).and_then(|(_, row)| sort_value(row, &spec.column_id));
                match (left, right) {
                    (Some(left), Some(right)) => {
                        let ordering = left.compare(&right);
                        match spec.direction {
                            SortDirection::Ascending => ordering,
                            SortDirection::Descending => ordering.reverse(),
                        }
                    }
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                }
            });
        }
        self.projection = projection;
        self.seen_revision = Some(revision);
        true
    }

    /// Number of rows in the current projection.
    pub fn len(&self) -> usize {
        self.projection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projection.is_empty()
    }

    /// Slice the cached projection for a viewport. Costs O(visible rows);
    /// never triggers a recompute.
    pub fn window<'a>(
        &self,
        rows: &'a IndexMap<String, Row>,
        scroll_offset: usize,
        viewport_height: usize,
        row_height: usize,
    ) -> Window<'a> {
        let count = self.projection.len();
        if row_height == 0 {
            return Window {
                start: 0,
                rows: Vec::new(),
                total_extent: 0,
            };
        }
        let start = (scroll_offset / row_height).min(count);
        let end = (scroll_offset + viewport_height)
            .div_ceil(row_height)
            .min(count);
        let visible = self.projection[start..end]
            .iter()
            .enumerate()
            .filter_map(|(slot, &row_index)| {
                let index = start + slot;
                rows.get_index(row_index).map(|(_, row)| WindowRow {
                    index,
                    offset: index * row_height,
                    row,
                })
            })
            .collect();
        Window {
            start,
            rows: visible,
            total_extent: count * row_height,
        }
    }
}
