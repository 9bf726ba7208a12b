//! JSON-stat decoding.
//!
//! A JSON-stat dataset stores its observations as one flat, usually sparse, array
//! indexed in row-major order over the dimensions listed in `id`/`size`. This module
//! expands that array into a dense [`Table`] with one row per combination of
//! categories, the first dimension varying slowest.
//!
//! ### Example
//! ```
//! use eustat_rs::jsonstat;
//! use serde_json::json;
//!
//! let doc = json!({
//!     "id": ["geo", "time"],
//!     "size": [2, 1],
//!     "dimension": {
//!         "geo": {"category": {"index": {"SE": 0, "NO": 1}, "label": {"SE": "Sweden"}}},
//!         "time": {"category": {"index": {"2020": 0}}}
//!     },
//!     "value": {"1": 42.0}
//! });
//! let table = jsonstat::decode_value(&doc)?;
//! assert_eq!(table.len(), 2);
//! assert_eq!(table.values(), &[None, Some(42.0)]);
//! assert_eq!(table.labels("geo").unwrap(), vec!["Sweden", "NO"]);
//! # Ok::<(), eustat_rs::Error>(())
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// A JSON-stat 2.0 dataset response, as returned by the statistics endpoint.
///
/// Only `id`, `size`, `dimension`, `value`, and `status` drive decoding; the other
/// fields are carried for callers that want them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub updated: Option<String>,
    #[serde(default)]
    pub id: Vec<String>,
    #[serde(default)]
    pub size: Vec<usize>,
    #[serde(default)]
    pub dimension: HashMap<String, Dimension>,
    /// Sparse object (`{"offset": number}`) or dense array.
    #[serde(default)]
    pub value: Option<Value>,
    /// Sparse object, dense array, or a single string shared by every cell.
    #[serde(default)]
    pub status: Option<Value>,
}

impl Document {
    /// Deserialize a document from an already-parsed JSON value.
    pub fn from_value(value: &Value) -> Result<Self> {
        Document::deserialize(value)
            .map_err(|e| Error::parsing(format!("malformed JSON-stat document: {e}")))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dimension {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub category: Category,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Category {
    #[serde(default)]
    pub index: Option<CategoryIndex>,
    #[serde(default)]
    pub label: HashMap<String, String>,
}

/// Category ordering along one dimension.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CategoryIndex {
    /// `{"code": position}`; positions are sort keys and are not validated further.
    Positions(Map<String, Value>),
    /// `["code", ...]`; array order is category order.
    Codes(Vec<String>),
}

/// Internal failure causes; all of them surface as [`Error::DataParsing`].
#[derive(Debug, thiserror::Error)]
enum Cause {
    #[error("{ids} dimension ids but {sizes} dimension sizes")]
    ShapeMismatch { ids: usize, sizes: usize },
    #[error("dimension '{dim}' resolves {found} categories but its size is {size}")]
    CategoryCount {
        dim: String,
        found: usize,
        size: usize,
    },
    #[error("dimension '{dim}' has a non-numeric position for category '{code}'")]
    BadPosition { dim: String, code: String },
    #[error("cell count overflows for sizes {0:?}")]
    Overflow(Vec<usize>),
    #[error("'{field}' must be an object or array, found {found}")]
    BadCells { field: &'static str, found: &'static str },
}

/// Decode a raw JSON value into a [`Table`].
pub fn decode_value(value: &Value) -> Result<Table> {
    decode(&Document::from_value(value)?)
}

/// Expand a JSON-stat document into a dense, row-oriented [`Table`].
///
/// ### Errors
/// [`Error::DataParsing`] when `value` is absent, when `id` or `size` is empty, or when
/// the dimension metadata is inconsistent with the declared sizes.
///
/// Unparseable offsets, out-of-range offsets, and non-numeric values are not errors:
/// the affected cells stay missing.
pub fn decode(doc: &Document) -> Result<Table> {
    let Some(values) = doc.value.as_ref() else {
        return Err(Error::parsing("no value data found in JSON-stat response"));
    };
    if doc.id.is_empty() || doc.size.is_empty() {
        return Err(Error::parsing(
            "missing dimension information in JSON-stat response",
        ));
    }
    build(doc, values)
        .map_err(|cause| Error::parsing(format!("failed to convert JSON-stat to table: {cause}")))
}

fn build(doc: &Document, values: &Value) -> Result<Table, Cause> {
    if doc.id.len() != doc.size.len() {
        return Err(Cause::ShapeMismatch {
            ids: doc.id.len(),
            sizes: doc.size.len(),
        });
    }
    let total = doc
        .size
        .iter()
        .try_fold(1usize, |acc, &s| acc.checked_mul(s))
        .ok_or_else(|| Cause::Overflow(doc.size.clone()))?;

    let mut dimensions = doc
        .id
        .iter()
        .zip(&doc.size)
        .map(|(id, &size)| resolve_axis(id, size, doc.dimension.get(id)))
        .collect::<Result<Vec<_>, _>>()?;

    for dim in &mut dimensions {
        dim.positions.reserve_exact(total);
    }
    for cell in RowMajor::new(&doc.size) {
        for (dim, &pos) in dimensions.iter_mut().zip(&cell) {
            dim.positions.push(pos);
        }
    }

    let mut cells = vec![None; total];
    scatter(values, "value", &mut cells, coerce_number)?;

    let status = match doc.status.as_ref() {
        None => None,
        Some(Value::String(shared)) => Some(vec![shared.clone(); total]),
        Some(source) => {
            let mut flags = vec![String::new(); total];
            scatter(source, "status", &mut flags, status_text)?;
            Some(flags)
        }
    };

    Ok(Table {
        dimensions,
        values: cells,
        status,
    })
}

/// Resolve the ordered category codes (and labels, if any) of one dimension.
fn resolve_axis(id: &str, size: usize, dim: Option<&Dimension>) -> Result<DimensionColumn, Cause> {
    let category = dim.map(|d| &d.category);
    let codes: Vec<String> = match category.and_then(|c| c.index.as_ref()) {
        Some(CategoryIndex::Positions(map)) if !map.is_empty() => {
            let mut ranked = map
                .iter()
                .map(|(code, pos)| {
                    position_key(pos)
                        .map(|p| (p, code))
                        .ok_or_else(|| Cause::BadPosition {
                            dim: id.to_string(),
                            code: code.clone(),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            // stable: equal positions keep document order
            ranked.sort_by(|(a, _), (b, _)| a.compare(b));
            ranked.into_iter().map(|(_, code)| code.clone()).collect()
        }
        Some(CategoryIndex::Codes(codes)) if !codes.is_empty() => codes.clone(),
        _ => (0..size).map(|i| i.to_string()).collect(),
    };
    if codes.len() != size {
        return Err(Cause::CategoryCount {
            dim: id.to_string(),
            found: codes.len(),
            size,
        });
    }

    let labels = category
        .map(|c| &c.label)
        .filter(|map| !map.is_empty())
        .map(|map| {
            codes
                .iter()
                .map(|code| map.get(code).unwrap_or(code).clone())
                .collect()
        });

    Ok(DimensionColumn {
        id: id.to_string(),
        codes,
        labels,
        positions: Vec::new(),
    })
}

/// Sort key of a category position. Any JSON number is accepted as-is.
#[derive(Debug, Clone, Copy)]
enum PositionKey {
    Int(i64),
    Float(f64),
}

impl PositionKey {
    fn as_f64(self) -> f64 {
        match self {
            PositionKey::Int(i) => i as f64,
            PositionKey::Float(f) => f,
        }
    }

    fn compare(&self, other: &Self) -> std::cmp::Ordering {
        match (*self, *other) {
            (PositionKey::Int(a), PositionKey::Int(b)) => a.cmp(&b),
            (a, b) => a.as_f64().total_cmp(&b.as_f64()),
        }
    }
}

fn position_key(pos: &Value) -> Option<PositionKey> {
    pos.as_i64()
        .map(PositionKey::Int)
        .or_else(|| pos.as_f64().map(PositionKey::Float))
}

/// Write each parseable entry of a sparse object (or dense array) into `cells`.
///
/// Keys that are not non-negative integers, and offsets outside `cells`, are skipped.
fn scatter<T>(
    source: &Value,
    field: &'static str,
    cells: &mut [T],
    convert: impl Fn(&Value) -> T,
) -> Result<(), Cause> {
    match source {
        Value::Object(entries) => {
            for (key, raw) in entries {
                if let Some(offset) = cell_offset(key, cells.len()) {
                    cells[offset] = convert(raw);
                }
            }
        }
        Value::Array(items) => {
            for (cell, raw) in cells.iter_mut().zip(items) {
                *cell = convert(raw);
            }
        }
        other => {
            return Err(Cause::BadCells {
                field,
                found: json_kind(other),
            });
        }
    }
    Ok(())
}

/// Parse a sparse-map key into an offset below `total`, or `None`.
pub(crate) fn cell_offset(key: &str, total: usize) -> Option<usize> {
    key.trim().parse::<usize>().ok().filter(|&i| i < total)
}

/// Numbers and numeric strings become values; anything else is missing.
pub(crate) fn coerce_number(raw: &Value) -> Option<f64> {
    let n = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

fn status_text(raw: &Value) -> String {
    match raw {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Row-major (C-order) enumeration of every index tuple for the given sizes.
///
/// The last position increments fastest, so the n-th tuple is exactly the
/// decomposition of flat offset `n`.
#[derive(Debug, Clone)]
pub struct RowMajor {
    sizes: Vec<usize>,
    next: Option<Vec<usize>>,
}

impl RowMajor {
    pub fn new(sizes: &[usize]) -> Self {
        let next = (!sizes.contains(&0)).then(|| vec![0; sizes.len()]);
        Self {
            sizes: sizes.to_vec(),
            next,
        }
    }
}

impl Iterator for RowMajor {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        let current = self.next.take()?;
        let mut succ = current.clone();
        for axis in (0..succ.len()).rev() {
            succ[axis] += 1;
            if succ[axis] < self.sizes[axis] {
                self.next = Some(succ);
                break;
            }
            succ[axis] = 0;
        }
        Some(current)
    }
}

/// Flat row-major offset of an index tuple. `None` if any index is out of range.
pub fn flat_offset(indices: &[usize], sizes: &[usize]) -> Option<usize> {
    if indices.len() != sizes.len() {
        return None;
    }
    indices
        .iter()
        .zip(sizes)
        .try_fold(0usize, |acc, (&i, &n)| (i < n).then(|| acc * n + i))
}

/// One dimension's column: its ordered categories plus each row's position in them.
#[derive(Debug, Clone, PartialEq)]
struct DimensionColumn {
    id: String,
    codes: Vec<String>,
    labels: Option<Vec<String>>,
    positions: Vec<usize>,
}

/// A decoded dataset: one row per cell of the cube.
///
/// Columns, in order: one per dimension (category code), `value`, `status` (only if
/// the document carried one), then `<dim>_label` for every dimension that had labels.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    dimensions: Vec<DimensionColumn>,
    values: Vec<Option<f64>>,
    status: Option<Vec<String>>,
}

impl Table {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn dimension_ids(&self) -> Vec<&str> {
        self.dimensions.iter().map(|d| d.id.as_str()).collect()
    }

    /// Ordered categories of a dimension (not per row).
    pub fn categories(&self, dim: &str) -> Option<&[String]> {
        self.dimension(dim).map(|d| d.codes.as_slice())
    }

    pub fn column_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.dimensions.iter().map(|d| d.id.clone()).collect();
        names.push("value".into());
        if self.status.is_some() {
            names.push("status".into());
        }
        names.extend(
            self.dimensions
                .iter()
                .filter(|d| d.labels.is_some())
                .map(|d| format!("{}_label", d.id)),
        );
        names
    }

    /// The per-row code column of a dimension.
    pub fn codes(&self, dim: &str) -> Option<Vec<&str>> {
        let d = self.dimension(dim)?;
        Some(d.positions.iter().map(|&p| d.codes[p].as_str()).collect())
    }

    /// The per-row `<dim>_label` column; `None` if the dimension carried no labels.
    pub fn labels(&self, dim: &str) -> Option<Vec<&str>> {
        let d = self.dimension(dim)?;
        let labels = d.labels.as_ref()?;
        Some(d.positions.iter().map(|&p| labels[p].as_str()).collect())
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    pub fn status(&self) -> Option<&[String]> {
        self.status.as_deref()
    }

    pub fn has_status(&self) -> bool {
        self.status.is_some()
    }

    pub fn row(&self, index: usize) -> Option<Row<'_>> {
        (index < self.len()).then_some(Row { table: self, index })
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> + '_ {
        (0..self.len()).map(move |index| Row { table: self, index })
    }

    /// Look up the row at the given coordinates. Every dimension must be named.
    pub fn find(&self, coords: &[(&str, &str)]) -> Option<Row<'_>> {
        if coords.len() != self.dimensions.len() {
            return None;
        }
        let mut indices = Vec::with_capacity(self.dimensions.len());
        let mut sizes = Vec::with_capacity(self.dimensions.len());
        for d in &self.dimensions {
            let (_, code) = coords.iter().find(|(id, _)| *id == d.id)?;
            indices.push(d.codes.iter().position(|c| c == code)?);
            sizes.push(d.codes.len());
        }
        self.row(flat_offset(&indices, &sizes)?)
    }

    fn dimension(&self, dim: &str) -> Option<&DimensionColumn> {
        self.dimensions.iter().find(|d| d.id == dim)
    }
}

/// A single cell of a table, rendered for output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cell<'a> {
    Text(&'a str),
    Number(Option<f64>),
}

/// Borrowed view of one table row.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    table: &'a Table,
    index: usize,
}

impl<'a> Row<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn code(&self, dim: &str) -> Option<&'a str> {
        let d = self.table.dimension(dim)?;
        Some(d.codes[d.positions[self.index]].as_str())
    }

    pub fn label(&self, dim: &str) -> Option<&'a str> {
        let d = self.table.dimension(dim)?;
        let labels = d.labels.as_ref()?;
        Some(labels[d.positions[self.index]].as_str())
    }

    pub fn value(&self) -> Option<f64> {
        self.table.values[self.index]
    }

    pub fn status(&self) -> Option<&'a str> {
        self.table.status.as_ref().map(|s| s[self.index].as_str())
    }

    /// Cells in [`Table::column_names`] order.
    pub fn cells(&self) -> Vec<Cell<'a>> {
        let table = self.table;
        let i = self.index;
        let mut out: Vec<Cell<'a>> = table
            .dimensions
            .iter()
            .map(|d| Cell::Text(d.codes[d.positions[i]].as_str()))
            .collect();
        out.push(Cell::Number(table.values[i]));
        if let Some(status) = table.status.as_ref() {
            out.push(Cell::Text(status[i].as_str()));
        }
        for d in &table.dimensions {
            if let Some(labels) = d.labels.as_ref() {
                out.push(Cell::Text(labels[d.positions[i]].as_str()));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn row_major_matches_flat_offset() {
        let sizes = [2, 3, 2];
        let tuples: Vec<Vec<usize>> = RowMajor::new(&sizes).collect();
        assert_eq!(tuples.len(), 12);
        assert_eq!(tuples[0], vec![0, 0, 0]);
        assert_eq!(tuples[1], vec![0, 0, 1]);
        assert_eq!(tuples[2], vec![0, 1, 0]);
        assert_eq!(tuples[11], vec![1, 2, 1]);
        for (n, t) in tuples.iter().enumerate() {
            assert_eq!(flat_offset(t, &sizes), Some(n));
        }
    }

    #[test]
    fn row_major_with_zero_size_is_empty() {
        assert_eq!(RowMajor::new(&[3, 0, 2]).count(), 0);
    }

    #[test]
    fn flat_offset_rejects_out_of_range() {
        assert_eq!(flat_offset(&[2, 0], &[2, 2]), None);
        assert_eq!(flat_offset(&[0], &[2, 2]), None);
    }

    #[test]
    fn cell_offset_tolerates_garbage() {
        assert_eq!(cell_offset("3", 4), Some(3));
        assert_eq!(cell_offset(" 2 ", 4), Some(2));
        assert_eq!(cell_offset("4", 4), None);
        assert_eq!(cell_offset("-1", 4), None);
        assert_eq!(cell_offset("abc", 4), None);
        assert_eq!(cell_offset("1.5", 4), None);
    }

    #[test]
    fn coerce_number_accepts_numbers_and_numeric_strings() {
        assert_eq!(coerce_number(&json!(1.5)), Some(1.5));
        assert_eq!(coerce_number(&json!(7)), Some(7.0));
        assert_eq!(coerce_number(&json!("2.25")), Some(2.25));
        assert_eq!(coerce_number(&json!(":")), None);
        assert_eq!(coerce_number(&json!(null)), None);
        assert_eq!(coerce_number(&json!(true)), None);
        assert_eq!(coerce_number(&json!("NaN")), None);
    }

    #[test]
    fn duplicate_positions_keep_document_order() {
        let doc = json!({
            "id": ["x"],
            "size": [3],
            "dimension": {"x": {"category": {"index": {"b": 1, "a": 0, "c": 1}}}},
            "value": {}
        });
        let t = decode_value(&doc).unwrap();
        assert_eq!(t.categories("x").unwrap(), ["a", "b", "c"]);
    }

    #[test]
    fn negative_and_float_positions_are_sorted_as_is() {
        let negative = json!({
            "id": ["geo"],
            "size": [2],
            "dimension": {"geo": {"category": {"index": {"SE": 0, "NO": -1}}}},
            "value": {"0": 1}
        });
        let t = decode_value(&negative).unwrap();
        assert_eq!(t.categories("geo").unwrap(), ["NO", "SE"]);
        assert_eq!(t.find(&[("geo", "NO")]).unwrap().value(), Some(1.0));

        let floats = json!({
            "id": ["geo"],
            "size": [3],
            "dimension": {"geo": {"category": {"index": {"SE": 1.0, "NO": 0.0, "DK": 0.5}}}},
            "value": {}
        });
        let t = decode_value(&floats).unwrap();
        assert_eq!(t.categories("geo").unwrap(), ["NO", "DK", "SE"]);
    }

    #[test]
    fn non_numeric_position_is_a_parsing_error() {
        let doc = json!({
            "id": ["geo"],
            "size": [1],
            "dimension": {"geo": {"category": {"index": {"SE": "first"}}}},
            "value": {}
        });
        let err = decode_value(&doc).unwrap_err();
        assert!(err.is_parsing());
        assert!(err.to_string().contains("non-numeric position"));
    }

    #[test]
    fn non_contiguous_positions_are_sort_keys() {
        let doc = json!({
            "id": ["x"],
            "size": [2],
            "dimension": {"x": {"category": {"index": {"late": 40, "early": 7}}}},
            "value": {"0": 1}
        });
        let t = decode_value(&doc).unwrap();
        assert_eq!(t.codes("x").unwrap(), vec!["early", "late"]);
        assert_eq!(t.values(), &[Some(1.0), None]);
    }
}
