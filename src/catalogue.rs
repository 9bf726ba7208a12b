//! Catalogue API formats: the tab-separated table of contents and the gzipped
//! metabase, plus search and folder browsing over the parsed listing.

use crate::error::{Error, Result};
use crate::models::{
    DatasetInfo, DimensionValues, EntryKind, FolderEntry, FolderListing, Metabase,
    TableOfContents,
};
use ahash::AHashMap;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::ReaderBuilder;
use flate2::read::GzDecoder;
use std::io::{BufRead, BufReader, Read};

/// Code of the root folder of the hierarchy.
pub const ROOT_FOLDER: &str = "data";

const INDENT_WIDTH: usize = 4;

/// Parse the dates used across the catalogue (`2025-06-26T23:00:00+0200`, `2025-06-26`,
/// `26.06.2025`). Returns `None` for blanks and anything unrecognized.
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%z") {
        return Some(dt.naive_local());
    }
    ["%Y-%m-%d", "%d.%m.%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn non_blank(s: &str) -> Option<String> {
    let t = s.trim();
    (!t.is_empty()).then(|| t.to_string())
}

/// Parse the TXT table of contents.
///
/// Columns: title, code, type, last update, last structure change, data start, data
/// end, value count. Nesting is encoded as four leading spaces per level in the title.
pub fn parse_toc(text: &str) -> Result<TableOfContents> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(b'\t')
        .quote(b'"')
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::None)
        .from_reader(text.as_bytes());
    let mut records = rdr.records();

    match records.next() {
        Some(Ok(_header)) => {}
        Some(Err(e)) => return Err(Error::parsing(format!("table of contents header: {e}"))),
        None => return Err(Error::parsing("empty table of contents or missing header")),
    }

    let mut datasets = Vec::new();
    let mut hierarchy: AHashMap<String, Vec<String>> = AHashMap::new();
    let mut path: Vec<String> = Vec::new();

    for record in records {
        let record = record.map_err(|e| Error::parsing(format!("table of contents row: {e}")))?;
        if record.len() < 8 {
            continue;
        }
        let raw_title = &record[0];
        let code = record[1].trim();
        let title = raw_title.trim();
        if title.is_empty() || code.is_empty() {
            continue;
        }

        let leading = raw_title.len() - raw_title.trim_start().len();
        // a row indented past its parent's child level hangs off the deepest open entry
        let level = (leading / INDENT_WIDTH).min(path.len());
        path.truncate(level);
        if let Some(parent) = path.last() {
            let children = hierarchy.entry(parent.clone()).or_default();
            if !children.iter().any(|c| c == code) {
                children.push(code.to_string());
            }
        }
        path.push(code.to_string());

        datasets.push(DatasetInfo {
            code: code.to_string(),
            title: title.to_string(),
            kind: EntryKind::parse(&record[2]),
            last_update: parse_datetime(&record[3]),
            last_modified: parse_datetime(&record[4]),
            data_start: non_blank(&record[5]),
            data_end: non_blank(&record[6]),
            values_count: record[7].trim().parse().ok(),
            short_description: None,
            unit: None,
            source: None,
        });
    }

    Ok(TableOfContents {
        datasets,
        hierarchy,
        creation_date: Some(chrono::Local::now().naive_local()),
    })
}

/// Parse metabase lines of the form `dataset\tdimension\tvalue`.
pub fn parse_metabase<R: BufRead>(reader: R) -> Result<Metabase> {
    let mut datasets: AHashMap<String, Vec<DimensionValues>> = AHashMap::new();
    for line in reader.lines() {
        let line = line.map_err(|e| Error::parsing(format!("metabase: {e}")))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut parts = line.split('\t');
        let (Some(code), Some(dim), Some(value)) = (parts.next(), parts.next(), parts.next())
        else {
            continue;
        };
        let dims = datasets.entry(code.to_string()).or_default();
        match dims.iter_mut().find(|d| d.name == dim) {
            Some(d) => d.values.push(value.to_string()),
            None => dims.push(DimensionValues {
                name: dim.to_string(),
                values: vec![value.to_string()],
            }),
        }
    }
    Ok(Metabase { datasets })
}

/// Decompress and parse the `metabase.txt.gz` download.
pub fn parse_metabase_gz<R: Read>(compressed: R) -> Result<Metabase> {
    parse_metabase(BufReader::new(GzDecoder::new(compressed)))
}

/// Search entries by title, description, or code (case-insensitive).
///
/// `updated_since` (`YYYY-MM-DD`, inclusive) drops entries updated earlier and entries
/// with no update date. Results are ordered most recently updated first, undated last.
pub fn search<'a>(
    toc: &'a TableOfContents,
    query: &str,
    max_results: usize,
    updated_since: Option<&str>,
) -> Result<Vec<&'a DatasetInfo>> {
    let since = updated_since
        .map(|s| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| {
                Error::invalid(format!("invalid date format '{s}', use YYYY-MM-DD"))
            })
        })
        .transpose()?;
    let q = query.to_lowercase();

    let mut hits: Vec<&DatasetInfo> = toc
        .datasets
        .iter()
        .filter(|d| {
            d.title.to_lowercase().contains(&q)
                || d
                    .short_description
                    .as_ref()
                    .is_some_and(|s| s.to_lowercase().contains(&q))
                || d.code.to_lowercase().contains(&q)
        })
        .filter(|d| match since {
            None => true,
            Some(since) => d.last_update.is_some_and(|u| u.date() >= since),
        })
        .collect();

    // newest first, undated last; stable so ties keep listing order
    hits.sort_by(|a, b| match (a.last_update, b.last_update) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    hits.truncate(max_results);
    Ok(hits)
}

impl TableOfContents {
    /// One level of the hierarchy below `parent` (the root folder when `None`).
    pub fn browse(&self, parent: Option<&str>, max_items: usize) -> Result<FolderListing> {
        let parent_code = parent.unwrap_or(ROOT_FOLDER);
        let parent = self
            .find(parent_code)
            .ok_or_else(|| Error::DatasetNotFound(format!("folder '{parent_code}'")))?
            .clone();
        let children = self.children(parent_code);

        let mut folders = Vec::new();
        let mut datasets = Vec::new();
        for code in children.iter().take(max_items) {
            let Some(child) = self.find(code) else {
                continue;
            };
            if child.kind.is_folder() {
                folders.push(FolderEntry {
                    info: child.clone(),
                    child_count: self.children(code).len(),
                });
            } else {
                datasets.push(child.clone());
            }
        }
        Ok(FolderListing {
            parent,
            folders,
            datasets,
            total: children.len(),
        })
    }
}
