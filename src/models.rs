use ahash::AHashMap;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Kind of a table-of-contents entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Folder,
    Dataset,
    Table,
    Other(String),
}

impl EntryKind {
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "folder" => EntryKind::Folder,
            "dataset" => EntryKind::Dataset,
            "table" => EntryKind::Table,
            other => EntryKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EntryKind::Folder => "folder",
            EntryKind::Dataset => "dataset",
            EntryKind::Table => "table",
            EntryKind::Other(s) => s,
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, EntryKind::Folder)
    }
}

/// One entry of the table of contents: a folder, dataset, or predefined table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetInfo {
    pub code: String,
    pub title: String,
    pub kind: EntryKind,
    pub last_update: Option<NaiveDateTime>,
    /// Last change of the table structure.
    pub last_modified: Option<NaiveDateTime>,
    pub data_start: Option<String>,
    pub data_end: Option<String>,
    pub values_count: Option<u64>,
    pub short_description: Option<String>,
    pub unit: Option<String>,
    pub source: Option<String>,
}

impl DatasetInfo {
    /// Minimal entry for a code known only from the metabase.
    pub fn bare(code: &str) -> Self {
        Self {
            code: code.to_string(),
            title: code.to_string(),
            kind: EntryKind::Dataset,
            last_update: None,
            last_modified: None,
            data_start: None,
            data_end: None,
            values_count: None,
            short_description: None,
            unit: None,
            source: None,
        }
    }
}

/// The full catalogue listing plus its folder hierarchy (parent code -> child codes).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableOfContents {
    pub datasets: Vec<DatasetInfo>,
    pub hierarchy: AHashMap<String, Vec<String>>,
    pub creation_date: Option<NaiveDateTime>,
}

impl TableOfContents {
    pub fn find(&self, code: &str) -> Option<&DatasetInfo> {
        self.datasets.iter().find(|d| d.code == code)
    }

    /// Direct children of a folder, in listing order.
    pub fn children(&self, code: &str) -> &[String] {
        self.hierarchy.get(code).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Available values of one dimension of a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionValues {
    pub name: String,
    pub values: Vec<String>,
}

/// Dimension catalogue for every dataset (dataset code -> dimensions in file order).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metabase {
    pub datasets: AHashMap<String, Vec<DimensionValues>>,
}

impl Metabase {
    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    pub fn dimensions(&self, code: &str) -> Option<&[DimensionValues]> {
        self.datasets.get(code).map(Vec::as_slice)
    }

    /// All dataset codes, sorted.
    pub fn codes(&self) -> Vec<&str> {
        let mut codes: Vec<&str> = self.datasets.keys().map(String::as_str).collect();
        codes.sort_unstable();
        codes
    }

    /// Codes containing `query` (case-insensitive), sorted.
    pub fn search_codes(&self, query: &str) -> Vec<&str> {
        let q = query.to_lowercase();
        self.codes()
            .into_iter()
            .filter(|c| c.to_lowercase().contains(&q))
            .collect()
    }
}

/// One level of the folder hierarchy, split into sub-folders and datasets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderListing {
    pub parent: DatasetInfo,
    pub folders: Vec<FolderEntry>,
    pub datasets: Vec<DatasetInfo>,
    /// Number of direct children before truncation.
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderEntry {
    pub info: DatasetInfo,
    pub child_count: usize,
}
