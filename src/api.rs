//! Synchronous client for the **Eurostat dissemination API**.
//!
//! Wraps the two public services:
//! - the *statistics* API (`statistics/1.0/data/{code}`), which returns JSON-stat
//!   documents that are decoded into [`Table`]s;
//! - the *catalogue* API (`catalogue/toc/txt`, `catalogue/metabase.txt.gz`), which lists
//!   datasets and the values available for each of their dimensions.
//!
//! Responses can be cached on disk (see [`ClientConfig::cache_dir`]); decoding happens
//! after the cache, so cached entries hold the raw documents.
//!
//! Typical usage:
//! ```no_run
//! # use eustat_rs::{Client, DataQuery, TimeSpec};
//! let client = Client::default();
//! let query = DataQuery::new()
//!     .filter("geo", ["FR", "DE"])?
//!     .filter("unit", ["CP_MEUR"])?
//!     .filter("na_item", ["B1GQ"])?
//!     .time(TimeSpec::Last(3));
//! let table = client.get_table("nama_10_gdp", &query)?;
//! for row in table.rows() {
//!     println!("{:?} {:?} {:?}", row.code("geo"), row.code("time"), row.value());
//! }
//! # Ok::<(), eustat_rs::Error>(())
//! ```
use crate::cache::FileCache;
use crate::catalogue;
use crate::error::{Error, Result};
use crate::jsonstat::{self, Table};
use crate::models::{DatasetInfo, DimensionValues, FolderListing, Metabase, TableOfContents};
use crate::query::{DataQuery, cache_key};
use crate::transport::{HttpTransport, Transport, async_warning};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC};
use regex::Regex;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock, Mutex};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://ec.europa.eu/eurostat/api/dissemination";

/// Environment variable overriding [`ClientConfig::base_url`].
pub const BASE_URL_ENV: &str = "EUSTAT_BASE_URL";

static DATASET_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.$-]+$").expect("valid dataset code regex"));

// Allow -, _, . unescaped in dataset codes
const SAFE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.');

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    /// Directory for the response cache; `None` disables caching.
    pub cache_dir: Option<PathBuf>,
    pub cache_expire: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var(BASE_URL_ENV).unwrap_or_else(|_| DEFAULT_BASE_URL.into()),
            timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
            cache_dir: None,
            cache_expire: Duration::from_secs(24 * 3600),
        }
    }
}

impl ClientConfig {
    /// Enable caching in the platform cache directory (falls back to `.eustat_cache`).
    pub fn with_default_cache(mut self) -> Self {
        let dir = dirs::cache_dir()
            .map(|d| d.join("eustat-rs"))
            .unwrap_or_else(|| PathBuf::from(".eustat_cache"));
        self.cache_dir = Some(dir);
        self
    }
}

pub struct Client {
    base_url: String,
    transport: Box<dyn Transport>,
    cache: Option<FileCache>,
    toc: Mutex<Option<Arc<TableOfContents>>>,
    metabase: Mutex<Option<Arc<Metabase>>>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl Default for Client {
    fn default() -> Self {
        let config = ClientConfig::default();
        let transport = HttpTransport::new(config.timeout, config.connect_timeout)
            .expect("reqwest client build");
        Self::from_parts(config.base_url, Box::new(transport), None)
    }
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(config.timeout, config.connect_timeout)?;
        Self::with_transport(config, Box::new(transport))
    }

    /// Build a client over a custom [`Transport`] (useful for tests and proxies).
    pub fn with_transport(config: ClientConfig, transport: Box<dyn Transport>) -> Result<Self> {
        let cache = config
            .cache_dir
            .as_ref()
            .map(|dir| FileCache::new(dir, config.cache_expire))
            .transpose()?;
        Ok(Self::from_parts(config.base_url, transport, cache))
    }

    fn from_parts(base_url: String, transport: Box<dyn Transport>, cache: Option<FileCache>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            transport,
            cache,
            toc: Mutex::new(None),
            metabase: Mutex::new(None),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn cache(&self) -> Option<&FileCache> {
        self.cache.as_ref()
    }

    fn cached<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        let cache = self.cache.as_ref()?;
        match cache.get(key) {
            Ok(hit) => hit,
            Err(e) => {
                log::warn!("ignoring unreadable cache entry: {e}");
                None
            }
        }
    }

    fn store<T: serde::Serialize>(&self, key: &str, value: &T) -> Result<()> {
        match self.cache.as_ref() {
            Some(cache) => cache.set(key, value),
            None => Ok(()),
        }
    }

    fn fetch(&self, url: &str, params: &[(String, String)]) -> Result<Vec<u8>> {
        let resp = self.transport.get(url, params)?.error_for_status()?;
        Ok(resp.body)
    }

    /// Raw JSON-stat document for a dataset.
    ///
    /// ### Errors
    /// - [`Error::InvalidParameter`] for a malformed dataset code or a remote 400
    /// - [`Error::DatasetNotFound`] for a remote 404
    /// - [`Error::Api`] for other remote failures, including oversized requests that
    ///   Eurostat defers to asynchronous processing
    /// - [`Error::DataParsing`] if the body is not JSON
    pub fn get_data(&self, dataset_code: &str, query: &DataQuery) -> Result<Value> {
        let code = dataset_code.trim();
        if !DATASET_CODE.is_match(code) {
            return Err(Error::invalid(format!("invalid dataset code '{dataset_code}'")));
        }
        let url = format!(
            "{}/statistics/1.0/data/{}",
            self.base_url,
            percent_encoding::utf8_percent_encode(code, SAFE)
        );
        let params = query.to_query_params();
        let key = cache_key(&url, &params);

        if let Some(doc) = self.cached::<Value>(&key) {
            return Ok(doc);
        }

        let body = self.fetch(&url, &params)?;
        let doc: Value = serde_json::from_slice(&body)
            .map_err(|e| Error::parsing(format!("failed to parse JSON response: {e}")))?;
        if let Some(err) = async_warning(&doc) {
            return Err(err);
        }
        self.store(&key, &doc)?;
        Ok(doc)
    }

    /// Fetch a dataset and decode it into a [`Table`].
    pub fn get_table(&self, dataset_code: &str, query: &DataQuery) -> Result<Table> {
        let doc = self.get_data(dataset_code, query)?;
        jsonstat::decode_value(&doc)
    }

    /// The table of contents, memoized in memory (and on disk when caching is on).
    pub fn table_of_contents(&self, refresh: bool) -> Result<Arc<TableOfContents>> {
        let mut memo = self.toc.lock().unwrap_or_else(|p| p.into_inner());
        if refresh {
            *memo = None;
        }
        if let Some(toc) = memo.as_ref() {
            return Ok(Arc::clone(toc));
        }

        let url = format!("{}/catalogue/toc/txt", self.base_url);
        let params = vec![("lang".to_string(), "en".to_string())];
        let key = cache_key(&url, &params);
        let disk = if refresh { None } else { self.cached::<TableOfContents>(&key) };
        let toc = match disk {
            Some(toc) => toc,
            None => {
                let body = self.fetch(&url, &params)?;
                let toc = catalogue::parse_toc(&String::from_utf8_lossy(&body))?;
                log::info!("table of contents loaded: {} entries", toc.datasets.len());
                self.store(&key, &toc)?;
                toc
            }
        };
        let toc = Arc::new(toc);
        *memo = Some(Arc::clone(&toc));
        Ok(toc)
    }

    /// See [`catalogue::search`].
    pub fn search_datasets(
        &self,
        query: &str,
        max_results: usize,
        updated_since: Option<&str>,
    ) -> Result<Vec<DatasetInfo>> {
        let toc = self.table_of_contents(false)?;
        let hits = catalogue::search(&toc, query, max_results, updated_since)?;
        Ok(hits.into_iter().cloned().collect())
    }

    pub fn dataset_info(&self, dataset_code: &str) -> Result<Option<DatasetInfo>> {
        let toc = self.table_of_contents(false)?;
        Ok(toc.find(dataset_code).cloned())
    }

    /// One folder level of the catalogue; `None` starts at the root.
    pub fn browse(&self, parent: Option<&str>, max_items: usize) -> Result<FolderListing> {
        self.table_of_contents(false)?.browse(parent, max_items)
    }

    /// The dimension catalogue of every dataset. The download is large, so it is
    /// memoized for the lifetime of the client.
    pub fn metabase(&self, refresh: bool) -> Result<Arc<Metabase>> {
        let mut memo = self.metabase.lock().unwrap_or_else(|p| p.into_inner());
        if refresh {
            *memo = None;
        }
        if let Some(mb) = memo.as_ref() {
            return Ok(Arc::clone(mb));
        }

        let url = format!("{}/catalogue/metabase.txt.gz", self.base_url);
        let key = cache_key(&url, &[]);
        let disk = if refresh { None } else { self.cached::<Metabase>(&key) };
        let mb = match disk {
            Some(mb) => mb,
            None => {
                log::info!("downloading metabase");
                let body = self.fetch(&url, &[])?;
                let mb = catalogue::parse_metabase_gz(body.as_slice())?;
                log::info!("metabase loaded: {} datasets", mb.len());
                self.store(&key, &mb)?;
                mb
            }
        };
        let mb = Arc::new(mb);
        *memo = Some(Arc::clone(&mb));
        Ok(mb)
    }

    /// Available filter values per dimension; empty when the dataset is unknown.
    pub fn available_filters(&self, dataset_code: &str) -> Result<Vec<DimensionValues>> {
        let mb = self.metabase(false)?;
        Ok(mb
            .dimensions(dataset_code)
            .map(<[DimensionValues]>::to_vec)
            .unwrap_or_default())
    }

    pub fn all_dataset_codes(&self) -> Result<Vec<String>> {
        let mb = self.metabase(false)?;
        Ok(mb.codes().into_iter().map(String::from).collect())
    }

    pub fn search_metabase_codes(&self, query: &str) -> Result<Vec<String>> {
        let mb = self.metabase(false)?;
        Ok(mb.search_codes(query).into_iter().map(String::from).collect())
    }

    pub fn is_metabase_loaded(&self) -> bool {
        self.metabase
            .lock()
            .map(|m| m.is_some())
            .unwrap_or(false)
    }

    /// Drop the on-disk cache and the in-memory catalogue memos.
    pub fn clear_cache(&self) -> Result<()> {
        if let Some(cache) = self.cache.as_ref() {
            cache.clear()?;
        }
        *self.toc.lock().unwrap_or_else(|p| p.into_inner()) = None;
        *self.metabase.lock().unwrap_or_else(|p| p.into_inner()) = None;
        Ok(())
    }
}
