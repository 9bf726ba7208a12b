//! eustat_rs
//!
//! A Rust library for discovering, browsing, and retrieving Eurostat datasets.
//! Pairs with the `eustat` CLI.
//!
//! ### Features
//! - Browse and search the catalogue (table of contents and dimension metabase)
//! - Fetch datasets from the statistics API with dimension and time filters
//! - Decode JSON-stat responses into a dense, labeled row table
//! - Save tables as CSV or JSON
//! - Optional on-disk response cache
//!
//! ### Example
//! ```no_run
//! use eustat_rs::{Client, ClientConfig, DataQuery, TimeSpec};
//!
//! let client = Client::new(ClientConfig::default().with_default_cache())?;
//! let query = DataQuery::new()
//!     .filter("geo", ["SE", "NO"])?
//!     .time(TimeSpec::Range { since: Some("2015".into()), until: Some("2020".into()) });
//! let table = client.get_table("demo_pjan", &query)?;
//! eustat_rs::storage::save_csv(&table, "population.csv")?;
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod api;
pub mod cache;
pub mod catalogue;
pub mod error;
pub mod jsonstat;
pub mod models;
pub mod query;
pub mod storage;
pub mod transport;

pub use api::{Client, ClientConfig};
pub use error::{Error, Result};
pub use jsonstat::{Document, Row, Table, decode, decode_value};
pub use models::{DatasetInfo, Metabase, TableOfContents};
pub use query::{DataQuery, GeoLevel, TimeSpec};
