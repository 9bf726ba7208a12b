use thiserror::Error;

/// Errors surfaced by the library.
///
/// Decoding failures of any kind collapse into [`Error::DataParsing`] so callers can
/// match a single variant for "the response could not be turned into a table".
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to parse response data: {0}")]
    DataParsing(String),

    #[error("dataset not found: {0}")]
    DatasetNotFound(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("eurostat api error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("cache error: {0}")]
    Cache(String),

    #[error("network error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    pub(crate) fn parsing(msg: impl Into<String>) -> Self {
        Error::DataParsing(msg.into())
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidParameter(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::DatasetNotFound(_))
    }

    pub fn is_parsing(&self) -> bool {
        matches!(self, Error::DataParsing(_))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
