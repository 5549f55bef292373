use camino::Utf8PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum HarvestError {
    #[error("invalid ISBN: {0:?}")]
    InvalidIsbn(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(Utf8PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid blurb link pattern: {0}")]
    InvalidPattern(String),

    #[error("missing access token (set DNB_ACCESS_TOKEN or create {0})")]
    #[diagnostic(help("the token is passed verbatim to the SRU endpoint"))]
    MissingAccessToken(Utf8PathBuf),

    #[error("failed to read catalog file at {0}")]
    CatalogRead(Utf8PathBuf),

    #[error("catalog store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("SRU request failed: {0}")]
    MarcHttp(String),

    #[error("SRU returned status {status} for ISBN {isbn}")]
    MarcStatus { isbn: String, status: u16 },

    #[error("blurb request failed: {0}")]
    BlurbHttp(String),

    #[error("blurb page returned status {status} for ISBN {isbn}")]
    BlurbStatus { isbn: String, status: u16 },

    #[error("malformed MARC21 record for ISBN {isbn}: {message}")]
    MalformedRecord { isbn: String, message: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
