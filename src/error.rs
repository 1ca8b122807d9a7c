use thiserror::Error;

#[derive(Debug, Error)]
pub enum BibError {
    #[error("not a short code (expected AUTHOR-YEAR-THEME[-SUFFIX]): {0}")]
    InvalidShortCode(String),
    #[error("short code collision: {0}")]
    ShortCodeCollision(String),
    #[error("malformed asset file name (expected `<code> <title>.<ext>`): {0}")]
    MalformedAssetName(String),
    #[error("malformed bibtex in {file}: {reason}")]
    MalformedBibtex { file: String, reason: String },
    #[error("config file invalid or unreadable: {0}")]
    InvalidConfig(String),
    #[error("pdf metadata incomplete for {file}: {reason}")]
    IncompleteMetadata { file: String, reason: String },
    #[error("refusing to overwrite existing file: {0}")]
    TargetExists(String),
    #[error("metadata lookup failed for doi {doi}: {reason}")]
    LookupFailed { doi: String, reason: String },
    #[error("another watcher already holds {0}")]
    WatcherRunning(String),
}
