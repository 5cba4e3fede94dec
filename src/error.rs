use thiserror::Error;

#[derive(Debug, Error)]
pub enum ViewerError {
    /// Snapshot listing or fetching failed
    #[error("snapshot source unavailable: {0}")]
    SourceUnavailable(String),

    /// A preset could not be written
    #[error("failed to save preset: {0}")]
    PresetSave(String),

    /// The script status stream is closed
    #[error("script status stream closed")]
    StatusStreamClosed,

    #[error("script launch failed: {0}")]
    Launch(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, ViewerError>;
