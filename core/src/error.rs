use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeoError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Schema mismatch: table '{table}' is missing required column '{column}'")]
    SchemaMismatch { table: String, column: String },

    #[error("Invalid input in table '{table}': {detail}")]
    InvalidInput { table: String, detail: String },

    #[error("Missing dependency: auxiliary table '{table}' is not available")]
    MissingDependency { table: String },

    #[error("No rows left after filtering for '{suffix}'")]
    EmptyFilterResult { suffix: String },

    #[error("Registry key '{key}' already holds a result")]
    DuplicateKey { key: String },

    #[error("Registry key '{key}' not found")]
    KeyNotFound { key: String },

    #[error("Invalid registry key '{key}'")]
    InvalidKey { key: String },

    #[error("Section '{section}' has no aggregation for metric '{metric}'")]
    UnsupportedMetric { section: String, metric: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GeoError {
    pub fn missing(table: &str) -> Self {
        GeoError::MissingDependency { table: table.to_string() }
    }
}

pub type GeoResult<T> = Result<T, GeoError>;
