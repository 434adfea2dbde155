use thiserror::Error;

use crate::models::StudentId;

/// Failures raised by the persistence gateway.
///
/// Callers at the request boundary do not distinguish between the variants;
/// they are kept apart for logging.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("student {0} does not exist")]
    MissingStudent(StudentId),
}

/// Failures while loading `Settings` from disk.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}
