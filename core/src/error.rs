use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config source unavailable for service '{service_id}': {reason}")]
    SourceUnavailable { service_id: String, reason: String },

    #[error("Audit sink rejected {count} change records: {reason}")]
    SinkRejected { count: usize, reason: String },

    #[error("Quote session for service '{service_id}' not found")]
    SessionNotFound { service_id: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
