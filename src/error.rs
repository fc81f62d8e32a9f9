//! Error types for KOTI

use thiserror::Error;

/// Result type alias for KOTI operations
pub type Result<T> = std::result::Result<T, KotiError>;

/// Main error type for KOTI
#[derive(Error, Debug)]
pub enum KotiError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// HTTP error (hub or sink)
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Plugin error
    #[error("plugin '{plugin}' error: {message}")]
    Plugin { plugin: String, message: String },

    /// Buffer full - documents dropped
    #[error("buffer full, dropped {count} documents")]
    BufferFull { count: usize },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Metrics error
    #[error("metrics error: {0}")]
    Metrics(String),

    /// Shutdown requested
    #[error("shutdown requested")]
    Shutdown,
}

/// Error type for ingestor and emitter operations
#[derive(Error, Debug)]
pub enum PluginError {
    /// Initialization failed
    #[error("initialization failed: {0}")]
    Init(String),

    /// Decode failed
    #[error("decode failed: {0}")]
    Decode(String),

    /// Send failed
    #[error("send failed: {0}")]
    Send(String),

    /// Connection error
    #[error("connection error: {0}")]
    Connection(String),

    /// Not ready
    #[error("plugin not ready")]
    NotReady,

    /// Shutdown error
    #[error("shutdown error: {0}")]
    Shutdown(String),
}

impl From<PluginError> for KotiError {
    fn from(err: PluginError) -> Self {
        KotiError::Plugin {
            plugin: "unknown".to_string(),
            message: err.to_string(),
        }
    }
}

/// Classification failure for a single raw hub record.
///
/// These are data, not panics: one bad record is reported and skipped,
/// and must never halt processing of the rest of a batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassifyError {
    /// Discriminator value not in the recognized set.
    ///
    /// Carries the raw `@type` string so operators can discover new
    /// upstream event kinds (the hub has introduced new types without
    /// notice before).
    #[error("unknown event type '{event_type}'")]
    UnknownEventType { event_type: String },

    /// Recognized discriminator, but the record is structurally invalid.
    #[error("malformed '{event_type}' event: {reason}")]
    MalformedEvent { event_type: String, reason: String },
}

impl ClassifyError {
    /// Short label for metrics and logs.
    pub fn reason_label(&self) -> &'static str {
        match self {
            ClassifyError::UnknownEventType { .. } => "unknown_type",
            ClassifyError::MalformedEvent { .. } => "malformed",
        }
    }
}
