//! Error types for supportdesk.

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Capability error: {0}")]
    Capability(#[from] CapabilityError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Model-capability errors. `ModelUnavailable` is fatal at wiring time for
/// mandatory capabilities; `Prediction` is a per-call failure.
#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    #[error("Capability {capability} unavailable: {reason}")]
    ModelUnavailable { capability: String, reason: String },

    #[error("Prediction failed on {capability}: {reason}")]
    Prediction { capability: String, reason: String },
}

impl CapabilityError {
    pub fn unavailable(capability: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ModelUnavailable {
            capability: capability.into(),
            reason: reason.into(),
        }
    }

    pub fn prediction(capability: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Prediction {
            capability: capability.into(),
            reason: reason.into(),
        }
    }
}

/// Processed-id ledger errors. Any of these aborts the current poll cycle.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Mail/notification channel errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to connect: {reason}")]
    ConnectFailed { name: String, reason: String },

    #[error("Authentication failed for channel {name}: {reason}")]
    AuthFailed { name: String, reason: String },

    #[error("Protocol error on channel {name}: {reason}")]
    Protocol { name: String, reason: String },

    #[error("Failed to send on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("Invalid message format: {0}")]
    InvalidMessage(String),
}

/// Ticket store errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Failed to open store: {0}")]
    Open(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Per-message pipeline errors surfaced by the orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Capability error: {0}")]
    Capability(#[from] CapabilityError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
