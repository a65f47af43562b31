use thiserror::Error;

/// Domain error taxonomy for the event broker engine.
///
/// Variants map 1:1 to the error kinds a caller (an HTTP adapter, a CLI) uses
/// to pick a status code; this crate never picks one itself.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("topic '{0}' already exists")]
    TopicAlreadyExists(String),

    #[error("topic '{0}' not found")]
    TopicNotFound(String),

    #[error("consumer '{0}' not found")]
    ConsumerNotFound(String),

    #[error("namespace '{0}' not found")]
    NamespaceNotFound(String),

    #[error("tenant '{0}' not found")]
    TenantNotFound(String),

    #[error("no schema registered for topic '{topic}' event type '{event_type}'")]
    SchemaNotFound { topic: String, event_type: String },

    #[error("payload failed schema validation at {}: {}", .paths.join(", "), .message)]
    SchemaValidation { paths: Vec<String>, message: String },

    #[error("invalid event payload: {0}")]
    InvalidEventPayload(String),

    #[error("invalid consumer registration: {0}")]
    InvalidConsumerRegistration(String),

    #[error("topic config error: {0}")]
    TopicConfigError(String),

    #[error("event storage error: {0}")]
    EventStorageError(String),

    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("payload too large: {size} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("authentication required")]
    AuthRequired,

    #[error("invalid api key")]
    InvalidApiKey,
}

pub type BrokerResult<T> = Result<T, BrokerError>;
