use hyper::StatusCode;
use thiserror::Error;

/// Invalid configuration. Always fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("max height ({max}) must be higher than the base height ({base})")]
    InvalidTravelRange { base: u32, max: u32 },
    #[error("no desk server base path has been configured")]
    MissingServerPath,
    #[error("invalid config: {0}")]
    InvalidValue(&'static str),
    #[error("{key} must contain {placeholder} exactly once (got {template:?})")]
    InvalidTopic {
        key: &'static str,
        placeholder: &'static str,
        template: String,
    },
}

/// Failure talking to the desk server. A single operation fails, state is
/// left as it was.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("http error: {0}")]
    Http(#[from] hyper::Error),
    #[error("failed to build request: {0}")]
    Request(#[from] hyper::http::Error),
    #[error("invalid uri: {0}")]
    Uri(#[from] hyper::http::uri::InvalidUri),
    #[error("unexpected status {status} from {uri}")]
    Status { status: StatusCode, uri: String },
    #[error("invalid response body: {0}")]
    Body(#[from] serde_path_to_error::Error<serde_json::Error>),
    #[error("timed out waiting for the desk server")]
    Timeout,
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("unknown actuator {0}")]
    UnknownActuator(String),
    #[error(transparent)]
    Transport(#[from] TransportError),
}
