use thiserror::Error;

use super::status::{Code, Status};

#[derive(Error, Debug)]
pub enum ZrpcError {
    /// Truncated or otherwise invalid bytes during binary decoding.
    #[error("Malformed wire data: {0}")]
    MalformedWireData(String),

    /// A value (JSON or in-memory) does not fit the message descriptor.
    #[error("Schema violation: {0}")]
    SchemaViolation(String),

    /// A descriptor could not be built or does not resolve inside its pool.
    #[error("Invalid descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("Unknown message type: {0}")]
    UnknownMessage(String),

    #[error("Unknown method {method} on service {service}")]
    UnknownMethod { service: String, method: String },

    #[error("Incomplete implementation of {service}: missing handlers for {missing:?}")]
    IncompleteImplementation {
        service: String,
        missing: Vec<String>,
    },

    #[error("Service already registered: {0}")]
    DuplicateService(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A server, client or metrics setting is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The remote side answered with a non-ok status.
    #[error("RPC failed with {0}")]
    Status(Status),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<hyper::Error> for ZrpcError {
    fn from(err: hyper::Error) -> Self {
        ZrpcError::Transport(err.to_string())
    }
}

impl From<hyper::http::Error> for ZrpcError {
    fn from(err: hyper::http::Error) -> Self {
        ZrpcError::Transport(err.to_string())
    }
}

impl From<hyper_util::client::legacy::Error> for ZrpcError {
    fn from(err: hyper_util::client::legacy::Error) -> Self {
        ZrpcError::Transport(err.to_string())
    }
}

impl From<Status> for ZrpcError {
    fn from(status: Status) -> Self {
        ZrpcError::Status(status)
    }
}

impl ZrpcError {
    /// Maps a local error onto the RPC status channel.
    ///
    /// Used by the dispatcher so that codec and registry failures reach the
    /// caller as a structured status instead of tearing down the connection.
    pub fn to_status(&self) -> Status {
        match self {
            ZrpcError::MalformedWireData(_)
            | ZrpcError::SchemaViolation(_)
            | ZrpcError::InvalidRequest(_) => Status::invalid_argument(self.to_string()),
            ZrpcError::UnknownMethod { .. } => Status::unimplemented(self.to_string()),
            ZrpcError::Status(status) => status.clone(),
            ZrpcError::Timeout(_) => Status::new(Code::DeadlineExceeded, self.to_string()),
            ZrpcError::Transport(_) | ZrpcError::Io(_) => {
                Status::new(Code::Unavailable, self.to_string())
            }
            ZrpcError::InvalidDescriptor(_)
            | ZrpcError::InvalidConfig(_)
            | ZrpcError::UnknownMessage(_)
            | ZrpcError::IncompleteImplementation { .. }
            | ZrpcError::DuplicateService(_)
            | ZrpcError::JsonSerialization(_) => Status::internal(self.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ZrpcError>;
