//! Error types for the CWMP core library.

use std::fmt;

use thiserror::Error;

/// Result type alias using the core [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for CWMP operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The request body is not well-formed XML.
    #[error("Invalid XML: {0}")]
    Parse(String),

    /// Well-formed XML that is not a usable SOAP envelope.
    #[error("{0}")]
    Protocol(String),

    /// Failed to serialize an outbound envelope.
    #[error("Failed to encode SOAP envelope: {0}")]
    Encode(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// SOAP fault code a CPE should see for this error.
    ///
    /// Input the device sent us that we cannot read is the client's fault;
    /// everything else is ours.
    pub const fn fault_code(&self) -> FaultCode {
        match self {
            Self::Parse(_) | Self::Protocol(_) => FaultCode::Client,
            _ => FaultCode::Server,
        }
    }
}

/// SOAP 1.1 `faultcode` values emitted by the ACS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultCode {
    Client,
    Server,
}

impl FaultCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Client => "Client",
            Self::Server => "Server",
        }
    }
}

impl fmt::Display for FaultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
