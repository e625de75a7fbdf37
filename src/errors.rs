//! Error types for the Steward daemon.
//!
//! All recoverable failures inside the dispatch path are expressed as
//! [`StewardError`] so that every layer above (kernel, protocol machine,
//! transport adapters) can translate them into the fixed JSON-RPC error
//! taxonomy without guessing. The numeric codes are part of the wire
//! contract and never change.

use thiserror::Error;

/// JSON parse failure at the transport boundary.
pub const PARSE_ERROR: i64 = -32700;
/// Malformed request envelope (not an object, wrong tag, missing method).
pub const INVALID_REQUEST: i64 = -32600;
/// Method name not present in the dispatch table.
pub const METHOD_NOT_FOUND: i64 = -32601;
/// Missing or schema-violating parameters.
pub const INVALID_PARAMS: i64 = -32602;
/// Unhandled internal failure.
pub const INTERNAL_ERROR: i64 = -32603;
/// Method dispatched before the MCP handshake completed.
pub const NOT_INITIALIZED: i64 = -32002;
/// Command rejected by the allowlist or privilege checks.
pub const INSUFFICIENT_PRIVILEGES: i64 = -31001;
/// Concurrency admission semaphore saturated.
pub const RESOURCE_LOCKED: i64 = -30001;

/// Unified error for the protocol, registry, executor, kernel and
/// snapshot components.
///
/// Each variant carries the innermost human-readable message; the
/// [`StewardError::code`] method yields the wire code the protocol layer
/// puts on the response envelope.
#[derive(Debug, Error)]
pub enum StewardError {
    /// The request envelope failed shape validation.
    #[error("{0}")]
    InvalidRequest(String),

    /// The requested method is not in the dispatch table.
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    /// Parameters were missing or did not satisfy the tool's input schema.
    #[error("{0}")]
    InvalidParams(String),

    /// A method other than the handshake pair was dispatched before
    /// `initialized` was observed.
    #[error("Server not initialized")]
    NotInitialized,

    /// A command was rejected before spawning (allowlist miss, injection
    /// metacharacters, or failed elevation).
    #[error("{0}")]
    CommandNotAllowed(String),

    /// The admission semaphore was fully occupied; the caller must retry
    /// with its own backoff.
    #[error("Maximum concurrent operations exceeded")]
    ResourceLocked,

    /// Anything else. The message is preserved verbatim into the error
    /// envelope so clients see the innermost cause.
    #[error("{0}")]
    Internal(String),
}

impl StewardError {
    /// Wire error code for this failure.
    pub fn code(&self) -> i64 {
        match self {
            StewardError::InvalidRequest(_) => INVALID_REQUEST,
            StewardError::MethodNotFound(_) => METHOD_NOT_FOUND,
            StewardError::InvalidParams(_) => INVALID_PARAMS,
            StewardError::NotInitialized => NOT_INITIALIZED,
            StewardError::CommandNotAllowed(_) => INSUFFICIENT_PRIVILEGES,
            StewardError::ResourceLocked => RESOURCE_LOCKED,
            StewardError::Internal(_) => INTERNAL_ERROR,
        }
    }

    /// Shorthand for an internal error with a formatted message.
    pub fn internal(msg: impl Into<String>) -> Self {
        StewardError::Internal(msg.into())
    }
}

impl From<std::io::Error> for StewardError {
    fn from(err: std::io::Error) -> Self {
        StewardError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for StewardError {
    fn from(err: serde_json::Error) -> Self {
        StewardError::Internal(err.to_string())
    }
}
