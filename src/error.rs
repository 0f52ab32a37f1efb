//! Error handling for fzlink
//!
//! This module defines the error taxonomy shared by the serial layer, the
//! connection supervisor and the screen pipeline, plus a Result alias.

use thiserror::Error;

/// Main error type for fzlink operations
#[derive(Error, Debug)]
pub enum LinkError {
    /// No serial endpoint matched the device's vendor/product identifiers
    #[error("No matching device found ({vendor_id:04x}:{product_id:04x})")]
    EndpointNotFound { vendor_id: u16, product_id: u16 },

    /// More than one endpoint matched and the locator was told not to guess
    #[error("Multiple matching devices found: {}", .candidates.join(", "))]
    AmbiguousEndpoint { candidates: Vec<String> },

    /// The boot prompt was never observed on the serial line
    #[error("Handshake prelude failed: {0}")]
    HandshakePrelude(String),

    /// The device answered the session-start command with something else
    #[error("Unexpected device response: {0}")]
    UnexpectedDeviceResponse(String),

    /// I/O failure on an established link
    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// Errors raised while opening or enumerating serial ports
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Screen streaming was requested without a registered frame sink
    #[error("No screen stream callback configured")]
    NoCallbackConfigured,

    /// The device handle is absent (disconnected or reconnecting)
    #[error("Device is not connected")]
    Unavailable,

    /// The supervisor has been shut down
    #[error("Connection supervisor is closed")]
    Closed,

    /// A blocking operation observed the cancellation signal
    #[error("Operation cancelled")]
    Cancelled,

    /// Errors reported by the device RPC channel
    #[error("RPC error: {0}")]
    Rpc(String),

    /// A screen frame did not match its declared geometry
    #[error("Invalid screen frame: {0}")]
    InvalidFrame(String),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors raised while encoding or writing images
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<LinkError>,
    },
}

impl LinkError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        LinkError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Strip any context wrappers and return the underlying error
    pub fn root(&self) -> &LinkError {
        match self {
            LinkError::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether this error belongs to the handshake family
    ///
    /// Handshake failures abort one connect attempt but are not transport faults.
    pub fn is_handshake(&self) -> bool {
        matches!(
            self.root(),
            LinkError::HandshakePrelude(_) | LinkError::UnexpectedDeviceResponse(_)
        )
    }
}

/// Result type alias for fzlink operations
pub type Result<T> = std::result::Result<T, LinkError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
