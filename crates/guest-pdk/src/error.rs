use thiserror::Error;

/// Errors raised by the guest side of the host memory protocol.
#[derive(Debug, Error)]
pub enum Error {
    /// The host returned the null handle for a non-empty allocation.
    #[error("host allocation of {0} bytes failed")]
    AllocationFailed(u64),

    /// A length reported by the host exceeds the configured transfer bound.
    #[error("transfer of {length} bytes exceeds limit of {limit} bytes")]
    TransferTooLarge {
        /// Length reported by the host.
        length: u64,
        /// Configured `HostConfig::max_transfer_len`.
        limit: u64,
    },

    /// Bytes read from the host are not valid UTF-8.
    #[error("invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Unknown HTTP method name.
    #[error("unsupported HTTP method: {0}")]
    InvalidMethod(String),

    /// Failure reported by plugin code itself.
    #[error("{0}")]
    Plugin(String),
}

impl Error {
    /// Build a plugin-level failure from any message.
    pub fn plugin(message: impl Into<String>) -> Self {
        Error::Plugin(message.into())
    }
}

/// Result type for guest-pdk operations.
pub type Result<T> = std::result::Result<T, Error>;
