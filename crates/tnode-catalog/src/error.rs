//! Catalog client error types.

/// Errors from catalog calls.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// HTTP transport error.
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },
    /// The catalog returned a non-2xx status.
    #[error("catalog {endpoint} returned {status}: {body}")]
    Api {
        endpoint: String,
        status: u16,
        body: String,
    },
    /// The catalog answered with a non-zero error code in its envelope.
    #[error("catalog {endpoint} rejected the request (errcode {errcode}): {msg}")]
    Rejected {
        endpoint: String,
        errcode: i64,
        msg: String,
    },
    /// Response deserialization failed.
    #[error("failed to deserialize response from {endpoint}: {source}")]
    Deserialization {
        endpoint: String,
        source: reqwest::Error,
    },
    /// The catalog cannot be reached at all.
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] super::config::ConfigError),
}
