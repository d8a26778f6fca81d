use thiserror::Error;

/// Why a single production fetch failed.
///
/// Every variant is recovered within the cycle that produced it.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to reach the Envoy")]
    Transport(#[source] reqwest::Error),

    #[error("the Envoy responded with status {0}")]
    BadStatus(u16),

    #[error("failed to decode the Envoy response")]
    Decode(#[source] serde_json::Error),
}

/// Startup misconfiguration, fatal before the server starts serving.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid Envoy address `{address}`: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("unknown time zone `{0}`")]
    UnknownTimeZone(String),

    #[error("failed to build the HTTP client")]
    HttpClient(#[source] reqwest::Error),
}
