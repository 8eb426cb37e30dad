//! Shared HTTP client construction.

use crate::classify::TransportError;
use reqwest::Client;
use std::time::Duration;

pub const USER_AGENT: &str = concat!("vecprobe/", env!("CARGO_PKG_VERSION"));

/// Client used by every probe and lifecycle call.
///
/// Certificate validation is off. This is a diagnostic that has to tell "the
/// port speaks TLS" apart from "the port is closed", and self-signed or
/// private-CA clusters are common; it is never used for data traffic.
pub fn http_client(timeout: Duration) -> Result<Client, TransportError> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .user_agent(USER_AGENT)
        .danger_accept_invalid_certs(true)
        .gzip(true)
        .brotli(true)
        .deflate(true)
        .build()
        .map_err(|e| TransportError::Other(format!("failed to build HTTP client: {}", e)))
}
