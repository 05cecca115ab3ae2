//! Shared HTTP client construction.

use devfetch_core::{Error, Result};
use reqwest::Client;
use std::time::Duration;

/// User agent sent with every request. GitHub rejects requests without one.
pub const USER_AGENT: &str = concat!("devfetch/", env!("CARGO_PKG_VERSION"));

/// Build a client with bounded connect and total timeouts.
pub(crate) fn build_client(connect_timeout: Duration, timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(connect_timeout)
        .timeout(timeout)
        .build()
        .map_err(|e| {
            Error::configuration_with_help(
                format!("Failed to create HTTP client: {e}"),
                "The TLS backend could not be initialized",
            )
        })
}
