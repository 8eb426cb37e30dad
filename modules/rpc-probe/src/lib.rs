//! RPC backend probe.
//!
//! The native protocol cannot be exercised without a full client handshake, so
//! this walks a fallback chain instead:
//!
//! 1. `GET {scheme}://{host}/healthz` with a short timeout. Most deployments do not
//!    expose it, so any failure here is logged and ignored.
//! 2. Resolve the hostname. Success means only that the name exists.
//!
//! A successful outcome from this module is never as strong as a REST
//! inventory call, and its message always says so.

use reqwest::Client;
use std::io;
use std::net::{IpAddr, ToSocketAddrs};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;
use vecprobe_core::transport::http_client;
use vecprobe_core::{CanonicalEndpoint, Confidence, ProbeOutcome, ProbeStatus, TransportError};

pub const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

const RESOLUTION_CAVEAT: &str =
    "name resolution only; the RPC protocol was not exercised, a client handshake is needed to confirm reachability";
const HEALTH_CAVEAT: &str = "HTTP health endpoint only; the RPC protocol was not exercised";

/// Hostname lookup, separated out so the last tier can run without real DNS.
pub trait NameResolver {
    fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>>;
}

/// Resolver backed by the operating system (`getaddrinfo`).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemResolver;

impl NameResolver for SystemResolver {
    fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        Ok((host, 0u16).to_socket_addrs()?.map(|sa| sa.ip()).collect())
    }
}

/// Probe with the system resolver and the default health timeout.
pub async fn probe(endpoint: &CanonicalEndpoint) -> ProbeOutcome {
    probe_with(endpoint, &SystemResolver, DEFAULT_HEALTH_TIMEOUT).await
}

pub async fn probe_with(endpoint: &CanonicalEndpoint, resolver: &dyn NameResolver, health_timeout: Duration) -> ProbeOutcome {
    let client = match http_client(health_timeout) {
        Ok(c) => Some(c),
        Err(e) => {
            debug!(error = %e, "health tier skipped");
            None
        }
    };
    run_chain(client.as_ref(), endpoint, resolver).await
}

async fn run_chain(client: Option<&Client>, endpoint: &CanonicalEndpoint, resolver: &dyn NameResolver) -> ProbeOutcome {
    let healthy = match client {
        Some(c) => health_tier(c, &health_url(endpoint)).await,
        None => false,
    };
    let outcome = if healthy {
        ProbeOutcome::success(Confidence::HealthOnly, format!("health endpoint answered ({})", HEALTH_CAVEAT), None)
    } else {
        resolution_tier(endpoint, resolver)
    };
    info!(backend = "rpc", base_url = %endpoint.base_url, status = %outcome.status(), "probe finished");
    outcome
}

/// `{scheme}://{host}/healthz`. The RPC port is not an HTTP port, so the health
/// surface is asked for on the scheme's default port.
fn health_url(endpoint: &CanonicalEndpoint) -> String {
    format!("{}://{}/healthz", endpoint.scheme, endpoint.host)
}

/// True only for an HTTP 200. Everything else is expected on this backend and dropped.
async fn health_tier(client: &Client, url: &str) -> bool {
    match client.get(url).send().await {
        Ok(resp) if resp.status().as_u16() == 200 => true,
        Ok(resp) => {
            debug!(%url, status = resp.status().as_u16(), "health tier: non-200, falling back to name resolution");
            false
        }
        Err(e) => {
            debug!(%url, error = %TransportError::from(&e), "health tier: request failed, falling back to name resolution");
            false
        }
    }
}

fn resolution_tier(endpoint: &CanonicalEndpoint, resolver: &dyn NameResolver) -> ProbeOutcome {
    let host = hostname(endpoint);
    if host.is_empty() {
        return ProbeOutcome::failure(ProbeStatus::NameResolutionFailed, "name resolution failed: empty hostname");
    }
    match resolver.resolve(&host) {
        Ok(addrs) if !addrs.is_empty() => {
            debug!(%host, addrs = ?addrs, "resolved");
            ProbeOutcome::success(
                Confidence::NameOnly,
                format!("{} resolved to {} address(es) ({})", host, addrs.len(), RESOLUTION_CAVEAT),
                None,
            )
        }
        Ok(_) => ProbeOutcome::failure(
            ProbeStatus::NameResolutionFailed,
            format!("name resolution failed for {}: no addresses returned", host),
        ),
        Err(e) => ProbeOutcome::failure(
            ProbeStatus::NameResolutionFailed,
            format!("name resolution failed for {}: {}", host, e),
        ),
    }
}

/// Prefer what a URL parser sees; fall back to the raw host when the base URL is not parseable.
fn hostname(endpoint: &CanonicalEndpoint) -> String {
    let parsed = Url::parse(&endpoint.base_url).ok();
    let host = parsed.as_ref().and_then(|u| u.host_str()).unwrap_or_else(|| endpoint.hostname());
    host.trim_start_matches('[').trim_end_matches(']').to_string()
}
