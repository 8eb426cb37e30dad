//! REST backend probe: an authenticated collection listing against `/collections`.

use reqwest::{Client, Method, Response};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};
use vecprobe_core::transport::http_client;
use vecprobe_core::{
    failure_outcome, CanonicalEndpoint, CollectionInventory, Confidence, EndpointDescriptor, ProbeOutcome,
    TransportError, TransportResult,
};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const API_KEY_HEADER: &str = "api-key";

/// Thin authenticated transport bound to one REST endpoint.
///
/// Also used by the collection lifecycle calls, so everything that talks to the
/// REST backend goes through the same headers, timeout and TLS posture.
#[derive(Clone)]
pub struct RestClient {
    http: Client,
    endpoint: CanonicalEndpoint,
    api_key: Option<String>,
}

impl RestClient {
    pub fn new(endpoint: CanonicalEndpoint, api_key: Option<&str>, timeout: Duration) -> Result<Self, TransportError> {
        Ok(RestClient {
            http: http_client(timeout)?,
            endpoint,
            api_key: api_key.filter(|k| !k.is_empty()).map(str::to_string),
        })
    }

    pub fn from_descriptor(desc: &EndpointDescriptor, timeout: Duration) -> Result<Self, TransportError> {
        Self::new(desc.normalize(), desc.api_key.as_deref(), timeout)
    }

    pub fn endpoint(&self) -> &CanonicalEndpoint {
        &self.endpoint
    }

    pub async fn get(&self, path: &str) -> Result<Response, TransportError> {
        self.send(Method::GET, path).await
    }

    pub async fn delete(&self, path: &str) -> Result<Response, TransportError> {
        self.send(Method::DELETE, path).await
    }

    async fn send(&self, method: Method, path: &str) -> Result<Response, TransportError> {
        let url = self.endpoint.url(path);
        debug!(%method, %url, authenticated = self.api_key.is_some(), "rest request");
        let mut req = self.http.request(method, &url);
        if let Some(key) = &self.api_key {
            req = req.header(API_KEY_HEADER, key);
        }
        req.send().await.map_err(|e| TransportError::from(&e))
    }
}

#[derive(Debug, Deserialize)]
struct ListCollectionsResponse {
    #[serde(default)]
    result: ListCollectionsResult,
}

#[derive(Debug, Default, Deserialize)]
struct ListCollectionsResult {
    #[serde(default)]
    collections: Vec<CollectionDescription>,
}

#[derive(Debug, Deserialize)]
struct CollectionDescription {
    name: String,
}

fn parse_inventory(body: &[u8]) -> Result<CollectionInventory, serde_json::Error> {
    let parsed: ListCollectionsResponse = serde_json::from_slice(body)?;
    Ok(CollectionInventory { names: parsed.result.collections.into_iter().map(|c| c.name).collect() })
}

/// Probe a normalized endpoint with the default timeout.
pub async fn probe(endpoint: &CanonicalEndpoint, api_key: Option<&str>) -> ProbeOutcome {
    probe_with_timeout(endpoint, api_key, DEFAULT_TIMEOUT).await
}

pub async fn probe_with_timeout(endpoint: &CanonicalEndpoint, api_key: Option<&str>, timeout: Duration) -> ProbeOutcome {
    let client = match RestClient::new(endpoint.clone(), api_key, timeout) {
        Ok(c) => c,
        Err(e) => return failure_outcome(&e.into(), "collection listing"),
    };
    probe_client(&client).await
}

/// Run the inventory call on an existing client. Read-only.
pub async fn probe_client(client: &RestClient) -> ProbeOutcome {
    let outcome = match client.get("/collections").await {
        Ok(resp) if resp.status().as_u16() == 200 => read_inventory(resp).await,
        Ok(resp) => failure_outcome(&TransportResult::Status(resp.status().as_u16()), "collection listing"),
        Err(e) => failure_outcome(&e.into(), "collection listing"),
    };
    info!(backend = "rest", base_url = %client.endpoint().base_url, status = %outcome.status(), "probe finished");
    outcome
}

async fn read_inventory(resp: Response) -> ProbeOutcome {
    let body = match resp.bytes().await {
        Ok(b) => b,
        Err(e) => {
            return ProbeOutcome::success(
                Confidence::Verified,
                format!("connected, but the response body could not be read: {}", TransportError::from(&e)),
                None,
            )
        }
    };
    match parse_inventory(&body) {
        Ok(inv) => {
            let message = format!("connected; {} collection(s) available", inv.count());
            ProbeOutcome::success(Confidence::Verified, message, Some(inv))
        }
        Err(e) => {
            debug!(error = %e, "unexpected collection listing body");
            ProbeOutcome::success(Confidence::Verified, format!("connected, but the collection list was unreadable: {}", e), None)
        }
    }
}
