//! Collection lifecycle against the REST backend: existence check and deletion.
//!
//! Deletion is irreversible. It takes a [`Confirmation`], which can only be made
//! from an explicit yes; how that yes is obtained is up to the caller.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rest_probe::RestClient;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};
use vecprobe_core::{classify, failure_outcome, CollectionState, DeleteResult, EndpointDescriptor, ProbeStatus, TransportError, TransportResult};

pub const DEFAULT_COLLECTION: &str = "pet-vet-embeddings";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything but RFC 3986 unreserved characters gets escaped in a path segment.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

/// Proof that the operator said yes. There is no default and no `From<bool>`.
#[derive(Debug)]
pub struct Confirmation(());

impl Confirmation {
    /// From a command-line flag such as `--yes`.
    pub fn from_flag(affirmed: bool) -> Option<Self> {
        affirmed.then_some(Confirmation(()))
    }

    /// From a typed answer; only `yes` or `y` (any case) count.
    pub fn from_answer(answer: &str) -> Option<Self> {
        let a = answer.trim().to_ascii_lowercase();
        (a == "yes" || a == "y").then_some(Confirmation(()))
    }
}

pub struct CollectionManager {
    client: RestClient,
}

impl CollectionManager {
    pub fn new(client: RestClient) -> Self {
        CollectionManager { client }
    }

    pub fn connect(desc: &EndpointDescriptor, timeout: Duration) -> Result<Self, TransportError> {
        Ok(Self::new(RestClient::from_descriptor(desc, timeout)?))
    }

    pub fn client(&self) -> &RestClient {
        &self.client
    }

    /// Anything short of a 200 reads as "does not exist".
    pub async fn exists(&self, name: &str) -> CollectionState {
        let resp = match self.client.get(&collection_path(name)).await {
            Ok(r) => r,
            Err(e) => {
                debug!(collection = name, error = %e, "existence check failed, treating as absent");
                return CollectionState::missing();
            }
        };
        let status = resp.status().as_u16();
        if classify(&TransportResult::Status(status)) != ProbeStatus::Success {
            debug!(collection = name, status, "collection not reported as present");
            return CollectionState::missing();
        }
        let dimension = match resp.json::<Value>().await {
            Ok(body) => vector_size(&body),
            Err(e) => {
                debug!(collection = name, error = %e, "collection info body unreadable");
                None
            }
        };
        CollectionState::present(dimension)
    }

    /// Issue the DELETE. One attempt, no retry on ambiguous answers.
    pub async fn delete(&self, name: &str, _confirmed: Confirmation) -> DeleteResult {
        warn!(collection = name, base_url = %self.client.endpoint().base_url, "deleting collection");
        let resp = match self.client.delete(&collection_path(name)).await {
            Ok(r) => r,
            Err(e) => {
                let outcome = failure_outcome(&e.into(), "collection deletion");
                return DeleteResult::failed(outcome.message());
            }
        };
        let status = resp.status().as_u16();
        let result = match classify(&TransportResult::Status(status)) {
            ProbeStatus::Success => DeleteResult::deleted(format!("collection '{}' deleted", name)),
            ProbeStatus::NotFound => DeleteResult::failed(format!("collection '{}' not found", name)),
            _ => {
                let body = resp.text().await.unwrap_or_default();
                DeleteResult::failed(format!("delete failed: {} - {}", status, body.trim()))
            }
        };
        info!(collection = name, status, success = result.is_success(), "delete finished");
        result
    }
}

fn collection_path(name: &str) -> String {
    format!("/collections/{}", utf8_percent_encode(name, SEGMENT))
}

/// `config.params.vectors.size`, under `result` (REST API) or at the top level.
/// Named-vector configs only count when there is exactly one vector.
fn vector_size(body: &Value) -> Option<u64> {
    let vectors = body
        .pointer("/result/config/params/vectors")
        .or_else(|| body.pointer("/config/params/vectors"))?;
    if let Some(size) = vectors.get("size").and_then(Value::as_u64) {
        return Some(size);
    }
    match vectors.as_object() {
        Some(named) if named.len() == 1 => named.values().next()?.get("size")?.as_u64(),
        _ => None,
    }
}
