//! Outcome classifier: the one table that maps raw transport results to a `ProbeStatus`.

use crate::outcome::{ProbeOutcome, ProbeStatus};
use std::error::Error as StdError;
use std::io;
use thiserror::Error;

/// A request that never produced an HTTP status, reduced to what matters for diagnosis.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("TLS negotiation failed: {0}")]
    Tls(String),
    #[error("connection refused: {0}")]
    Refused(String),
    #[error("no route to host: {0}")]
    NoRoute(String),
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("name resolution failed: {0}")]
    Dns(String),
    #[error("{0}")]
    Other(String),
}

/// What came back from the wire: either a status code or a transport failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportResult {
    Status(u16),
    Failed(TransportError),
}

impl From<TransportError> for TransportResult {
    fn from(e: TransportError) -> Self {
        TransportResult::Failed(e)
    }
}

/// First match wins; the order mirrors the diagnosis table.
pub fn classify(result: &TransportResult) -> ProbeStatus {
    match result {
        TransportResult::Status(200) => ProbeStatus::Success,
        TransportResult::Status(401) => ProbeStatus::AuthenticationFailed,
        TransportResult::Status(403) => ProbeStatus::PermissionDenied,
        TransportResult::Status(404) => ProbeStatus::NotFound,
        TransportResult::Status(_) => ProbeStatus::RequestFailed,
        TransportResult::Failed(TransportError::Tls(_)) => ProbeStatus::TlsError,
        TransportResult::Failed(
            TransportError::Refused(_) | TransportError::NoRoute(_) | TransportError::Timeout(_),
        ) => ProbeStatus::Unreachable,
        TransportResult::Failed(TransportError::Dns(_)) => ProbeStatus::NameResolutionFailed,
        TransportResult::Failed(TransportError::Other(_)) => ProbeStatus::UnknownError,
    }
}

/// Classify and attach a human-readable message. `target` names what was asked for
/// (for example "collection listing") and only shows up in failure messages.
///
/// A 200 is never turned into a success here: callers that get one have a body
/// to read and build the success outcome themselves.
pub fn failure_outcome(result: &TransportResult, target: &str) -> ProbeOutcome {
    let status = classify(result);
    let message = match (status, result) {
        (ProbeStatus::AuthenticationFailed, _) => {
            "authentication failed: check the API key credentials".to_string()
        }
        (ProbeStatus::PermissionDenied, _) => {
            format!("permission denied for {}: the API key lacks access", target)
        }
        (ProbeStatus::NotFound, _) => format!("{} not found (HTTP 404)", target),
        (_, TransportResult::Status(code)) => format!("{} failed with HTTP status {}", target, code),
        (ProbeStatus::TlsError, TransportResult::Failed(e)) => format!("TLS error: {}", e),
        (ProbeStatus::Unreachable, TransportResult::Failed(e)) => format!("unreachable: {}", e),
        (ProbeStatus::NameResolutionFailed, TransportResult::Failed(e)) => e.to_string(),
        (_, TransportResult::Failed(e)) => format!("unknown error: {}", e),
    };
    ProbeOutcome::failure(status, message)
}

impl From<&reqwest::Error> for TransportError {
    fn from(err: &reqwest::Error) -> Self {
        let text = chain_text(err);
        // the top-level message embeds the URL, so heuristics only look at the causes
        let lower = err.source().map(chain_text).unwrap_or_default().to_ascii_lowercase();
        if has_tls_cause(err) || mentions_tls(&lower) {
            return TransportError::Tls(text);
        }
        if err.is_timeout() {
            return TransportError::Timeout(text);
        }
        if let Some(kind) = io_kind(err) {
            match kind {
                io::ErrorKind::ConnectionRefused | io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted => {
                    return TransportError::Refused(text)
                }
                io::ErrorKind::TimedOut => return TransportError::Timeout(text),
                _ => {}
            }
        }
        if lower.contains("no route to host") || lower.contains("network is unreachable") || lower.contains("host is unreachable") {
            return TransportError::NoRoute(text);
        }
        if lower.contains("connection refused") {
            return TransportError::Refused(text);
        }
        if mentions_dns(&lower) {
            return TransportError::Dns(text);
        }
        TransportError::Other(text)
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError::from(&err)
    }
}

/// The whole `source()` chain joined, so nested causes reach the message.
fn chain_text(err: &(dyn StdError + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut cur = err.source();
    while let Some(e) = cur {
        let s = e.to_string();
        if !parts.iter().any(|p| p.contains(&s)) {
            parts.push(s);
        }
        cur = e.source();
    }
    parts.join(": ")
}

fn causes<'a>(err: &'a (dyn StdError + 'static)) -> impl Iterator<Item = &'a (dyn StdError + 'static)> {
    std::iter::successors(Some(err), |&e| e.source())
}

fn has_tls_cause(err: &reqwest::Error) -> bool {
    causes(err).any(is_rustls)
}

/// io::Error skips its payload in source(), and the TLS stack nests them, so unwrap every layer.
fn is_rustls(err: &(dyn StdError + 'static)) -> bool {
    let mut cur = err;
    loop {
        if cur.downcast_ref::<rustls::Error>().is_some() {
            return true;
        }
        match cur.downcast_ref::<io::Error>().and_then(|io| io.get_ref()) {
            Some(inner) => cur = inner,
            None => return false,
        }
    }
}

fn io_kind(err: &reqwest::Error) -> Option<io::ErrorKind> {
    causes(err).find_map(|e| e.downcast_ref::<io::Error>().map(|io| io.kind()))
}

fn mentions_tls(lower: &str) -> bool {
    lower.contains("certificate") || lower.contains("handshake") || lower.contains("tls") || lower.contains("ssl")
}

fn mentions_dns(lower: &str) -> bool {
    lower.contains("dns error")
        || lower.contains("failed to lookup address")
        || lower.contains("name or service not known")
        || lower.contains("nodename nor servname")
        || lower.contains("no such host")
        || lower.contains("temporary failure in name resolution")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn every_transport_error() -> Vec<TransportError> {
        vec![
            TransportError::Tls("bad cert".into()),
            TransportError::Refused("refused".into()),
            TransportError::NoRoute("no route".into()),
            TransportError::Timeout("slow".into()),
            TransportError::Dns("nxdomain".into()),
            TransportError::Other("weird".into()),
        ]
    }

    #[test]
    fn fixed_status_codes() {
        assert_eq!(classify(&TransportResult::Status(200)), ProbeStatus::Success);
        assert_eq!(classify(&TransportResult::Status(401)), ProbeStatus::AuthenticationFailed);
        assert_eq!(classify(&TransportResult::Status(403)), ProbeStatus::PermissionDenied);
        assert_eq!(classify(&TransportResult::Status(404)), ProbeStatus::NotFound);
        assert_eq!(classify(&TransportResult::Status(500)), ProbeStatus::RequestFailed);
        assert_eq!(classify(&TransportResult::Status(201)), ProbeStatus::RequestFailed);
    }

    #[test]
    fn every_status_code_maps_to_one_status() {
        for code in 100u16..=599 {
            let s = classify(&TransportResult::Status(code));
            assert!(ProbeStatus::ALL.contains(&s));
            let transportish = matches!(
                s,
                ProbeStatus::TlsError | ProbeStatus::Unreachable | ProbeStatus::NameResolutionFailed | ProbeStatus::UnknownError
            );
            assert!(!transportish, "HTTP {code} classified as transport failure");
            if code != 200 {
                let o = failure_outcome(&TransportResult::Status(code), "probe");
                assert_eq!(o.status(), s);
            }
        }
    }

    #[test]
    fn every_transport_error_maps_to_one_status() {
        let expected = [
            ProbeStatus::TlsError,
            ProbeStatus::Unreachable,
            ProbeStatus::Unreachable,
            ProbeStatus::Unreachable,
            ProbeStatus::NameResolutionFailed,
            ProbeStatus::UnknownError,
        ];
        for (e, want) in every_transport_error().into_iter().zip(expected) {
            assert_eq!(classify(&e.clone().into()), want, "{e:?}");
        }
    }

    #[test]
    fn messages_carry_useful_text() {
        let auth = failure_outcome(&TransportResult::Status(401), "collection listing");
        assert!(auth.message().contains("credentials"));
        let other = failure_outcome(&TransportResult::Status(503), "collection listing");
        assert!(other.message().contains("503"));
        let unknown = failure_outcome(&TransportError::Other("socket exploded".into()).into(), "x");
        assert!(unknown.message().contains("socket exploded"));
        assert!(unknown.detail().is_none());
    }

    #[test]
    fn text_heuristics() {
        assert!(mentions_dns("error trying to connect: dns error: failed to lookup address information"));
        assert!(!mentions_dns("connection refused"));
        assert!(mentions_tls("invalid peer certificate: unknownissuer"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn https_to_plain_http_is_tls_error() {
        let server = wiremock::MockServer::start().await;
        let client = crate::transport::http_client(std::time::Duration::from_secs(3)).expect("client");
        let err = client
            .get(format!("https://127.0.0.1:{}/collections", server.address().port()))
            .send()
            .await
            .expect_err("plain http cannot complete a TLS handshake");
        let te = TransportError::from(&err);
        assert!(matches!(te, TransportError::Tls(_)), "{te:?}");
        assert_eq!(classify(&te.into()), ProbeStatus::TlsError);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn closed_port_is_unreachable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();
        drop(listener);
        let client = crate::transport::http_client(std::time::Duration::from_secs(2)).expect("client");
        let err = client
            .get(format!("http://127.0.0.1:{}/collections", port))
            .send()
            .await
            .expect_err("nothing listens there");
        let te = TransportError::from(&err);
        assert_eq!(classify(&te.into()), ProbeStatus::Unreachable);
    }
}
