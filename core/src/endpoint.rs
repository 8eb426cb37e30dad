//! Endpoint descriptors and the normalizer that turns them into canonical endpoints.

use serde::Serialize;
use std::fmt;
use std::net::Ipv6Addr;

/// Which of the two backend families an endpoint belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// REST-speaking store (Qdrant-style `/collections` API).
    Rest,
    /// RPC-speaking store (Milvus/Zilliz-style) with an optional HTTP health surface.
    Rpc,
}

impl BackendKind {
    /// Port on which a bare host is assumed to speak TLS.
    pub const fn tls_default_port(&self) -> u16 {
        match self {
            Self::Rest => 6334,
            Self::Rpc => 443,
        }
    }

    pub const fn default_port(&self) -> u16 {
        match self {
            Self::Rest => 6334,
            Self::Rpc => 19530,
        }
    }

    pub const fn label(&self) -> &'static str {
        match self {
            Self::Rest => "rest",
            Self::Rpc => "rpc",
        }
    }

    /// Managed RPC deployments are served over TLS; their hostnames give them away.
    fn host_implies_tls(&self, host: &str) -> bool {
        match self {
            Self::Rest => false,
            Self::Rpc => {
                let h = host.to_ascii_lowercase();
                h.contains("serverless") || h.contains("cloud")
            }
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Caller-supplied description of where a backend lives.
#[derive(Clone, PartialEq, Eq)]
pub struct EndpointDescriptor {
    pub backend: BackendKind,
    /// Host as typed by the operator; may carry a scheme, a port or a path.
    pub raw_host: String,
    pub port: u16,
    pub api_key: Option<String>,
}

impl EndpointDescriptor {
    pub fn new(backend: BackendKind, raw_host: impl Into<String>, port: u16) -> Self {
        EndpointDescriptor { backend, raw_host: raw_host.into(), port, api_key: None }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.is_empty());
        self
    }

    pub fn normalize(&self) -> CanonicalEndpoint {
        normalize(&self.raw_host, self.port, self.backend)
    }

    /// Derived from normalization; never an input.
    pub fn use_tls(&self) -> bool {
        self.normalize().scheme == Scheme::Https
    }
}

// Hand-written so the key never reaches logs through `{:?}`.
impl fmt::Debug for EndpointDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointDescriptor")
            .field("backend", &self.backend)
            .field("raw_host", &self.raw_host)
            .field("port", &self.port)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Normalized connection parameters. Built fresh for every call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalEndpoint {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
    pub base_url: String,
}

impl CanonicalEndpoint {
    /// `base_url` joined with an absolute path such as `/collections`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Host without IPv6 brackets, suitable for name resolution.
    pub fn hostname(&self) -> &str {
        self.host.trim_start_matches('[').trim_end_matches(']')
    }
}

/// Turn an arbitrary host string plus port into a canonical endpoint.
///
/// Never fails: garbage in yields a host that the probe will fail to reach,
/// which is reported as a network outcome rather than a parse error.
/// Precedence for the scheme: explicit prefix, then the backend's TLS port,
/// then the backend's hostname hint, then plain http.
pub fn normalize(raw_host: &str, port: u16, backend: BackendKind) -> CanonicalEndpoint {
    let trimmed = raw_host.trim();
    let (explicit, rest) = split_scheme(trimmed);
    let host = bracket_v6(strip_port(strip_path(rest)).to_string());

    let scheme = match explicit {
        Some(s) => s,
        None if port == backend.tls_default_port() => Scheme::Https,
        None if backend.host_implies_tls(&host) => Scheme::Https,
        None => Scheme::Http,
    };
    let base_url = format!("{}://{}:{}", scheme, host, port);
    CanonicalEndpoint { scheme, host, port, base_url }
}

fn split_scheme(s: &str) -> (Option<Scheme>, &str) {
    for (prefix, scheme) in [("https://", Scheme::Https), ("http://", Scheme::Http)] {
        if let Some(head) = s.get(..prefix.len()) {
            if head.eq_ignore_ascii_case(prefix) {
                return (Some(scheme), &s[prefix.len()..]);
            }
        }
    }
    (None, s)
}

fn strip_path(s: &str) -> &str {
    match s.find(|c| matches!(c, '/' | '?' | '#')) {
        Some(idx) => &s[..idx],
        None => s,
    }
}

fn strip_port(authority: &str) -> &str {
    if authority.starts_with('[') {
        // [v6]:port keeps its brackets
        return match authority.find(']') {
            Some(end) => &authority[..=end],
            None => authority,
        };
    }
    if authority.parse::<Ipv6Addr>().is_ok() {
        return authority;
    }
    match authority.rsplit_once(':') {
        Some((host, port)) if port.parse::<u16>().is_ok() => host,
        _ => authority,
    }
}

fn bracket_v6(host: String) -> String {
    if host.parse::<Ipv6Addr>().is_ok() { format!("[{}]", host) } else { host }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renormalize(ep: &CanonicalEndpoint, backend: BackendKind) -> CanonicalEndpoint {
        normalize(&ep.base_url, ep.port, backend)
    }

    #[test]
    fn bare_host_on_tls_port_is_https() {
        let ep = normalize("qdrant.example.com", 6334, BackendKind::Rest);
        assert_eq!(ep.scheme, Scheme::Https);
        assert_eq!(ep.host, "qdrant.example.com");
        assert_eq!(ep.base_url, "https://qdrant.example.com:6334");
    }

    #[test]
    fn bare_host_elsewhere_is_http() {
        let ep = normalize("localhost", 6333, BackendKind::Rest);
        assert_eq!(ep.base_url, "http://localhost:6333");
    }

    #[test]
    fn explicit_scheme_wins_over_port() {
        let ep = normalize("http://qdrant.internal", 6334, BackendKind::Rest);
        assert_eq!(ep.scheme, Scheme::Http);
        assert_eq!(ep.base_url, "http://qdrant.internal:6334");

        let ep = normalize("HTTPS://db.example.com/", 8080, BackendKind::Rest);
        assert_eq!(ep.scheme, Scheme::Https);
        assert_eq!(ep.host, "db.example.com");
    }

    #[test]
    fn embedded_port_and_path_are_dropped() {
        let ep = normalize("https://db.example.com:9999/collections", 6334, BackendKind::Rest);
        assert_eq!(ep.host, "db.example.com");
        assert_eq!(ep.base_url, "https://db.example.com:6334");
    }

    #[test]
    fn rpc_cloud_hosts_are_tls() {
        let ep = normalize("in03-abc.serverless.aws-eu-central-1.cloud.zilliz.com", 19530, BackendKind::Rpc);
        assert_eq!(ep.scheme, Scheme::Https);
        let ep = normalize("milvus.local", 19530, BackendKind::Rpc);
        assert_eq!(ep.scheme, Scheme::Http);
    }

    #[test]
    fn ipv6_literals_keep_brackets() {
        let ep = normalize("[::1]:6333", 6333, BackendKind::Rest);
        assert_eq!(ep.host, "[::1]");
        assert_eq!(ep.hostname(), "::1");
        assert_eq!(ep.base_url, "http://[::1]:6333");

        let ep = normalize("::1", 6333, BackendKind::Rest);
        assert_eq!(ep.host, "[::1]");
    }

    #[test]
    fn malformed_input_does_not_panic() {
        for raw in ["", "   ", "://", "http://", "host:notaport", "a b c", "https://:::"] {
            let ep = normalize(raw, 1, BackendKind::Rest);
            assert!(ep.base_url.starts_with(ep.scheme.as_str()));
        }
        assert_eq!(normalize("host:notaport", 80, BackendKind::Rest).host, "host:notaport");
    }

    #[test]
    fn normalization_is_idempotent() {
        let cases = [
            ("qdrant.example.com", 6334),
            ("qdrant.example.com", 6333),
            ("http://10.0.0.5", 6334),
            ("https://x.cloud.qdrant.io", 443),
            ("  spaced.example.org  ", 80),
            ("[fe80::1]", 6334),
            ("host:notaport", 1234),
            ("2001:db8::7", 6333),
        ];
        for backend in [BackendKind::Rest, BackendKind::Rpc] {
            for (raw, port) in cases {
                let once = normalize(raw, port, backend);
                assert_eq!(renormalize(&once, backend), once, "{raw}:{port} ({backend})");
            }
        }
    }

    #[test]
    fn descriptor_debug_redacts_key() {
        let d = EndpointDescriptor::new(BackendKind::Rest, "h", 1).with_api_key(Some("sekrit".into()));
        let dbg = format!("{:?}", d);
        assert!(!dbg.contains("sekrit"));
        assert!(!d.use_tls());
    }

    #[test]
    fn empty_api_key_is_treated_as_absent() {
        let d = EndpointDescriptor::new(BackendKind::Rest, "h", 1).with_api_key(Some(String::new()));
        assert!(d.api_key.is_none());
    }
}
