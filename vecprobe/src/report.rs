use anyhow::Result;
use std::io::Write;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use vecprobe_core::{BackendKind, CanonicalEndpoint, ProbeOutcome};

pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_else(|_| String::new())
}

/// One probed backend, as printed or written out.
#[derive(Debug, Clone)]
pub struct BackendReport {
    pub backend: BackendKind,
    pub endpoint: CanonicalEndpoint,
    pub api_key_configured: bool,
    pub outcome: ProbeOutcome,
    pub started_at: String,
    pub ended_at: String,
    pub duration_ms: u128,
}

impl BackendReport {
    pub fn text_lines(&self) -> Vec<String> {
        let mark = if self.outcome.is_success() { "ok  " } else { "FAIL" };
        let mut lines = vec![format!(
            "{:<4} {} {} [{}] {} ({} ms, api key {})",
            self.backend,
            mark,
            self.endpoint.base_url,
            self.outcome.status(),
            self.outcome.message(),
            self.duration_ms,
            if self.api_key_configured { "configured" } else { "not configured" },
        )];
        if let Some(inv) = self.outcome.detail() {
            lines.extend(inv.names.iter().map(|n| format!("       - {}", n)));
        }
        lines
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "backend": self.backend,
            "url": self.endpoint.base_url,
            "scheme": self.endpoint.scheme,
            "host": self.endpoint.host,
            "port": self.endpoint.port,
            "api_key_configured": self.api_key_configured,
            "status": self.outcome.status(),
            "message": self.outcome.message(),
            "confidence": self.outcome.confidence(),
            "collections": self.outcome.detail().map(|d| &d.names),
            "started_at": self.started_at,
            "ended_at": self.ended_at,
            "duration_ms": self.duration_ms,
        })
    }
}

pub fn failures(reports: &[BackendReport]) -> usize {
    reports.iter().filter(|r| !r.outcome.is_success()).count()
}

pub fn write_csv<W: Write>(w: W, reports: &[BackendReport]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(w);
    wtr.write_record(["backend", "url", "status", "confidence", "message", "collections", "started_at", "ended_at", "duration_ms"])?;
    for r in reports {
        wtr.write_record([
            r.backend.label().to_string(),
            r.endpoint.base_url.clone(),
            r.outcome.status().to_string(),
            r.outcome.confidence().map(|c| c.as_str().to_string()).unwrap_or_default(),
            r.outcome.message().to_string(),
            r.outcome.detail().map(|d| d.names.join("|")).unwrap_or_default(),
            r.started_at.clone(),
            r.ended_at.clone(),
            r.duration_ms.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vecprobe_core::{normalize, CollectionInventory, Confidence, ProbeStatus};

    fn report(outcome: ProbeOutcome) -> BackendReport {
        BackendReport {
            backend: BackendKind::Rest,
            endpoint: normalize("q.example.com", 6334, BackendKind::Rest),
            api_key_configured: true,
            outcome,
            started_at: "2024-01-01T00:00:00Z".into(),
            ended_at: "2024-01-01T00:00:01Z".into(),
            duration_ms: 1000,
        }
    }

    #[test]
    fn text_lists_collections() {
        let inv = CollectionInventory { names: vec!["a".into(), "b".into()] };
        let r = report(ProbeOutcome::success(Confidence::Verified, "connected", Some(inv)));
        let lines = r.text_lines();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("https://q.example.com:6334"));
        assert!(lines[0].contains("[success]"));
        assert!(lines[2].ends_with("- b"));
    }

    #[test]
    fn json_and_csv_carry_status() {
        let r = report(ProbeOutcome::failure(ProbeStatus::AuthenticationFailed, "bad key"));
        let v = r.to_json();
        assert_eq!(v["status"], "authentication_failed");
        assert!(v["collections"].is_null());
        assert_eq!(failures(&[r.clone()]), 1);

        let mut buf = Vec::new();
        write_csv(&mut buf, &[r]).expect("csv");
        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.lines().nth(1).expect("row").contains("authentication_failed"));
    }
}
