//! Result types shared by every probe and lifecycle call.

use serde::Serialize;
use std::fmt;

/// Flat diagnosis taxonomy. Every probe and lifecycle call lands on exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStatus {
    Success,
    AuthenticationFailed,
    PermissionDenied,
    NotFound,
    RequestFailed,
    TlsError,
    Unreachable,
    NameResolutionFailed,
    UnknownError,
}

impl ProbeStatus {
    pub const ALL: [ProbeStatus; 9] = [
        Self::Success,
        Self::AuthenticationFailed,
        Self::PermissionDenied,
        Self::NotFound,
        Self::RequestFailed,
        Self::TlsError,
        Self::Unreachable,
        Self::NameResolutionFailed,
        Self::UnknownError,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::AuthenticationFailed => "authentication_failed",
            Self::PermissionDenied => "permission_denied",
            Self::NotFound => "not_found",
            Self::RequestFailed => "request_failed",
            Self::TlsError => "tls_error",
            Self::Unreachable => "unreachable",
            Self::NameResolutionFailed => "name_resolution_failed",
            Self::UnknownError => "unknown_error",
        }
    }

    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// How much a successful outcome actually proves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// Only the hostname resolved; nothing was sent to the service.
    NameOnly,
    /// An HTTP health endpoint answered; the native protocol was not exercised.
    HealthOnly,
    /// An authenticated API call succeeded.
    Verified,
}

impl Confidence {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NameOnly => "name_only",
            Self::HealthOnly => "health_only",
            Self::Verified => "verified",
        }
    }
}

/// Names of the collections returned by an inventory call, in server order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CollectionInventory {
    pub names: Vec<String>,
}

impl CollectionInventory {
    pub fn count(&self) -> usize {
        self.names.len()
    }
}

/// Classified result of a single probe.
///
/// Only successes carry a `detail`; the constructors keep it that way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeOutcome {
    status: ProbeStatus,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    confidence: Option<Confidence>,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<CollectionInventory>,
}

impl ProbeOutcome {
    pub fn success(confidence: Confidence, message: impl Into<String>, detail: Option<CollectionInventory>) -> Self {
        ProbeOutcome { status: ProbeStatus::Success, message: message.into(), confidence: Some(confidence), detail }
    }

    /// Build a non-success outcome. Passing `Success` here is a caller bug and
    /// is downgraded to `UnknownError` rather than producing an unlabeled success.
    pub fn failure(status: ProbeStatus, message: impl Into<String>) -> Self {
        let status = if status.is_success() { ProbeStatus::UnknownError } else { status };
        ProbeOutcome { status, message: message.into(), confidence: None, detail: None }
    }

    pub fn status(&self) -> ProbeStatus {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn detail(&self) -> Option<&CollectionInventory> {
        self.detail.as_ref()
    }

    /// `None` for failures.
    pub fn confidence(&self) -> Option<Confidence> {
        self.confidence
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Point-in-time answer to "does this collection exist?".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CollectionState {
    pub exists: bool,
    pub dimension: Option<u64>,
}

impl CollectionState {
    pub const fn missing() -> Self {
        CollectionState { exists: false, dimension: None }
    }

    pub const fn present(dimension: Option<u64>) -> Self {
        CollectionState { exists: true, dimension }
    }
}

/// Result of a delete call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteResult {
    success: bool,
    message: String,
}

impl DeleteResult {
    pub fn deleted(message: impl Into<String>) -> Self {
        DeleteResult { success: true, message: message.into() }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        DeleteResult { success: false, message: message.into() }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn into_parts(self) -> (bool, String) {
        (self.success, self.message)
    }
}
