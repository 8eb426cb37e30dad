//! Core types shared by the probes: endpoints, outcomes and the classifier.

pub mod classify;
pub mod endpoint;
pub mod outcome;
pub mod transport;

pub use classify::{classify, failure_outcome, TransportError, TransportResult};
pub use endpoint::{normalize, BackendKind, CanonicalEndpoint, EndpointDescriptor, Scheme};
pub use outcome::{CollectionInventory, CollectionState, Confidence, DeleteResult, ProbeOutcome, ProbeStatus};

pub const fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!version().is_empty());
    }
}
