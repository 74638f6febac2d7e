//! Decoded-payload validation
//!
//! The dispatch sink asks a validator whether a payload is rejected and
//! sends negative or positive feedback accordingly. The rule itself is a
//! placeholder hook, replaceable without touching dispatch.

use tracing::debug;

use crate::capture::DecodedData;

/// Decides whether a decoded payload gets negative feedback
pub trait PayloadValidator: Send + Sync {
    fn is_rejected(&self, payload: &DecodedData) -> bool;
}

impl<F> PayloadValidator for F
where
    F: Fn(&DecodedData) -> bool + Send + Sync,
{
    fn is_rejected(&self, payload: &DecodedData) -> bool {
        self(payload)
    }
}

/// Rejects payloads whose data ends with a suffix; an empty suffix rejects nothing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuffixRule {
    suffix: String,
}

impl SuffixRule {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self { suffix: suffix.into() }
    }
}

impl PayloadValidator for SuffixRule {
    fn is_rejected(&self, payload: &DecodedData) -> bool {
        let rejected = !self.suffix.is_empty() && payload.data.ends_with(&self.suffix);
        debug!(data = %payload.data, suffix = %self.suffix, rejected, "SuffixRule::is_rejected: called");
        rejected
    }
}

/// Accepts everything
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl PayloadValidator for AcceptAll {
    fn is_rejected(&self, _payload: &DecodedData) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(s: &str) -> DecodedData {
        DecodedData::new("Code 128", s)
    }

    #[test]
    fn test_suffix_rule() {
        let rule = SuffixRule::new("6");
        assert!(rule.is_rejected(&data("A1236")));
        assert!(!rule.is_rejected(&data("A123")));
        assert!(!rule.is_rejected(&data("")));
    }

    #[test]
    fn test_empty_suffix_rejects_nothing() {
        let rule = SuffixRule::new("");
        assert!(!rule.is_rejected(&data("A1236")));
    }

    #[test]
    fn test_closure_validator() {
        let starts_with_x = |p: &DecodedData| p.data.starts_with('X');
        assert!(starts_with_x.is_rejected(&data("X1")));
        assert!(!starts_with_x.is_rejected(&data("1X")));
        assert!(!AcceptAll.is_rejected(&data("X1")));
    }
}
