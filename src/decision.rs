/*!
 * Decision Resolver
 * Applies a programmed expectation when one matches the request key,
 * otherwise the process-wide default decision
 */

use crate::expectation::{ExpectationStore, Keyed};
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// Outcome of a mock decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    /// Approved / no duplicate found
    Accept,
    /// Rejected / duplicate found
    Reject,
}

impl Decision {
    /// Case-insensitive. Anything unrecognised fails open to `Accept`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "REJECTED" | "REJECT" | "DUPLICATE" => Decision::Reject,
            _ => Decision::Accept,
        }
    }
}

/// An expectation that can force a decision and delay the response
pub trait DecisionOverride: Keyed {
    /// Empty or absent means "use the default decision"
    fn forced_decision(&self) -> Option<&str>;

    fn delay_secs(&self) -> u64;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub decision: Decision,
    /// Gallery reference IDs reported back, in request order. Empty on accept.
    pub candidates: Vec<String>,
    /// Delivery delay. Not part of the response payload.
    pub delay_secs: u64,
    /// Whether an expectation matched the key
    pub matched: bool,
}

pub struct DecisionResolver<E> {
    expectations: Arc<ExpectationStore<E>>,
    default_decision: RwLock<String>,
}

impl<E> DecisionResolver<E>
where
    E: DecisionOverride + Clone + Default,
{
    pub fn new(expectations: Arc<ExpectationStore<E>>, default_decision: impl Into<String>) -> Self {
        Self {
            expectations,
            default_decision: RwLock::new(default_decision.into()),
        }
    }

    pub fn expectations(&self) -> &ExpectationStore<E> {
        &self.expectations
    }

    pub fn default_decision(&self) -> String {
        self.default_decision
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_default_decision(&self, decision: impl Into<String>) {
        *self
            .default_decision
            .write()
            .unwrap_or_else(PoisonError::into_inner) = decision.into();
    }

    /// Resolve the decision for `key` against the candidate `gallery`.
    pub fn resolve<'a, I>(&self, key: &str, gallery: I) -> Resolution
    where
        I: IntoIterator<Item = &'a str>,
    {
        let expectation = self.expectations.lookup(key);

        let forced = expectation
            .as_ref()
            .and_then(|e| e.forced_decision())
            .filter(|d| !d.trim().is_empty())
            .map(Decision::parse);

        let decision = match forced {
            Some(decision) => decision,
            None => Decision::parse(&self.default_decision()),
        };

        let candidates = match decision {
            Decision::Reject => gallery.into_iter().map(str::to_string).collect(),
            Decision::Accept => Vec::new(),
        };

        let delay_secs = expectation.as_ref().map_or(0, |e| e.delay_secs());

        debug!(
            key,
            ?decision,
            matched = expectation.is_some(),
            delay_secs,
            "Resolved mock decision"
        );

        Resolution {
            decision,
            candidates,
            delay_secs,
            matched: expectation.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default)]
    struct Programmed {
        key: String,
        decision: String,
        delay: u64,
    }

    impl Keyed for Programmed {
        fn key(&self) -> &str {
            &self.key
        }
    }

    impl DecisionOverride for Programmed {
        fn forced_decision(&self) -> Option<&str> {
            Some(&self.decision)
        }

        fn delay_secs(&self) -> u64 {
            self.delay
        }
    }

    fn resolver(default: &str) -> DecisionResolver<Programmed> {
        DecisionResolver::new(Arc::new(ExpectationStore::new()), default)
    }

    const GALLERY: [&str; 3] = ["ref-3", "ref-1", "ref-2"];

    #[test]
    fn parse_is_case_insensitive_and_fails_open() {
        assert_eq!(Decision::parse("rejected"), Decision::Reject);
        assert_eq!(Decision::parse(" REJECTED "), Decision::Reject);
        assert_eq!(Decision::parse("Duplicate"), Decision::Reject);
        assert_eq!(Decision::parse("APPROVED"), Decision::Accept);
        assert_eq!(Decision::parse("maybe"), Decision::Accept);
        assert_eq!(Decision::parse(""), Decision::Accept);
    }

    #[test]
    fn unmatched_key_uses_default() {
        let resolver = resolver("REJECTED");
        let resolution = resolver.resolve("rid-9", GALLERY);

        assert_eq!(resolution.decision, Decision::Reject);
        assert_eq!(resolution.candidates, vec!["ref-3", "ref-1", "ref-2"]);
        assert_eq!(resolution.delay_secs, 0);
        assert!(!resolution.matched);
    }

    #[test]
    fn expectation_overrides_default() {
        let resolver = resolver("REJECTED");
        resolver.expectations().insert(Programmed {
            key: "rid-1".to_string(),
            decision: "APPROVED".to_string(),
            delay: 5,
        });

        let resolution = resolver.resolve("rid-1", GALLERY);
        assert_eq!(resolution.decision, Decision::Accept);
        assert!(resolution.candidates.is_empty());
        assert_eq!(resolution.delay_secs, 5);
    }

    #[test]
    fn empty_forced_decision_keeps_delay_but_uses_default() {
        let resolver = resolver("APPROVED");
        resolver.expectations().insert(Programmed {
            key: "rid-2".to_string(),
            decision: String::new(),
            delay: 3,
        });

        let resolution = resolver.resolve("rid-2", GALLERY);
        assert_eq!(resolution.decision, Decision::Accept);
        assert_eq!(resolution.delay_secs, 3);
        assert!(resolution.matched);
    }

    #[test]
    fn resolution_is_deterministic() {
        let resolver = resolver("REJECTED");
        let first = resolver.resolve("rid-3", GALLERY);
        for _ in 0..10 {
            assert_eq!(resolver.resolve("rid-3", GALLERY), first);
        }
    }

    #[test]
    fn default_decision_can_be_replaced() {
        let resolver = resolver("APPROVED");
        assert_eq!(resolver.resolve("rid", GALLERY).decision, Decision::Accept);

        resolver.set_default_decision("REJECTED");
        assert_eq!(resolver.default_decision(), "REJECTED");
        assert_eq!(resolver.resolve("rid", GALLERY).candidates.len(), GALLERY.len());
    }
}
