//! Failure-sentinel detection.
//!
//! The analyst personas are instructed to open with a fixed sentinel phrase
//! when a supplied document cannot be analysed. Detection happens exactly
//! once, immediately after the gateway call; downstream code branches on the
//! tag instead of re-testing raw response text.

/// A completion response tagged with the failure-detection verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedCompletion {
    /// The response text, unchanged.
    pub text: String,
    /// Whether the text contains the failure sentinel.
    pub failure_signaled: bool,
}

/// Detects the persona's failure sentinel in completion output.
///
/// Matching is case-insensitive containment: models occasionally restyle
/// the casing or embed the phrase mid-sentence.
pub struct FailureDetector {
    /// Sentinel phrase, lowercased at construction.
    sentinel: String,
}

impl FailureDetector {
    /// Creates a detector for `sentinel`. An empty sentinel disables
    /// detection entirely rather than matching every response.
    pub fn new(sentinel: impl Into<String>) -> Self {
        Self {
            sentinel: sentinel.into().to_lowercase(),
        }
    }

    /// Tags a completion with whether it signals an analysis failure.
    pub fn tag(&self, text: impl Into<String>) -> TaggedCompletion {
        let text = text.into();
        let failure_signaled =
            !self.sentinel.is_empty() && text.to_lowercase().contains(&self.sentinel);
        TaggedCompletion {
            text,
            failure_signaled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_sentinel_is_detected() {
        let detector = FailureDetector::new("DOCUMENT UNUSABLE");
        assert!(detector.tag("DOCUMENT UNUSABLE").failure_signaled);
    }

    #[test]
    fn test_detection_is_case_insensitive_containment() {
        let detector = FailureDetector::new("DOCUMENT UNUSABLE");
        let tagged = detector.tag("I must report this document unusable: page 3 is blank.");
        assert!(tagged.failure_signaled);
        assert_eq!(
            tagged.text,
            "I must report this document unusable: page 3 is blank."
        );
    }

    #[test]
    fn test_ordinary_response_is_not_flagged() {
        let detector = FailureDetector::new("DOCUMENT UNUSABLE");
        assert!(!detector.tag("The bid totals $1.2M across five trades.").failure_signaled);
    }

    #[test]
    fn test_empty_sentinel_never_matches() {
        let detector = FailureDetector::new("");
        assert!(!detector.tag("any response at all").failure_signaled);
    }
}
