//! Built-in prompt content.
//!
//! Provides the canonical prompt-key sequences per analysis kind and the
//! default prompt texts shipped with the orchestrator. Deployments may
//! layer their own content store over these; the keys are the contract.

use crate::walkthrough::AnalysisKind;
use once_cell::sync::Lazy;
use std::collections::HashMap;

use super::namespace;

/// Prompt key for the corrective-action directive.
pub const CORRECTIVE_ACTION_KEY: &str = "corrective_action";

/// Prompt key for the cost-optimization (value engineering) directive.
pub const VALUE_ENGINEERING_KEY: &str = "value_engineering";

/// Prompt key for the history-summarization template used by compaction.
pub const SUMMARIZATION_KEY: &str = "summarization";

/// Canonical step sequence for a bid-package review.
const BID_REVIEW_SEQUENCE: &[&str] = &[
    "bid_review.intake",
    "bid_review.scope_gaps",
    "bid_review.cost_breakdown",
    "bid_review.risk_register",
    "bid_review.recommendation",
];

/// Canonical step sequence for a supplier-quote scan.
const QUOTE_SCAN_SEQUENCE: &[&str] = &[
    "quote_scan.intake",
    "quote_scan.line_items",
    "quote_scan.compliance",
    "quote_scan.summary",
];

/// Returns the canonical prompt-key sequence for an analysis kind.
///
/// `Selected` has no canonical sequence: its sequence is supplied by the
/// caller at session start, so this returns `None` for it.
pub fn canonical_sequence(kind: AnalysisKind) -> Option<&'static [&'static str]> {
    match kind {
        AnalysisKind::BidReview => Some(BID_REVIEW_SEQUENCE),
        AnalysisKind::QuoteScan => Some(QUOTE_SCAN_SEQUENCE),
        AnalysisKind::Selected => None,
    }
}

static PRESET_PROMPTS: Lazy<HashMap<(&'static str, &'static str), &'static str>> =
    Lazy::new(|| {
        let mut m: HashMap<(&'static str, &'static str), &'static str> = HashMap::new();

        // Personas, keyed by the prompt tag recorded on the conversation.
        m.insert(
            (namespace::PERSONA, "bid_review"),
            "You are a senior construction estimator reviewing a contractor's bid package \
for a commercial project. You read drawings, scope letters, and schedules of values \
with a sceptical eye, and you answer in plain, precise language a project manager can \
act on. Ground every observation in the supplied documents; never invent quantities or \
prices. If a supplied document is illegible, truncated, or not a bid document at all, \
respond with exactly: DOCUMENT UNUSABLE, followed by one sentence naming what is wrong.",
        );
        m.insert(
            (namespace::PERSONA, "quote_scan"),
            "You are a procurement analyst for a construction management firm, scanning a \
supplier quote against the request it answers. You care about unit pricing, lead times, \
exclusions, and terms that shift risk onto the buyer. Be concise and tabular where the \
data allows. If a supplied document is illegible, truncated, or not a quote at all, \
respond with exactly: DOCUMENT UNUSABLE, followed by one sentence naming what is wrong.",
        );

        // Bid review steps.
        m.insert(
            (namespace::ANALYSIS, "bid_review.intake"),
            "Read the attached bid package. Identify the bidder, the project, the bid date, \
the total bid amount, and the list of documents the bid claims to include. Note any \
document the bid references but does not attach.",
        );
        m.insert(
            (namespace::ANALYSIS, "bid_review.scope_gaps"),
            "Compare the bid's stated scope against the trade scope implied by its own \
inclusions and exclusions. List every gap, overlap, or ambiguous boundary you find, \
quoting the bid language that creates it. Flag exclusions that are unusual for this trade.",
        );
        m.insert(
            (namespace::ANALYSIS, "bid_review.cost_breakdown"),
            "Break the bid total down by the line items the bid provides. Where the bid \
gives only a lump sum, say so. Identify line items that look materially out of range for \
the described work, and state what comparison you are basing that judgement on.",
        );
        m.insert(
            (namespace::ANALYSIS, "bid_review.risk_register"),
            "Build a risk register for accepting this bid: schedule risks, commercial terms \
that shift risk to the owner, qualification or bonding concerns, and anything in the bid \
contradicting another part of the bid. One row per risk with severity and the bid language \
that raises it.",
        );
        m.insert(
            (namespace::ANALYSIS, "bid_review.recommendation"),
            "Write a recommendation to the project manager: accept, accept with conditions, \
clarify before award, or reject. Justify it strictly from the findings of the previous \
steps, and list the specific clarification questions to put to the bidder, if any.",
        );

        // Quote scan steps.
        m.insert(
            (namespace::ANALYSIS, "quote_scan.intake"),
            "Read the attached supplier quote. Identify the supplier, quote reference, \
validity period, delivery terms, and quoted total. Note the request or specification the \
quote responds to, if stated.",
        );
        m.insert(
            (namespace::ANALYSIS, "quote_scan.line_items"),
            "Extract every line item with quantity, unit, unit price, and extended price. \
Recompute the extensions and the total; report any arithmetic that does not reconcile \
with the quoted total.",
        );
        m.insert(
            (namespace::ANALYSIS, "quote_scan.compliance"),
            "Check the quote's terms: payment terms, escalation clauses, exclusions, \
retention, and warranty. List each term that deviates from net-30, fixed-price, \
materials-warranted norms, quoting the language involved.",
        );
        m.insert(
            (namespace::ANALYSIS, "quote_scan.summary"),
            "Summarize the quote for the procurement log: supplier, total, validity, the \
three most significant findings from the previous steps, and whether the quote is ready \
to accept as priced.",
        );

        // Orchestrator directives.
        m.insert(
            (namespace::SYSTEM, CORRECTIVE_ACTION_KEY),
            "Your previous response reported the supplied document as unusable. Re-examine \
the attached material once more, reading past OCR noise, rotated pages, or unusual \
layout. If any part of it is legible, analyse that part and clearly mark what you could \
not read. Only if nothing at all is legible, repeat the unusable marker. Your previous \
response follows for reference.",
        );
        m.insert(
            (namespace::SYSTEM, VALUE_ENGINEERING_KEY),
            "\n\nAdditionally, propose value-engineering alternatives wherever the analysed \
material allows: cheaper materials or methods delivering the same specified performance, \
with the estimated saving and any trade-off named for each proposal.",
        );
        m.insert(
            (namespace::SYSTEM, SUMMARIZATION_KEY),
            "Condense the conversation below into a running summary for your own later use. \
Carry forward every document finding, figure, decision, and open question; drop \
pleasantries and restatements. Merge with the prior summary where one is given, keeping \
its still-relevant content. Write plain prose, no headings.",
        );

        m
    });

/// Returns the built-in prompt text under `(namespace, key)`, if any.
pub fn preset_prompt(namespace: &str, key: &str) -> Option<&'static str> {
    PRESET_PROMPTS.get(&(namespace, key)).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_canonical_key_has_content() {
        for kind in [AnalysisKind::BidReview, AnalysisKind::QuoteScan] {
            let sequence = canonical_sequence(kind).unwrap();
            assert!(!sequence.is_empty());
            for key in sequence {
                assert!(
                    preset_prompt(namespace::ANALYSIS, key).is_some(),
                    "missing prompt content for {key}"
                );
            }
        }
    }

    #[test]
    fn test_selected_has_no_canonical_sequence() {
        assert!(canonical_sequence(AnalysisKind::Selected).is_none());
    }

    #[test]
    fn test_directives_present() {
        assert!(preset_prompt(namespace::SYSTEM, CORRECTIVE_ACTION_KEY).is_some());
        assert!(preset_prompt(namespace::SYSTEM, VALUE_ENGINEERING_KEY).is_some());
        assert!(preset_prompt(namespace::SYSTEM, SUMMARIZATION_KEY).is_some());
    }
}
