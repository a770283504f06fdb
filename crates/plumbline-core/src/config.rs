use serde::{Deserialize, Serialize};

/// Tunable policy constants of the orchestration engines.
///
/// Every field has a serde default so a partial TOML file (or an empty
/// one) yields a working configuration.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    /// Unsummarized history size (in characters) above which compaction runs.
    #[serde(default = "default_compaction_threshold_chars")]
    pub compaction_threshold_chars: usize,

    /// Whether exchanges flagged as analysis turns also trigger compaction.
    /// Off by default: walkthrough pipelines fire many exchanges back to
    /// back and compacting mid-pipeline wastes completion calls.
    #[serde(default)]
    pub compact_analysis_turns: bool,

    /// Sentinel phrase the persona emits when a document cannot be analysed.
    /// Matched case-insensitively against response text.
    #[serde(default = "default_failure_sentinel")]
    pub failure_sentinel: String,

    /// Upper bound on auto-derived conversation titles, in characters.
    #[serde(default = "default_title_max_chars")]
    pub title_max_chars: usize,

    /// Deadline for one completion call, in seconds.
    #[serde(default = "default_gateway_deadline_secs")]
    pub gateway_deadline_secs: u64,

    /// Deadline for one summarization call, in seconds. Kept shorter than
    /// the analysis deadline since compaction is best-effort.
    #[serde(default = "default_compaction_deadline_secs")]
    pub compaction_deadline_secs: u64,

    /// Deadline for resolving one attachment from the blob store, in seconds.
    #[serde(default = "default_blob_deadline_secs")]
    pub blob_deadline_secs: u64,
}

fn default_compaction_threshold_chars() -> usize {
    240_000
}

fn default_failure_sentinel() -> String {
    "DOCUMENT UNUSABLE".to_string()
}

fn default_title_max_chars() -> usize {
    80
}

fn default_gateway_deadline_secs() -> u64 {
    120
}

fn default_compaction_deadline_secs() -> u64 {
    60
}

fn default_blob_deadline_secs() -> u64 {
    30
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            compaction_threshold_chars: default_compaction_threshold_chars(),
            compact_analysis_turns: false,
            failure_sentinel: default_failure_sentinel(),
            title_max_chars: default_title_max_chars(),
            gateway_deadline_secs: default_gateway_deadline_secs(),
            compaction_deadline_secs: default_compaction_deadline_secs(),
            blob_deadline_secs: default_blob_deadline_secs(),
        }
    }
}
