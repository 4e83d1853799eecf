use serde::{Deserialize, Serialize};

/// The JSON description of one audit run. Every entry is optional; absent
/// entries fall back to the default rules.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(rename = "contestName")]
    pub contest_name: Option<String>,
    #[serde(rename = "logFile")]
    pub log_file: Option<String>,
    #[serde(rename = "nameMatching")]
    pub name_matching: Option<NameMatchingConfig>,
    #[serde(rename = "exemptCandidates")]
    pub exempt_candidates: Option<Vec<String>>,
    #[serde(rename = "maxFraudCandidates")]
    pub max_fraud_candidates: Option<usize>,
    #[serde(rename = "rankingSize")]
    pub ranking_size: Option<usize>,
    #[serde(rename = "clusterWindowFraction")]
    pub cluster_window_fraction: Option<f64>,
}

/// Name consolidation policy, as written in the configuration file.
/// `mode` is `editDistance` or `foldedPrefix`.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct NameMatchingConfig {
    pub mode: String,
    #[serde(rename = "maxEditDistance")]
    pub max_edit_distance: Option<u32>,
    #[serde(rename = "prefixLength")]
    pub prefix_length: Option<usize>,
}
