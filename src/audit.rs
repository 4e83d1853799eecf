use log::{info, warn};

use fraud_analysis::*;
use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::Path;

use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::Args;
use crate::audit::config_reader::AuditConfig;

pub mod config_reader;
pub mod log_reader;

#[derive(Debug, Snafu)]
pub enum AuditError {
    #[snafu(display("Error opening vote log {path}"))]
    OpeningLog {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error opening configuration {path}"))]
    OpeningConfig {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing configuration"))]
    ParsingConfig { source: serde_json::Error },
    #[snafu(display("Error opening reference summary {path}"))]
    OpeningReference {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing reference summary"))]
    ParsingReference { source: serde_json::Error },
    #[snafu(display("Error rendering summary"))]
    RenderingSummary { source: serde_json::Error },
    #[snafu(display("Error writing summary to {path}"))]
    WritingSummary {
        source: std::io::Error,
        path: String,
    },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type AuditResult<T> = Result<T, AuditError>;

fn validate_rules(config: &AuditConfig) -> AuditResult<AuditRules> {
    let mut rules = AuditRules::default_rules();
    if let Some(nm) = &config.name_matching {
        rules.name_matching = match nm.mode.as_str() {
            "editDistance" => NameMatching::EditDistance {
                max_distance: nm.max_edit_distance.unwrap_or(2),
            },
            "foldedPrefix" => NameMatching::FoldedPrefix {
                prefix_len: nm.prefix_length.unwrap_or(8),
            },
            x => {
                whatever!(
                    "Cannot use name matching mode {:?} (currently not implemented)",
                    x
                )
            }
        };
    }
    if let Some(cands) = &config.exempt_candidates {
        rules.exempt_candidates = cands.clone();
    }
    if let Some(n) = config.max_fraud_candidates {
        rules.max_fraud_candidates = n;
    }
    if let Some(n) = config.ranking_size {
        rules.ranking_size = n;
    }
    if let Some(f) = config.cluster_window_fraction {
        rules.cluster_window_fraction = f;
    }
    Ok(rules)
}

fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}

/// The two-section report: fraud candidates with their reasons, then the
/// clean ranking of everyone else.
fn format_report(contest: &str, stats: &FraudStats) -> String {
    let mut out = String::new();
    out.push_str(&format!("Vote audit for {}\n", contest));
    out.push_str(&format!(
        "{} votes over {} candidates after name consolidation\n\n",
        stats.total_votes,
        stats.groups.len()
    ));

    out.push_str("Fraud candidates:\n");
    if stats.fraud_candidates.is_empty() {
        out.push_str("  (none detected)\n");
    }
    for v in stats.fraud_candidates.iter() {
        out.push_str(&format!(
            "  {}: {} votes (score {})\n",
            v.candidate, v.vote_count, v.score
        ));
        for r in v.reasons.iter() {
            out.push_str(&format!("    - {}\n", r));
        }
    }

    out.push_str("\nClean ranking:\n");
    for (idx, (name, votes)) in stats.ranking.iter().enumerate() {
        out.push_str(&format!("  {:2}. {} ({} votes)\n", idx + 1, name, votes));
    }
    out
}

fn build_summary_js(contest: &str, stats: &FraudStats) -> JSValue {
    let fraud: Vec<JSValue> = stats
        .fraud_candidates
        .iter()
        .map(|v| {
            json!({
                "candidate": v.candidate,
                "votes": v.vote_count.to_string(),
                "score": v.score.to_string(),
                "reasons": v.reasons,
            })
        })
        .collect();
    let ranking: Vec<JSValue> = stats
        .ranking
        .iter()
        .enumerate()
        .map(|(idx, (name, votes))| {
            json!({
                "rank": (idx + 1).to_string(),
                "candidate": name,
                "votes": votes.to_string(),
            })
        })
        .collect();
    json!({
        "config": { "contest": contest },
        "totalVotes": stats.total_votes.to_string(),
        "fraudCandidates": fraud,
        "ranking": ranking,
    })
}

pub fn run_audit(args: &Args) -> AuditResult<()> {
    let config: Option<AuditConfig> = match &args.config {
        Some(path) => {
            let config_str =
                fs::read_to_string(path).context(OpeningConfigSnafu { path: path.clone() })?;
            let c: AuditConfig =
                serde_json::from_str(&config_str).context(ParsingConfigSnafu {})?;
            info!("run_audit: config: {:?}", c);
            Some(c)
        }
        None => None,
    };

    let rules = match &config {
        Some(c) => validate_rules(c)?,
        None => AuditRules::default_rules(),
    };

    let log_path = match args
        .input
        .clone()
        .or_else(|| config.as_ref().and_then(|c| c.log_file.clone()))
    {
        Some(p) => p,
        None => {
            whatever!("No vote log provided: use --input or the logFile configuration entry")
        }
    };

    let records = log_reader::read_log_file(&log_path)?;
    info!(
        "run_audit: {} vote records read from {}",
        records.len(),
        log_path
    );

    let stats = match run_fraud_stats(&records, &rules) {
        Result::Ok(x) => x,
        Result::Err(x) => {
            whatever!("Analysis error: {:?}", x)
        }
    };

    let contest = config
        .as_ref()
        .and_then(|c| c.contest_name.clone())
        .unwrap_or_else(|| simplify_file_name(&log_path));

    println!("{}", format_report(&contest, &stats));

    let summary_js = build_summary_js(&contest, &stats);
    let pretty_js_stats =
        serde_json::to_string_pretty(&summary_js).context(RenderingSummarySnafu {})?;
    match &args.out {
        Some(p) if p == "stdout" => println!("summary:{}", pretty_js_stats),
        Some(p) => fs::write(p, &pretty_js_stats).context(WritingSummarySnafu { path: p.clone() })?,
        None => {}
    }

    // The reference summary, if provided for comparison
    if let Some(summary_p) = &args.reference {
        let ref_str = fs::read_to_string(summary_p).context(OpeningReferenceSnafu {
            path: summary_p.clone(),
        })?;
        let summary_ref: JSValue =
            serde_json::from_str(&ref_str).context(ParsingReferenceSnafu {})?;
        let pretty_js_summary_ref =
            serde_json::to_string_pretty(&summary_ref).context(RenderingSummarySnafu {})?;
        if pretty_js_summary_ref != pretty_js_stats {
            warn!("Found differences with the reference summary");
            print_diff(
                pretty_js_summary_ref.as_str(),
                pretty_js_stats.as_ref(),
                "\n",
            );
            whatever!("Difference detected between calculated summary and reference summary")
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::config_reader::NameMatchingConfig;

    fn sample_stats() -> FraudStats {
        FraudStats {
            fraud_candidates: vec![SuspicionVerdict {
                candidate: "Eve Mallory".to_string(),
                score: 1400,
                reasons: vec![
                    "all votes from single IP".to_string(),
                    "12 votes within 11 seconds".to_string(),
                ],
                vote_count: 12,
            }],
            ranking: vec![
                ("Alice Jones".to_string(), 20),
                ("Bob Brown".to_string(), 10),
            ],
            groups: vec![
                NameGroup {
                    canonical: "Alice Jones".to_string(),
                    variants: vec!["Alice Jones".to_string()],
                    total_votes: 20,
                },
                NameGroup {
                    canonical: "Eve Mallory".to_string(),
                    variants: vec!["Eve Mallory".to_string()],
                    total_votes: 12,
                },
                NameGroup {
                    canonical: "Bob Brown".to_string(),
                    variants: vec!["Bob Brown".to_string()],
                    total_votes: 10,
                },
            ],
            total_votes: 42,
        }
    }

    fn empty_config() -> AuditConfig {
        AuditConfig {
            contest_name: None,
            log_file: None,
            name_matching: None,
            exempt_candidates: None,
            max_fraud_candidates: None,
            ranking_size: None,
            cluster_window_fraction: None,
        }
    }

    #[test]
    fn validate_rules_rejects_unknown_matching_mode() {
        let mut config = empty_config();
        config.name_matching = Some(NameMatchingConfig {
            mode: "soundex".to_string(),
            max_edit_distance: None,
            prefix_length: None,
        });
        assert!(validate_rules(&config).is_err());
    }

    #[test]
    fn validate_rules_applies_overrides() {
        let mut config = empty_config();
        config.name_matching = Some(NameMatchingConfig {
            mode: "foldedPrefix".to_string(),
            max_edit_distance: None,
            prefix_length: Some(6),
        });
        config.exempt_candidates = Some(vec!["Write-in".to_string()]);
        config.max_fraud_candidates = Some(3);
        let rules = validate_rules(&config).unwrap();
        assert_eq!(
            rules.name_matching,
            NameMatching::FoldedPrefix { prefix_len: 6 }
        );
        assert_eq!(rules.exempt_candidates, vec!["Write-in".to_string()]);
        assert_eq!(rules.max_fraud_candidates, 3);
        assert_eq!(rules.ranking_size, 20);
    }

    #[test]
    fn config_reads_camel_case_entries() {
        let config: AuditConfig = serde_json::from_str(
            r#"{
                "contestName": "city mayor",
                "logFile": "votes.log",
                "nameMatching": {"mode": "editDistance", "maxEditDistance": 1},
                "exemptCandidates": ["Undeclared"],
                "rankingSize": 5
            }"#,
        )
        .unwrap();
        assert_eq!(config.contest_name.as_deref(), Some("city mayor"));
        assert_eq!(config.log_file.as_deref(), Some("votes.log"));
        let rules = validate_rules(&config).unwrap();
        assert_eq!(
            rules.name_matching,
            NameMatching::EditDistance { max_distance: 1 }
        );
        assert_eq!(rules.ranking_size, 5);
    }

    #[test]
    fn report_lists_fraud_then_ranking() {
        let report = format_report("city mayor", &sample_stats());
        assert!(report.starts_with("Vote audit for city mayor\n"));
        assert!(report.contains("42 votes over 3 candidates"));
        assert!(report.contains("  Eve Mallory: 12 votes (score 1400)\n"));
        assert!(report.contains("    - all votes from single IP\n"));
        let fraud_pos = report.find("Fraud candidates:").unwrap();
        let ranking_pos = report.find("Clean ranking:").unwrap();
        assert!(fraud_pos < ranking_pos);
        assert!(report.contains("   1. Alice Jones (20 votes)\n"));
        assert!(report.contains("   2. Bob Brown (10 votes)\n"));
    }

    #[test]
    fn report_with_no_findings() {
        let mut stats = sample_stats();
        stats.fraud_candidates.clear();
        let report = format_report("city mayor", &stats);
        assert!(report.contains("  (none detected)\n"));
    }

    #[test]
    fn summary_json_shape() {
        let js = build_summary_js("city mayor", &sample_stats());
        assert_eq!(js["config"]["contest"], json!("city mayor"));
        assert_eq!(js["totalVotes"], json!("42"));
        assert_eq!(js["fraudCandidates"][0]["candidate"], json!("Eve Mallory"));
        assert_eq!(js["fraudCandidates"][0]["score"], json!("1400"));
        assert_eq!(js["ranking"][0]["rank"], json!("1"));
        assert_eq!(js["ranking"][1]["candidate"], json!("Bob Brown"));
    }
}
