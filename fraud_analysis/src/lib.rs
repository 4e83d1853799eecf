pub mod builder;
mod config;
pub mod manual;

use log::{debug, info};

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

pub use crate::builder::Builder;
pub use crate::config::*;

// **** Private structures ****

/// Everything observed about one consolidated candidate: the public feature
/// snapshot plus the sorted timestamps some rules need to re-scan.
#[derive(PartialEq, Debug, Clone)]
struct GroupSample {
    features: CandidateFeatures,
    // Sorted ascending.
    timestamps: Vec<DateTime<Utc>>,
}

/// Runs the fraud analysis with the given rules over the given records.
///
/// Arguments:
/// * `records` the vote records of one run, in log order
/// * `rules` the policy that governs this audit
///
/// The computation is deterministic: equal scores keep the group creation
/// order, equal vote counts in the ranking are ordered by canonical name.
pub fn run_fraud_stats(
    records: &[VoteRecord],
    rules: &AuditRules,
) -> Result<FraudStats, AnalysisErrors> {
    check_rules(rules)?;
    info!("run_fraud_stats: processing {} vote records", records.len());

    let groups = consolidate_names(records, rules.name_matching);
    info!(
        "run_fraud_stats: {} canonical candidates after consolidation",
        groups.len()
    );
    for g in groups.iter() {
        debug!(
            "Candidate: {} ({} variants, {} votes)",
            g.canonical,
            g.variants.len(),
            g.total_votes
        );
    }

    let exempt: HashSet<&str> = rules.exempt_candidates.iter().map(|s| s.as_str()).collect();

    let mut verdicts: Vec<SuspicionVerdict> = Vec::new();
    for group in groups.iter() {
        let sample = observe_group(group, records, rules.cluster_window_fraction);
        debug!(
            "run_fraud_stats: {}: {:?}",
            group.canonical, sample.features
        );
        if exempt.contains(group.canonical.as_str()) {
            debug!("run_fraud_stats: {} is exempt from scoring", group.canonical);
            continue;
        }
        let (score, reasons) = score_candidate(&sample, &rules.scoring_rules);
        if score > 0 {
            info!(
                "run_fraud_stats: {} scored {}: {:?}",
                group.canonical, score, reasons
            );
            verdicts.push(SuspicionVerdict {
                candidate: group.canonical.clone(),
                score,
                reasons,
                vote_count: group.total_votes,
            });
        }
    }

    // Stable sort: equal scores keep the group creation order.
    verdicts.sort_by(|a, b| b.score.cmp(&a.score));
    let fraud_candidates: Vec<SuspicionVerdict> = verdicts
        .into_iter()
        .take(rules.max_fraud_candidates)
        .collect();
    let fraud_names: HashSet<String> = fraud_candidates
        .iter()
        .map(|v| v.candidate.clone())
        .collect();

    let mut ranking: Vec<(String, u64)> = groups
        .iter()
        .filter(|g| !fraud_names.contains(&g.canonical))
        .map(|g| (g.canonical.clone(), g.total_votes))
        .collect();
    ranking.sort_by(|x, y| y.1.cmp(&x.1).then(x.0.cmp(&y.0)));
    ranking.truncate(rules.ranking_size);

    Ok(FraudStats {
        fraud_candidates,
        ranking,
        groups,
        total_votes: records.len() as u64,
    })
}

pub(crate) fn check_rules(rules: &AuditRules) -> Result<(), AnalysisErrors> {
    if !rules.cluster_window_fraction.is_finite()
        || rules.cluster_window_fraction <= 0.0
        || rules.cluster_window_fraction > 1.0
    {
        return Err(AnalysisErrors::InvalidRules(format!(
            "cluster window fraction must be within (0, 1], got {}",
            rules.cluster_window_fraction
        )));
    }
    if let NameMatching::FoldedPrefix { prefix_len } = rules.name_matching {
        if prefix_len == 0 {
            return Err(AnalysisErrors::InvalidRules(
                "folded prefix length must be at least 1".to_string(),
            ));
        }
    }
    Ok(())
}

// **** Name consolidation ****

/// Lowercases and strips every character outside a-z. Diacritics, digits,
/// punctuation and spaces are all removed.
fn fold_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Levenshtein edit distance, insertions, deletions and substitutions each
/// costing 1. Standard dynamic-programming table.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut d = vec![vec![0usize; b.len() + 1]; a.len() + 1];
    for (i, row) in d.iter_mut().enumerate() {
        row[0] = i;
    }
    for j in 0..=b.len() {
        d[0][j] = j;
    }
    for i in 1..=a.len() {
        for j in 1..=b.len() {
            d[i][j] = if a[i - 1] == b[j - 1] {
                d[i - 1][j - 1]
            } else {
                1 + d[i - 1][j].min(d[i][j - 1]).min(d[i - 1][j - 1])
            };
        }
    }
    d[a.len()][b.len()]
}

fn names_similar(a: &str, b: &str, matching: NameMatching) -> bool {
    if a == b {
        return true;
    }
    match matching {
        NameMatching::EditDistance { max_distance } => {
            let fa = fold_name(a);
            let fb = fold_name(b);
            let budget = max_distance as usize;
            // Cheap pre-filter: a length gap larger than the budget can
            // never be within distance.
            if fa.len().abs_diff(fb.len()) > budget {
                return false;
            }
            levenshtein(&fa, &fb) <= budget
        }
        NameMatching::FoldedPrefix { prefix_len } => {
            let pa: String = fold_name(a).chars().take(prefix_len).collect();
            let pb: String = fold_name(b).chars().take(prefix_len).collect();
            pa == pb
        }
    }
}

/// Groups the raw spellings of the records into canonical identities.
///
/// Spellings are processed most frequent first so that the dominant spelling
/// becomes the canonical, instead of rare misspellings merging into each
/// other. Ties keep log order. A spelling joins the first group (in creation
/// order) whose canonical it matches and is never re-clustered afterwards.
fn consolidate_names(records: &[VoteRecord], matching: NameMatching) -> Vec<NameGroup> {
    let mut counts: HashMap<&str, (u64, usize)> = HashMap::new();
    for (idx, r) in records.iter().enumerate() {
        let e = counts.entry(r.candidate.as_str()).or_insert((0, idx));
        e.0 += 1;
    }
    let mut ordered: Vec<(&str, u64, usize)> = counts
        .iter()
        .map(|(name, (count, first_seen))| (*name, *count, *first_seen))
        .collect();
    ordered.sort_by(|x, y| y.1.cmp(&x.1).then(x.2.cmp(&y.2)));

    let mut groups: Vec<NameGroup> = Vec::new();
    for (name, count, _) in ordered {
        let mut merged = false;
        for g in groups.iter_mut() {
            if names_similar(name, &g.canonical, matching) {
                g.variants.push(name.to_string());
                g.total_votes += count;
                merged = true;
                break;
            }
        }
        if !merged {
            groups.push(NameGroup {
                canonical: name.to_string(),
                variants: vec![name.to_string()],
                total_votes: count,
            });
        }
    }
    groups
}

// **** Feature extraction ****

fn seconds_between(a: DateTime<Utc>, b: DateTime<Utc>) -> f64 {
    (b - a).num_milliseconds() as f64 / 1000.0
}

/// Collects the records of one group and derives its feature snapshot.
fn observe_group(group: &NameGroup, records: &[VoteRecord], window_fraction: f64) -> GroupSample {
    let variant_set: HashSet<&str> = group.variants.iter().map(|s| s.as_str()).collect();

    let mut ip_votes: HashMap<&str, u64> = HashMap::new();
    let mut timestamps: Vec<DateTime<Utc>> = Vec::new();
    for r in records.iter() {
        if variant_set.contains(r.candidate.as_str()) {
            *ip_votes.entry(r.ip.as_str()).or_insert(0) += 1;
            timestamps.push(r.timestamp);
        }
    }
    timestamps.sort();

    let total_votes = timestamps.len() as u64;
    let unique_ips = ip_votes.len();
    let max_votes_from_single_ip = ip_votes.values().cloned().max().unwrap_or(0);
    let votes_per_ip = if unique_ips == 0 {
        0.0
    } else {
        total_votes as f64 / unique_ips as f64
    };
    let time_range_seconds = match (timestamps.first(), timestamps.last()) {
        (Some(&first), Some(&last)) if timestamps.len() >= 2 => seconds_between(first, last),
        _ => 0.0,
    };
    let time_clustering_ratio = clustering_ratio(&timestamps, window_fraction);

    GroupSample {
        features: CandidateFeatures {
            total_votes,
            unique_ips,
            votes_per_ip,
            max_votes_from_single_ip,
            time_range_seconds,
            time_clustering_ratio,
        },
        timestamps,
    }
}

/// Fraction of the votes inside the densest window of
/// `window_fraction * total_range` seconds. A degenerate range (single vote
/// or all votes simultaneous) counts as fully clustered.
fn clustering_ratio(sorted: &[DateTime<Utc>], window_fraction: f64) -> f64 {
    if sorted.is_empty() {
        return 1.0;
    }
    let range = seconds_between(sorted[0], sorted[sorted.len() - 1]);
    if range <= 0.0 {
        return 1.0;
    }
    let window = range * window_fraction;
    let best = max_count_in_window(sorted, window);
    best as f64 / sorted.len() as f64
}

/// Largest number of timestamps falling inside `[t, t + window_secs]` for
/// any timestamp `t` taken as a window start. Expects sorted input.
fn max_count_in_window(sorted: &[DateTime<Utc>], window_secs: f64) -> usize {
    let mut best = 0usize;
    let mut hi = 0usize;
    for lo in 0..sorted.len() {
        if hi < lo {
            hi = lo;
        }
        while hi < sorted.len() && seconds_between(sorted[lo], sorted[hi]) <= window_secs {
            hi += 1;
        }
        best = best.max(hi - lo);
    }
    best
}

// **** Scoring ****

fn score_candidate(sample: &GroupSample, rules: &[ScoringRule]) -> (u64, Vec<String>) {
    let mut score: u64 = 0;
    let mut reasons: Vec<String> = Vec::new();
    for rule in rules.iter() {
        if let Some((weight, reason)) = apply_rule(rule, sample) {
            score += weight;
            reasons.push(reason);
        }
    }
    (score, reasons)
}

fn apply_rule(rule: &ScoringRule, sample: &GroupSample) -> Option<(u64, String)> {
    let f = &sample.features;
    match *rule {
        ScoringRule::AllVotesSingleIp { min_votes, weight } => {
            if f.unique_ips == 1 && f.total_votes > min_votes {
                Some((weight, "all votes from single IP".to_string()))
            } else {
                None
            }
        }
        ScoringRule::IpConcentration {
            dominant_share,
            min_votes,
            dominant_weight,
            absolute_votes,
            absolute_weight,
        } => {
            let max = f.max_votes_from_single_ip;
            if max as f64 > dominant_share * f.total_votes as f64 && f.total_votes > min_votes {
                Some((
                    dominant_weight,
                    format!("one IP cast {} of {} votes", max, f.total_votes),
                ))
            } else if max > absolute_votes {
                Some((absolute_weight, format!("{} votes from one IP", max)))
            } else {
                None
            }
        }
        ScoringRule::VoteBurst {
            large_votes,
            large_window_secs,
            large_weight,
            small_votes,
            small_window_secs,
            small_weight,
        } => {
            if f.total_votes > large_votes && f.time_range_seconds < large_window_secs {
                Some((
                    large_weight,
                    format!(
                        "{} votes within {:.0} seconds",
                        f.total_votes, f.time_range_seconds
                    ),
                ))
            } else if f.total_votes > small_votes && f.time_range_seconds < small_window_secs {
                Some((
                    small_weight,
                    format!(
                        "{} votes within {:.0} seconds",
                        f.total_votes, f.time_range_seconds
                    ),
                ))
            } else {
                None
            }
        }
        ScoringRule::TimeClustering {
            min_ratio,
            min_votes,
            weight,
        } => {
            if f.time_clustering_ratio > min_ratio && f.total_votes > min_votes {
                Some((
                    weight,
                    format!(
                        "{:.0}% of votes inside the densest time window",
                        f.time_clustering_ratio * 100.0
                    ),
                ))
            } else {
                None
            }
        }
        ScoringRule::VotesPerIp { threshold, weight } => {
            if f.votes_per_ip > threshold {
                Some((
                    weight,
                    format!("{:.1} votes per IP on average", f.votes_per_ip),
                ))
            } else {
                None
            }
        }
        ScoringRule::SlidingWindowRate {
            window_secs,
            min_votes,
            per_vote_weight,
        } => {
            let peak = max_count_in_window(&sample.timestamps, window_secs) as u64;
            if peak > min_votes {
                Some((
                    peak * per_vote_weight,
                    format!("{} votes within a {:.0}s span", peak, window_secs),
                ))
            } else {
                None
            }
        }
        ScoringRule::HighVolume { min_votes, weight } => {
            if f.total_votes > min_votes {
                Some((weight, format!("{} total votes", f.total_votes)))
            } else {
                None
            }
        }
    }
}
