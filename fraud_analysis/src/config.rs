// ********* Input data structures ***********

use chrono::{DateTime, Utc};
use std::error::Error;
use std::fmt::Display;

/// A single vote as extracted from the campaign log.
///
/// The IP is an opaque string: no validation is applied to it, a malformed
/// address is still a usable aggregation key. Records are immutable and only
/// live for the duration of one analysis run.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct VoteRecord {
    pub ip: String,
    pub candidate: String,
    pub timestamp: DateTime<Utc>,
}

// ******** Output data structures *********

/// A set of raw candidate spellings merged into one identity.
///
/// The canonical spelling is always `variants[0]`. Groups partition the raw
/// names of a run: every spelling belongs to exactly one group.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct NameGroup {
    pub canonical: String,
    pub variants: Vec<String>,
    /// Corrected vote count: the sum over all variants.
    pub total_votes: u64,
}

/// Aggregate statistics for one consolidated candidate.
#[derive(PartialEq, Debug, Clone)]
pub struct CandidateFeatures {
    pub total_votes: u64,
    pub unique_ips: usize,
    pub votes_per_ip: f64,
    pub max_votes_from_single_ip: u64,
    pub time_range_seconds: f64,
    /// Fraction of the votes inside the densest short window, in [0, 1].
    pub time_clustering_ratio: f64,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SuspicionVerdict {
    pub candidate: String,
    pub score: u64,
    pub reasons: Vec<String>,
    pub vote_count: u64,
}

/// The outcome of one analysis run.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct FraudStats {
    /// The most suspicious candidates, highest score first.
    pub fraud_candidates: Vec<SuspicionVerdict>,
    /// Corrected ranking of the remaining candidates, most votes first.
    pub ranking: Vec<(String, u64)>,
    /// All consolidated groups, in creation order.
    pub groups: Vec<NameGroup>,
    pub total_votes: u64,
}

/// Errors that prevent the analysis from completing successfully.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum AnalysisErrors {
    InvalidRules(String),
    InvalidTimestamp(String),
}

impl Error for AnalysisErrors {}

impl Display for AnalysisErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisErrors::InvalidRules(msg) => write!(f, "invalid audit rules: {}", msg),
            AnalysisErrors::InvalidTimestamp(s) => write!(f, "invalid timestamp: {}", s),
        }
    }
}

// ********* Configuration **********

/// The policy for deciding that two raw spellings denote the same candidate.
#[derive(PartialEq, Debug, Clone, Copy)]
pub enum NameMatching {
    /// Fold both names (lowercase, ASCII letters only) and accept a
    /// Levenshtein distance up to `max_distance`. Identical raw strings
    /// always match.
    EditDistance { max_distance: u32 },
    /// Historical policy: equal folded prefixes of `prefix_len` characters
    /// are merged.
    FoldedPrefix { prefix_len: usize },
}

/// One scoring rule, with its thresholds and weights.
///
/// Rules are additive and evaluated in the order they appear in
/// [`AuditRules::scoring_rules`]; the order only affects the ordering of the
/// accumulated reasons. The two-arm rules are else-if ladders: at most one
/// arm fires, the first taking precedence.
#[derive(PartialEq, Debug, Clone, Copy)]
pub enum ScoringRule {
    /// Every vote came from one IP and there are strictly more than
    /// `min_votes` of them.
    AllVotesSingleIp { min_votes: u64, weight: u64 },
    /// One IP cast more than `dominant_share` of the total (given more than
    /// `min_votes` votes), or more than `absolute_votes` outright.
    IpConcentration {
        dominant_share: f64,
        min_votes: u64,
        dominant_weight: u64,
        absolute_votes: u64,
        absolute_weight: u64,
    },
    /// Many votes inside a short overall time range.
    VoteBurst {
        large_votes: u64,
        large_window_secs: f64,
        large_weight: u64,
        small_votes: u64,
        small_window_secs: f64,
        small_weight: u64,
    },
    /// The densest window concentrates more than `min_ratio` of the votes.
    TimeClustering { min_ratio: f64, min_votes: u64, weight: u64 },
    /// Average votes per distinct IP above `threshold`.
    VotesPerIp { threshold: f64, weight: u64 },
    /// Historical rule: more than `min_votes` votes inside any sliding
    /// window of `window_secs` adds the peak count times `per_vote_weight`.
    SlidingWindowRate {
        window_secs: f64,
        min_votes: u64,
        per_vote_weight: u64,
    },
    /// Historical rule: a flat penalty above a raw-volume threshold.
    HighVolume { min_votes: u64, weight: u64 },
}

#[derive(PartialEq, Debug, Clone)]
pub struct AuditRules {
    pub name_matching: NameMatching,
    pub scoring_rules: Vec<ScoringRule>,
    /// Canonical names that are never scored.
    pub exempt_candidates: Vec<String>,
    /// Width of the clustering window, as a fraction of the total time
    /// range. Must be within (0, 1].
    pub cluster_window_fraction: f64,
    /// How many top-scored candidates to name as fraud. Fewer are named
    /// when fewer have a nonzero score; there is no backfill.
    pub max_fraud_candidates: usize,
    /// Length of the clean ranking.
    pub ranking_size: usize,
}

impl AuditRules {
    pub fn default_rules() -> AuditRules {
        AuditRules {
            name_matching: NameMatching::EditDistance { max_distance: 2 },
            scoring_rules: reference_scoring_rules(),
            exempt_candidates: Vec::new(),
            cluster_window_fraction: 0.05,
            max_fraud_candidates: 2,
            ranking_size: 20,
        }
    }
}

/// The reference rule set, in evaluation order.
pub fn reference_scoring_rules() -> Vec<ScoringRule> {
    vec![
        ScoringRule::AllVotesSingleIp {
            min_votes: 2,
            weight: 1000,
        },
        ScoringRule::IpConcentration {
            dominant_share: 0.8,
            min_votes: 10,
            dominant_weight: 800,
            absolute_votes: 50,
            absolute_weight: 500,
        },
        ScoringRule::VoteBurst {
            large_votes: 20,
            large_window_secs: 120.0,
            large_weight: 600,
            small_votes: 10,
            small_window_secs: 60.0,
            small_weight: 400,
        },
        ScoringRule::TimeClustering {
            min_ratio: 0.7,
            min_votes: 15,
            weight: 300,
        },
        ScoringRule::VotesPerIp {
            threshold: 30.0,
            weight: 200,
        },
    ]
}
