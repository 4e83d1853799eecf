// Primitives for reading vote logs.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use log::{debug, info};
use regex::Regex;
use snafu::ResultExt;
use std::fs;

use fraud_analysis::VoteRecord;

use crate::audit::{AuditResult, OpeningLogSnafu};

/// The marker that qualifies a log line as a candidate vote record.
const CANDIDATE_MARKER: &str = "candidate:";

/// Accepted timestamp formats besides RFC 3339, read as UTC.
const NAIVE_TIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// A line split into its labeled fields, before validation.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ParsedVoteLine {
    pub ip: Option<String>,
    pub candidate: Option<String>,
    pub time: Option<String>,
}

/// The compiled field patterns. A value runs to the next recognized label or
/// to the end of the line, so the fields may appear in any order.
struct FieldPatterns {
    ip: Regex,
    candidate: Regex,
    time: Regex,
}

impl FieldPatterns {
    fn new() -> FieldPatterns {
        FieldPatterns {
            ip: Regex::new(r"ip:\s*([^,]*)").unwrap(),
            candidate: Regex::new(r"candidate:\s*(.*?)\s*(?:,\s*(?:ip|time)\s*:|$)").unwrap(),
            time: Regex::new(r"time:\s*(.*?)\s*(?:,\s*(?:ip|candidate)\s*:|$)").unwrap(),
        }
    }

    fn capture(re: &Regex, line: &str) -> Option<String> {
        re.captures(line)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
    }

    fn split_line(&self, line: &str) -> Option<ParsedVoteLine> {
        if !line.contains(CANDIDATE_MARKER) {
            return None;
        }
        Some(ParsedVoteLine {
            ip: Self::capture(&self.ip, line),
            candidate: Self::capture(&self.candidate, line),
            time: Self::capture(&self.time, line),
        })
    }
}

pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    for fmt in NAIVE_TIME_FORMATS {
        if let Ok(t) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&t));
        }
    }
    None
}

/// Validates a split line into a vote record. The candidate and time fields
/// are mandatory; a missing IP is kept as an empty opaque string.
fn to_record(parsed: &ParsedVoteLine) -> Option<VoteRecord> {
    let candidate = parsed.candidate.clone().filter(|c| !c.is_empty())?;
    let timestamp = parse_timestamp(parsed.time.as_deref()?)?;
    Some(VoteRecord {
        ip: parsed.ip.clone().unwrap_or_default(),
        candidate,
        timestamp,
    })
}

/// Extracts the vote records from the log contents. Lines without the
/// candidate marker are ignored; malformed candidate lines are dropped and
/// counted, never an error.
pub fn extract_records(contents: &str) -> Vec<VoteRecord> {
    let patterns = FieldPatterns::new();
    let mut records: Vec<VoteRecord> = Vec::new();
    let mut skipped: u64 = 0;
    for (idx, line) in contents.lines().enumerate() {
        let parsed = match patterns.split_line(line) {
            Some(p) => p,
            None => continue,
        };
        match to_record(&parsed) {
            Some(r) => records.push(r),
            None => {
                skipped += 1;
                debug!(
                    "extract_records: line {}: dropping incomplete record {:?}",
                    idx + 1,
                    parsed
                );
            }
        }
    }
    if skipped > 0 {
        info!(
            "extract_records: skipped {} malformed candidate lines",
            skipped
        );
    }
    records
}

pub fn read_log_file(path: &str) -> AuditResult<Vec<VoteRecord>> {
    let contents = fs::read_to_string(path).context(OpeningLogSnafu { path })?;
    Ok(extract_records(&contents))
}
