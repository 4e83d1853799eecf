use chrono::{DateTime, Utc};

pub use crate::config::*;

/// A builder for assembling vote records incrementally.
///
/// Use it when the records do not come from a log file, for instance when
/// another system hands votes over one at a time.
///
/// ```
/// pub use fraud_analysis::Builder;
/// pub use fraud_analysis::AuditRules;
/// # use fraud_analysis::AnalysisErrors;
///
/// let mut builder = Builder::new(&AuditRules::default_rules())?;
///
/// builder.add_record_simple("203.0.113.7", "Anna", "2024-03-01T10:00:00Z")?;
/// builder.add_record_simple("203.0.113.8", "Bob", "2024-03-01T10:00:05Z")?;
///
/// let stats = builder.analyze()?;
/// assert_eq!(stats.ranking.len(), 2);
/// assert!(stats.fraud_candidates.is_empty());
/// # Ok::<(), AnalysisErrors>(())
/// ```
pub struct Builder {
    pub(crate) _rules: AuditRules,
    pub(crate) _records: Vec<VoteRecord>,
}

impl Builder {
    pub fn new(rules: &AuditRules) -> Result<Builder, AnalysisErrors> {
        crate::check_rules(rules)?;
        Ok(Builder {
            _rules: rules.clone(),
            _records: Vec::new(),
        })
    }

    /// Adds a vote record.
    ///
    /// The IP is treated as an opaque string and never validated.
    pub fn add_record(
        &mut self,
        ip: &str,
        candidate: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<(), AnalysisErrors> {
        self._records.push(VoteRecord {
            ip: ip.to_string(),
            candidate: candidate.to_string(),
            timestamp,
        });
        Ok(())
    }

    /// Adds a vote record with an RFC 3339 timestamp string.
    ///
    /// It is the simplest use case for most cases.
    pub fn add_record_simple(
        &mut self,
        ip: &str,
        candidate: &str,
        timestamp: &str,
    ) -> Result<(), AnalysisErrors> {
        let t = DateTime::parse_from_rfc3339(timestamp)
            .map_err(|_| AnalysisErrors::InvalidTimestamp(timestamp.to_string()))?;
        self.add_record(ip, candidate, t.with_timezone(&Utc))
    }

    /// Runs the analysis over the accumulated records.
    pub fn analyze(&self) -> Result<FraudStats, AnalysisErrors> {
        crate::run_fraud_stats(&self._records, &self._rules)
    }
}
