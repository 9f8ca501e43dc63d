//! Activity journal entry types.
//!
//! Entries are built from an [`EntryDraft`] by the journal, which stamps
//! the id and timestamp. Category and severity are plain data: every
//! helper in the journal funnels into the same append path.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome class of a journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Warning,
    Error,
    Info,
}

impl Severity {
    pub const ALL: [Self; 4] = [Self::Success, Self::Warning, Self::Error, Self::Info];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Info => "info",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Subsystem a journal entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Oracle,
    Security,
    Performance,
    Blockchain,
    System,
}

impl Category {
    pub const ALL: [Self; 5] = [
        Self::Oracle,
        Self::Security,
        Self::Performance,
        Self::Blockchain,
        Self::System,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Oracle => "oracle",
            Self::Security => "security",
            Self::Performance => "performance",
            Self::Blockchain => "blockchain",
            Self::System => "system",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored journal entry. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Unique entry identifier.
    pub id: String,
    /// Human-readable message.
    pub message: String,
    /// Outcome class.
    pub severity: Severity,
    /// Owning subsystem.
    pub category: Category,
    /// Component or provider that emitted the entry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Structured payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// Wall-clock time of the append, `HH:MM:SS`.
    pub created_at: String,
}

/// Everything needed to append an entry except id and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryDraft {
    pub message: String,
    pub severity: Severity,
    pub category: Category,
    pub source: Option<String>,
    pub details: Option<serde_json::Value>,
}

impl EntryDraft {
    /// Start an `info`/`system` draft.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: Severity::Info,
            category: Category::System,
            source: None,
            details: None,
        }
    }

    #[must_use]
    pub const fn severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    #[must_use]
    pub const fn category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    #[must_use]
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    #[must_use]
    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Result of one security scan check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanOutcome {
    Passed,
    Failed,
    Warning,
}

impl ScanOutcome {
    /// Severity a scan result is journaled with.
    pub const fn severity(self) -> Severity {
        match self {
            Self::Passed => Severity::Success,
            Self::Failed => Severity::Error,
            Self::Warning => Severity::Warning,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "PASSED",
            Self::Failed => "FAILED",
            Self::Warning => "WARNING",
        }
    }
}

/// Count per severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub success: usize,
    pub warning: usize,
    pub error: usize,
    pub info: usize,
}

/// Count per category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCounts {
    pub oracle: usize,
    pub security: usize,
    pub performance: usize,
    pub blockchain: usize,
    pub system: usize,
}

/// Aggregate view over the journal contents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogStats {
    pub total: usize,
    pub by_severity: SeverityCounts,
    pub by_category: CategoryCounts,
    /// Share of error entries in percent, one decimal.
    pub error_rate: f64,
    /// Share of success entries in percent, one decimal.
    pub success_rate: f64,
}

impl LogStats {
    /// Tally a sequence of entries.
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a LogEntry>) -> Self {
        let mut stats = Self::default();

        for entry in entries {
            stats.total += 1;
            match entry.severity {
                Severity::Success => stats.by_severity.success += 1,
                Severity::Warning => stats.by_severity.warning += 1,
                Severity::Error => stats.by_severity.error += 1,
                Severity::Info => stats.by_severity.info += 1,
            }
            match entry.category {
                Category::Oracle => stats.by_category.oracle += 1,
                Category::Security => stats.by_category.security += 1,
                Category::Performance => stats.by_category.performance += 1,
                Category::Blockchain => stats.by_category.blockchain += 1,
                Category::System => stats.by_category.system += 1,
            }
        }

        stats.error_rate = percent(stats.by_severity.error, stats.total);
        stats.success_rate = percent(stats.by_severity.success, stats.total);
        stats
    }
}

#[allow(clippy::cast_precision_loss)]
fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 / total as f64 * 1000.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(severity: Severity, category: Category) -> LogEntry {
        LogEntry {
            id: "x".to_string(),
            message: "m".to_string(),
            severity,
            category,
            source: None,
            details: None,
            created_at: "00:00:00".to_string(),
        }
    }

    #[test]
    fn test_stats_rates() {
        let entries = vec![
            entry(Severity::Error, Category::Oracle),
            entry(Severity::Success, Category::Oracle),
            entry(Severity::Success, Category::Blockchain),
        ];
        let stats = LogStats::from_entries(&entries);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_severity.success, 2);
        assert_eq!(stats.by_category.oracle, 2);
        assert!((stats.error_rate - 33.3).abs() < f64::EPSILON);
        assert!((stats.success_rate - 66.7).abs() < f64::EPSILON);
    }

    #[test]
    fn test_stats_empty() {
        let stats = LogStats::from_entries(&Vec::<LogEntry>::new());
        assert_eq!(stats.total, 0);
        assert!(stats.error_rate.abs() < f64::EPSILON);
    }

    #[test]
    fn test_serializes_lowercase_enums() {
        let json = serde_json::to_value(entry(Severity::Warning, Category::Security)).unwrap();
        assert_eq!(json["severity"], "warning");
        assert_eq!(json["category"], "security");
        assert_eq!(json["createdAt"], "00:00:00");
        assert!(json.get("source").is_none());
    }
}
