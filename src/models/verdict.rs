//! Classification verdicts and the per-run accumulators they feed.

use std::collections::BTreeMap;

use serde::Serialize;

/// Outcome of running one classified line through a rule set.
///
/// `ExpectedSafe` carries the name of the rule (or tier) that matched;
/// `Unknown` and `UnexpectedUnsafe` carry none by construction.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub enum Verdict {
    ExpectedSafe { rule: String },
    UnexpectedUnsafe,
    Unknown,
}

impl Verdict {
    pub fn expected(rule: impl Into<String>) -> Self {
        Self::ExpectedSafe { rule: rule.into() }
    }

    pub fn is_expected_safe(&self) -> bool {
        matches!(self, Self::ExpectedSafe { .. })
    }
}

/// Accumulated daemon-inventory classification for a run.
#[derive(Debug, Clone, Default)]
pub struct DaemonFindings {
    /// Lines matching a known platform component. Context metric, not a
    /// verdict.
    pub seen_count: usize,
    /// Per-rule match counts, keyed by rule name.
    pub matched_by_rule: BTreeMap<String, usize>,
    /// Unmatched daemon paths, keyed by host.
    pub unknown_by_host: BTreeMap<String, Vec<String>>,
}

impl DaemonFindings {
    pub fn record_match(&mut self, rule: &str) {
        self.seen_count += 1;
        *self.matched_by_rule.entry(rule.to_string()).or_insert(0) += 1;
    }

    pub fn record_unknown(&mut self, host: &str, path: &str) {
        self.unknown_by_host
            .entry(host.to_string())
            .or_default()
            .push(path.to_string());
    }

    pub fn unknown_count(&self) -> usize {
        self.unknown_by_host.values().map(Vec::len).sum()
    }

    /// Fold a per-file partial into the run-wide accumulator.
    pub fn merge(&mut self, other: DaemonFindings) {
        self.seen_count += other.seen_count;
        for (rule, count) in other.matched_by_rule {
            *self.matched_by_rule.entry(rule).or_insert(0) += count;
        }
        for (host, mut paths) in other.unknown_by_host {
            self.unknown_by_host
                .entry(host)
                .or_default()
                .append(&mut paths);
        }
    }
}

/// Accumulated dependency-path classification for a run.
#[derive(Debug, Clone, Default)]
pub struct DependencyFindings {
    /// Expected-safe path counts per tier name (ghost, cell, logging).
    pub safe_by_tier: BTreeMap<String, usize>,
    /// Paths needing investigation, keyed by host.
    pub unsafe_by_host: BTreeMap<String, Vec<String>>,
}

impl DependencyFindings {
    pub fn record_safe(&mut self, tier: &str) {
        *self.safe_by_tier.entry(tier.to_string()).or_insert(0) += 1;
    }

    pub fn record_unsafe(&mut self, host: &str, path: &str) {
        self.unsafe_by_host
            .entry(host.to_string())
            .or_default()
            .push(path.to_string());
    }

    pub fn safe_count(&self) -> usize {
        self.safe_by_tier.values().sum()
    }

    pub fn unsafe_count(&self) -> usize {
        self.unsafe_by_host.values().map(Vec::len).sum()
    }

    pub fn merge(&mut self, other: DependencyFindings) {
        for (tier, count) in other.safe_by_tier {
            *self.safe_by_tier.entry(tier).or_insert(0) += count;
        }
        for (host, mut paths) in other.unsafe_by_host {
            self.unsafe_by_host
                .entry(host)
                .or_default()
                .append(&mut paths);
        }
    }
}
