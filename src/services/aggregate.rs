//! Severity aggregation: findings from all files fold into one catalog.

use serde::Serialize;

use crate::models::{Catalog, CatalogKey, Finding, RiskLabel};

/// Build a per-file partial catalog from one file's findings.
///
/// Findings with no usable score land under `Undefined`: kept for summary
/// counts, excluded from the reportable catalog and the compliance CSV.
pub fn aggregate(findings: &[Finding]) -> Catalog {
    let mut catalog = Catalog::new();
    for finding in findings {
        let risk_label = RiskLabel::for_finding(finding);
        if risk_label == RiskLabel::Undefined {
            tracing::debug!(
                host = %finding.host,
                plugin_id = finding.plugin_id,
                "Unscorable finding kept for counts only"
            );
        }
        catalog.insert(
            CatalogKey {
                risk_label,
                plugin_id: finding.plugin_id,
            },
            finding,
        );
    }
    catalog
}

/// Catalog entry counts per severity bucket, for the charting layer.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct SeverityDistribution {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub undefined: usize,
}

impl SeverityDistribution {
    pub fn from_catalog(catalog: &Catalog) -> Self {
        let mut dist = Self::default();
        for (key, _) in catalog.iter() {
            match key.risk_label {
                RiskLabel::Critical => dist.critical += 1,
                RiskLabel::High => dist.high += 1,
                RiskLabel::Medium => dist.medium += 1,
                RiskLabel::Low => dist.low += 1,
                RiskLabel::Undefined => dist.undefined += 1,
            }
        }
        dist
    }

    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low + self.undefined
    }
}
