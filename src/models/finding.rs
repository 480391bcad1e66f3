//! Core finding model and the severity catalog built from it.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// One (host × check) result parsed from a scan file.
///
/// For web-scanner reports the "host" is an affected URL. Immutable once
/// parsed; classification and aggregation never mutate findings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub host: String,
    pub plugin_id: u32,
    pub plugin_name: String,
    pub raw_output: String,
    /// Vendor risk code (0-3) where the report carries one instead of CVSS.
    pub severity_raw: Option<u8>,
    pub cvss_score: Option<f32>,
}

/// Normalized severity derived from CVSS v3 or a vendor risk code.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RiskLabel {
    Critical,
    High,
    Medium,
    Low,
    /// No usable score. Kept for summary counts, excluded from the catalog
    /// used for compliance reporting.
    Undefined,
}

impl RiskLabel {
    /// Fixed CVSS v3 base score thresholds.
    pub fn from_cvss(score: Option<f32>) -> Self {
        match score {
            Some(s) if s >= 9.0 => Self::Critical,
            Some(s) if s >= 7.0 => Self::High,
            Some(s) if s >= 4.0 => Self::Medium,
            Some(s) if s > 0.1 => Self::Low,
            _ => Self::Undefined,
        }
    }

    /// Map a vendor severity code: ZAP riskcode runs 0 (informational) to
    /// 3 (high), the host scanner's severity attribute adds 4 (critical).
    pub fn from_risk_code(code: u8) -> Self {
        match code {
            4 => Self::Critical,
            3 => Self::High,
            2 => Self::Medium,
            1 => Self::Low,
            _ => Self::Undefined,
        }
    }

    /// Severity for a finding: CVSS when present, vendor risk code otherwise.
    pub fn for_finding(finding: &Finding) -> Self {
        if finding.cvss_score.is_some() {
            Self::from_cvss(finding.cvss_score)
        } else if let Some(code) = finding.severity_raw {
            Self::from_risk_code(code)
        } else {
            Self::Undefined
        }
    }

    /// Label used in the POA&M column set.
    ///
    /// The compliance framework has no "Critical" bucket and spells Medium
    /// as "Moderate"; this mapping applies only to the CSV risk columns.
    pub fn compliance_label(&self) -> &'static str {
        match self {
            Self::Critical | Self::High => "High",
            Self::Medium => "Moderate",
            Self::Low => "Low",
            Self::Undefined => "Undefined",
        }
    }
}

impl std::fmt::Display for RiskLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Critical => "Critical",
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
            Self::Undefined => "Undefined",
        };
        write!(f, "{s}")
    }
}

/// Composite catalog key: one entry per severity bucket per plugin.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CatalogKey {
    pub risk_label: RiskLabel,
    pub plugin_id: u32,
}

/// Deduplicated view of one vulnerability across all hosts in a cycle.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub plugin_name: String,
    pub cvss_score: Option<f32>,
    pub risk_label: RiskLabel,
    pub affected_hosts: BTreeSet<String>,
}

/// Run-wide vulnerability catalog with defined insert/merge semantics.
///
/// Host insertion is idempotent: ingesting the same file twice leaves the
/// host sets unchanged. `BTreeMap` keeps report ordering deterministic.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: BTreeMap<CatalogKey, CatalogEntry>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one finding under its severity bucket, unioning the host set.
    pub fn insert(&mut self, key: CatalogKey, finding: &Finding) {
        let entry = self.entries.entry(key).or_insert_with(|| CatalogEntry {
            plugin_name: finding.plugin_name.clone(),
            cvss_score: finding.cvss_score,
            risk_label: RiskLabel::for_finding(finding),
            affected_hosts: BTreeSet::new(),
        });
        entry.affected_hosts.insert(finding.host.clone());
    }

    /// Fold another catalog into this one (single-threaded reduce step).
    pub fn merge(&mut self, other: Catalog) {
        for (key, incoming) in other.entries {
            match self.entries.get_mut(&key) {
                Some(existing) => {
                    existing.affected_hosts.extend(incoming.affected_hosts);
                    if existing.cvss_score.is_none() {
                        existing.cvss_score = incoming.cvss_score;
                    }
                }
                None => {
                    self.entries.insert(key, incoming);
                }
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CatalogKey, &CatalogEntry)> {
        self.entries.iter()
    }

    /// Entries with a normalized severity, i.e. the reporting catalog.
    pub fn reportable(&self) -> impl Iterator<Item = (&CatalogKey, &CatalogEntry)> {
        self.entries
            .iter()
            .filter(|(key, _)| key.risk_label != RiskLabel::Undefined)
    }

    /// Distinct plugin ids across reportable entries.
    pub fn reportable_plugin_ids(&self) -> BTreeSet<u32> {
        self.reportable().map(|(key, _)| key.plugin_id).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &CatalogKey) -> Option<&CatalogEntry> {
        self.entries.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(host: &str, plugin_id: u32, cvss: Option<f32>) -> Finding {
        Finding {
            host: host.to_string(),
            plugin_id,
            plugin_name: format!("plugin-{plugin_id}"),
            raw_output: String::new(),
            severity_raw: None,
            cvss_score: cvss,
        }
    }

    #[test]
    fn cvss_threshold_boundaries() {
        assert_eq!(RiskLabel::from_cvss(Some(9.0)), RiskLabel::Critical);
        assert_eq!(RiskLabel::from_cvss(Some(8.999)), RiskLabel::High);
        assert_eq!(RiskLabel::from_cvss(Some(7.0)), RiskLabel::High);
        assert_eq!(RiskLabel::from_cvss(Some(4.0)), RiskLabel::Medium);
        assert_eq!(RiskLabel::from_cvss(Some(0.2)), RiskLabel::Low);
        assert_eq!(RiskLabel::from_cvss(Some(0.1)), RiskLabel::Undefined);
        assert_eq!(RiskLabel::from_cvss(None), RiskLabel::Undefined);
    }

    #[test]
    fn risk_code_mapping() {
        assert_eq!(RiskLabel::from_risk_code(4), RiskLabel::Critical);
        assert_eq!(RiskLabel::from_risk_code(3), RiskLabel::High);
        assert_eq!(RiskLabel::from_risk_code(2), RiskLabel::Medium);
        assert_eq!(RiskLabel::from_risk_code(1), RiskLabel::Low);
        assert_eq!(RiskLabel::from_risk_code(0), RiskLabel::Undefined);
    }

    #[test]
    fn cvss_takes_precedence_over_risk_code() {
        let mut f = finding("host-a", 1, Some(9.8));
        f.severity_raw = Some(1);
        assert_eq!(RiskLabel::for_finding(&f), RiskLabel::Critical);
    }

    #[test]
    fn compliance_label_downmaps_critical() {
        assert_eq!(RiskLabel::Critical.compliance_label(), "High");
        assert_eq!(RiskLabel::High.compliance_label(), "High");
        assert_eq!(RiskLabel::Medium.compliance_label(), "Moderate");
        assert_eq!(RiskLabel::Low.compliance_label(), "Low");
    }

    #[test]
    fn catalog_host_insertion_is_idempotent() {
        let mut catalog = Catalog::new();
        let f = finding("web-0", 11111, Some(7.5));
        let key = CatalogKey {
            risk_label: RiskLabel::High,
            plugin_id: 11111,
        };
        catalog.insert(key.clone(), &f);
        catalog.insert(key.clone(), &f);
        assert_eq!(catalog.get(&key).unwrap().affected_hosts.len(), 1);
    }

    #[test]
    fn merge_unions_host_sets() {
        let key = CatalogKey {
            risk_label: RiskLabel::High,
            plugin_id: 11111,
        };
        let mut a = Catalog::new();
        a.insert(key.clone(), &finding("web-0", 11111, Some(7.5)));
        let mut b = Catalog::new();
        b.insert(key.clone(), &finding("web-1", 11111, Some(7.5)));
        b.insert(key.clone(), &finding("web-0", 11111, Some(7.5)));

        a.merge(b);
        let hosts = &a.get(&key).unwrap().affected_hosts;
        assert_eq!(hosts.len(), 2);
        assert!(hosts.contains("web-0") && hosts.contains("web-1"));
    }

    #[test]
    fn undefined_entries_excluded_from_reportable() {
        let mut catalog = Catalog::new();
        catalog.insert(
            CatalogKey {
                risk_label: RiskLabel::Undefined,
                plugin_id: 10,
            },
            &finding("h", 10, None),
        );
        catalog.insert(
            CatalogKey {
                risk_label: RiskLabel::Low,
                plugin_id: 20,
            },
            &finding("h", 20, Some(2.0)),
        );
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.reportable().count(), 1);
        assert_eq!(catalog.reportable_plugin_ids().into_iter().next(), Some(20));
    }
}
