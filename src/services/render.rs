//! Report rendering: one finding set, several audience-specific artifacts.
//!
//! Every renderer is a pure function of its inputs writing to an
//! `io::Write`, so file output and stdout produce identical content. Entry
//! lines in the text reports start with `Plugin ID: <n>,`, the shape the
//! baseline extractor re-parses next cycle. Do not change it casually.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use chrono::NaiveDate;

use crate::errors::EngineError;
use crate::models::{Catalog, CatalogEntry, DaemonFindings, DependencyFindings};
use crate::services::aggregate::SeverityDistribution;
use crate::services::trend::TrendDiff;

/// Fixed corrective-action text for stemcell-sourced findings.
const STEMCELL_REMEDIATION_PLAN: &str = "We use operating system 'stemcells' from the \
upstream BOSH open source project, and these libraries are part of those packages. They \
release updates frequently, usually every couple weeks or so, and we will deploy this \
update when they make it ready.";

/// POA&M tracker column set, in import order.
const POAM_COLUMNS: [&str; 28] = [
    "POA&M ID",
    "Control Identifier",
    "Weakness/Deficiency Name",
    "Weakness/Deficiency Description",
    "Source Identifying Weakness",
    "Vulnerability ID",
    "Affected Components",
    "Point of Contact",
    "Status",
    "Required Corrective Actions",
    "Date Identified",
    "Scheduled Completion Date",
    "Type of Milestone",
    "Milestone Changes",
    "Completion Date",
    "Decommission/Removal",
    "Risk Acknowledgement Date",
    "System Component",
    "Initial Risk Rating",
    "Residual Risk Level",
    "Deviation Request",
    "RTM Required",
    "False Positive",
    "Deviation Rationale",
    "Supporting Documents",
    "Comments",
    "Auto Approval",
    "Known Exploited Vulnerability",
];

/// Run a renderer against a file path, or stdout when no path is given.
pub fn render_to<F>(output: Option<&Path>, render: F) -> Result<(), EngineError>
where
    F: FnOnce(&mut dyn Write) -> Result<(), EngineError>,
{
    match output {
        Some(path) => {
            let file = File::create(path)?;
            let mut writer = BufWriter::new(file);
            render(&mut writer)?;
            writer.flush()?;
            tracing::info!(output = %path.display(), "Report written");
            Ok(())
        }
        None => {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            render(&mut lock)?;
            lock.flush()?;
            Ok(())
        }
    }
}

fn header(w: &mut dyn Write, title: &str, date: NaiveDate) -> io::Result<()> {
    writeln!(w, "------- {title} ({}) -------", date.format("%Y-%m-%d"))
}

fn entry_line(w: &mut dyn Write, plugin_id: u32, entry: &CatalogEntry) -> io::Result<()> {
    let cvss = match entry.cvss_score {
        Some(score) => format!("{score:.1}"),
        None => "n/a".to_string(),
    };
    writeln!(
        w,
        "Plugin ID: {plugin_id}, Severity: {}, Name: {}, CVSS: {cvss}",
        entry.risk_label, entry.plugin_name
    )
}

/// Inline hosts up to `max_hosts`, otherwise just the count.
fn host_lines(
    w: &mut dyn Write,
    hosts: &BTreeSet<String>,
    max_hosts: usize,
) -> io::Result<()> {
    if hosts.len() > max_hosts {
        writeln!(w, "\t{} affected hosts found ...", hosts.len())
    } else {
        for host in hosts {
            writeln!(w, "\t{host}")?;
        }
        Ok(())
    }
}

/// Text summary: severity totals, then carryover and new sections.
pub fn render_summary(
    catalog: &Catalog,
    diff: &TrendDiff,
    max_hosts: usize,
    date: NaiveDate,
    w: &mut dyn Write,
) -> Result<(), EngineError> {
    header(w, "VULNERABILITY SUMMARY REPORT", date)?;

    let dist = SeverityDistribution::from_catalog(catalog);
    writeln!(w)?;
    writeln!(
        w,
        "Totals by severity: Critical: {}, High: {}, Medium: {}, Low: {}, Undefined: {}",
        dist.critical, dist.high, dist.medium, dist.low, dist.undefined
    )?;

    let carryover: Vec<_> = catalog
        .reportable()
        .filter(|(key, _)| diff.is_carryover(key.plugin_id))
        .collect();
    let fresh: Vec<_> = catalog
        .reportable()
        .filter(|(key, _)| !diff.is_carryover(key.plugin_id))
        .collect();

    writeln!(w)?;
    if carryover.is_empty() {
        writeln!(w, "No results carried over from previous month.")?;
    } else {
        writeln!(w, "Still present from last month (Not Fixed):")?;
        writeln!(w)?;
        for (key, entry) in &carryover {
            entry_line(w, key.plugin_id, entry)?;
            host_lines(w, &entry.affected_hosts, max_hosts)?;
        }
    }

    writeln!(w)?;
    if fresh.is_empty() {
        writeln!(w, "No new vulnerabilities found this month.")?;
    } else {
        writeln!(w, "New vulnerabilities this month:")?;
        writeln!(w)?;
        for (key, entry) in &fresh {
            entry_line(w, key.plugin_id, entry)?;
            host_lines(w, &entry.affected_hosts, max_hosts)?;
        }
    }
    Ok(())
}

/// Daemon inventory report: expected counts per component, then per-host
/// unknown paths.
pub fn render_daemons(
    daemons: &DaemonFindings,
    date: NaiveDate,
    w: &mut dyn Write,
) -> Result<(), EngineError> {
    header(w, "DAEMON REPORT", date)?;

    writeln!(w)?;
    writeln!(w, "Expected platform daemons seen: {}", daemons.seen_count)?;
    for (rule, count) in &daemons.matched_by_rule {
        writeln!(w, "\t{rule}: {count}")?;
    }

    writeln!(w)?;
    writeln!(w, "Unknown daemons: {}", daemons.unknown_count())?;
    for (host, paths) in &daemons.unknown_by_host {
        writeln!(w, "{host}:")?;
        for path in paths {
            writeln!(w, "\t{path}")?;
        }
    }
    Ok(())
}

/// Dependency-exposure report: expected-safe tier counts, then per-host
/// paths needing investigation.
pub fn render_log4j(
    dependencies: &DependencyFindings,
    date: NaiveDate,
    w: &mut dyn Write,
) -> Result<(), EngineError> {
    header(w, "LOG4J EXPOSURE REPORT", date)?;

    writeln!(w)?;
    writeln!(w, "Expected-safe paths: {}", dependencies.safe_count())?;
    for (tier, count) in &dependencies.safe_by_tier {
        writeln!(w, "\t{tier}: {count}")?;
    }

    writeln!(w)?;
    writeln!(
        w,
        "Unexpected vulnerable paths: {}",
        dependencies.unsafe_count()
    )?;
    for (host, paths) in &dependencies.unsafe_by_host {
        writeln!(w, "{host}:")?;
        for path in paths {
            writeln!(w, "\t{path}")?;
        }
    }
    Ok(())
}

/// Operator work queue: every reportable entry, severity-ordered, full host
/// list uncapped.
pub fn render_work(
    catalog: &Catalog,
    date: NaiveDate,
    w: &mut dyn Write,
) -> Result<(), EngineError> {
    header(w, "WORK REPORT", date)?;
    writeln!(w)?;
    for (key, entry) in catalog.reportable() {
        entry_line(w, key.plugin_id, entry)?;
        for host in &entry.affected_hosts {
            writeln!(w, "\t{host}")?;
        }
    }
    Ok(())
}

/// POA&M compliance CSV: one row per reportable catalog entry.
///
/// The risk columns use the compliance label set (Critical down-mapped to
/// High, Medium spelled Moderate); carryover entries are marked Ongoing.
pub fn render_csv(
    catalog: &Catalog,
    diff: &TrendDiff,
    point_of_contact: &str,
    date: NaiveDate,
    w: &mut dyn Write,
) -> Result<(), EngineError> {
    let mut csv_writer = csv::Writer::from_writer(w);
    csv_writer.write_record(POAM_COLUMNS)?;

    let date_identified = date.format("%m/%d/%Y").to_string();
    for (key, entry) in catalog.reportable() {
        let risk = entry.risk_label.compliance_label();
        let status = if diff.is_carryover(key.plugin_id) {
            "Ongoing"
        } else {
            "Open"
        };
        let description = format!(
            "{}, https://www.tenable.com/plugins/nessus/{}",
            entry.plugin_name, key.plugin_id
        );
        let vulnerability_id = key.plugin_id.to_string();
        let components = format!("{} production hosts", entry.affected_hosts.len());
        csv_writer.write_record([
            "",
            "RA-5",
            entry.plugin_name.as_str(),
            description.as_str(),
            "Nessus Scan Report",
            vulnerability_id.as_str(),
            components.as_str(),
            point_of_contact,
            status,
            STEMCELL_REMEDIATION_PLAN,
            date_identified.as_str(),
            "",
            "Resolve",
            "",
            "",
            "",
            "",
            "CloudFoundry stemcell",
            risk,
            risk,
            "No",
            "No",
            "No",
            "",
            "",
            "",
            "No",
            "No",
        ])?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Severity bucket counts as JSON for the charting layer.
pub fn render_distribution(
    dist: &SeverityDistribution,
    w: &mut dyn Write,
) -> Result<(), EngineError> {
    serde_json::to_writer_pretty(&mut *w, dist)
        .map_err(|e| EngineError::Config(format!("serializing distribution: {e}")))?;
    writeln!(w)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CatalogKey, Finding, RiskLabel};

    fn sample_catalog() -> Catalog {
        let mut catalog = Catalog::new();
        for (host, plugin_id, cvss) in [
            ("web-0", 51192u32, Some(6.5f32)),
            ("web-1", 51192, Some(6.5)),
            ("web-0", 151513, Some(9.8)),
        ] {
            let finding = Finding {
                host: host.to_string(),
                plugin_id,
                plugin_name: if plugin_id == 51192 {
                    "SSL Certificate Cannot Be Trusted".to_string()
                } else {
                    "Critical Library Flaw".to_string()
                },
                raw_output: String::new(),
                severity_raw: None,
                cvss_score: cvss,
            };
            catalog.insert(
                CatalogKey {
                    risk_label: RiskLabel::for_finding(&finding),
                    plugin_id,
                },
                &finding,
            );
        }
        catalog
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 4).unwrap()
    }

    fn render_summary_string(catalog: &Catalog, diff: &TrendDiff, max_hosts: usize) -> String {
        let mut out = Vec::new();
        render_summary(catalog, diff, max_hosts, date(), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn summary_sections_follow_diff() {
        let catalog = sample_catalog();
        let diff = TrendDiff::partition(
            &catalog.reportable_plugin_ids(),
            &BTreeSet::from([51192]),
        );
        let text = render_summary_string(&catalog, &diff, 6);

        assert!(text.contains("------- VULNERABILITY SUMMARY REPORT (2025-03-04) -------"));
        assert!(text.contains("Still present from last month (Not Fixed):"));
        assert!(text.contains("New vulnerabilities this month:"));
        let still = text.find("Still present").unwrap();
        let fresh = text.find("New vulnerabilities").unwrap();
        let ssl = text.find("Plugin ID: 51192,").unwrap();
        let lib = text.find("Plugin ID: 151513,").unwrap();
        assert!(still < ssl && ssl < fresh);
        assert!(fresh < lib);
    }

    #[test]
    fn summary_first_run_is_all_new() {
        let catalog = sample_catalog();
        let diff =
            TrendDiff::partition(&catalog.reportable_plugin_ids(), &BTreeSet::new());
        let text = render_summary_string(&catalog, &diff, 6);
        assert!(text.contains("No results carried over from previous month."));
        assert!(text.contains("New vulnerabilities this month:"));
    }

    #[test]
    fn summary_lines_round_trip_through_baseline() {
        use crate::services::baseline::{BaselineSource, RenderedReportBaseline};
        use std::io::Write as _;

        let catalog = sample_catalog();
        let diff =
            TrendDiff::partition(&catalog.reportable_plugin_ids(), &BTreeSet::new());
        let text = render_summary_string(&catalog, &diff, 6);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file.flush().unwrap();

        let ids = RenderedReportBaseline::new(Some(file.path()))
            .plugin_ids()
            .unwrap();
        assert_eq!(ids, catalog.reportable_plugin_ids());
    }

    #[test]
    fn host_cap_replaces_listing_with_count() {
        let catalog = sample_catalog();
        let diff =
            TrendDiff::partition(&catalog.reportable_plugin_ids(), &BTreeSet::new());
        let text = render_summary_string(&catalog, &diff, 1);
        assert!(text.contains("2 affected hosts found ..."));
        assert!(!text.contains("\tweb-1"));
    }

    #[test]
    fn daemon_report_lists_unknowns_per_host() {
        let mut daemons = DaemonFindings::default();
        daemons.record_match("gorouter");
        daemons.record_match("gorouter");
        daemons.record_unknown("web-0", "/usr/local/bin/mystery-agent");

        let mut out = Vec::new();
        render_daemons(&daemons, date(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Expected platform daemons seen: 2"));
        assert!(text.contains("\tgorouter: 2"));
        assert!(text.contains("Unknown daemons: 1"));
        assert!(text.contains("web-0:\n\t/usr/local/bin/mystery-agent"));
    }

    #[test]
    fn log4j_report_breaks_out_tiers() {
        let mut deps = DependencyFindings::default();
        deps.record_safe("ghost");
        deps.record_safe("cell");
        deps.record_safe("cell");
        deps.record_unsafe("uaa-0", "/home/vcap/app/lib/log4j-core-2.7.jar");

        let mut out = Vec::new();
        render_log4j(&deps, date(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Expected-safe paths: 3"));
        assert!(text.contains("\tcell: 2"));
        assert!(text.contains("\tghost: 1"));
        assert!(text.contains("Unexpected vulnerable paths: 1"));
        assert!(text.contains("uaa-0:\n\t/home/vcap/app/lib/log4j-core-2.7.jar"));
    }

    #[test]
    fn work_report_lists_all_hosts_uncapped() {
        let catalog = sample_catalog();
        let mut out = Vec::new();
        render_work(&catalog, date(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("\tweb-0"));
        assert!(text.contains("\tweb-1"));
        // Critical entries sort before Medium.
        assert!(text.find("Plugin ID: 151513,").unwrap() < text.find("Plugin ID: 51192,").unwrap());
    }

    #[test]
    fn csv_has_28_columns_and_downmapped_risk() {
        let catalog = sample_catalog();
        let diff = TrendDiff::partition(
            &catalog.reportable_plugin_ids(),
            &BTreeSet::from([51192]),
        );
        let mut out = Vec::new();
        render_csv(&catalog, &diff, "security@agency.gov", date(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        let mut reader = csv::Reader::from_reader(text.as_bytes());
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.len(), 28);
        assert_eq!(&headers[0], "POA&M ID");
        assert_eq!(&headers[27], "Known Exploited Vulnerability");

        let rows: Vec<csv::StringRecord> =
            reader.records().collect::<Result<_, _>>().unwrap();
        assert_eq!(rows.len(), 2);
        let critical_row = rows.iter().find(|r| &r[5] == "151513").unwrap();
        assert_eq!(&critical_row[18], "High"); // Critical down-mapped
        assert_eq!(&critical_row[8], "Open");
        let medium_row = rows.iter().find(|r| &r[5] == "51192").unwrap();
        assert_eq!(&medium_row[18], "Moderate");
        assert_eq!(&medium_row[8], "Ongoing");
        assert_eq!(&medium_row[6], "2 production hosts");
        assert_eq!(&medium_row[7], "security@agency.gov");
    }

    #[test]
    fn csv_excludes_undefined_entries() {
        let mut catalog = sample_catalog();
        let info = Finding {
            host: "h".to_string(),
            plugin_id: 10180,
            plugin_name: "Ping".to_string(),
            raw_output: String::new(),
            severity_raw: None,
            cvss_score: None,
        };
        catalog.insert(
            CatalogKey {
                risk_label: RiskLabel::Undefined,
                plugin_id: 10180,
            },
            &info,
        );
        let diff =
            TrendDiff::partition(&catalog.reportable_plugin_ids(), &BTreeSet::new());
        let mut out = Vec::new();
        render_csv(&catalog, &diff, "", date(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(!text.contains("10180"));
    }

    #[test]
    fn distribution_is_json() {
        let dist = SeverityDistribution {
            critical: 1,
            high: 0,
            medium: 2,
            low: 0,
            undefined: 3,
        };
        let mut out = Vec::new();
        render_distribution(&dist, &mut out).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["critical"], 1);
        assert_eq!(value["medium"], 2);
        assert_eq!(value["undefined"], 3);
    }

    #[test]
    fn render_to_file_matches_inline_render() {
        let catalog = sample_catalog();
        let diff =
            TrendDiff::partition(&catalog.reportable_plugin_ids(), &BTreeSet::new());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("03.summary.txt");
        render_to(Some(&path), |w| render_summary(&catalog, &diff, 6, date(), w)).unwrap();

        let from_file = std::fs::read_to_string(&path).unwrap();
        let inline = render_summary_string(&catalog, &diff, 6);
        assert_eq!(from_file, inline);
    }
}
