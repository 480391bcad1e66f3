//! First-match classification of daemon-inventory and dependency-path
//! findings.
//!
//! Both classifiers share the algorithm: walk the lines of a finding's
//! plugin output, evaluate each against an ordered rule set, and let the
//! first match decide. Everything that falls through every rule lands in
//! exactly one recorded branch (unknown for daemons, unsafe for dependency
//! paths), so nothing disappears without a report line.

use std::sync::OnceLock;

use regex::Regex;

use crate::models::{DaemonFindings, DependencyFindings, Finding, Verdict};
use crate::services::rules::RuleSet;

/// Plugin reporting running daemons not managed by the package system.
pub const DAEMON_PLUGIN_ID: u32 = 33851;

/// Known log4j CVE-check plugins.
pub const LOG4J_PLUGIN_IDS: [u32; 7] =
    [155999, 156032, 156057, 156103, 156183, 156327, 156860];

/// OS agent binaries present on every fleet host; never worth reporting.
const OS_AGENT_BINARIES: [&str; 2] = ["nessus_agent", "amazon-ssm-agent"];

/// Classify one daemon path line. `Unknown` means no configured platform
/// component claims the path.
pub fn classify_daemon_line(line: &str, host: &str, rules: &RuleSet) -> Verdict {
    match rules.first_match(line, host) {
        Some(rule) => Verdict::expected(&rule.name),
        None => Verdict::Unknown,
    }
}

/// Classify one dependency (log4j) path. A path whose rule tier matched only
/// on the path half falls through here to `UnexpectedUnsafe`.
pub fn classify_dependency_path(path: &str, host: &str, rules: &RuleSet) -> Verdict {
    match rules.first_match(path, host) {
        Some(rule) => Verdict::expected(&rule.name),
        None => Verdict::UnexpectedUnsafe,
    }
}

/// Run the daemon classifier over one finding's plugin output.
///
/// Keeps only absolute-path lines (the output's header/boilerplate lines
/// never start with `/`), skips the fleet-wide OS agent binaries, then
/// first-match-classifies each remaining line.
pub fn classify_daemons(finding: &Finding, rules: &RuleSet, out: &mut DaemonFindings) {
    for line in finding.raw_output.lines() {
        let line = line.trim();
        if !line.starts_with('/') {
            continue;
        }
        if OS_AGENT_BINARIES.iter().any(|agent| line.contains(agent)) {
            continue;
        }
        match classify_daemon_line(line, &finding.host, rules) {
            Verdict::ExpectedSafe { rule } => out.record_match(&rule),
            _ => {
                tracing::info!(host = %finding.host, path = line, "Unknown daemon");
                out.record_unknown(&finding.host, line);
            }
        }
    }
}

/// Plugin-output line shape carrying a finding's filesystem path.
fn path_line_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // Infallible: literal pattern.
        Regex::new(r"^\s*Path\s+:\s+(/.*)").unwrap_or_else(|_| unreachable!())
    })
}

/// Run the dependency-path classifier over one finding's plugin output.
pub fn classify_dependency_paths(
    finding: &Finding,
    rules: &RuleSet,
    out: &mut DependencyFindings,
) {
    for line in finding.raw_output.lines() {
        let Some(caps) = path_line_pattern().captures(line) else {
            continue;
        };
        let Some(path) = caps.get(1).map(|m| m.as_str().trim_end()) else {
            continue;
        };
        match classify_dependency_path(path, &finding.host, rules) {
            Verdict::ExpectedSafe { rule } => out.record_safe(&rule),
            _ => {
                tracing::warn!(
                    host = %finding.host,
                    path,
                    plugin_id = finding.plugin_id,
                    "Unexpected vulnerable dependency path"
                );
                out.record_unsafe(&finding.host, path);
            }
        }
    }
}

/// Route one finding to whichever classifier covers its plugin, if any.
pub fn classify(
    finding: &Finding,
    daemon_rules: &RuleSet,
    dependency_rules: &RuleSet,
    daemons: &mut DaemonFindings,
    dependencies: &mut DependencyFindings,
) {
    if finding.plugin_id == DAEMON_PLUGIN_ID {
        classify_daemons(finding, daemon_rules, daemons);
    } else if LOG4J_PLUGIN_IDS.contains(&finding.plugin_id) {
        classify_dependency_paths(finding, dependency_rules, dependencies);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn daemon_finding(host: &str, output: &str) -> Finding {
        Finding {
            host: host.to_string(),
            plugin_id: DAEMON_PLUGIN_ID,
            plugin_name: "Unknown daemons".to_string(),
            raw_output: output.to_string(),
            severity_raw: Some(1),
            cvss_score: None,
        }
    }

    fn log4j_finding(host: &str, output: &str) -> Finding {
        Finding {
            host: host.to_string(),
            plugin_id: 156032,
            plugin_name: "Apache Log4j Installed (Unix)".to_string(),
            raw_output: output.to_string(),
            severity_raw: Some(3),
            cvss_score: Some(9.8),
        }
    }

    fn gorouter_rules() -> RuleSet {
        RuleSet::daemons_from_yaml("daemons:\n  - gorouter\n").unwrap()
    }

    #[test]
    fn known_daemon_path_is_expected_safe() {
        let rules = gorouter_rules();
        let finding = daemon_finding(
            "router-0",
            "The following running daemons are not managed by dpkg :\n\
             /var/vcap/data/packages/gorouter/abc123/bin/gorouter\n",
        );
        let mut out = DaemonFindings::default();
        classify_daemons(&finding, &rules, &mut out);
        assert_eq!(out.seen_count, 1);
        assert_eq!(out.unknown_count(), 0);
    }

    #[test]
    fn unknown_daemon_recorded_per_host() {
        let rules = gorouter_rules();
        let finding = daemon_finding("router-0", "/usr/local/bin/mystery-agent\n");
        let mut out = DaemonFindings::default();
        classify_daemons(&finding, &rules, &mut out);
        assert_eq!(out.seen_count, 0);
        assert_eq!(
            out.unknown_by_host["router-0"],
            vec!["/usr/local/bin/mystery-agent".to_string()]
        );
    }

    #[test]
    fn os_agent_binaries_are_skipped() {
        let rules = gorouter_rules();
        let finding = daemon_finding(
            "router-0",
            "/opt/nessus_agent/sbin/nessus-agent-module\n/usr/bin/amazon-ssm-agent\n",
        );
        let mut out = DaemonFindings::default();
        classify_daemons(&finding, &rules, &mut out);
        assert_eq!(out.seen_count, 0);
        assert_eq!(out.unknown_count(), 0);
    }

    #[test]
    fn boilerplate_lines_ignored() {
        let rules = gorouter_rules();
        let finding = daemon_finding(
            "router-0",
            "The following running daemons are not managed by dpkg :\n\n",
        );
        let mut out = DaemonFindings::default();
        classify_daemons(&finding, &rules, &mut out);
        assert_eq!(out.seen_count + out.unknown_count(), 0);
    }

    #[test]
    fn cell_tier_requires_cell_host() {
        let rules = RuleSet::dependency_default();
        let output = "  Path      : /var/vcap/data/grootfs/store/unprivileged/images/395c7a88/diff/home/vcap/app/WEB-INF/lib/log4j-core-2.7.jar\n";

        let mut out = DependencyFindings::default();
        classify_dependency_paths(
            &log4j_finding("cf-prod-diego-cell-24", output),
            &rules,
            &mut out,
        );
        assert_eq!(out.safe_by_tier.get("cell"), Some(&1));
        assert_eq!(out.unsafe_count(), 0);

        let mut out = DependencyFindings::default();
        classify_dependency_paths(&log4j_finding("uaa-0", output), &rules, &mut out);
        assert_eq!(out.safe_count(), 0);
        assert_eq!(out.unsafe_count(), 1);
        assert!(out.unsafe_by_host["uaa-0"][0].contains("log4j-core-2.7.jar"));
    }

    #[test]
    fn ghost_tier_wins_over_cell_tier() {
        let rules = RuleSet::dependency_default();
        let output = "  Path      : /var/vcap/data/grootfs/store/unprivileged/volumes/ab12cd/diff/lib/log4j-core-2.7.jar\n";
        let mut out = DependencyFindings::default();
        classify_dependency_paths(
            &log4j_finding("cf-prod-diego-cell-24", output),
            &rules,
            &mut out,
        );
        assert_eq!(out.safe_by_tier.get("ghost"), Some(&1));
        assert!(out.safe_by_tier.get("cell").is_none());
    }

    #[test]
    fn logging_tier_on_indexer_host() {
        let rules = RuleSet::dependency_default();
        let output = "  Path      : /var/vcap/packages/opensearch/lib/log4j-core-2.17.1.jar\n";
        let mut out = DependencyFindings::default();
        classify_dependency_paths(
            &log4j_finding("opensearch-data-2", output),
            &rules,
            &mut out,
        );
        assert_eq!(out.safe_by_tier.get("logging"), Some(&1));
    }

    #[test]
    fn non_path_output_lines_ignored() {
        let rules = RuleSet::dependency_default();
        let output = "Nessus detected the following Log4j installs:\n\
                      \n  Version   : 2.7\n";
        let mut out = DependencyFindings::default();
        classify_dependency_paths(&log4j_finding("uaa-0", output), &rules, &mut out);
        assert_eq!(out.safe_count() + out.unsafe_count(), 0);
    }

    #[test]
    fn routing_by_plugin_id() {
        let daemon_rules = gorouter_rules();
        let dep_rules = RuleSet::dependency_default();
        let mut daemons = DaemonFindings::default();
        let mut deps = DependencyFindings::default();

        let unclassified = Finding {
            host: "h".to_string(),
            plugin_id: 51192,
            plugin_name: "SSL".to_string(),
            raw_output: "/some/path".to_string(),
            severity_raw: Some(2),
            cvss_score: Some(6.5),
        };
        classify(&unclassified, &daemon_rules, &dep_rules, &mut daemons, &mut deps);
        assert_eq!(daemons.seen_count + daemons.unknown_count(), 0);
        assert_eq!(deps.safe_count() + deps.unsafe_count(), 0);

        classify(
            &daemon_finding("h", "/var/vcap/data/packages/gorouter/a/bin/gorouter"),
            &daemon_rules,
            &dep_rules,
            &mut daemons,
            &mut deps,
        );
        assert_eq!(daemons.seen_count, 1);
    }

    #[test]
    fn verdicts_cover_every_classified_line() {
        let rules = gorouter_rules();
        for line in ["/var/vcap/data/packages/gorouter/a/bin/gorouter", "/opt/x"] {
            let verdict = classify_daemon_line(line, "h", &rules);
            assert!(matches!(
                verdict,
                Verdict::ExpectedSafe { .. } | Verdict::Unknown
            ));
        }
        let dep_rules = RuleSet::dependency_default();
        for path in [
            "/var/vcap/data/grootfs/store/unprivileged/volumes/x/diff/a.jar",
            "/home/vcap/app/lib/log4j-core-2.7.jar",
        ] {
            let verdict = classify_dependency_path(path, "h", &dep_rules);
            assert!(matches!(
                verdict,
                Verdict::ExpectedSafe { .. } | Verdict::UnexpectedUnsafe
            ));
        }
    }
}
