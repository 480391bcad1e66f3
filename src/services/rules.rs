//! Ordered, immutable rule sets for first-match classification.
//!
//! A `RuleSet` is built once at startup from configuration and passed by
//! reference through classification calls. Evaluation order is the list
//! order; the first rule whose path pattern (and host scope, when present)
//! matches decides the verdict and no later rule is consulted.

use std::fs;
use std::path::Path;

use regex::Regex;
use serde::Deserialize;

use crate::errors::EngineError;

/// Default daemon rule list, compiled in so a bare install still classifies.
const DEFAULT_DAEMONS_YAML: &str = include_str!("../../rules/daemons.yaml");

/// One classification rule: a path pattern with an optional host scope.
#[derive(Debug, Clone)]
pub struct Rule {
    pub name: String,
    path: Regex,
    host: Option<Regex>,
}

impl Rule {
    /// Rule matching any host whose line matches the path pattern.
    pub fn path_only(name: &str, path_pattern: &str) -> Result<Self, EngineError> {
        Ok(Self {
            name: name.to_string(),
            path: compile(path_pattern)?,
            host: None,
        })
    }

    /// Rule gated on both a path pattern and a host-name pattern.
    pub fn host_scoped(
        name: &str,
        path_pattern: &str,
        host_pattern: &str,
    ) -> Result<Self, EngineError> {
        Ok(Self {
            name: name.to_string(),
            path: compile(path_pattern)?,
            host: Some(compile(host_pattern)?),
        })
    }

    fn path_matches(&self, line: &str) -> bool {
        self.path.is_match(line)
    }

    /// Host scope is only consulted when the path half already matched.
    fn host_matches(&self, host: &str) -> bool {
        match &self.host {
            Some(re) => re.is_match(host),
            None => true,
        }
    }
}

fn compile(pattern: &str) -> Result<Regex, EngineError> {
    Regex::new(pattern)
        .map_err(|e| EngineError::Config(format!("invalid rule pattern {pattern:?}: {e}")))
}

/// Ordered rule list; immutable for the duration of a run.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

/// Shape of the daemon rules YAML file.
#[derive(Debug, Deserialize)]
struct DaemonRulesFile {
    daemons: Vec<String>,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// First rule whose path pattern matches `line` and whose host scope
    /// (when present) matches `host`. A rule whose path half matches but
    /// whose host half does not is passed over, not returned.
    pub fn first_match(&self, line: &str, host: &str) -> Option<&Rule> {
        self.rules
            .iter()
            .find(|rule| rule.path_matches(line) && rule.host_matches(host))
    }

    /// Build the daemon rule set from YAML text.
    ///
    /// Each entry is a regex fragment for one known platform component,
    /// matched as a path segment on any host.
    pub fn daemons_from_yaml(text: &str) -> Result<Self, EngineError> {
        let file: DaemonRulesFile = serde_yaml::from_str(text)
            .map_err(|e| EngineError::Config(format!("invalid daemon rules: {e}")))?;
        let rules = file
            .daemons
            .iter()
            .map(|name| Rule::path_only(name, &format!("/(?:{name})(?:/|$)")))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(rules))
    }

    /// Load daemon rules from `path`, or the embedded default when `None`.
    pub fn load_daemons(path: Option<&Path>) -> Result<Self, EngineError> {
        let text = match path {
            Some(p) => {
                if !p.exists() {
                    return Err(EngineError::InputNotFound(p.to_path_buf()));
                }
                fs::read_to_string(p)?
            }
            None => DEFAULT_DAEMONS_YAML.to_string(),
        };
        let rules = Self::daemons_from_yaml(&text)?;
        tracing::debug!(rules = rules.len(), "Loaded daemon rule set");
        Ok(rules)
    }

    /// Fixed dependency-path rule tiers, in evaluation order:
    /// ghost container-layer mounts, then sandboxed per-tenant image mounts
    /// on cell workers, then the log indexer's bundled jar on its own hosts.
    pub fn dependency_default() -> Self {
        let rules = vec![
            Rule::path_only("ghost", r"^/var/vcap/data/grootfs/store/unprivileged/volumes/"),
            Rule::host_scoped(
                "cell",
                r"^/var/vcap/data/grootfs/store/",
                r"diego[-_]cell",
            ),
            Rule::host_scoped(
                "logging",
                r"/packages/(?:opensearch|logstash|elasticsearch)[^\s]*/.*log4j[^/]*\.jar$",
                r"(?:logsearch|opensearch)",
            ),
        ];
        // Patterns above are literals; compile failures are unreachable.
        Self::new(rules.into_iter().collect::<Result<Vec<_>, _>>().unwrap_or_default())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }
}
