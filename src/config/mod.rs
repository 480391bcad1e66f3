use std::env;
use std::path::PathBuf;

/// Engine configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Root of the ConMon directory tree (`<root>/<year>/<MM>`).
    pub root_dir: PathBuf,
    /// Daemon rules YAML override; embedded default when unset.
    pub daemon_rules_path: Option<PathBuf>,
    /// Point of contact written into POA&M CSV rows.
    pub point_of_contact: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let root_dir = env::var("CONMON_ROOT").map(PathBuf::from).unwrap_or_else(|_| {
            let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join("Documents").join("ConMon")
        });
        Self {
            root_dir,
            daemon_rules_path: env::var("CONMON_DAEMON_RULES").ok().map(PathBuf::from),
            point_of_contact: env::var("CONMON_POC").unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_populated() {
        // Only checks derived shape; the env itself varies per machine.
        let config = AppConfig::from_env();
        assert!(!config.root_dir.as_os_str().is_empty());
    }
}
