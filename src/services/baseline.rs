//! Baseline extraction from the previous cycle's rendered report.
//!
//! The only persisted state between cycles is the rendered text artifact, so
//! the baseline is reconstructed by re-parsing it for `Plugin ID: <n>,`
//! lines. That re-parse is lossy but is the established contract with the
//! monthly driver; the `BaselineSource` seam exists so a structured snapshot
//! can replace it without touching the diff partition.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::errors::EngineError;

/// Source of the previous cycle's known plugin identifiers.
pub trait BaselineSource {
    fn plugin_ids(&self) -> Result<BTreeSet<u32>, EngineError>;
}

/// Baseline re-parsed from a previously rendered text report.
///
/// A `None` path or a path that does not exist is an empty baseline:
/// first-run semantics, not an error.
#[derive(Debug, Clone)]
pub struct RenderedReportBaseline {
    path: Option<PathBuf>,
}

impl RenderedReportBaseline {
    pub fn new(path: Option<&Path>) -> Self {
        Self {
            path: path.map(Path::to_path_buf),
        }
    }
}

/// Line-prefix shape shared with the renderer's entry lines.
fn plugin_line_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // Infallible: literal pattern.
        Regex::new(r"^Plugin ID: (\d+),").unwrap_or_else(|_| unreachable!())
    })
}

impl BaselineSource for RenderedReportBaseline {
    fn plugin_ids(&self) -> Result<BTreeSet<u32>, EngineError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(BTreeSet::new());
        };
        if !path.exists() {
            tracing::info!(
                baseline = %path.display(),
                "No previous report; treating baseline as empty"
            );
            return Ok(BTreeSet::new());
        }

        let text = fs::read_to_string(path)?;
        let mut ids = BTreeSet::new();
        for line in text.lines() {
            if let Some(caps) = plugin_line_pattern().captures(line) {
                if let Some(id) = caps.get(1).and_then(|m| m.as_str().parse().ok()) {
                    ids.insert(id);
                }
            }
        }
        tracing::debug!(baseline = %path.display(), ids = ids.len(), "Loaded baseline");
        Ok(ids)
    }
}
