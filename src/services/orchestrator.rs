//! Monthly cycle driver.
//!
//! Thin wrapper over the pipeline: resolves this cycle's scan directory and
//! report paths, the previous month's artifact for the baseline, and runs
//! one pipeline invocation per requested category. Directory layout is
//! `<root>/<year>/<MM>/` for scans and `<root>/<year>/reports/` for
//! rendered artifacts named `<MM>.<category>.<ext>`.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Datelike, Local};

use crate::config::AppConfig;
use crate::errors::EngineError;
use crate::services::aggregate::SeverityDistribution;
use crate::services::pipeline::{self, RunOptions};
use crate::services::render;

/// Report categories the engine renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportCategory {
    Daemons,
    Log4j,
    Summary,
    Work,
    Csv,
}

impl ReportCategory {
    pub const ALL: [ReportCategory; 5] = [
        Self::Daemons,
        Self::Log4j,
        Self::Summary,
        Self::Work,
        Self::Csv,
    ];

    fn slug(&self) -> &'static str {
        match self {
            Self::Daemons => "daemons",
            Self::Log4j => "log4j",
            Self::Summary => "summary",
            Self::Work => "work",
            Self::Csv => "poam",
        }
    }

    fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            _ => "txt",
        }
    }

    /// Categories whose artifact is diffed against the previous cycle.
    fn uses_baseline(&self) -> bool {
        matches!(self, Self::Summary | Self::Csv)
    }
}

impl std::fmt::Display for ReportCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.slug())
    }
}

/// Resolved directories for one cycle.
#[derive(Debug, Clone)]
pub struct CyclePaths {
    pub month_dir: PathBuf,
    pub reports_dir: PathBuf,
}

/// Rendered-artifact directory for one year.
pub fn reports_dir(root: &Path, year: i32) -> PathBuf {
    root.join(year.to_string()).join("reports")
}

/// Create (or reuse) the month and reports directories for a cycle.
pub fn setup_dirs(root: &Path, year: i32, month: u32) -> Result<CyclePaths, EngineError> {
    let month_dir = root.join(year.to_string()).join(format!("{month:02}"));
    let reports_dir = reports_dir(root, year);
    fs::create_dir_all(&month_dir)?;
    fs::create_dir_all(&reports_dir)?;
    tracing::info!(month_dir = %month_dir.display(), reports_dir = %reports_dir.display(), "Cycle directories ready");
    Ok(CyclePaths {
        month_dir,
        reports_dir,
    })
}

/// The cycle immediately before (year, month), crossing year boundaries.
pub fn previous_month(year: i32, month: u32) -> (i32, u32) {
    if month == 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    }
}

/// Artifact path for one category in one month: `<MM>.<category>.<ext>`.
pub fn report_file(reports_dir: &Path, month: u32, category: ReportCategory) -> PathBuf {
    reports_dir.join(format!(
        "{month:02}.{}.{}",
        category.slug(),
        category.extension()
    ))
}

/// Run the pipeline once per requested category for one cycle.
///
/// Defaults to the current local year/month when not given. Returns the
/// number of categories rendered.
pub async fn run_cycle(
    config: &AppConfig,
    year: Option<i32>,
    month: Option<u32>,
    categories: &[ReportCategory],
    max_hosts: usize,
) -> Result<usize, EngineError> {
    let now = Local::now();
    let year = year.unwrap_or_else(|| now.year());
    let month = month.unwrap_or_else(|| now.month());
    let today = now.date_naive();

    let paths = setup_dirs(&config.root_dir, year, month)?;
    let (prev_year, prev_month) = previous_month(year, month);
    let prev_reports_dir = reports_dir(&config.root_dir, prev_year);

    let mut rendered = 0usize;
    for &category in categories {
        let output = report_file(&paths.reports_dir, month, category);
        // The baseline is always the previous summary text: the POA&M CSV
        // carries no `Plugin ID:` lines to re-parse.
        let prev = category
            .uses_baseline()
            .then(|| report_file(&prev_reports_dir, prev_month, ReportCategory::Summary));

        tracing::info!(%category, output = %output.display(), "Generating report");
        let outcome = pipeline::run(&RunOptions {
            inputs: vec![paths.month_dir.clone()],
            daemon_rules_path: config.daemon_rules_path.clone(),
            prev,
        })
        .await?;

        render::render_to(Some(&output), |w| match category {
            ReportCategory::Daemons => render::render_daemons(&outcome.daemons, today, w),
            ReportCategory::Log4j => render::render_log4j(&outcome.dependencies, today, w),
            ReportCategory::Summary => {
                render::render_summary(&outcome.catalog, &outcome.diff, max_hosts, today, w)
            }
            ReportCategory::Work => render::render_work(&outcome.catalog, today, w),
            ReportCategory::Csv => render::render_csv(
                &outcome.catalog,
                &outcome.diff,
                &config.point_of_contact,
                today,
                w,
            ),
        })?;

        if category == ReportCategory::Summary {
            let dist_path = paths.reports_dir.join(format!("{month:02}.severity.json"));
            let dist = SeverityDistribution::from_catalog(&outcome.catalog);
            render::render_to(Some(&dist_path), |w| render::render_distribution(&dist, w))?;
        }

        if output.exists() {
            tracing::info!(output = %output.display(), "Report successfully generated");
        } else {
            tracing::warn!(output = %output.display(), "Expected report file not found");
        }
        rendered += 1;
    }
    Ok(rendered)
}
