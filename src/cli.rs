//! Command-line surface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::services::orchestrator::ReportCategory;

/// ConMon scan report engine.
#[derive(Parser, Debug)]
#[command(name = "conmon", version, about = "Classify scan findings and track month-over-month trends")]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Scan report files or directories to walk for .nessus/.xml files
    #[arg(value_name = "PATH")]
    pub inputs: Vec<PathBuf>,

    /// Generate the daemon inventory report
    #[arg(short = 'd', long)]
    pub daemons: bool,

    /// Generate the log4j dependency-exposure report
    #[arg(short = 'l', long)]
    pub log4j: bool,

    /// Generate the vulnerability summary report
    #[arg(short = 's', long)]
    pub summary: bool,

    /// Generate the operator work report
    #[arg(short = 'w', long)]
    pub work: bool,

    /// Generate POA&M CSV rows
    #[arg(long)]
    pub csv: bool,

    /// Generate every report category
    #[arg(long)]
    pub all: bool,

    /// Inline host listing cap before summarizing by count
    #[arg(long, value_name = "N", default_value_t = 6)]
    pub max_hosts: usize,

    /// Output file (default stdout)
    #[arg(short = 'o', long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Previous cycle's rendered report, used as the trend baseline
    #[arg(long, value_name = "PATH")]
    pub prev: Option<PathBuf>,

    /// Daemon rules YAML (default: built-in rule list)
    #[arg(long, value_name = "PATH")]
    pub rules: Option<PathBuf>,

    /// Write severity distribution JSON alongside the reports
    #[arg(long, value_name = "PATH")]
    pub distribution: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the monthly cycle: walk <root>/<year>/<MM> and render reports
    /// into <root>/<year>/reports
    Cycle {
        /// Year (default: current)
        #[arg(short = 'y', long)]
        year: Option<i32>,

        /// Month 1-12 (default: current)
        #[arg(short = 'm', long, value_parser = clap::value_parser!(u32).range(1..=12))]
        month: Option<u32>,

        /// Report category to generate
        #[arg(short = 'r', long, value_enum)]
        report: Option<ReportCategory>,

        /// Generate every category
        #[arg(long, conflicts_with = "report")]
        all: bool,
    },
}

impl Args {
    /// Report categories selected by flags; summary when none given.
    pub fn categories(&self) -> Vec<ReportCategory> {
        if self.all {
            return ReportCategory::ALL.to_vec();
        }
        let mut selected = Vec::new();
        if self.daemons {
            selected.push(ReportCategory::Daemons);
        }
        if self.log4j {
            selected.push(ReportCategory::Log4j);
        }
        if self.summary {
            selected.push(ReportCategory::Summary);
        }
        if self.work {
            selected.push(ReportCategory::Work);
        }
        if self.csv {
            selected.push(ReportCategory::Csv);
        }
        if selected.is_empty() {
            selected.push(ReportCategory::Summary);
        }
        selected
    }
}
