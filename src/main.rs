use std::io::Write;

use clap::Parser;
use mimalloc::MiMalloc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use conmon::cli::{Args, Commands};
use conmon::config::AppConfig;
use conmon::services::aggregate::SeverityDistribution;
use conmon::services::orchestrator::{self, ReportCategory};
use conmon::services::pipeline::{self, RunOptions};
use conmon::services::render;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("conmon={}", args.log_level))),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = AppConfig::from_env();

    match args.command {
        Some(Commands::Cycle {
            year,
            month,
            report,
            all,
        }) => {
            let categories: Vec<ReportCategory> = if all || report.is_none() {
                ReportCategory::ALL.to_vec()
            } else {
                report.into_iter().collect()
            };
            let rendered =
                orchestrator::run_cycle(&config, year, month, &categories, args.max_hosts)
                    .await?;
            tracing::info!(reports = rendered, "Cycle complete");
        }
        None => {
            if args.inputs.is_empty() {
                anyhow::bail!("no input files given; pass scan report paths or use `conmon cycle`");
            }
            run_reports(&args, &config).await?;
        }
    }
    Ok(())
}

/// One pipeline run, then every selected category rendered into the same
/// sink (file or stdout).
async fn run_reports(args: &Args, config: &AppConfig) -> anyhow::Result<()> {
    let outcome = pipeline::run(&RunOptions {
        inputs: args.inputs.clone(),
        daemon_rules_path: args
            .rules
            .clone()
            .or_else(|| config.daemon_rules_path.clone()),
        prev: args.prev.clone(),
    })
    .await?;

    tracing::info!(
        parsed = outcome.parsed_files,
        skipped = outcome.skipped_files,
        entries = outcome.catalog.len(),
        "Pipeline complete"
    );

    let today = chrono::Local::now().date_naive();
    let categories = args.categories();
    render::render_to(args.output.as_deref(), |w| {
        for (i, category) in categories.iter().enumerate() {
            if i > 0 {
                writeln!(w)?;
            }
            match category {
                ReportCategory::Daemons => render::render_daemons(&outcome.daemons, today, w)?,
                ReportCategory::Log4j => {
                    render::render_log4j(&outcome.dependencies, today, w)?
                }
                ReportCategory::Summary => render::render_summary(
                    &outcome.catalog,
                    &outcome.diff,
                    args.max_hosts,
                    today,
                    w,
                )?,
                ReportCategory::Work => render::render_work(&outcome.catalog, today, w)?,
                ReportCategory::Csv => render::render_csv(
                    &outcome.catalog,
                    &outcome.diff,
                    &config.point_of_contact,
                    today,
                    w,
                )?,
            }
        }
        Ok(())
    })?;

    if let Some(dist_path) = &args.distribution {
        let dist = SeverityDistribution::from_catalog(&outcome.catalog);
        render::render_to(Some(dist_path), |w| render::render_distribution(&dist, w))?;
    }
    Ok(())
}
