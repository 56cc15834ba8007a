// mod.rs — Subcommands and the flags they share.

pub mod build;
pub mod list;
pub mod verify;

use std::path::PathBuf;

use clap::{Args, ValueEnum};
use rc_compiler::{BuildReport, CompilerConfig, Level};

/// Report output format on stdout.
#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Text,
    Json,
}

/// Flags shared by the commands that run the pipeline. Each one overrides
/// the matching `rulecard.toml` value.
#[derive(Args)]
pub struct BuildArgs {
    /// Rule Card root directory.
    #[arg(long)]
    rules_dir: Option<PathBuf>,
    /// Agent manifest file.
    #[arg(long)]
    manifest: Option<PathBuf>,
    /// Package output directory.
    #[arg(long)]
    out: Option<PathBuf>,
    /// Skip invalid cards with a warning instead of failing.
    #[arg(long)]
    lenient: bool,
    /// Worker threads (0 = available parallelism).
    #[arg(long)]
    workers: Option<usize>,
    /// Report format on stdout.
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

impl BuildArgs {
    pub fn apply(&self, config: &CompilerConfig) -> CompilerConfig {
        let mut config = config.clone();
        if let Some(dir) = &self.rules_dir {
            config.paths.rules_dir = dir.clone();
        }
        if let Some(manifest) = &self.manifest {
            config.paths.manifest = manifest.clone();
        }
        if let Some(out) = &self.out {
            config.paths.output_dir = out.clone();
        }
        if self.lenient {
            config.build.lenient = true;
        }
        if let Some(workers) = self.workers {
            config.build.workers = workers;
        }
        config
    }
}

/// Print the report. Text output hides info-level entries unless verbose.
pub fn print_report(report: &BuildReport, format: ReportFormat, verbose: bool) -> anyhow::Result<()> {
    match format {
        ReportFormat::Text => {
            let min_level = if verbose { Level::Info } else { Level::Warning };
            let stdout = std::io::stdout();
            report.render(&mut stdout.lock(), min_level)?;
        }
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
    }
    Ok(())
}
