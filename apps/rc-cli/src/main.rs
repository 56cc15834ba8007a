//! # rulecard
//!
//! Command-line interface for the Rule Card compiler.
//!
//! - `rulecard validate` — check every card (and the manifest, if present)
//! - `rulecard compile` — build and write one package per agent
//! - `rulecard verify` — re-check written packages and report drift
//! - `rulecard list` — show which cards each agent receives
//!
//! The report goes to stdout, logs go to stderr. Any error exits nonzero.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use rc_compiler::CompilerConfig;
use tracing_subscriber::EnvFilter;

/// Rule Card compiler: validated security rules in, agent packages out.
#[derive(Parser)]
#[command(name = "rulecard", version, about)]
struct Cli {
    /// Project root directory (defaults to current directory).
    #[arg(long, default_value = ".")]
    project_root: PathBuf,

    /// Debug-level logging for rulecard crates.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log line format on stderr.
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate cards and resolve the manifest without writing anything.
    Validate {
        #[command(flatten)]
        build: commands::BuildArgs,
    },
    /// Compile every agent package (all or nothing).
    Compile {
        #[command(flatten)]
        build: commands::BuildArgs,
        /// Build date as RFC 3339 (defaults to SOURCE_DATE_EPOCH, then now).
        #[arg(long)]
        build_date: Option<String>,
        /// Explicit package version instead of the timestamp version.
        #[arg(long)]
        package_version: Option<String>,
    },
    /// Verify compiled packages (files or directories of packages).
    Verify {
        /// Package files, or directories containing them.
        #[arg(required = true)]
        packages: Vec<PathBuf>,
        /// Compare against the cards in this directory to report drift.
        #[arg(long)]
        rules_dir: Option<PathBuf>,
        /// Also re-run each agent's selector from this manifest to report
        /// cards that are newly selected or no longer selected.
        #[arg(long, requires = "rules_dir")]
        manifest: Option<PathBuf>,
    },
    /// List each agent's rules and any orphaned cards.
    List {
        #[command(flatten)]
        build: commands::BuildArgs,
    },
}

fn init_tracing(verbose: bool, format: LogFormat) -> anyhow::Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let mut filter = EnvFilter::from_default_env();
    for target in ["rc_cards", "rc_manifest", "rc_compiler", "rulecard"] {
        filter = filter.add_directive(format!("{}={}", target, level).parse()?);
    }

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format)?;

    let project_root = cli.project_root.canonicalize().unwrap_or(cli.project_root);
    let config = CompilerConfig::for_project(&project_root)?;

    match &cli.command {
        Commands::Validate { build } => commands::build::validate(&config, build, cli.verbose),
        Commands::Compile {
            build,
            build_date,
            package_version,
        } => commands::build::compile(
            &config,
            build,
            build_date.as_deref(),
            package_version.as_deref(),
            cli.verbose,
        ),
        Commands::Verify {
            packages,
            rules_dir,
            manifest,
        } => commands::verify::execute(packages, rules_dir.as_deref(), manifest.as_deref()),
        Commands::List { build } => commands::list::execute(&config, build),
    }
}
