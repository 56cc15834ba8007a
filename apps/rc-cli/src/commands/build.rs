// build.rs — `validate` and `compile`.

use rc_compiler::{BuildOutcome, BuildStamp, Compiler, CompilerConfig};

use super::{print_report, BuildArgs, ReportFormat};

pub fn validate(config: &CompilerConfig, args: &BuildArgs, verbose: bool) -> anyhow::Result<()> {
    let compiler = Compiler::new(args.apply(config), BuildStamp::now());
    let outcome = compiler.validate();
    print_report(&outcome.report, args.format, verbose)?;

    if !outcome.succeeded() {
        anyhow::bail!("validation failed: {}", outcome.report.summary());
    }
    if args.format == ReportFormat::Text {
        println!(
            "{} card(s) valid, {} agent(s) resolved",
            outcome.valid_cards,
            outcome.assignments.len()
        );
    }
    Ok(())
}

pub fn compile(
    config: &CompilerConfig,
    args: &BuildArgs,
    build_date: Option<&str>,
    package_version: Option<&str>,
    verbose: bool,
) -> anyhow::Result<()> {
    let mut stamp = BuildStamp::resolve(build_date)?;
    if let Some(version) = package_version {
        stamp = stamp.with_version(version);
    }

    let compiler = Compiler::new(args.apply(config), stamp);
    let outcome = compiler.compile();
    print_report(&outcome.report, args.format, verbose)?;

    if !outcome.succeeded() {
        anyhow::bail!(
            "compilation failed, no packages written: {}",
            outcome.report.summary()
        );
    }
    if args.format == ReportFormat::Text {
        print_written(&compiler, &outcome);
    }
    Ok(())
}

fn print_written(compiler: &Compiler, outcome: &BuildOutcome) {
    println!(
        "Wrote {} package(s) to {} (version {}, built {})",
        outcome.written.len(),
        compiler.config().paths.output_dir.display(),
        compiler.stamp().version,
        compiler.stamp().build_date_string()
    );
    for package in &outcome.written {
        println!(
            "  {:<24} sha256:{}  source:{}",
            package.agent_id, package.file_digest, package.source_digest
        );
    }
}
