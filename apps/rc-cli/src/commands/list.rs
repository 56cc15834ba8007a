// list.rs — `list`: agent membership at a glance.

use rc_compiler::{BuildStamp, Compiler, CompilerConfig};

use super::{print_report, BuildArgs, ReportFormat};

pub fn execute(config: &CompilerConfig, args: &BuildArgs) -> anyhow::Result<()> {
    let outcome = Compiler::new(args.apply(config), BuildStamp::now()).validate();

    if args.format == ReportFormat::Json {
        let listing = serde_json::json!({
            "agents": outcome.assignments,
            "orphans": outcome.orphans,
            "report": outcome.report,
        });
        println!("{}", serde_json::to_string_pretty(&listing)?);
    } else {
        for (agent_id, rules) in &outcome.assignments {
            println!("{} ({} rule(s))", agent_id, rules.len());
            for rule in rules {
                println!("  {}", rule);
            }
        }
        if !outcome.orphans.is_empty() {
            println!("orphaned ({} card(s))", outcome.orphans.len());
            for rule in &outcome.orphans {
                println!("  {}", rule);
            }
        }
        print_report(&outcome.report, args.format, false)?;
    }

    if !outcome.succeeded() {
        anyhow::bail!("{}", outcome.report.summary());
    }
    Ok(())
}
