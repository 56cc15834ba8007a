// pipeline.rs — The compile run: load → resolve → aggregate → write.
//
// Each stage runs only when the stage before it finished without errors,
// but everything a stage finds is reported before the run stops. Nothing is
// written unless the report is error-free at the point of writing.
//
// Card validation and per-agent aggregation both fan out on scoped threads.
// Results are re-collected in path / agent_id order, so the report and the
// packages never depend on thread scheduling.

use std::collections::BTreeMap;
use std::thread;

use rc_cards::corpus::effective_workers;
use rc_cards::{load_corpus, Corpus, LoadOptions, LoadedCard};
use rc_manifest::{resolve, AgentEntry, Manifest};
use tracing::{debug, info, warn};

use crate::aggregate::compile_agent;
use crate::config::CompilerConfig;
use crate::error::CompileError;
use crate::package::CompiledAgentPackage;
use crate::report::{BuildReport, Level};
use crate::stamp::BuildStamp;
use crate::writer::{PackageWriter, WrittenPackage};

/// Everything a run produced.
#[derive(Debug, Default)]
pub struct BuildOutcome {
    pub report: BuildReport,
    /// Number of card files found under the rules root.
    pub discovered: usize,
    /// Number of cards that validated.
    pub valid_cards: usize,
    /// agent_id → matched rule ids, for every agent that matched something.
    pub assignments: BTreeMap<String, Vec<String>>,
    /// Active cards no agent selects.
    pub orphans: Vec<String>,
    /// Packages built in memory, in agent_id order.
    pub packages: Vec<CompiledAgentPackage>,
    /// Packages that reached disk. Empty unless the whole run succeeded.
    pub written: Vec<WrittenPackage>,
}

impl BuildOutcome {
    pub fn succeeded(&self) -> bool {
        !self.report.has_errors()
    }
}

/// Runs the compile pipeline for one project configuration.
#[derive(Debug, Clone)]
pub struct Compiler {
    config: CompilerConfig,
    stamp: BuildStamp,
}

impl Compiler {
    pub fn new(config: CompilerConfig, stamp: BuildStamp) -> Self {
        Self { config, stamp }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn stamp(&self) -> &BuildStamp {
        &self.stamp
    }

    /// Run every check and build packages in memory without writing.
    /// Resolution is skipped when the manifest file does not exist.
    pub fn validate(&self) -> BuildOutcome {
        self.run(false)
    }

    /// Full run. Packages are written only if no stage reported an error.
    pub fn compile(&self) -> BuildOutcome {
        self.run(true)
    }

    fn run(&self, write: bool) -> BuildOutcome {
        let paths = &self.config.paths;
        let mut outcome = BuildOutcome::default();

        let options = LoadOptions {
            lenient: self.config.build.lenient,
            workers: self.config.build.workers,
        };
        let load = match load_corpus(&paths.rules_dir, &options) {
            Ok(load) => load,
            Err(e) => {
                outcome.report.add_card_error(&e, Level::Error);
                return outcome;
            }
        };
        outcome.discovered = load.discovered;
        outcome.valid_cards = load.corpus.len();
        for err in &load.errors {
            outcome.report.add_card_error(err, Level::Error);
        }
        for err in &load.skipped {
            outcome.report.add_card_error(err, Level::Warning);
        }
        for loaded in load.corpus.disabled() {
            outcome.report.add_disabled_card(loaded);
        }

        if !write && !paths.manifest.exists() {
            info!(path = %paths.manifest.display(), "no manifest; skipping resolution");
            return outcome;
        }
        let manifest = match Manifest::load(&paths.manifest) {
            Ok(manifest) => Some(manifest),
            Err(e) => {
                outcome.report.add_manifest_error(&e, &paths.manifest);
                None
            }
        };

        if !load.is_clean() {
            warn!(errors = load.errors.len(), "card errors found; skipping resolution");
            return outcome;
        }
        let Some(manifest) = manifest else {
            return outcome;
        };

        let resolution = resolve(&manifest, &load.corpus);
        for err in &resolution.errors {
            outcome.report.add_manifest_error(err, &paths.manifest);
        }
        for warning in &resolution.warnings {
            outcome.report.add_resolve_warning(warning);
        }
        outcome.assignments = resolution
            .assignments
            .iter()
            .map(|(agent_id, cards)| {
                (
                    agent_id.clone(),
                    cards.iter().map(|c| c.id().to_string()).collect(),
                )
            })
            .collect();
        outcome.orphans = resolution.orphans().map(|(id, _)| id.to_string()).collect();
        if !resolution.is_complete() {
            return outcome;
        }

        let work: Vec<(&AgentEntry, &[&LoadedCard])> = manifest
            .agents()
            .map(|agent| (agent, resolution.cards_for(&agent.agent_id)))
            .collect();
        let results = self.aggregate_parallel(&work, &load.corpus);

        let mut packages = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(package) => packages.push(package),
                Err(e) => {
                    warn!(error = %e, "agent aggregation failed");
                    outcome.report.add_compile_error(&e);
                }
            }
        }
        if outcome.report.has_errors() {
            return outcome;
        }
        outcome.packages = packages;

        if !write {
            return outcome;
        }
        match PackageWriter::new(&paths.output_dir).write_all(&outcome.packages) {
            Ok(written) => {
                info!(
                    packages = written.len(),
                    version = %self.stamp.version,
                    output_dir = %paths.output_dir.display(),
                    "compile finished"
                );
                outcome.written = written;
            }
            Err(e) => outcome.report.add_compile_error(&e),
        }
        outcome
    }

    /// Aggregate each agent on a scoped worker pool. Results come back in
    /// the order of `work`.
    fn aggregate_parallel(
        &self,
        work: &[(&AgentEntry, &[&LoadedCard])],
        corpus: &Corpus,
    ) -> Vec<Result<CompiledAgentPackage, CompileError>> {
        let attribution = self.config.build.attribution.as_str();
        let stamp = &self.stamp;
        let compile_one = |(agent, cards): &(&AgentEntry, &[&LoadedCard])| {
            compile_agent(agent, cards, corpus, stamp, attribution)
        };

        if work.is_empty() {
            return Vec::new();
        }
        let workers = effective_workers(self.config.build.workers, work.len());
        debug!(agents = work.len(), workers, "aggregating agents");
        if workers == 1 {
            return work.iter().map(compile_one).collect();
        }

        let chunk_size = work.len().div_ceil(workers);
        thread::scope(|scope| {
            let handles: Vec<_> = work
                .chunks(chunk_size)
                .map(|chunk| scope.spawn(move || chunk.iter().map(compile_one).collect::<Vec<_>>()))
                .collect();

            let mut results = Vec::with_capacity(work.len());
            for handle in handles {
                match handle.join() {
                    Ok(chunk) => results.extend(chunk),
                    Err(panic) => std::panic::resume_unwind(panic),
                }
            }
            results
        })
    }
}
