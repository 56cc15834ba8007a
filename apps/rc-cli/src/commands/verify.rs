// verify.rs — `verify`: re-check compiled packages, optionally against the
// current cards and manifest.

use std::fs;
use std::path::{Path, PathBuf};

use rc_cards::{load_corpus, Corpus, LoadOptions};
use rc_compiler::{verify_package, verify_selection, CompiledAgentPackage};
use rc_manifest::Manifest;
use tracing::info;

pub fn execute(
    inputs: &[PathBuf],
    rules_dir: Option<&Path>,
    manifest: Option<&Path>,
) -> anyhow::Result<()> {
    let corpus = rules_dir.map(load_reference_corpus).transpose()?;
    let manifest = manifest.map(Manifest::load).transpose()?;
    let packages = expand_inputs(inputs)?;
    if packages.is_empty() {
        anyhow::bail!("no package files found");
    }

    let mut failed = 0;
    for path in &packages {
        let package = CompiledAgentPackage::load(path)?;
        let mut findings = verify_package(&package, corpus.as_ref())?;
        if let (Some(manifest), Some(corpus)) = (&manifest, &corpus) {
            findings.extend(verify_selection(&package, manifest, corpus));
        }
        if findings.is_empty() {
            println!(
                "{}: OK ({} rule(s), source {})",
                path.display(),
                package.rules.len(),
                package.source_digest
            );
        } else {
            failed += 1;
            println!("{}: {} problem(s)", path.display(), findings.len());
            for finding in &findings {
                let label = if finding.is_drift() { "drift" } else { "invalid" };
                println!("  {}: {}", label, finding);
            }
        }
    }

    println!("{} package(s) checked, {} failed", packages.len(), failed);
    if failed > 0 {
        anyhow::bail!("{} package(s) failed verification", failed);
    }
    Ok(())
}

fn load_reference_corpus(rules_dir: &Path) -> anyhow::Result<Corpus> {
    let load = load_corpus(rules_dir, &LoadOptions::default())?;
    if !load.is_clean() {
        for err in &load.errors {
            eprintln!("{}", err);
        }
        anyhow::bail!(
            "rules directory {} has {} error(s); cannot check drift",
            rules_dir.display(),
            load.errors.len()
        );
    }
    info!(cards = load.corpus.len(), "loaded reference corpus");
    Ok(load.corpus)
}

/// Files as given; directories expand to their `*.json` files, sorted.
fn expand_inputs(inputs: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let mut packages = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = fs::read_dir(input)?
                .map(|entry| entry.map(|e| e.path()))
                .collect::<Result<_, _>>()?;
            found.retain(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"));
            found.sort();
            packages.extend(found);
        } else {
            packages.push(input.clone());
        }
    }
    Ok(packages)
}
