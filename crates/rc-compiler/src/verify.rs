// verify.rs — Consumer-side package verification.
//
// Recomputes what a package claims about itself from its own `rules_detail`
// and, when given the current corpus, reports drift between the package and
// the cards on disk. With the manifest as well, it also reports agents whose
// selector now picks a different set of cards. A clean result means the agent runtime and the CI
// engine reading this file are looking at the knowledge it says it holds.

use std::collections::{BTreeMap, BTreeSet};

use rc_cards::{canonical, Corpus};
use rc_manifest::Manifest;

use crate::aggregate::merge_validation_hooks;
use crate::error::CompileError;
use crate::package::CompiledAgentPackage;

/// One way a package disagrees with itself or with the corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyFinding {
    /// The package includes no rules.
    Empty,
    /// `rules` and `rules_detail` have different lengths.
    LengthMismatch { rules: usize, rules_detail: usize },
    /// `rules[index]` names a different card than `rules_detail[index]`.
    Misaligned {
        index: usize,
        rule_id: String,
        detail_id: String,
    },
    /// `rules` is not strictly ascending at `index` (unsorted or repeated).
    Unsorted { index: usize, rule_id: String },
    /// The recorded digest does not match the included cards.
    DigestMismatch { recorded: String, computed: String },
    /// `validation_hooks` is not the union of the included cards' `detect`.
    HooksMismatch {
        recorded: BTreeMap<String, Vec<String>>,
        computed: BTreeMap<String, Vec<String>>,
    },
    /// An included card no longer exists in the corpus.
    RemovedFromCorpus { rule_id: String },
    /// An included card has changed in the corpus since the build.
    ContentDrift { rule_id: String },
    /// An included card has since been disabled.
    DisabledInCorpus { rule_id: String },
    /// The package's agent is no longer declared in the manifest.
    AgentNotInManifest { agent_id: String },
    /// The agent's selector now matches a different set of active cards.
    /// `dropped` only lists cards that are still active in the corpus.
    SelectionChanged {
        added: Vec<String>,
        dropped: Vec<String>,
    },
}

impl VerifyFinding {
    /// Drift findings describe the corpus moving on, not a broken package.
    pub fn is_drift(&self) -> bool {
        matches!(
            self,
            VerifyFinding::RemovedFromCorpus { .. }
                | VerifyFinding::ContentDrift { .. }
                | VerifyFinding::DisabledInCorpus { .. }
                | VerifyFinding::AgentNotInManifest { .. }
                | VerifyFinding::SelectionChanged { .. }
        )
    }
}

impl std::fmt::Display for VerifyFinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerifyFinding::Empty => write!(f, "package includes no rules"),
            VerifyFinding::LengthMismatch {
                rules,
                rules_detail,
            } => write!(
                f,
                "rules has {} entries but rules_detail has {}",
                rules, rules_detail
            ),
            VerifyFinding::Misaligned {
                index,
                rule_id,
                detail_id,
            } => write!(
                f,
                "rules[{}] is '{}' but rules_detail[{}] is '{}'",
                index, rule_id, index, detail_id
            ),
            VerifyFinding::Unsorted { index, rule_id } => {
                write!(f, "rules[{}] '{}' is out of order or repeated", index, rule_id)
            }
            VerifyFinding::DigestMismatch { recorded, computed } => write!(
                f,
                "source_digest is {} but the included cards hash to {}",
                recorded, computed
            ),
            VerifyFinding::HooksMismatch { .. } => write!(
                f,
                "validation_hooks is not the union of the included cards' detect maps"
            ),
            VerifyFinding::RemovedFromCorpus { rule_id } => {
                write!(f, "rule '{}' is no longer in the corpus", rule_id)
            }
            VerifyFinding::ContentDrift { rule_id } => {
                write!(f, "rule '{}' has changed since this package was built", rule_id)
            }
            VerifyFinding::DisabledInCorpus { rule_id } => {
                write!(f, "rule '{}' has been disabled since this package was built", rule_id)
            }
            VerifyFinding::AgentNotInManifest { agent_id } => {
                write!(f, "agent '{}' is no longer in the manifest", agent_id)
            }
            VerifyFinding::SelectionChanged { added, dropped } => {
                write!(f, "selector now matches a different rule set")?;
                if !added.is_empty() {
                    write!(f, "; newly selected: {}", added.join(", "))?;
                }
                if !dropped.is_empty() {
                    write!(f, "; no longer selected: {}", dropped.join(", "))?;
                }
                Ok(())
            }
        }
    }
}

/// Check a package's internal invariants and, with `corpus`, its drift.
pub fn verify_package(
    package: &CompiledAgentPackage,
    corpus: Option<&Corpus>,
) -> Result<Vec<VerifyFinding>, CompileError> {
    let mut findings = Vec::new();

    if package.rules.is_empty() {
        findings.push(VerifyFinding::Empty);
    }
    if package.rules.len() != package.rules_detail.len() {
        findings.push(VerifyFinding::LengthMismatch {
            rules: package.rules.len(),
            rules_detail: package.rules_detail.len(),
        });
    }
    for (index, (rule_id, detail)) in package.rules.iter().zip(&package.rules_detail).enumerate() {
        if *rule_id != detail.id {
            findings.push(VerifyFinding::Misaligned {
                index,
                rule_id: rule_id.clone(),
                detail_id: detail.id.clone(),
            });
        }
    }
    for (index, pair) in package.rules.windows(2).enumerate() {
        if pair[0] >= pair[1] {
            findings.push(VerifyFinding::Unsorted {
                index: index + 1,
                rule_id: pair[1].clone(),
            });
        }
    }

    let hashes = package
        .rules_detail
        .iter()
        .map(|card| canonical::card_content_hash(card).map(|hash| (card.id.as_str(), hash)))
        .collect::<Result<Vec<_>, _>>()?;

    let computed = canonical::source_digest(hashes.iter().map(|(id, hash)| (*id, hash.as_str())));
    if computed != package.source_digest {
        findings.push(VerifyFinding::DigestMismatch {
            recorded: package.source_digest.clone(),
            computed,
        });
    }

    let hooks = merge_validation_hooks(&package.rules_detail);
    if hooks != package.validation_hooks {
        findings.push(VerifyFinding::HooksMismatch {
            recorded: package.validation_hooks.clone(),
            computed: hooks,
        });
    }

    if let Some(corpus) = corpus {
        for (id, hash) in &hashes {
            match corpus.get(id) {
                None => findings.push(VerifyFinding::RemovedFromCorpus {
                    rule_id: id.to_string(),
                }),
                Some(current) if !current.card.is_active() => {
                    findings.push(VerifyFinding::DisabledInCorpus {
                        rule_id: id.to_string(),
                    })
                }
                Some(current) if current.content_hash != *hash => {
                    findings.push(VerifyFinding::ContentDrift {
                        rule_id: id.to_string(),
                    })
                }
                Some(_) => {}
            }
        }
    }

    Ok(findings)
}

/// Re-run the agent's selector over the current corpus and compare the
/// result with the package's `rules`.
pub fn verify_selection(
    package: &CompiledAgentPackage,
    manifest: &Manifest,
    corpus: &Corpus,
) -> Vec<VerifyFinding> {
    let Some(agent) = manifest.get(&package.id) else {
        return vec![VerifyFinding::AgentNotInManifest {
            agent_id: package.id.clone(),
        }];
    };

    let selected: BTreeSet<&str> = corpus
        .active()
        .filter(|loaded| agent.selector.matches(&loaded.card))
        .map(|loaded| loaded.id())
        .collect();
    let recorded: BTreeSet<&str> = package.rules.iter().map(String::as_str).collect();

    let added: Vec<String> = selected
        .difference(&recorded)
        .map(|id| id.to_string())
        .collect();
    // Removed and disabled cards are already reported by `verify_package`.
    let dropped: Vec<String> = recorded
        .difference(&selected)
        .filter(|id| corpus.get(id).is_some_and(|c| c.card.is_active()))
        .map(|id| id.to_string())
        .collect();

    if added.is_empty() && dropped.is_empty() {
        Vec::new()
    } else {
        vec![VerifyFinding::SelectionChanged { added, dropped }]
    }
}
