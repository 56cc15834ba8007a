// resolver.rs — Manifest Resolver: group validated cards by agent.
//
// Runs only after the whole corpus has validated. For each agent (in
// agent_id order) it walks the active cards in id order and keeps the ones
// the selector accepts, so every per-agent list is already id-sorted no
// matter how the filesystem enumerated the files.
//
// Outcomes:
// - an agent with no matching card  → ManifestError::EmptyAgent (fatal)
// - an active card no agent selects → ResolveWarning::OrphanCard
// - a card default that disagrees with the manifest → ResolveWarning::DefaultsConflict

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use rc_cards::{Corpus, LoadedCard};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::ManifestError;
use crate::manifest::Manifest;

/// A card-level default that disagrees with the manifest. The manifest wins.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DefaultsConflict {
    pub agent_id: String,
    pub rule_id: String,
    pub key: String,
    pub manifest_value: serde_json::Value,
    pub card_value: serde_json::Value,
}

/// Non-fatal findings from resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolveWarning {
    /// An active card that no runtime consumer will ever see.
    OrphanCard { rule_id: String, path: PathBuf },
    DefaultsConflict(DefaultsConflict),
}

impl std::fmt::Display for ResolveWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolveWarning::OrphanCard { rule_id, path } => write!(
                f,
                "rule '{}' ({}) is not selected by any agent",
                rule_id,
                path.display()
            ),
            ResolveWarning::DefaultsConflict(c) => write!(
                f,
                "agent '{}': rule '{}' sets default '{}' = {} but the manifest sets {} (manifest wins)",
                c.agent_id, c.rule_id, c.key, c.card_value, c.manifest_value
            ),
        }
    }
}

/// Cards assigned to each agent plus everything resolution found wrong.
#[derive(Debug, Default)]
pub struct Resolution<'c> {
    /// agent_id → matched cards, sorted by card id. Agents with no match are absent.
    pub assignments: BTreeMap<String, Vec<&'c LoadedCard>>,
    pub errors: Vec<ManifestError>,
    pub warnings: Vec<ResolveWarning>,
}

impl<'c> Resolution<'c> {
    /// Whether every declared agent has at least one card.
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn cards_for(&self, agent_id: &str) -> &[&'c LoadedCard] {
        self.assignments
            .get(agent_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn orphans(&self) -> impl Iterator<Item = (&str, &PathBuf)> {
        self.warnings.iter().filter_map(|w| match w {
            ResolveWarning::OrphanCard { rule_id, path } => Some((rule_id.as_str(), path)),
            ResolveWarning::DefaultsConflict(_) => None,
        })
    }
}

/// Assign every active card in `corpus` to the agents whose selector accepts it.
pub fn resolve<'c>(manifest: &Manifest, corpus: &'c Corpus) -> Resolution<'c> {
    let mut resolution = Resolution::default();
    let mut selected: BTreeSet<&str> = BTreeSet::new();

    for agent in manifest.agents() {
        let matched: Vec<&LoadedCard> = corpus
            .active()
            .filter(|loaded| agent.selector.matches(&loaded.card))
            .collect();

        if matched.is_empty() {
            warn!(agent_id = %agent.agent_id, selector = %agent.selector, "agent matches no rule cards");
            resolution.errors.push(ManifestError::EmptyAgent {
                agent_id: agent.agent_id.clone(),
                selector: agent.selector.to_string(),
            });
            continue;
        }

        for &loaded in &matched {
            selected.insert(loaded.id());
            for (key, card_value) in &loaded.card.defaults {
                if let Some(manifest_value) = agent.policy.defaults.get(key) {
                    if manifest_value != card_value {
                        let conflict = DefaultsConflict {
                            agent_id: agent.agent_id.clone(),
                            rule_id: loaded.id().to_string(),
                            key: key.clone(),
                            manifest_value: manifest_value.clone(),
                            card_value: card_value.clone(),
                        };
                        warn!(
                            agent_id = %conflict.agent_id,
                            rule_id = %conflict.rule_id,
                            key = %conflict.key,
                            "card default conflicts with manifest default"
                        );
                        resolution
                            .warnings
                            .push(ResolveWarning::DefaultsConflict(conflict));
                    }
                }
            }
        }

        info!(agent_id = %agent.agent_id, rules = matched.len(), "agent resolved");
        resolution.assignments.insert(agent.agent_id.clone(), matched);
    }

    for loaded in corpus.active() {
        if !selected.contains(loaded.id()) {
            warn!(rule_id = %loaded.id(), path = %loaded.path.display(), "orphaned rule card");
            resolution.warnings.push(ResolveWarning::OrphanCard {
                rule_id: loaded.id().to_string(),
                path: loaded.path.clone(),
            });
        }
    }

    resolution
}
