// aggregate.rs — Aggregator: one agent's matched cards → one package.
//
// The package is a pure function of (agent entry, matched cards, stamp,
// attribution). Cards are re-sorted by id here even though the resolver
// already sorts them, so the output never depends on the caller's order.

use std::collections::{BTreeMap, HashSet};

use rc_cards::canonical;
use rc_cards::{Corpus, LoadedCard, RuleCard};
use rc_manifest::AgentEntry;
use tracing::debug;

use crate::error::CompileError;
use crate::package::CompiledAgentPackage;
use crate::stamp::BuildStamp;

/// Attribution stamped into packages unless configured otherwise.
pub const DEFAULT_ATTRIBUTION: &str = "Compiled from Rule Cards by rulecard";

/// Build the package for `agent` from its matched `cards`.
///
/// Every card is cross-checked against `corpus`: a card the corpus does not
/// hold, or holds with different content, fails the agent with
/// [`CompileError::MissingRule`].
pub fn compile_agent(
    agent: &AgentEntry,
    cards: &[&LoadedCard],
    corpus: &Corpus,
    stamp: &BuildStamp,
    attribution: &str,
) -> Result<CompiledAgentPackage, CompileError> {
    if cards.is_empty() {
        return Err(CompileError::EmptyPackage {
            agent_id: agent.agent_id.clone(),
        });
    }

    let mut cards = cards.to_vec();
    cards.sort_by(|a, b| a.id().cmp(b.id()));

    for pair in cards.windows(2) {
        if pair[0].id() == pair[1].id() {
            return Err(CompileError::DuplicateRule {
                agent_id: agent.agent_id.clone(),
                rule_id: pair[0].id().to_string(),
            });
        }
    }

    for loaded in &cards {
        let known = corpus
            .get(loaded.id())
            .is_some_and(|c| c.content_hash == loaded.content_hash);
        if !known {
            return Err(CompileError::MissingRule {
                agent_id: agent.agent_id.clone(),
                rule_id: loaded.id().to_string(),
            });
        }
    }

    let source_digest = canonical::source_digest(
        cards
            .iter()
            .map(|c| (c.id(), c.content_hash.as_str())),
    );
    let rules: Vec<String> = cards.iter().map(|c| c.id().to_string()).collect();
    let rules_detail: Vec<RuleCard> = cards.iter().map(|c| c.card.clone()).collect();
    let validation_hooks = merge_validation_hooks(&rules_detail);

    debug!(
        agent_id = %agent.agent_id,
        rules = rules.len(),
        tools = validation_hooks.len(),
        digest = %source_digest,
        "agent aggregated"
    );

    Ok(CompiledAgentPackage {
        id: agent.agent_id.clone(),
        name: agent.name.clone(),
        version: stamp.version.clone(),
        build_date: stamp.build_date_string(),
        source_digest,
        attribution: attribution.to_string(),
        policy: agent.policy.clone(),
        rules,
        rules_detail,
        validation_hooks,
    })
}

/// Union every card's `detect` map, per tool, keeping the first occurrence
/// of each id. Cards are taken in the order given.
pub fn merge_validation_hooks<'a>(
    cards: impl IntoIterator<Item = &'a RuleCard>,
) -> BTreeMap<String, Vec<String>> {
    let mut hooks: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();

    for card in cards {
        for (tool, ids) in &card.detect {
            let merged = hooks.entry(tool.clone()).or_default();
            for id in ids {
                if seen.insert((tool.clone(), id.clone())) {
                    merged.push(id.clone());
                }
            }
        }
    }
    hooks
}

#[cfg(test)]
mod tests {
    use super::*;
    use rc_cards::{Severity, Verification};
    use rc_manifest::{AgentPolicy, RuleSelector, SelectorSpec};

    fn card(id: &str, semgrep: &[&str]) -> RuleCard {
        let mut detect = BTreeMap::new();
        if !semgrep.is_empty() {
            detect.insert(
                "semgrep".to_string(),
                semgrep.iter().map(|s| s.to_string()).collect(),
            );
        }
        RuleCard {
            id: id.to_string(),
            title: "Aggregation test card".to_string(),
            severity: Severity::High,
            scope: "auth".to_string(),
            requirement: "Long enough requirement text.".to_string(),
            dos: vec!["do".to_string()],
            donts: vec!["dont".to_string()],
            detect,
            verify: Verification {
                tests: vec!["test".to_string()],
            },
            refs: BTreeMap::new(),
            disabled: false,
            defaults: BTreeMap::new(),
        }
    }

    fn loaded(card: RuleCard) -> LoadedCard {
        let path = format!("rules/{}.yaml", card.id);
        LoadedCard::new(card, path).unwrap()
    }

    fn agent() -> AgentEntry {
        AgentEntry {
            agent_id: "auth".to_string(),
            name: "Authentication".to_string(),
            selector: RuleSelector::compile(&SelectorSpec {
                scopes: vec!["auth".to_string()],
                ..Default::default()
            })
            .unwrap(),
            policy: AgentPolicy {
                targets: vec!["**/*.java".to_string()],
                defaults: BTreeMap::from([(
                    "token_ttl_seconds".to_string(),
                    serde_json::json!(3600),
                )]),
            },
        }
    }

    fn stamp() -> BuildStamp {
        BuildStamp::parse_rfc3339("2026-10-18T12:00:00Z").unwrap()
    }

    fn corpus_of(cards: &[LoadedCard]) -> Corpus {
        let (corpus, errors) = Corpus::build(cards.iter().cloned());
        assert!(errors.is_empty());
        corpus
    }

    #[test]
    fn hooks_keep_first_seen_order() {
        let cards = [card("AUTH-PW-001", &["a"]), card("AUTH-PW-002", &["b", "a"])];
        let hooks = merge_validation_hooks(&cards);
        assert_eq!(hooks["semgrep"], vec!["a", "b"]);
    }

    #[test]
    fn hooks_dedupe_per_tool_only() {
        let mut first = card("AUTH-PW-001", &["x"]);
        first
            .detect
            .insert("codeql".to_string(), vec!["x".to_string(), "x".to_string()]);
        let hooks = merge_validation_hooks([&first]);
        assert_eq!(hooks["semgrep"], vec!["x"]);
        assert_eq!(hooks["codeql"], vec!["x"]);
    }

    #[test]
    fn package_is_sorted_and_aligned() {
        let cards = [
            loaded(card("AUTH-PW-002", &["b"])),
            loaded(card("AUTH-PW-001", &["a"])),
        ];
        let corpus = corpus_of(&cards);
        let refs: Vec<&LoadedCard> = cards.iter().collect();

        let package = compile_agent(&agent(), &refs, &corpus, &stamp(), DEFAULT_ATTRIBUTION).unwrap();
        assert_eq!(package.rules, vec!["AUTH-PW-001", "AUTH-PW-002"]);
        for (id, detail) in package.rules.iter().zip(&package.rules_detail) {
            assert_eq!(id, &detail.id);
        }
        assert_eq!(package.validation_hooks["semgrep"], vec!["a", "b"]);
        assert_eq!(package.version, "1.20261018120000");
        assert_eq!(package.build_date, "2026-10-18T12:00:00Z");
        assert_eq!(package.policy, agent().policy);
        assert_eq!(package.attribution, DEFAULT_ATTRIBUTION);
    }

    #[test]
    fn digest_ignores_input_order() {
        let cards = [
            loaded(card("AUTH-PW-001", &["a"])),
            loaded(card("AUTH-PW-002", &["b"])),
        ];
        let corpus = corpus_of(&cards);
        let forward: Vec<&LoadedCard> = cards.iter().collect();
        let backward: Vec<&LoadedCard> = cards.iter().rev().collect();

        let a = compile_agent(&agent(), &forward, &corpus, &stamp(), DEFAULT_ATTRIBUTION).unwrap();
        let b = compile_agent(&agent(), &backward, &corpus, &stamp(), DEFAULT_ATTRIBUTION).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn digest_changes_with_card_content() {
        let original = [loaded(card("AUTH-PW-001", &["a"]))];
        let mut edited_card = card("AUTH-PW-001", &["a"]);
        edited_card.severity = Severity::Critical;
        let edited = [loaded(edited_card)];

        let a = compile_agent(
            &agent(),
            &original.iter().collect::<Vec<_>>(),
            &corpus_of(&original),
            &stamp(),
            DEFAULT_ATTRIBUTION,
        )
        .unwrap();
        let b = compile_agent(
            &agent(),
            &edited.iter().collect::<Vec<_>>(),
            &corpus_of(&edited),
            &stamp(),
            DEFAULT_ATTRIBUTION,
        )
        .unwrap();
        assert_ne!(a.source_digest, b.source_digest);
    }

    #[test]
    fn card_outside_corpus_is_missing_rule() {
        let in_corpus = [loaded(card("AUTH-PW-001", &[]))];
        let corpus = corpus_of(&in_corpus);
        let stray = loaded(card("AUTH-PW-404", &[]));
        let refs = vec![&in_corpus[0], &stray];

        let err = compile_agent(&agent(), &refs, &corpus, &stamp(), DEFAULT_ATTRIBUTION).unwrap_err();
        match err {
            CompileError::MissingRule { agent_id, rule_id } => {
                assert_eq!(agent_id, "auth");
                assert_eq!(rule_id, "AUTH-PW-404");
            }
            other => panic!("expected MissingRule, got {:?}", other),
        }
    }

    #[test]
    fn card_with_stale_content_is_missing_rule() {
        let in_corpus = [loaded(card("AUTH-PW-001", &["a"]))];
        let corpus = corpus_of(&in_corpus);
        let stale = loaded(card("AUTH-PW-001", &["old"]));

        let err = compile_agent(&agent(), &[&stale], &corpus, &stamp(), DEFAULT_ATTRIBUTION).unwrap_err();
        assert!(matches!(err, CompileError::MissingRule { .. }));
    }

    #[test]
    fn duplicate_card_is_rejected() {
        let cards = [loaded(card("AUTH-PW-001", &[]))];
        let corpus = corpus_of(&cards);
        let err = compile_agent(
            &agent(),
            &[&cards[0], &cards[0]],
            &corpus,
            &stamp(),
            DEFAULT_ATTRIBUTION,
        )
        .unwrap_err();
        assert!(matches!(err, CompileError::DuplicateRule { .. }));
    }

    #[test]
    fn no_cards_is_rejected() {
        let corpus = corpus_of(&[]);
        let err = compile_agent(&agent(), &[], &corpus, &stamp(), DEFAULT_ATTRIBUTION).unwrap_err();
        assert!(matches!(err, CompileError::EmptyPackage { .. }));
    }
}
