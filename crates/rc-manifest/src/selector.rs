// selector.rs — Rule selectors: which cards belong to an agent.
//
// A selector is a union of matchers over a card's `scope` and id category.
// Each matcher kind is explicit so resolution never depends on ad hoc
// string comparison:
//
//   scopes:          exact scope match        ("dockerfile")
//   scope_prefixes:  scope starts with        ("backend:")
//   scope_globs:     glob over the scope      ("k8s:*")
//   categories:      first id segment equals  ("AUTH" for AUTH-PW-001)
//
// Glob patterns are compiled once at manifest load. An invalid pattern is a
// manifest error, never a silent non-match.

use glob::Pattern;
use rc_cards::RuleCard;
use serde::{Deserialize, Serialize};

/// The YAML form of a selector.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SelectorSpec {
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub scope_prefixes: Vec<String>,
    #[serde(default)]
    pub scope_globs: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
}

/// A single predicate over a card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeMatcher {
    Exact(String),
    Prefix(String),
    Glob(Pattern),
    Category(String),
}

impl ScopeMatcher {
    pub fn matches(&self, card: &RuleCard) -> bool {
        match self {
            ScopeMatcher::Exact(scope) => card.scope == *scope,
            ScopeMatcher::Prefix(prefix) => card.scope.starts_with(prefix.as_str()),
            ScopeMatcher::Glob(pattern) => pattern.matches(&card.scope),
            ScopeMatcher::Category(category) => card.category() == category,
        }
    }
}

impl std::fmt::Display for ScopeMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScopeMatcher::Exact(scope) => write!(f, "scope == {:?}", scope),
            ScopeMatcher::Prefix(prefix) => write!(f, "scope starts with {:?}", prefix),
            ScopeMatcher::Glob(pattern) => write!(f, "scope ~ {:?}", pattern.as_str()),
            ScopeMatcher::Category(category) => write!(f, "category == {:?}", category),
        }
    }
}

/// A compiled selector: a card matches when any matcher does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSelector {
    matchers: Vec<ScopeMatcher>,
}

impl RuleSelector {
    /// Compile a selector spec. Returns one message per invalid entry,
    /// keyed by field path.
    pub fn compile(spec: &SelectorSpec) -> Result<Self, Vec<(String, String)>> {
        let mut matchers = Vec::new();
        let mut problems = Vec::new();

        for (_, scope) in non_empty_entries("scopes", &spec.scopes, &mut problems) {
            matchers.push(ScopeMatcher::Exact(scope));
        }
        for (_, prefix) in non_empty_entries("scope_prefixes", &spec.scope_prefixes, &mut problems) {
            matchers.push(ScopeMatcher::Prefix(prefix));
        }
        for (i, glob) in non_empty_entries("scope_globs", &spec.scope_globs, &mut problems) {
            match Pattern::new(&glob) {
                Ok(pattern) => matchers.push(ScopeMatcher::Glob(pattern)),
                Err(e) => problems.push((
                    format!("scope_globs[{}]", i),
                    format!("invalid glob '{}': {}", glob, e),
                )),
            }
        }
        for (_, category) in non_empty_entries("categories", &spec.categories, &mut problems) {
            matchers.push(ScopeMatcher::Category(category));
        }

        if matchers.is_empty() && problems.is_empty() {
            problems.push((
                "rule_selector".to_string(),
                "selector has no matchers; add scopes, scope_prefixes, scope_globs, or categories"
                    .to_string(),
            ));
        }

        if problems.is_empty() {
            Ok(Self { matchers })
        } else {
            Err(problems)
        }
    }

    pub fn matches(&self, card: &RuleCard) -> bool {
        self.matchers.iter().any(|m| m.matches(card))
    }

    pub fn matchers(&self) -> &[ScopeMatcher] {
        &self.matchers
    }
}

/// Trimmed, non-empty entries with their original index. Blank entries are
/// recorded as problems.
fn non_empty_entries(
    field: &str,
    values: &[String],
    problems: &mut Vec<(String, String)>,
) -> Vec<(usize, String)> {
    let mut out = Vec::with_capacity(values.len());
    for (i, value) in values.iter().enumerate() {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            problems.push((format!("{}[{}]", field, i), "must not be empty".to_string()));
        } else {
            out.push((i, trimmed.to_string()));
        }
    }
    out
}

impl std::fmt::Display for RuleSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.matchers.iter().map(|m| m.to_string()).collect();
        write!(f, "{}", parts.join(" || "))
    }
}
