// card.rs — Rule Card data model.
//
// A RuleCard is only ever constructed by the schema validator (or read back
// from a compiled package). Field order here is the field order of every
// serialized card, so it is part of the output format.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// How serious a violation of the rule is.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Accepted spellings, lowercase only.
    pub const ALLOWED: &'static [&'static str] = &["low", "medium", "high", "critical"];

    /// Parse the lowercase YAML spelling. Anything else is rejected.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// Human-readable test cases that demonstrate compliance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Verification {
    pub tests: Vec<String>,
}

/// One validated security requirement.
///
/// ```yaml
/// id: DOCKER-USER-001
/// title: Containers must not run as root
/// severity: high
/// scope: dockerfile
/// requirement: Every image must switch to a non-root USER before ENTRYPOINT.
/// do: ["Add a USER instruction with a fixed UID"]
/// dont: ["Rely on the base image default user"]
/// detect:
///   hadolint: [DL3002]
/// verify:
///   tests: ["Image metadata reports a non-zero UID"]
/// refs:
///   cis: ["4.1"]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleCard {
    /// `CATEGORY-SUBCATEGORY-NNN`, unique across the corpus.
    pub id: String,
    pub title: String,
    pub severity: Severity,
    /// Context tag used for agent membership (e.g. `dockerfile`, `backend:java`).
    pub scope: String,
    pub requirement: String,
    #[serde(rename = "do")]
    pub dos: Vec<String>,
    #[serde(rename = "dont")]
    pub donts: Vec<String>,
    /// Scanner tool name → tool-specific rule ids.
    #[serde(default)]
    pub detect: BTreeMap<String, Vec<String>>,
    pub verify: Verification,
    /// Standard name (asvs, owasp, cwe, ...) → reference ids.
    #[serde(default)]
    pub refs: BTreeMap<String, Vec<String>>,
    /// Retired cards stay in the corpus for id reservation but are never compiled.
    #[serde(default, skip_serializing_if = "is_false")]
    pub disabled: bool,
    /// Card-level policy default suggestions. Manifest defaults always win.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub defaults: BTreeMap<String, serde_json::Value>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl RuleCard {
    /// The first id segment (`AUTH` in `AUTH-PW-001`).
    pub fn category(&self) -> &str {
        self.id.split('-').next().unwrap_or("")
    }

    /// Whether the card takes part in compilation.
    pub fn is_active(&self) -> bool {
        !self.disabled
    }
}
