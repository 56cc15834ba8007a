// manifest.rs — Agent manifest model and loader.
//
// The manifest is a YAML mapping of agent_id → entry:
//
//   auth:
//     name: Authentication Specialist
//     rule_selector:
//       scopes: [auth]
//       scope_prefixes: ["backend:"]
//     policy:
//       targets: ["**/*.java"]
//       defaults: { token_ttl_seconds: 3600 }
//
// The same mapping may also sit under a single top-level `agents:` key, so
// `agents` itself is reserved and never a valid agent_id.
// Entries are strict (unknown keys rejected) and every problem across all
// agents is collected before the load fails.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use rc_cards::schema::scalar_to_json;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use tracing::debug;

use crate::error::{ManifestError, ManifestIssue};
use crate::selector::{RuleSelector, SelectorSpec};

/// Agent ids become package file names, so they are restricted to a
/// filesystem-safe alphabet.
static AGENT_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9_-]*$").unwrap());

/// Key of the optional top-level wrapper; not usable as an agent_id.
pub const AGENTS_KEY: &str = "agents";

/// Policy block copied verbatim into the compiled package.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AgentPolicy {
    /// Glob patterns of files this agent applies to.
    pub targets: Vec<String>,
    /// Default configuration values (e.g. TTLs) for the agent runtime.
    #[serde(default)]
    pub defaults: BTreeMap<String, serde_json::Value>,
}

/// Raw YAML shape of one manifest entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct EntrySpec {
    name: String,
    rule_selector: SelectorSpec,
    policy: AgentPolicy,
}

/// One declared sub-agent.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentEntry {
    pub agent_id: String,
    pub name: String,
    pub selector: RuleSelector,
    pub policy: AgentPolicy,
}

/// A validated manifest. Agents iterate in `agent_id` order.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    agents: BTreeMap<String, AgentEntry>,
}

impl Manifest {
    /// Load and validate a manifest file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| ManifestError::IoError {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &source)
    }

    /// Parse and validate manifest source. `path` is used for reporting only.
    pub fn parse(path: impl Into<PathBuf>, source: &str) -> Result<Self, ManifestError> {
        let path = path.into();
        let root: Value = serde_yaml::from_str(source).map_err(|source| ManifestError::Parse {
            path: path.clone(),
            source,
        })?;

        let mut issues = Vec::new();
        let mut agents = BTreeMap::new();

        let Some(entries) = agent_table(&root) else {
            issues.push(ManifestIssue::document(
                "<document>",
                "expected a mapping of agent_id to agent entry",
            ));
            return Err(ManifestError::Invalid { path, issues });
        };

        if entries.is_empty() {
            issues.push(ManifestIssue::document("<document>", "manifest declares no agents"));
        }

        for (key, value) in entries {
            let Some(agent_id) = key.as_str() else {
                issues.push(ManifestIssue::document("<key>", "agent ids must be strings"));
                continue;
            };
            if let Some(entry) = parse_entry(agent_id, value, &mut issues) {
                debug!(agent_id, selector = %entry.selector, "manifest entry loaded");
                agents.insert(agent_id.to_string(), entry);
            }
        }

        if issues.is_empty() {
            Ok(Self { agents })
        } else {
            Err(ManifestError::Invalid { path, issues })
        }
    }

    /// Build a manifest from already-validated entries.
    pub fn from_entries(entries: impl IntoIterator<Item = AgentEntry>) -> Self {
        Self {
            agents: entries
                .into_iter()
                .map(|e| (e.agent_id.clone(), e))
                .collect(),
        }
    }

    pub fn get(&self, agent_id: &str) -> Option<&AgentEntry> {
        self.agents.get(agent_id)
    }

    /// Agents in `agent_id` order.
    pub fn agents(&self) -> impl Iterator<Item = &AgentEntry> {
        self.agents.values()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

/// The agent mapping, unwrapping an optional single `agents:` key. A lone
/// `agents:` whose body is shaped like an entry is left as an (invalid)
/// agent so the reserved-id issue is reported instead of its fields.
fn agent_table(root: &Value) -> Option<&serde_yaml::Mapping> {
    let map = root.as_mapping()?;
    if map.len() == 1 {
        if let Some(inner) = map.get(AGENTS_KEY).and_then(Value::as_mapping) {
            if !inner.contains_key("rule_selector") {
                return Some(inner);
            }
        }
    }
    Some(map)
}

fn parse_entry(agent_id: &str, value: &Value, issues: &mut Vec<ManifestIssue>) -> Option<AgentEntry> {
    let before = issues.len();

    if agent_id == AGENTS_KEY {
        issues.push(ManifestIssue::agent(
            agent_id,
            "agent_id",
            "'agents' is reserved for the top-level wrapper; choose another agent_id",
        ));
    } else if !AGENT_ID_PATTERN.is_match(agent_id) {
        issues.push(ManifestIssue::agent(
            agent_id,
            "agent_id",
            "must match [a-z0-9][a-z0-9_-]* (it becomes the package file name)",
        ));
    }

    let spec: EntrySpec = match serde_yaml::from_value(value.clone()) {
        Ok(spec) => spec,
        Err(e) => {
            issues.push(ManifestIssue::agent(agent_id, "<entry>", e.to_string()));
            return None;
        }
    };

    let name = spec.name.trim().to_string();
    if name.is_empty() {
        issues.push(ManifestIssue::agent(agent_id, "name", "must not be empty"));
    }

    let selector = match RuleSelector::compile(&spec.rule_selector) {
        Ok(selector) => Some(selector),
        Err(problems) => {
            for (field, message) in problems {
                let field = if field == "rule_selector" {
                    field
                } else {
                    format!("rule_selector.{}", field)
                };
                issues.push(ManifestIssue::agent(agent_id, field, message));
            }
            None
        }
    };

    if spec.policy.targets.is_empty() {
        issues.push(ManifestIssue::agent(
            agent_id,
            "policy.targets",
            "must list at least one glob pattern",
        ));
    }
    for (i, target) in spec.policy.targets.iter().enumerate() {
        if target.trim().is_empty() {
            issues.push(ManifestIssue::agent(
                agent_id,
                format!("policy.targets[{}]", i),
                "must not be empty",
            ));
        } else if let Err(e) = glob::Pattern::new(target) {
            issues.push(ManifestIssue::agent(
                agent_id,
                format!("policy.targets[{}]", i),
                format!("invalid glob '{}': {}", target, e),
            ));
        }
    }

    check_defaults(agent_id, value, issues);

    if issues.len() > before {
        return None;
    }

    Some(AgentEntry {
        agent_id: agent_id.to_string(),
        name,
        selector: selector?,
        policy: spec.policy,
    })
}

/// `policy.defaults` values must be YAML scalars that survive conversion to
/// JSON unchanged. Nested values and non-finite numbers are rejected.
fn check_defaults(agent_id: &str, entry: &Value, issues: &mut Vec<ManifestIssue>) {
    let Some(defaults) = entry
        .get("policy")
        .and_then(|policy| policy.get("defaults"))
        .and_then(Value::as_mapping)
    else {
        return;
    };
    for (key, value) in defaults {
        let name = key
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| format!("{:?}", key));
        if scalar_to_json(value).is_none() {
            issues.push(ManifestIssue::agent(
                agent_id,
                format!("policy.defaults.{}", name),
                "must be a string, boolean, or finite number",
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MANIFEST: &str = r#"
docker:
  name: Container Security
  rule_selector:
    scopes: [dockerfile]
  policy:
    targets: ["**/Dockerfile", "**/*.dockerfile"]
auth:
  name: Authentication Specialist
  rule_selector:
    scope_prefixes: ["backend:"]
    categories: [AUTH]
  policy:
    targets: ["**/*.java"]
    defaults:
      token_ttl_seconds: 3600
      mfa_required: true
"#;

    fn issues(source: &str) -> Vec<ManifestIssue> {
        match Manifest::parse("agents.yaml", source) {
            Err(ManifestError::Invalid { issues, .. }) => issues,
            other => panic!("expected Invalid, got {:?}", other.map(|m| m.len())),
        }
    }

    #[test]
    fn parses_agents_in_id_order() {
        let manifest = Manifest::parse("agents.yaml", MANIFEST).unwrap();
        let ids: Vec<_> = manifest.agents().map(|a| a.agent_id.as_str()).collect();
        assert_eq!(ids, vec!["auth", "docker"]);

        let auth = manifest.get("auth").unwrap();
        assert_eq!(auth.name, "Authentication Specialist");
        assert_eq!(auth.selector.matchers().len(), 2);
        assert_eq!(auth.policy.defaults["token_ttl_seconds"], serde_json::json!(3600));
        assert_eq!(auth.policy.defaults["mfa_required"], serde_json::json!(true));
    }

    #[test]
    fn agents_wrapper_is_accepted() {
        let wrapped = format!(
            "agents:\n{}",
            MANIFEST
                .lines()
                .map(|l| format!("  {}\n", l))
                .collect::<String>()
        );
        let manifest = Manifest::parse("agents.yaml", &wrapped).unwrap();
        assert_eq!(manifest.len(), 2);
    }

    #[test]
    fn unknown_entry_field_is_rejected() {
        let source = MANIFEST.replace("  name: Container Security", "  name: Container Security\n  owner: me");
        let found = issues(&source);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].agent_id.as_deref(), Some("docker"));
    }

    #[test]
    fn unsafe_agent_id_is_rejected() {
        let source = MANIFEST.replace("docker:", "../docker:");
        let found = issues(&source);
        assert!(found.iter().any(|i| i.field == "agent_id"));
    }

    #[test]
    fn empty_targets_rejected() {
        let source = MANIFEST.replace(
            "targets: [\"**/Dockerfile\", \"**/*.dockerfile\"]",
            "targets: []",
        );
        let found = issues(&source);
        assert!(found.iter().any(|i| i.field == "policy.targets"));
    }

    #[test]
    fn invalid_target_glob_rejected() {
        let source = MANIFEST.replace("\"**/*.java\"", "\"src/[\"");
        let found = issues(&source);
        assert!(found.iter().any(|i| i.field == "policy.targets[0]"));
    }

    #[test]
    fn empty_selector_rejected() {
        let source = MANIFEST.replace("    scopes: [dockerfile]\n", "    scopes: []\n");
        let found = issues(&source);
        assert!(found.iter().any(|i| i.field == "rule_selector"));
    }

    #[test]
    fn problems_across_agents_are_collected() {
        let source = MANIFEST
            .replace("    scopes: [dockerfile]\n", "    scopes: []\n")
            .replace("\"**/*.java\"", "\"src/[\"");
        let found = issues(&source);
        assert!(found.iter().any(|i| i.agent_id.as_deref() == Some("docker")));
        assert!(found.iter().any(|i| i.agent_id.as_deref() == Some("auth")));
    }

    #[test]
    fn empty_manifest_rejected() {
        let found = issues("{}\n");
        assert!(found[0].message.contains("no agents"));
    }

    #[test]
    fn invalid_yaml_is_parse_error() {
        let err = Manifest::parse("agents.yaml", "docker: [\n").unwrap_err();
        assert!(matches!(err, ManifestError::Parse { .. }));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = Manifest::load(dir.path().join("agents.yaml")).unwrap_err();
        assert!(matches!(err, ManifestError::IoError { .. }));
    }

    #[test]
    fn load_reads_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("agents.yaml");
        fs::write(&path, MANIFEST).unwrap();
        assert_eq!(Manifest::load(&path).unwrap().len(), 2);
    }

    #[test]
    fn nested_and_non_finite_defaults_rejected() {
        let source = MANIFEST.replace(
            "      mfa_required: true\n",
            "      mfa_required: true\n      nested: {a: [1, 2]}\n      ratio: .nan\n",
        );
        let found = issues(&source);
        let fields: Vec<_> = found.iter().map(|i| i.field.as_str()).collect();
        assert_eq!(fields, vec!["policy.defaults.nested", "policy.defaults.ratio"]);
        assert!(found.iter().all(|i| i.agent_id.as_deref() == Some("auth")));
    }

    #[test]
    fn scalar_defaults_accepted() {
        let source = MANIFEST.replace(
            "      mfa_required: true\n",
            "      mfa_required: true\n      ratio: 0.5\n      region: eu-west-1\n",
        );
        let manifest = Manifest::parse("agents.yaml", &source).unwrap();
        let defaults = &manifest.get("auth").unwrap().policy.defaults;
        assert_eq!(defaults["ratio"], serde_json::json!(0.5));
        assert_eq!(defaults["region"], serde_json::json!("eu-west-1"));
    }

    #[test]
    fn lone_agent_named_agents_is_reserved() {
        let source = "agents:\n  name: Everything\n  rule_selector:\n    categories: [AUTH]\n  policy:\n    targets: [\"**/*\"]\n";
        let found = issues(source);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].agent_id.as_deref(), Some("agents"));
        assert_eq!(found[0].field, "agent_id");
        assert!(found[0].message.contains("reserved"));
    }

    #[test]
    fn wrapped_agent_named_agents_is_reserved() {
        let source = format!(
            "agents:\n{}  agents:\n    name: Everything\n    rule_selector:\n      categories: [AUTH]\n    policy:\n      targets: [\"**/*\"]\n",
            MANIFEST
                .lines()
                .map(|l| format!("  {}\n", l))
                .collect::<String>()
        );
        let found = issues(&source);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].agent_id.as_deref(), Some("agents"));
    }
}
