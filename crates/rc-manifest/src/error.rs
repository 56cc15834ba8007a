// error.rs — Error types for manifest loading and resolution.

use std::path::PathBuf;

use thiserror::Error;

/// One problem found in a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}{field}: {message}", .agent_id.as_ref().map(|a| format!("agent '{}': ", a)).unwrap_or_default())]
pub struct ManifestIssue {
    /// The agent the problem belongs to, if any.
    pub agent_id: Option<String>,
    /// Dotted field path within the agent entry (e.g. `policy.targets[0]`).
    pub field: String,
    pub message: String,
}

impl ManifestIssue {
    pub fn agent(agent_id: &str, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            agent_id: Some(agent_id.to_string()),
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn document(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            agent_id: None,
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Errors that can occur while loading a manifest or resolving agents.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The manifest file could not be read.
    #[error("I/O error at {}: {source}", .path.display())]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The manifest is not valid YAML.
    #[error("failed to parse manifest {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    /// The manifest parsed but one or more entries are malformed.
    #[error("manifest {} has {} problem(s)", .path.display(), .issues.len())]
    Invalid {
        path: PathBuf,
        issues: Vec<ManifestIssue>,
    },

    /// An agent's selector matched no active card.
    #[error("agent '{agent_id}' matches no rule cards (selector: {selector})")]
    EmptyAgent { agent_id: String, selector: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_display_includes_agent_when_present() {
        let issue = ManifestIssue::agent("docker", "policy.targets", "must not be empty");
        assert_eq!(
            issue.to_string(),
            "agent 'docker': policy.targets: must not be empty"
        );

        let issue = ManifestIssue::document("<document>", "no agents declared");
        assert_eq!(issue.to_string(), "<document>: no agents declared");
    }

    #[test]
    fn empty_agent_display_names_selector() {
        let err = ManifestError::EmptyAgent {
            agent_id: "docker".to_string(),
            selector: "scope == \"dockerfile\"".to_string(),
        };
        let display = err.to_string();
        assert!(display.contains("docker"));
        assert!(display.contains("dockerfile"));
    }
}
