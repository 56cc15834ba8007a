// error.rs — Error types for aggregation, configuration, and package output.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while compiling or writing agent packages.
#[derive(Debug, Error)]
pub enum CompileError {
    /// A read or write failed.
    #[error("I/O error at {}: {source}", .path.display())]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An agent references a card that is not in the validated corpus, or
    /// whose content no longer matches it.
    #[error("agent '{agent_id}' references rule '{rule_id}' which is not in the validated corpus")]
    MissingRule { agent_id: String, rule_id: String },

    /// The same card was handed to one agent twice.
    #[error("agent '{agent_id}' includes rule '{rule_id}' more than once")]
    DuplicateRule { agent_id: String, rule_id: String },

    /// Aggregation was asked to build a package with no cards.
    #[error("agent '{agent_id}' has no rules to compile")]
    EmptyPackage { agent_id: String },

    /// The configuration file could not be parsed.
    #[error("invalid config {}: {source}", .path.display())]
    Config {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// The build date could not be determined from the given input.
    #[error("invalid build date '{value}': {reason}")]
    InvalidBuildDate { value: String, reason: String },

    /// A package file is not a valid Compiled Agent Package.
    #[error("failed to read package {}: {source}", .path.display())]
    InvalidPackage {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Serialization to JSON failed.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl CompileError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CompileError::IoError {
            path: path.into(),
            source,
        }
    }

    /// The agent this error is about, if any.
    pub fn agent_id(&self) -> Option<&str> {
        match self {
            CompileError::MissingRule { agent_id, .. }
            | CompileError::DuplicateRule { agent_id, .. }
            | CompileError::EmptyPackage { agent_id } => Some(agent_id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_rule_display_names_agent_and_rule() {
        let err = CompileError::MissingRule {
            agent_id: "auth".to_string(),
            rule_id: "AUTH-PW-001".to_string(),
        };
        let display = err.to_string();
        assert!(display.contains("auth"));
        assert!(display.contains("AUTH-PW-001"));
        assert_eq!(err.agent_id(), Some("auth"));
    }

    #[test]
    fn io_error_display_includes_path() {
        let err = CompileError::io(
            "dist/agents/auth.json",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("dist/agents/auth.json"));
        assert_eq!(err.agent_id(), None);
    }
}
