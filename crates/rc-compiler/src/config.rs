//! Compiler configuration from `rulecard.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aggregate::DEFAULT_ATTRIBUTION;
use crate::error::CompileError;

/// Top-level configuration. Every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CompilerConfig {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub build: BuildConfig,
}

/// Where inputs are read from and packages are written to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PathsConfig {
    /// Root directory searched recursively for Rule Cards.
    #[serde(default = "default_rules_dir")]
    pub rules_dir: PathBuf,

    /// Agent manifest file.
    #[serde(default = "default_manifest")]
    pub manifest: PathBuf,

    /// Directory that receives one `<agent_id>.json` per agent.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            rules_dir: default_rules_dir(),
            manifest: default_manifest(),
            output_dir: default_output_dir(),
        }
    }
}

/// Build behavior.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BuildConfig {
    /// Attribution string stamped into every package.
    #[serde(default = "default_attribution")]
    pub attribution: String,

    /// Skip schema-invalid cards with a warning instead of failing.
    #[serde(default)]
    pub lenient: bool,

    /// Worker threads for validation and aggregation (0 = available parallelism).
    #[serde(default)]
    pub workers: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            attribution: default_attribution(),
            lenient: false,
            workers: 0,
        }
    }
}

fn default_rules_dir() -> PathBuf {
    PathBuf::from("rules")
}

fn default_manifest() -> PathBuf {
    PathBuf::from("agents.yaml")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("dist/agents")
}

fn default_attribution() -> String {
    DEFAULT_ATTRIBUTION.to_string()
}

impl CompilerConfig {
    /// File name looked up at the project root.
    pub const FILE_NAME: &'static str = "rulecard.toml";

    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CompileError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| CompileError::io(path, e))?;
        toml::from_str(&content).map_err(|source| CompileError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Configuration for a project: `rulecard.toml` at `root` if present,
    /// defaults otherwise. Relative paths are resolved against `root`.
    pub fn for_project(root: impl AsRef<Path>) -> Result<Self, CompileError> {
        let root = root.as_ref();
        let config_path = root.join(Self::FILE_NAME);
        let config = if config_path.exists() {
            debug!(path = %config_path.display(), "loading config");
            Self::load(&config_path)?
        } else {
            Self::default()
        };
        Ok(config.rooted_at(root))
    }

    /// Resolve relative paths against `root`. Absolute paths are kept.
    pub fn rooted_at(mut self, root: &Path) -> Self {
        self.paths.rules_dir = root.join(&self.paths.rules_dir);
        self.paths.manifest = root.join(&self.paths.manifest);
        self.paths.output_dir = root.join(&self.paths.output_dir);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults_under_root() {
        let dir = TempDir::new().unwrap();
        let config = CompilerConfig::for_project(dir.path()).unwrap();
        assert_eq!(config.paths.rules_dir, dir.path().join("rules"));
        assert_eq!(config.paths.manifest, dir.path().join("agents.yaml"));
        assert_eq!(config.paths.output_dir, dir.path().join("dist/agents"));
        assert_eq!(config.build.attribution, DEFAULT_ATTRIBUTION);
        assert!(!config.build.lenient);
        assert_eq!(config.build.workers, 0);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(CompilerConfig::FILE_NAME),
            "[paths]\nrules_dir = \"policy/cards\"\n\n[build]\nworkers = 4\n",
        )
        .unwrap();

        let config = CompilerConfig::for_project(dir.path()).unwrap();
        assert_eq!(config.paths.rules_dir, dir.path().join("policy/cards"));
        assert_eq!(config.paths.manifest, dir.path().join("agents.yaml"));
        assert_eq!(config.build.workers, 4);
        assert_eq!(config.build.attribution, DEFAULT_ATTRIBUTION);
    }

    #[test]
    fn absolute_paths_are_kept() {
        let dir = TempDir::new().unwrap();
        let elsewhere = TempDir::new().unwrap();
        let config = CompilerConfig {
            paths: PathsConfig {
                output_dir: elsewhere.path().to_path_buf(),
                ..Default::default()
            },
            ..Default::default()
        }
        .rooted_at(dir.path());
        assert_eq!(config.paths.output_dir, elsewhere.path());
    }

    #[test]
    fn unknown_key_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CompilerConfig::FILE_NAME);
        fs::write(&path, "[build]\nstrict = true\n").unwrap();
        let err = CompilerConfig::load(&path).unwrap_err();
        assert!(matches!(err, CompileError::Config { .. }));
    }
}
