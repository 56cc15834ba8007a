//! The Compiled Agent Package: the artifact read by the agent runtime and
//! the CI validation engine.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use rc_cards::RuleCard;
use rc_manifest::AgentPolicy;
use serde::{Deserialize, Serialize};

use crate::error::CompileError;

/// One agent's compiled knowledge.
///
/// Field order here is the field order on disk. Every map is a `BTreeMap`,
/// so two equal packages always serialize to the same bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompiledAgentPackage {
    /// The manifest `agent_id`.
    pub id: String,
    pub name: String,
    pub version: String,
    /// `YYYY-MM-DDTHH:MM:SSZ`.
    pub build_date: String,
    /// SHA-256 over the included cards' `(id, content hash)` pairs.
    pub source_digest: String,
    pub attribution: String,
    /// Copied verbatim from the manifest entry.
    pub policy: AgentPolicy,
    /// Included card ids, sorted.
    pub rules: Vec<String>,
    /// Full cards, index-aligned with `rules`.
    pub rules_detail: Vec<RuleCard>,
    /// tool → deduplicated scanner rule ids, first-seen order.
    pub validation_hooks: BTreeMap<String, Vec<String>>,
}

impl CompiledAgentPackage {
    /// Read a package from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CompileError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| CompileError::io(path, e))?;
        serde_json::from_slice(&bytes).map_err(|source| CompileError::InvalidPackage {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The on-disk form: pretty JSON, two-space indent, trailing newline.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CompileError> {
        let mut bytes = serde_json::to_vec_pretty(self)?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    /// File name for this package inside the output directory.
    pub fn file_name(&self) -> String {
        format!("{}.json", self.id)
    }
}
