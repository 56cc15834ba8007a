// writer.rs — Package Writer: the only component that writes to disk.
//
// All-or-nothing per run:
//
// 1. Every package is serialized in memory first.
// 2. The bytes go into a fresh staging directory beside the output directory.
// 3. Only after every write succeeds are packages moved into place: existing
//    `*.json` packages are set aside, the new ones are renamed in, and the
//    set-aside files that were not replaced are dropped as stale.
//
// Only `*.json` files directly inside the output directory are ever touched;
// other files and subdirectories are left alone. If any step fails, the
// moves made so far are undone and the staging directory is removed.

use std::fs;
use std::path::{Path, PathBuf};

use rc_cards::canonical::hash_bytes;
use tracing::{debug, info, warn};

use crate::error::CompileError;
use crate::package::CompiledAgentPackage;

/// A package that reached its final location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenPackage {
    pub agent_id: String,
    pub path: PathBuf,
    /// SHA-256 of the exact bytes on disk.
    pub file_digest: String,
    pub source_digest: String,
}

/// Writes a complete package set into one output directory.
#[derive(Debug, Clone)]
pub struct PackageWriter {
    output_dir: PathBuf,
}

impl PackageWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write every package, or none of them.
    pub fn write_all(
        &self,
        packages: &[CompiledAgentPackage],
    ) -> Result<Vec<WrittenPackage>, CompileError> {
        let rendered = packages
            .iter()
            .map(|p| p.to_bytes().map(|bytes| (p, bytes)))
            .collect::<Result<Vec<_>, _>>()?;

        let parent = self.parent_dir();
        fs::create_dir_all(&parent).map_err(|e| CompileError::io(&parent, e))?;

        let staging = self.sibling("staging");
        if staging.exists() {
            fs::remove_dir_all(&staging).map_err(|e| CompileError::io(&staging, e))?;
        }
        for dir in [staging.join("new"), staging.join("previous")] {
            fs::create_dir_all(&dir).map_err(|e| CompileError::io(&dir, e))?;
        }

        let result = self
            .stage(&staging.join("new"), &rendered)
            .and_then(|written| {
                self.commit(&staging, &written)?;
                Ok(written)
            });
        discard(&staging);
        let written = result?;

        for package in &written {
            info!(
                agent_id = %package.agent_id,
                path = %package.path.display(),
                digest = %package.file_digest,
                "package written"
            );
        }
        Ok(written)
    }

    /// Write all packages into `dir`.
    fn stage(
        &self,
        dir: &Path,
        rendered: &[(&CompiledAgentPackage, Vec<u8>)],
    ) -> Result<Vec<WrittenPackage>, CompileError> {
        let mut written = Vec::with_capacity(rendered.len());
        for (package, bytes) in rendered {
            let file_name = package.file_name();
            let staged = dir.join(&file_name);
            fs::write(&staged, bytes).map_err(|e| CompileError::io(&staged, e))?;
            debug!(agent_id = %package.id, path = %staged.display(), "package staged");
            written.push(WrittenPackage {
                agent_id: package.id.clone(),
                path: self.output_dir.join(&file_name),
                file_digest: hash_bytes(bytes),
                source_digest: package.source_digest.clone(),
            });
        }
        Ok(written)
    }

    /// Move staged packages into the output directory, setting the previous
    /// packages aside first. Undone on any failure.
    fn commit(&self, staging: &Path, written: &[WrittenPackage]) -> Result<(), CompileError> {
        fs::create_dir_all(&self.output_dir).map_err(|e| CompileError::io(&self.output_dir, e))?;

        let mut set_aside: Vec<(PathBuf, PathBuf)> = Vec::new();
        for existing in self.existing_packages()? {
            let Some(name) = existing.file_name() else {
                continue;
            };
            let backup = staging.join("previous").join(name);
            if let Err(e) = fs::rename(&existing, &backup) {
                rollback(&[], &set_aside);
                return Err(CompileError::io(&existing, e));
            }
            set_aside.push((existing, backup));
        }

        let mut installed: Vec<PathBuf> = Vec::with_capacity(written.len());
        for package in written {
            let Some(name) = package.path.file_name() else {
                continue;
            };
            let staged = staging.join("new").join(name);
            if let Err(e) = fs::rename(&staged, &package.path) {
                rollback(&installed, &set_aside);
                return Err(CompileError::io(&package.path, e));
            }
            installed.push(package.path.clone());
        }

        for (original, _) in &set_aside {
            if !installed.contains(original) {
                info!(path = %original.display(), "stale package removed");
            }
        }
        Ok(())
    }

    /// `*.json` files directly inside the output directory, sorted.
    fn existing_packages(&self) -> Result<Vec<PathBuf>, CompileError> {
        let entries =
            fs::read_dir(&self.output_dir).map_err(|e| CompileError::io(&self.output_dir, e))?;
        let mut packages = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| CompileError::io(&self.output_dir, e))?.path();
            if path.is_file() && is_package_file(&path) {
                packages.push(path);
            }
        }
        packages.sort();
        Ok(packages)
    }

    fn parent_dir(&self) -> PathBuf {
        match self.output_dir.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// `.<output-name>.<suffix>` next to the output directory.
    fn sibling(&self, suffix: &str) -> PathBuf {
        let name = self
            .output_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "packages".to_string());
        self.parent_dir().join(format!(".{}.{}", name, suffix))
    }
}

fn is_package_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "json")
}

/// Remove packages installed by a failed commit and restore the set-aside ones.
fn rollback(installed: &[PathBuf], set_aside: &[(PathBuf, PathBuf)]) {
    for path in installed {
        if let Err(e) = fs::remove_file(path) {
            warn!(path = %path.display(), error = %e, "could not remove partially installed package");
        }
    }
    for (original, backup) in set_aside {
        if let Err(e) = fs::rename(backup, original) {
            warn!(path = %original.display(), error = %e, "could not restore previous package");
        }
    }
}

fn discard(staging: &Path) {
    if let Err(e) = fs::remove_dir_all(staging) {
        warn!(path = %staging.display(), error = %e, "could not remove staging directory");
    }
}
