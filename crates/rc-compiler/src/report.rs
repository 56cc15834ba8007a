// report.rs — Consolidated build report.
//
// Every problem from every stage lands here as a `Diagnostic`, so one run
// shows the author everything at once. The report decides pass/fail: any
// `Level::Error` fails the run.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use rc_cards::{CardError, LoadedCard};
use rc_manifest::{ManifestError, ResolveWarning};
use serde::Serialize;

use crate::error::CompileError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Level::Info => write!(f, "info"),
            Level::Warning => write!(f, "warning"),
            Level::Error => write!(f, "error"),
        }
    }
}

/// What went wrong, independent of how bad it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    Schema,
    DuplicateId,
    EmptyAgent,
    OrphanCard,
    Io,
    Manifest,
    MissingRule,
    DefaultsConflict,
    DisabledCard,
    Serialization,
    Config,
}

impl std::fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            DiagnosticKind::Schema => "schema",
            DiagnosticKind::DuplicateId => "duplicate-id",
            DiagnosticKind::EmptyAgent => "empty-agent",
            DiagnosticKind::OrphanCard => "orphan-card",
            DiagnosticKind::Io => "io",
            DiagnosticKind::Manifest => "manifest",
            DiagnosticKind::MissingRule => "missing-rule",
            DiagnosticKind::DefaultsConflict => "defaults-conflict",
            DiagnosticKind::DisabledCard => "disabled-card",
            DiagnosticKind::Serialization => "serialization",
            DiagnosticKind::Config => "config",
        };
        write!(f, "{}", label)
    }
}

/// One reported problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub level: Level,
    pub kind: DiagnosticKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(level: Level, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            level,
            kind,
            path: None,
            field: None,
            message: message.into(),
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]", self.level, self.kind)?;
        if let Some(path) = &self.path {
            write!(f, " {}", path.display())?;
        }
        if let Some(field) = &self.field {
            write!(f, " ({})", field)?;
        }
        write!(f, ": {}", self.message)
    }
}

/// All diagnostics of one run, in the order they were found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub diagnostics: Vec<Diagnostic>,
}

impl BuildReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Record a card error. Schema errors expand to one diagnostic per
    /// violated field.
    pub fn add_card_error(&mut self, err: &CardError, level: Level) {
        match err {
            CardError::Schema { violations, .. } => {
                for v in violations {
                    self.push(
                        Diagnostic::new(level, DiagnosticKind::Schema, v.kind.to_string())
                            .with_path(&v.path)
                            .with_field(&v.field),
                    );
                }
            }
            CardError::DuplicateId { id, first, second } => self.push(
                Diagnostic::new(
                    level,
                    DiagnosticKind::DuplicateId,
                    format!(
                        "rule id '{}' is declared in both {} and {}",
                        id,
                        first.display(),
                        second.display()
                    ),
                )
                .with_path(second)
                .with_field("id"),
            ),
            CardError::IoError { path, source } => self.push(
                Diagnostic::new(level, DiagnosticKind::Io, source.to_string()).with_path(path),
            ),
            CardError::InvalidPattern { .. } => {
                self.push(Diagnostic::new(level, DiagnosticKind::Io, err.to_string()))
            }
            CardError::SerializationError(e) => self.push(Diagnostic::new(
                level,
                DiagnosticKind::Serialization,
                e.to_string(),
            )),
        }
    }

    /// Record a manifest error. Every issue of an invalid manifest becomes
    /// its own diagnostic.
    pub fn add_manifest_error(&mut self, err: &ManifestError, manifest_path: &Path) {
        match err {
            ManifestError::IoError { path, source } => self.push(
                Diagnostic::new(Level::Error, DiagnosticKind::Io, source.to_string())
                    .with_path(path),
            ),
            ManifestError::Parse { path, source } => self.push(
                Diagnostic::new(Level::Error, DiagnosticKind::Manifest, source.to_string())
                    .with_path(path),
            ),
            ManifestError::Invalid { path, issues } => {
                for issue in issues {
                    let field = match &issue.agent_id {
                        Some(agent) => format!("{}.{}", agent, issue.field),
                        None => issue.field.clone(),
                    };
                    self.push(
                        Diagnostic::new(Level::Error, DiagnosticKind::Manifest, &issue.message)
                            .with_path(path)
                            .with_field(field),
                    );
                }
            }
            ManifestError::EmptyAgent { agent_id, .. } => self.push(
                Diagnostic::new(Level::Error, DiagnosticKind::EmptyAgent, err.to_string())
                    .with_path(manifest_path)
                    .with_field(agent_id),
            ),
        }
    }

    pub fn add_resolve_warning(&mut self, warning: &ResolveWarning) {
        match warning {
            ResolveWarning::OrphanCard { path, .. } => self.push(
                Diagnostic::new(Level::Warning, DiagnosticKind::OrphanCard, warning.to_string())
                    .with_path(path),
            ),
            ResolveWarning::DefaultsConflict(conflict) => self.push(
                Diagnostic::new(
                    Level::Warning,
                    DiagnosticKind::DefaultsConflict,
                    warning.to_string(),
                )
                .with_field(format!("{}.policy.defaults.{}", conflict.agent_id, conflict.key)),
            ),
        }
    }

    pub fn add_compile_error(&mut self, err: &CompileError) {
        let kind = match err {
            CompileError::MissingRule { .. }
            | CompileError::DuplicateRule { .. }
            | CompileError::EmptyPackage { .. } => DiagnosticKind::MissingRule,
            CompileError::IoError { .. } => DiagnosticKind::Io,
            CompileError::SerializationError(_) | CompileError::InvalidPackage { .. } => {
                DiagnosticKind::Serialization
            }
            CompileError::Config { .. } | CompileError::InvalidBuildDate { .. } => {
                DiagnosticKind::Config
            }
        };
        let mut diagnostic = Diagnostic::new(Level::Error, kind, err.to_string());
        if let CompileError::IoError { path, .. } = err {
            diagnostic = diagnostic.with_path(path);
        }
        if let Some(agent_id) = err.agent_id() {
            diagnostic = diagnostic.with_field(agent_id);
        }
        self.push(diagnostic);
    }

    pub fn add_disabled_card(&mut self, loaded: &LoadedCard) {
        self.push(
            Diagnostic::new(
                Level::Info,
                DiagnosticKind::DisabledCard,
                format!("rule '{}' is disabled and excluded from every agent", loaded.id()),
            )
            .with_path(&loaded.path),
        );
    }

    pub fn count(&self, level: Level) -> usize {
        self.diagnostics.iter().filter(|d| d.level == level).count()
    }

    pub fn has_errors(&self) -> bool {
        self.count(Level::Error) > 0
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.level == Level::Error)
    }

    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.kind == kind)
    }

    /// One-line pass/fail summary.
    pub fn summary(&self) -> String {
        let verdict = if self.has_errors() { "FAILED" } else { "OK" };
        format!(
            "{}: {} error(s), {} warning(s)",
            verdict,
            self.count(Level::Error),
            self.count(Level::Warning)
        )
    }

    /// Every diagnostic at or above `min_level`, one per line, then the summary.
    pub fn render(&self, out: &mut impl Write, min_level: Level) -> io::Result<()> {
        for diagnostic in self.diagnostics.iter().filter(|d| d.level >= min_level) {
            writeln!(out, "{}", diagnostic)?;
        }
        writeln!(out, "{}", self.summary())
    }
}
