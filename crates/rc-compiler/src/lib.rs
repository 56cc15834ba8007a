//! # rc-compiler
//!
//! Compiles validated Rule Cards into Compiled Agent Packages.
//!
//! The IDE guidance agent and the CI validation engine both read these
//! packages, so the compiler's job is to make them identical for identical
//! input: same cards in, same bytes out.
//!
//! Pipeline (see [`Compiler`]):
//!
//! 1. Load and validate the card corpus (parallel, then a join barrier).
//! 2. Load the manifest and resolve cards to agents.
//! 3. Aggregate one [`CompiledAgentPackage`] per agent (parallel).
//! 4. Write every package or none ([`PackageWriter`]).
//!
//! Every problem is collected into a [`BuildReport`]; a report with any
//! error means nothing was written.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod package;
pub mod pipeline;
pub mod report;
pub mod stamp;
pub mod verify;
pub mod writer;

pub use aggregate::{compile_agent, merge_validation_hooks, DEFAULT_ATTRIBUTION};
pub use config::CompilerConfig;
pub use error::CompileError;
pub use package::CompiledAgentPackage;
pub use pipeline::{BuildOutcome, Compiler};
pub use report::{BuildReport, Diagnostic, DiagnosticKind, Level};
pub use stamp::BuildStamp;
pub use verify::{verify_package, verify_selection, VerifyFinding};
pub use writer::{PackageWriter, WrittenPackage};
