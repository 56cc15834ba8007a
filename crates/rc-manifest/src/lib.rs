//! # rc-manifest
//!
//! Agent manifest parsing and Rule Card resolution for rulecard.
//!
//! The manifest declares which sub-agents exist and which cards belong to
//! each. [`resolve`] turns a manifest plus a validated
//! [`Corpus`](rc_cards::Corpus) into an id-ordered card list per agent.
//!
//! ## Key invariants
//!
//! - **No empty agents**: an agent whose selector matches nothing is an
//!   error. It would ship no guidance while appearing to exist.
//! - **Orphans are surfaced**: an active card no agent selects is a warning.
//! - **Manifest defaults win**: card-level `defaults` never override the
//!   manifest; disagreements are warnings.

pub mod error;
pub mod manifest;
pub mod resolver;
pub mod selector;

pub use error::{ManifestError, ManifestIssue};
pub use manifest::{AgentEntry, AgentPolicy, Manifest};
pub use resolver::{resolve, DefaultsConflict, Resolution, ResolveWarning};
pub use selector::{RuleSelector, ScopeMatcher, SelectorSpec};
