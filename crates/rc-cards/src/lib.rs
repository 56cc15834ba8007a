//! # rc-cards
//!
//! Rule Card model, schema validation, and corpus loading for rulecard.
//!
//! A Rule Card is one atomic security requirement authored as a YAML file.
//! This crate is the single parse-or-reject boundary: raw YAML goes in,
//! and only a fully validated [`RuleCard`] comes out. Nothing downstream
//! ever touches an untyped map.
//!
//! ## Key invariants
//!
//! - **All-or-nothing per card**: a card with any schema violation is
//!   rejected as a whole, and every violation is reported at once.
//! - **Strict keys**: unknown fields are violations, not silently ignored.
//! - **Globally unique ids**: [`load_corpus`] fails on duplicate ids and
//!   names both files.
//! - **Immutable snapshot**: a [`Corpus`] is built once per run, indexed by
//!   id, and is read-only afterwards.
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use rc_cards::{load_corpus, LoadOptions};
//!
//! let load = load_corpus("rules", &LoadOptions::default()).unwrap();
//! for err in &load.errors {
//!     eprintln!("{}", err);
//! }
//! println!("{} valid card(s)", load.corpus.len());
//! ```

pub mod canonical;
pub mod card;
pub mod corpus;
pub mod error;
pub mod schema;

pub use card::{RuleCard, Severity, Verification};
pub use corpus::{discover, load_corpus, Corpus, CorpusLoad, LoadOptions, LoadedCard};
pub use error::{CardError, SchemaViolation, ViolationKind};
