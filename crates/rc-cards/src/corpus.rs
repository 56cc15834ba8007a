// corpus.rs — Rule Card discovery, parallel validation, and the corpus snapshot.
//
// Loading is a two-phase process:
//
// 1. Every `*.yaml` / `*.yml` file under the rules root is validated
//    independently on a scoped worker pool. Workers own disjoint, contiguous
//    slices of the sorted path list, so results come back in path order
//    without any shared state.
// 2. After the join, a single pass checks global id uniqueness and builds
//    the immutable `Corpus`, indexed by id.
//
// Problems are collected, never short-circuited, so one run reports all of
// them. Whether the run may continue is the caller's call: `CorpusLoad`
// separates fatal `errors` from cards `skipped` in lenient mode.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

use tracing::{debug, info, warn};

use crate::canonical::card_content_hash;
use crate::card::RuleCard;
use crate::error::CardError;
use crate::schema;

/// File extensions recognized as Rule Cards.
pub const CARD_EXTENSIONS: &[&str] = &["yaml", "yml"];

/// A validated card together with where it came from and its content hash.
#[derive(Debug, Clone)]
pub struct LoadedCard {
    pub card: RuleCard,
    pub path: PathBuf,
    /// SHA-256 of the card's canonical JSON.
    pub content_hash: String,
}

impl LoadedCard {
    /// Hash the card and pair it with its source path.
    pub fn new(card: RuleCard, path: impl Into<PathBuf>) -> Result<Self, CardError> {
        let content_hash = card_content_hash(&card)?;
        Ok(Self {
            card,
            path: path.into(),
            content_hash,
        })
    }

    pub fn id(&self) -> &str {
        &self.card.id
    }
}

/// Immutable snapshot of every validated card in one run, indexed by id.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    cards: BTreeMap<String, LoadedCard>,
}

impl Corpus {
    /// Build a corpus, rejecting duplicate ids.
    ///
    /// Every duplicate is reported against the first card that claimed the id
    /// (first in the order given). All non-duplicate cards are kept so later
    /// stages can still report their own problems.
    pub fn build(cards: impl IntoIterator<Item = LoadedCard>) -> (Self, Vec<CardError>) {
        let mut index: BTreeMap<String, LoadedCard> = BTreeMap::new();
        let mut errors = Vec::new();

        for loaded in cards {
            match index.entry(loaded.card.id.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(loaded);
                }
                Entry::Occupied(existing) => {
                    errors.push(CardError::DuplicateId {
                        id: loaded.card.id.clone(),
                        first: existing.get().path.clone(),
                        second: loaded.path,
                    });
                }
            }
        }

        (Self { cards: index }, errors)
    }

    pub fn get(&self, id: &str) -> Option<&LoadedCard> {
        self.cards.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.cards.contains_key(id)
    }

    /// All cards in id order, including disabled ones.
    pub fn iter(&self) -> impl Iterator<Item = &LoadedCard> {
        self.cards.values()
    }

    /// Cards that take part in compilation, in id order.
    pub fn active(&self) -> impl Iterator<Item = &LoadedCard> {
        self.cards.values().filter(|c| c.card.is_active())
    }

    /// Cards retired with `disabled: true`, in id order.
    pub fn disabled(&self) -> impl Iterator<Item = &LoadedCard> {
        self.cards.values().filter(|c| !c.card.is_active())
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

/// Options for loading a corpus.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Skip invalid cards (reported in `skipped`) instead of failing the run.
    pub lenient: bool,
    /// Worker threads for validation. 0 means available parallelism.
    pub workers: usize,
}

/// Outcome of loading a rules directory.
#[derive(Debug, Default)]
pub struct CorpusLoad {
    pub corpus: Corpus,
    /// Problems that must fail the run.
    pub errors: Vec<CardError>,
    /// Invalid cards that lenient mode left out.
    pub skipped: Vec<CardError>,
    /// Number of card files found.
    pub discovered: usize,
}

impl CorpusLoad {
    /// Whether the corpus is complete and may be compiled.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Find every card file under `root`, sorted by path.
pub fn discover(root: impl AsRef<Path>) -> Result<Vec<PathBuf>, CardError> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Err(CardError::IoError {
            path: root.to_path_buf(),
            source: std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "rules directory does not exist",
            ),
        });
    }

    let escaped = glob::Pattern::escape(&root.to_string_lossy());
    let mut paths = Vec::new();
    for ext in CARD_EXTENSIONS {
        let pattern = format!("{}/**/*.{}", escaped, ext);
        let entries = glob::glob(&pattern).map_err(|e| CardError::InvalidPattern {
            pattern: pattern.clone(),
            reason: e.to_string(),
        })?;
        for entry in entries {
            let path = entry.map_err(|e| CardError::IoError {
                path: e.path().to_path_buf(),
                source: e.into_error(),
            })?;
            if path.is_file() {
                paths.push(path);
            }
        }
    }

    paths.sort();
    paths.dedup();
    Ok(paths)
}

/// Read and validate one card file.
pub fn load_card(path: &Path) -> Result<LoadedCard, CardError> {
    let source = fs::read_to_string(path).map_err(|source| CardError::IoError {
        path: path.to_path_buf(),
        source,
    })?;
    let card = schema::validate_str(path, &source).map_err(|violations| CardError::Schema {
        path: path.to_path_buf(),
        violations,
    })?;
    LoadedCard::new(card, path)
}

/// Validate every card file under `root` and build the corpus.
///
/// Only a missing or unreadable rules root fails outright. Per-card problems
/// land in the returned `CorpusLoad`.
pub fn load_corpus(root: impl AsRef<Path>, options: &LoadOptions) -> Result<CorpusLoad, CardError> {
    let root = root.as_ref();
    let paths = discover(root)?;
    info!(root = %root.display(), count = paths.len(), "discovered rule cards");

    let results = validate_parallel(&paths, options.workers);

    let mut valid = Vec::new();
    let mut errors = Vec::new();
    let mut skipped = Vec::new();
    for result in results {
        match result {
            Ok(loaded) => {
                debug!(rule_id = %loaded.card.id, path = %loaded.path.display(), "card valid");
                valid.push(loaded);
            }
            Err(err @ CardError::Schema { .. }) if options.lenient => {
                warn!(error = %err, "skipping invalid card (lenient mode)");
                skipped.push(err);
            }
            Err(err) => errors.push(err),
        }
    }

    let (corpus, duplicates) = Corpus::build(valid);
    errors.extend(duplicates);

    info!(
        valid = corpus.len(),
        errors = errors.len(),
        skipped = skipped.len(),
        "rule card validation finished"
    );

    Ok(CorpusLoad {
        corpus,
        errors,
        skipped,
        discovered: paths.len(),
    })
}

/// Validate cards on a scoped worker pool, returning results in input order.
fn validate_parallel(paths: &[PathBuf], workers: usize) -> Vec<Result<LoadedCard, CardError>> {
    if paths.is_empty() {
        return Vec::new();
    }
    let workers = effective_workers(workers, paths.len());
    if workers == 1 {
        return paths.iter().map(|p| load_card(p)).collect();
    }

    let chunk_size = paths.len().div_ceil(workers);
    thread::scope(|scope| {
        let handles: Vec<_> = paths
            .chunks(chunk_size)
            .map(|chunk| scope.spawn(move || chunk.iter().map(|p| load_card(p)).collect::<Vec<_>>()))
            .collect();

        let mut results = Vec::with_capacity(paths.len());
        for handle in handles {
            match handle.join() {
                Ok(chunk) => results.extend(chunk),
                Err(panic) => std::panic::resume_unwind(panic),
            }
        }
        results
    })
}

/// Resolve the worker count: 0 means available parallelism, never more
/// threads than items.
pub fn effective_workers(requested: usize, items: usize) -> usize {
    let requested = if requested == 0 {
        thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    } else {
        requested
    };
    requested.clamp(1, items.max(1))
}
