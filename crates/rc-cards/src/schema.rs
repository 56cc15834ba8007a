// schema.rs — Rule Card schema validator.
//
// Walks the raw YAML tree of one card and records every violation it finds
// before deciding. A RuleCard is only constructed when the list is empty,
// so a card is accepted or rejected as a whole.
//
// Text fields are trimmed before length checks and storage. Block scalars
// (`|`, `>`) add trailing newlines that would otherwise leak formatting
// into the content hash.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde_yaml::{Mapping, Value};

use crate::card::{RuleCard, Severity, Verification};
use crate::error::{SchemaViolation, ViolationKind};

static ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][A-Z0-9]*-[A-Z][A-Z0-9]*-[0-9]{3}$").unwrap());

/// Every top-level key a card may carry.
pub const CARD_FIELDS: &[&str] = &[
    "id",
    "title",
    "severity",
    "scope",
    "requirement",
    "do",
    "dont",
    "detect",
    "verify",
    "refs",
    "disabled",
    "defaults",
];

const VERIFY_FIELDS: &[&str] = &["tests"];

pub const TITLE_MIN_LEN: usize = 5;
pub const TITLE_MAX_LEN: usize = 100;
pub const REQUIREMENT_MIN_LEN: usize = 10;

/// Whether a string is a well-formed Rule Card id.
pub fn is_valid_id(id: &str) -> bool {
    ID_PATTERN.is_match(id)
}

/// Validate YAML source text as one Rule Card.
///
/// `path` is only used for error reporting.
pub fn validate_str(path: &Path, source: &str) -> Result<RuleCard, Vec<SchemaViolation>> {
    match serde_yaml::from_str::<Value>(source) {
        Ok(value) => validate_value(path, &value),
        Err(e) => Err(vec![SchemaViolation {
            path: path.to_path_buf(),
            field: "<document>".to_string(),
            kind: ViolationKind::ParseFailed {
                message: e.to_string(),
            },
        }]),
    }
}

/// Validate an already-parsed YAML tree as one Rule Card.
pub fn validate_value(path: &Path, value: &Value) -> Result<RuleCard, Vec<SchemaViolation>> {
    let mut checker = Checker::new(path);

    let Some(root) = value.as_mapping() else {
        checker.push(
            "<document>",
            ViolationKind::WrongType {
                expected: "a mapping of card fields",
            },
        );
        return Err(checker.violations);
    };

    checker.unknown_keys(root, "", CARD_FIELDS);

    let id = checker.id(root);
    let title = checker.text(root, "title", TITLE_MIN_LEN, Some(TITLE_MAX_LEN));
    let severity = checker.severity(root);
    let scope = checker.scope(root);
    let requirement = checker.text(root, "requirement", REQUIREMENT_MIN_LEN, None);
    let dos = checker.required_list(root, "do", "do");
    let donts = checker.required_list(root, "dont", "dont");
    let detect = checker.list_map(root, "detect");
    let verify = checker.verify(root);
    let refs = checker.list_map(root, "refs");
    let disabled = checker.flag(root, "disabled");
    let defaults = checker.defaults(root);

    if !checker.violations.is_empty() {
        return Err(checker.violations);
    }

    match (
        id,
        title,
        severity,
        scope,
        requirement,
        dos,
        donts,
        detect,
        verify,
        refs,
        disabled,
        defaults,
    ) {
        (
            Some(id),
            Some(title),
            Some(severity),
            Some(scope),
            Some(requirement),
            Some(dos),
            Some(donts),
            Some(detect),
            Some(verify),
            Some(refs),
            Some(disabled),
            Some(defaults),
        ) => Ok(RuleCard {
            id,
            title,
            severity,
            scope,
            requirement,
            dos,
            donts,
            detect,
            verify,
            refs,
            disabled,
            defaults,
        }),
        // Every None above pushed a violation.
        _ => Err(checker.violations),
    }
}

/// Accumulates violations for one file.
struct Checker<'a> {
    path: &'a Path,
    violations: Vec<SchemaViolation>,
}

impl<'a> Checker<'a> {
    fn new(path: &'a Path) -> Self {
        Self {
            path,
            violations: Vec::new(),
        }
    }

    fn push(&mut self, field: impl Into<String>, kind: ViolationKind) {
        self.violations.push(SchemaViolation {
            path: self.path.to_path_buf(),
            field: field.into(),
            kind,
        });
    }

    fn unknown_keys(&mut self, map: &Mapping, prefix: &str, allowed: &'static [&'static str]) {
        for key in map.keys() {
            match key.as_str() {
                Some(name) if allowed.contains(&name) => {}
                Some(name) => self.push(
                    format!("{}{}", prefix, name),
                    ViolationKind::UnknownField { allowed },
                ),
                None => self.push(
                    format!("{}<key>", prefix),
                    ViolationKind::WrongType {
                        expected: "string keys",
                    },
                ),
            }
        }
    }

    /// Look up a key that must be present and non-null.
    fn required<'m>(&mut self, map: &'m Mapping, key: &str, field: &str) -> Option<&'m Value> {
        match map.get(key) {
            None => {
                self.push(field, ViolationKind::MissingField);
                None
            }
            Some(Value::Null) => {
                self.push(field, ViolationKind::EmptyValue);
                None
            }
            Some(value) => Some(value),
        }
    }

    /// A trimmed, non-empty string.
    fn string(&mut self, value: &Value, field: &str) -> Option<String> {
        let Some(s) = value.as_str() else {
            self.push(field, ViolationKind::WrongType { expected: "a string" });
            return None;
        };
        let trimmed = s.trim();
        if trimmed.is_empty() {
            self.push(field, ViolationKind::EmptyValue);
            return None;
        }
        Some(trimmed.to_string())
    }

    fn text(&mut self, map: &Mapping, key: &str, min: usize, max: Option<usize>) -> Option<String> {
        let value = self.required(map, key, key)?;
        let text = self.string(value, key)?;
        let actual = text.chars().count();
        if actual < min || max.is_some_and(|max| actual > max) {
            self.push(key, ViolationKind::LengthOutOfRange { min, max, actual });
            return None;
        }
        Some(text)
    }

    fn id(&mut self, map: &Mapping) -> Option<String> {
        let value = self.required(map, "id", "id")?;
        let id = self.string(value, "id")?;
        if !is_valid_id(&id) {
            self.push("id", ViolationKind::InvalidIdPattern { value: id });
            return None;
        }
        Some(id)
    }

    fn severity(&mut self, map: &Mapping) -> Option<Severity> {
        let value = self.required(map, "severity", "severity")?;
        let raw = self.string(value, "severity")?;
        let parsed = Severity::parse(&raw);
        if parsed.is_none() {
            self.push(
                "severity",
                ViolationKind::InvalidEnumValue {
                    value: raw,
                    allowed: Severity::ALLOWED,
                },
            );
        }
        parsed
    }

    fn scope(&mut self, map: &Mapping) -> Option<String> {
        let value = self.required(map, "scope", "scope")?;
        let scope = self.string(value, "scope")?;
        if scope.chars().any(char::is_whitespace) {
            self.push("scope", ViolationKind::ContainsWhitespace);
            return None;
        }
        Some(scope)
    }

    /// A non-empty list of non-empty strings, checked entry by entry.
    fn string_list(&mut self, value: &Value, field: &str) -> Option<Vec<String>> {
        let Some(items) = value.as_sequence() else {
            self.push(
                field,
                ViolationKind::WrongType {
                    expected: "a list of strings",
                },
            );
            return None;
        };
        if items.is_empty() {
            self.push(field, ViolationKind::EmptyList);
            return None;
        }
        let mut out = Vec::with_capacity(items.len());
        let mut ok = true;
        for (i, item) in items.iter().enumerate() {
            match self.string(item, &format!("{}[{}]", field, i)) {
                Some(s) => out.push(s),
                None => ok = false,
            }
        }
        ok.then_some(out)
    }

    fn required_list(&mut self, map: &Mapping, key: &str, field: &str) -> Option<Vec<String>> {
        let value = self.required(map, key, field)?;
        self.string_list(value, field)
    }

    /// An optional `name → [ids]` mapping. Absent means empty; a present
    /// key with an empty list is an incomplete rule and is rejected.
    fn list_map(&mut self, map: &Mapping, key: &str) -> Option<BTreeMap<String, Vec<String>>> {
        let Some(value) = map.get(key) else {
            return Some(BTreeMap::new());
        };
        let Some(entries) = value.as_mapping() else {
            self.push(
                key,
                ViolationKind::WrongType {
                    expected: "a mapping of name to list of ids",
                },
            );
            return None;
        };

        let mut out = BTreeMap::new();
        let mut ok = true;
        for (name, ids) in entries {
            let Some(name) = name.as_str().map(str::trim).filter(|n| !n.is_empty()) else {
                self.push(
                    format!("{}.<key>", key),
                    ViolationKind::WrongType {
                        expected: "a non-empty string key",
                    },
                );
                ok = false;
                continue;
            };
            if out.contains_key(name) {
                self.push(
                    format!("{}.{}", key, name),
                    ViolationKind::DuplicateKey {
                        name: name.to_string(),
                    },
                );
                ok = false;
                continue;
            }
            match self.string_list(ids, &format!("{}.{}", key, name)) {
                Some(ids) => {
                    out.insert(name.to_string(), ids);
                }
                None => ok = false,
            }
        }
        ok.then_some(out)
    }

    fn verify(&mut self, map: &Mapping) -> Option<Verification> {
        let value = self.required(map, "verify", "verify")?;
        let Some(section) = value.as_mapping() else {
            self.push(
                "verify",
                ViolationKind::WrongType {
                    expected: "a mapping with a `tests` list",
                },
            );
            return None;
        };
        self.unknown_keys(section, "verify.", VERIFY_FIELDS);
        let tests = self.required_list(section, "tests", "verify.tests")?;
        Some(Verification { tests })
    }

    fn flag(&mut self, map: &Mapping, key: &str) -> Option<bool> {
        match map.get(key) {
            None => Some(false),
            Some(Value::Bool(b)) => Some(*b),
            Some(_) => {
                self.push(key, ViolationKind::WrongType { expected: "a boolean" });
                None
            }
        }
    }

    /// Optional mapping of scalar policy defaults.
    fn defaults(&mut self, map: &Mapping) -> Option<BTreeMap<String, serde_json::Value>> {
        let Some(value) = map.get("defaults") else {
            return Some(BTreeMap::new());
        };
        let Some(entries) = value.as_mapping() else {
            self.push(
                "defaults",
                ViolationKind::WrongType {
                    expected: "a mapping of scalar values",
                },
            );
            return None;
        };

        let mut out = BTreeMap::new();
        let mut ok = true;
        for (key, value) in entries {
            let Some(key) = key.as_str().filter(|k| !k.trim().is_empty()) else {
                self.push(
                    "defaults.<key>",
                    ViolationKind::WrongType {
                        expected: "a non-empty string key",
                    },
                );
                ok = false;
                continue;
            };
            match scalar_to_json(value) {
                Some(json) => {
                    out.insert(key.to_string(), json);
                }
                None => {
                    self.push(
                        format!("defaults.{}", key),
                        ViolationKind::WrongType {
                            expected: "a string, number, or boolean",
                        },
                    );
                    ok = false;
                }
            }
        }
        ok.then_some(out)
    }
}

/// Convert a YAML scalar to JSON. Non-scalars and non-finite numbers yield None.
pub fn scalar_to_json(value: &Value) -> Option<serde_json::Value> {
    match value {
        Value::Bool(b) => Some(serde_json::Value::Bool(*b)),
        Value::String(s) => Some(serde_json::Value::String(s.clone())),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(serde_json::Value::from(i))
            } else if let Some(u) = n.as_u64() {
                Some(serde_json::Value::from(u))
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(serde_json::Value::Number)
            }
        }
        _ => None,
    }
}
