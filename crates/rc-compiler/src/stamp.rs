// stamp.rs — Build stamp: the `version` and `build_date` of a compile run.
//
// One stamp is taken per run and shared by every package, so a set of
// packages always carries a single version. The instant comes from, in
// order: an explicit RFC 3339 value, `SOURCE_DATE_EPOCH`, the wall clock.
// It is truncated to whole seconds so the rendered date is stable.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::CompileError;

/// Major version of the package format. Prefixes every timestamp version.
pub const PACKAGE_FORMAT_MAJOR: u32 = 1;

/// Environment variable honored for reproducible builds.
pub const SOURCE_DATE_EPOCH: &str = "SOURCE_DATE_EPOCH";

/// The version and build date stamped into packages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildStamp {
    pub build_date: DateTime<Utc>,
    pub version: String,
}

impl BuildStamp {
    /// Stamp for `instant`, truncated to seconds. The version is
    /// `<format-major>.<YYYYMMDDHHMMSS>`.
    pub fn at(instant: DateTime<Utc>) -> Self {
        let build_date = DateTime::from_timestamp(instant.timestamp(), 0).unwrap_or(instant);
        let version = format!(
            "{}.{}",
            PACKAGE_FORMAT_MAJOR,
            build_date.format("%Y%m%d%H%M%S")
        );
        Self {
            build_date,
            version,
        }
    }

    pub fn now() -> Self {
        Self::at(Utc::now())
    }

    /// Stamp from an RFC 3339 date such as `2026-10-18T12:00:00Z`.
    pub fn parse_rfc3339(value: &str) -> Result<Self, CompileError> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| Self::at(dt.with_timezone(&Utc)))
            .map_err(|e| CompileError::InvalidBuildDate {
                value: value.to_string(),
                reason: e.to_string(),
            })
    }

    /// Stamp from a Unix timestamp in seconds, as carried by `SOURCE_DATE_EPOCH`.
    pub fn parse_epoch(value: &str) -> Result<Self, CompileError> {
        let invalid = |reason: &str| CompileError::InvalidBuildDate {
            value: value.to_string(),
            reason: reason.to_string(),
        };
        let secs: i64 = value
            .trim()
            .parse()
            .map_err(|_| invalid("expected integer seconds since the Unix epoch"))?;
        DateTime::from_timestamp(secs, 0)
            .map(Self::at)
            .ok_or_else(|| invalid("timestamp out of range"))
    }

    /// Resolve the stamp for a run. `explicit` wins over `SOURCE_DATE_EPOCH`,
    /// which wins over the wall clock.
    pub fn resolve(explicit: Option<&str>) -> Result<Self, CompileError> {
        if let Some(value) = explicit {
            return Self::parse_rfc3339(value);
        }
        match std::env::var(SOURCE_DATE_EPOCH) {
            Ok(value) if !value.trim().is_empty() => Self::parse_epoch(&value),
            _ => Ok(Self::now()),
        }
    }

    /// Replace the derived version with an explicit one.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// `YYYY-MM-DDTHH:MM:SSZ`.
    pub fn build_date_string(&self) -> String {
        self.build_date.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}
