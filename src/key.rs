//! Composite module identity and revision normalization.
//!
//! Every document in every index is located by (name, revision,
//! organization). The ledger files serialize this as
//! `name@revision/organization`. Revisions arrive in whatever state the
//! upstream extractor left them; [`validate_revision`] is the single
//! normalization point and must be applied identically on write and on read,
//! or index lookups silently miss.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

/// Canonical sentinel for an absent or unparseable revision.
pub const UNSET_REVISION: &str = "1970-01-01";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModuleKey {
    pub name: String,
    pub revision: String,
    pub organization: String,
}

impl ModuleKey {
    /// Build a key, normalizing the raw revision.
    #[must_use]
    pub fn new(name: &str, raw_revision: &str, organization: &str) -> Self {
        Self {
            name: name.to_string(),
            revision: validate_revision(raw_revision),
            organization: organization.to_string(),
        }
    }

    /// Parse the ledger serialization `name@revision/organization`.
    ///
    /// The revision component is normalized, so a key parsed from a ledger
    /// and a key built from catalog metadata compare equal.
    pub fn parse(raw: &str) -> Result<Self> {
        let (name, rest) = raw.split_once('@').ok_or_else(|| SyncError::InvalidKey {
            key: raw.to_string(),
            reason: "missing '@' between name and revision".to_string(),
        })?;
        let (revision, organization) =
            rest.split_once('/').ok_or_else(|| SyncError::InvalidKey {
                key: raw.to_string(),
                reason: "missing '/' between revision and organization".to_string(),
            })?;
        if name.is_empty() {
            return Err(SyncError::InvalidKey {
                key: raw.to_string(),
                reason: "empty module name".to_string(),
            });
        }
        Ok(Self::new(name, revision, organization))
    }

    /// The `name@revision` composite used in log lines and by the
    /// reconciler, where the organization is unknown.
    #[must_use]
    pub fn name_revision(&self) -> String {
        format!("{}@{}", self.name, self.revision)
    }
}

impl fmt::Display for ModuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}/{}", self.name, self.revision, self.organization)
    }
}

/// Normalize a raw revision string to `YYYY-MM-DD`.
///
/// Empty, `unknown`, or unparseable values collapse to [`UNSET_REVISION`].
/// A date whose day is out of range for its month (a known artifact of
/// hand-edited module headers, e.g. `2018-02-29`) is clamped to day 28 and
/// revalidated. Pure: same input, same output, at every call site.
#[must_use]
pub fn validate_revision(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "unknown" {
        return UNSET_REVISION.to_string();
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return date.format("%Y-%m-%d").to_string();
    }
    if let Some(date) = clamp_day(trimmed) {
        return date.format("%Y-%m-%d").to_string();
    }
    UNSET_REVISION.to_string()
}

fn clamp_day(raw: &str) -> Option<NaiveDate> {
    let mut parts = raw.splitn(3, '-');
    let year: i32 = parts.next()?.parse().ok()?;
    let month: u32 = parts.next()?.parse().ok()?;
    let day: u32 = parts.next()?.parse().ok()?;
    if day <= 28 {
        // Day was in range; the parse failed for some other reason.
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, 28)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_revision_passes_through() {
        assert_eq!(validate_revision("2021-01-01"), "2021-01-01");
    }

    #[test]
    fn unpadded_revision_is_normalized() {
        assert_eq!(validate_revision("2021-1-1"), "2021-01-01");
    }

    #[test]
    fn empty_and_unknown_collapse_to_sentinel() {
        assert_eq!(validate_revision(""), UNSET_REVISION);
        assert_eq!(validate_revision("   "), UNSET_REVISION);
        assert_eq!(validate_revision("unknown"), UNSET_REVISION);
    }

    #[test]
    fn garbage_collapses_to_sentinel() {
        assert_eq!(validate_revision("not-a-date"), UNSET_REVISION);
        assert_eq!(validate_revision("2021-13-01"), UNSET_REVISION);
    }

    #[test]
    fn day_out_of_range_is_clamped() {
        assert_eq!(validate_revision("2018-02-29"), "2018-02-28");
        assert_eq!(validate_revision("2019-04-31"), "2019-04-28");
    }

    #[test]
    fn normalization_is_pure() {
        for raw in ["2018-02-29", "", "unknown", "2021-7-4", "junk"] {
            assert_eq!(validate_revision(raw), validate_revision(raw));
        }
    }

    #[test]
    fn parse_round_trips() {
        let key = ModuleKey::parse("foo@2021-01-01/ietf").expect("parse");
        assert_eq!(key.name, "foo");
        assert_eq!(key.revision, "2021-01-01");
        assert_eq!(key.organization, "ietf");
        assert_eq!(key.to_string(), "foo@2021-01-01/ietf");
        assert_eq!(key.name_revision(), "foo@2021-01-01");
    }

    #[test]
    fn parse_normalizes_revision() {
        let key = ModuleKey::parse("foo@2018-02-29/ietf").expect("parse");
        assert_eq!(key.revision, "2018-02-28");
    }

    #[test]
    fn parse_rejects_malformed_keys() {
        assert!(ModuleKey::parse("foo").is_err());
        assert!(ModuleKey::parse("foo@2021-01-01").is_err());
        assert!(ModuleKey::parse("@2021-01-01/ietf").is_err());
    }
}
