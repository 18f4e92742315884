//! Tunable knobs for the core, loaded from an optional TOML document.
//!
//! None of these are exposed in `spec.md`'s Non-goals list, so they are fair
//! game to surface as configuration the way `examples/jj-vcs-jj`'s
//! `user_config.rs` surfaces its own knobs: a plain `serde`-deserializable
//! struct with a `Default` impl matching the original tool's hard-coded
//! constants.

use std::time::Duration;

use serde::Deserialize;

/// Deterministic tie-break rule used where the original tool's `better_than`
/// stub always returned `true` (spec.md §9 Open Question). This crate
/// resolves that question in favor of lexical tag-name order; see
/// `DESIGN.md`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TieBreak {
    /// Prefer the branch whose name sorts first lexically.
    LexicalBranchName,
}

impl Default for TieBreak {
    fn default() -> Self {
        TieBreak::LexicalBranchName
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    /// Revisions across files within this many seconds of each other, with
    /// identical author/commit-id/log, are clustered into one changeset.
    /// Matches `original_source/changeset.c`'s `FUZZ_TIME`.
    #[serde(with = "duration_secs")]
    pub fuzz_window: Duration,

    /// The exact log text CVS writes for a vendor-branch import's trunk
    /// revision 1.1. A dead trunk 1.1 with this log, coincident with a live
    /// `1.1.1.1` on a vendor branch, is treated as an implicit merge rather
    /// than a real commit. Matches `original_source/emission.c`'s
    /// `can_replace_with_implicit_merge`.
    pub vendor_initial_log: String,

    /// How to break ties when two candidate parent branches for a tag have
    /// equal weight.
    pub tie_break: TieBreak,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            fuzz_window: Duration::from_secs(300),
            vendor_initial_log: "Initial revision\n".to_string(),
            tie_break: TieBreak::default(),
        }
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_original_tool_constants() {
        let c = Config::default();
        assert_eq!(c.fuzz_window, Duration::from_secs(300));
        assert_eq!(c.vendor_initial_log, "Initial revision\n");
        assert_eq!(c.tie_break, TieBreak::LexicalBranchName);
    }

    #[test]
    fn partial_toml_overrides_only_given_fields() {
        let c = Config::from_toml_str("fuzz-window = 60\n").unwrap();
        assert_eq!(c.fuzz_window, Duration::from_secs(60));
        assert_eq!(c.vendor_initial_log, "Initial revision\n");
    }
}
