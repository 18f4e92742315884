//! Crate-wide error taxonomy (spec.md §7).
//!
//! The core never attempts to recover from these: the caller is expected to
//! surface the diagnostic and stop. Non-fatal anomalies (tag on a dead
//! version, duplicate branch, duplicate blob) are logged with
//! `tracing::warn!` instead of being represented here.

use thiserror::Error;

use crate::dotted::ParseError;
use crate::ids::{FileId, TagId, VersionId};

/// A fatal error raised by the core. Maps to spec.md §7's four error kinds.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed input from the parser collaborator: a bad revision number,
    /// a missing timestamp, or log text that does not terminate cleanly.
    #[error("malformed input: {0}")]
    MalformedInput(#[from] MalformedInput),

    /// The transport collaborator returned something the core's fetch
    /// protocol does not understand.
    #[error("protocol deviation: {0}")]
    ProtocolDeviation(String),

    /// A collection could not grow to hold more entries (arena capacity,
    /// allocation failure surfaced as a recoverable `Result` rather than an
    /// abort).
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// A structural invariant does not hold: an unresolvable file/version
    /// reference, a cycle that cannot be broken, or a tag with no reachable
    /// parent branch.
    #[error("invariant violation: {0}")]
    InvariantViolation(#[from] InvariantViolation),
}

#[derive(Debug, Error)]
pub enum MalformedInput {
    #[error(transparent)]
    Version(#[from] ParseError),

    #[error("file {file} has no timestamp for version {version}")]
    MissingTimestamp { file: FileId, version: VersionId },

    #[error("log message for version {version} of file {file} does not terminate")]
    UnterminatedLog { file: FileId, version: VersionId },
}

#[derive(Debug, Error)]
pub enum InvariantViolation {
    #[error("file {0} not found")]
    UnknownFile(FileId),

    #[error("version {0} not found")]
    UnknownVersion(VersionId),

    #[error("tag {0} not found")]
    UnknownTag(TagId),

    #[error("tag {0} has no reachable parent branch after cycle breaking")]
    UnreachableTag(TagId),

    #[error("branch-dependency graph still has a cycle after {attempts} break attempts")]
    UnbreakableCycle { attempts: usize },

    #[error("changeset {0} is empty")]
    EmptyChangeset(crate::ids::ChangesetId),
}

pub type Result<T> = std::result::Result<T, CoreError>;
