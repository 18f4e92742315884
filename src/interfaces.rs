//! Trait boundaries for the three collaborators this crate only *consumes*
//! (spec.md §6): the legacy-server parser, the blob-fetching transport, and
//! the fast-import-style output sink. None of the three are implemented by
//! this crate outside of tests; production callers supply their own.
//!
//! Modeled the way `examples/jj-vcs-jj/lib/src/op_store.rs` pairs a small
//! `Result`-returning trait with a dedicated error enum per collaborator,
//! rather than funneling every failure through one crate-wide error type.

use thiserror::Error;

use crate::ids::{FileId, Mark, VersionId};

/// A thin query surface over an already-populated [`crate::database::Database`].
/// Building the database from raw RCS/CVS log text is the parser
/// collaborator's job and is out of scope for this crate (spec.md §1); this
/// trait exists so code in this crate (and its tests) can be written against
/// "some populated history source" without hard-coding `Database` directly.
/// [`crate::database::Database`] implements it directly.
pub trait HistorySource {
    fn find_file(&self, path: &str) -> Option<FileId>;
    fn find_version(&self, file: FileId, version: &str) -> Option<VersionId>;
}

impl HistorySource for crate::database::Database {
    fn find_file(&self, path: &str) -> Option<FileId> {
        crate::database::Database::find_file(self, path)
    }

    fn find_version(&self, file: FileId, version: &str) -> Option<VersionId> {
        crate::database::Database::find_version(self, file, version)
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport returned a line the core's fetch protocol does not understand: {0}")]
    ProtocolDeviation(String),

    #[error("transport connection failed: {0}")]
    Connection(String),
}

/// The transport collaborator's fetch-by-version operation (spec.md §6):
/// given a file and version, returns that revision's blob content. Consumed
/// by the fix-up generator (component G) and the emission scheduler
/// (component F) whenever a newly-`used` version's content must be emitted
/// as a `blob` record and no prior fetch has already supplied it.
pub trait ContentFetcher {
    fn fetch(&mut self, file: FileId, version: VersionId) -> Result<Vec<u8>, FetchError>;
}

/// One line of a fast-import-style `commit` record's file-change list
/// (spec.md §6: `M <mode> :<blobmark> <path>` or `D <path>`).
#[derive(Debug, Clone)]
pub enum FileChange {
    Modify {
        path: String,
        executable: bool,
        blob: Mark,
    },
    Delete {
        path: String,
    },
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("output sink failed: {0}")]
    Io(String),
}

/// The fast-import-style record consumer (spec.md §6), driven by the
/// emission scheduler (component F) and the fix-up generator (component G).
/// Every method corresponds to one record kind in the wire format; this
/// crate never formats or writes the byte stream itself, only calls these
/// methods in emission order.
pub trait OutputSink {
    fn blob(&mut self, mark: Mark, data: &[u8]) -> Result<(), SinkError>;

    #[allow(clippy::too_many_arguments)]
    fn commit(
        &mut self,
        ref_name: &str,
        mark: Mark,
        author: &str,
        epoch: i64,
        message: &str,
        changes: &[FileChange],
    ) -> Result<(), SinkError>;

    fn reset(&mut self, ref_name: &str, from: Option<Mark>) -> Result<(), SinkError>;

    fn progress_done(&mut self) -> Result<(), SinkError>;
}
