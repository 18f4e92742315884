//! File/version model (component B, spec.md §4.B).
//!
//! Versions live in one flat arena owned by
//! [`crate::database::Database`] (`Database::versions`); a [`File`] holds
//! only the sorted list of [`VersionId`]s that belong to it, plus its
//! attached [`FileTag`]s. This mirrors the arena-with-indices design used
//! throughout the crate (see Design Notes in `SPEC_FULL.md`) while matching
//! the original's pointer-identity model, where a `version_t*` is a stable
//! global reference regardless of which `file_t` it hangs off.

use std::sync::Arc;

use smallvec::SmallVec;

use crate::dotted::DottedVersion;
use crate::ids::{ChangesetId, FileId, Mark, TagId, VersionId};

/// An archival path, e.g. `module/src/foo.c,v` with the `,v` suffix and
/// `Attic/` bookkeeping already stripped by the parser collaborator. Files
/// are ordered and looked up by this path (spec.md §3: "after construction,
/// files are sorted by archival path so binary search works").
pub type ArchivePath = Arc<str>;

#[derive(Debug)]
pub struct File {
    pub path: ArchivePath,
    pub archive_path: ArchivePath,
    /// Sorted by [`DottedVersion`] ordering.
    pub version_ids: Vec<VersionId>,
    /// Sorted by tag name.
    pub file_tags: Vec<FileTag>,
    /// Unique branches this file's versions live on, sorted by branch
    /// version string (populated during resolution, spec.md §4.B).
    pub branches: Vec<TagId>,
}

impl File {
    pub(crate) fn new(path: ArchivePath, archive_path: ArchivePath) -> Self {
        File {
            path,
            archive_path,
            version_ids: Vec::new(),
            file_tags: Vec::new(),
            branches: Vec::new(),
        }
    }

    /// Binary search for a version by its dotted-decimal string. Mirrors
    /// `original_source/file.c: file_find_version`.
    pub fn find_version(&self, versions: &[Version], want: &DottedVersion) -> Option<VersionId> {
        self.version_ids
            .binary_search_by(|&id| versions[id.index()].version.cmp(want))
            .ok()
            .map(|i| self.version_ids[i])
    }
}

#[derive(Debug)]
pub struct Version {
    pub version: DottedVersion,
    pub dead: bool,
    pub author: Arc<str>,
    pub commit_id: Option<Arc<str>>,
    pub log: Arc<str>,
    /// Seconds since the Unix epoch, in UTC.
    pub time: i64,
    /// Timezone offset in minutes east of UTC, as recorded by the server
    /// (purely informational; all scheduling uses UTC `time`).
    pub tz_offset_minutes: i32,
    pub executable: bool,

    pub file: FileId,
    pub parent: Option<VersionId>,
    pub children: SmallVec<[VersionId; 2]>,

    /// The branch (tag) this version's line of descent lives on. `None` for
    /// trunk.
    pub branch: Option<TagId>,

    /// The changeset this version has been clustered into. Set by
    /// [`crate::changeset::cluster`].
    pub changeset: Option<ChangesetId>,

    /// Whether this version counts as a distinct change in its changeset, or
    /// is suppressed because the scheduler classified it as the redundant
    /// half of a vendor-import implicit merge (spec.md §4.F "`used` filter").
    pub used: bool,

    /// External identity assigned when this version's content is fetched
    /// and emitted as a blob.
    pub mark: Option<Mark>,
}

impl Version {
    pub(crate) fn new(file: FileId, version: DottedVersion) -> Self {
        Version {
            version,
            dead: false,
            author: Arc::from(""),
            commit_id: None,
            log: Arc::from(""),
            time: 0,
            tz_offset_minutes: 0,
            executable: false,
            file,
            parent: None,
            children: SmallVec::new(),
            branch: None,
            changeset: None,
            used: true,
            mark: None,
        }
    }
}

/// "Live" meaning: `None` if `this` is absent or dead. Matches
/// `original_source/emission.c`'s `version_live`, used when comparing branch
/// tips for equality.
pub fn live(this: Option<VersionId>, versions: &[Version]) -> Option<VersionId> {
    this.filter(|id| !versions[id.index()].dead)
}

/// Binds a [`crate::tag::Tag`] to a [`File`] (spec.md §3).
#[derive(Debug, Clone)]
pub struct FileTag {
    pub tag: TagId,
    /// The raw (pre-normalization) dotted-decimal string as recorded in the
    /// file's RCS header.
    pub raw_version: DottedVersion,
    /// The resolved version: for a plain tag, the exact tagged revision; for
    /// a branch, the branch point (the revision the branch forks from), or
    /// `None` for a branch addition with no prior revision on the file.
    pub resolved: Option<VersionId>,
    pub is_branch: bool,
}

impl FileTag {
    /// The branch's own (odd-depth) number after `X.Y.0.Z` normalization,
    /// e.g. `1.2.0.4` -> `1.2.4`. Only meaningful when `is_branch`.
    pub fn branch_number(&self) -> DottedVersion {
        self.raw_version.normalize_branch()
    }
}
