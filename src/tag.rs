//! Tags and branches (spec.md §3).
//!
//! A [`Tag`] represents either a plain symbolic tag or a branch (when
//! `branch_versions.is_some()`). Both kinds participate in the emission heap
//! uniformly via their embedded `changeset` id, matching the original's
//! choice to give every `tag_t` a `changeset` member "so tags participate in
//! the emission heap uniformly with commits" (spec.md §3).

use std::sync::Arc;

use crate::ids::{ChangesetId, FileId, TagId, VersionId};

/// One entry in a tag's weighted parent-branch list: "this tag has `weight`
/// file-versions whose branch is `branch`". Populated by the branch analyzer
/// (spec.md §4.D step 2), sorted by weight descending then by `branch`
/// identity for a deterministic order.
#[derive(Debug, Clone, Copy)]
pub struct ParentBranch {
    pub branch: TagId,
    pub weight: u32,
}

/// One entry in a branch's weighted child-tag list: the mirror image of
/// [`ParentBranch`], attached to the branch rather than the child.
#[derive(Debug, Clone, Copy)]
pub struct BranchTag {
    pub tag: TagId,
    pub weight: u32,
}

#[derive(Debug)]
pub struct Tag {
    pub name: Arc<str>,

    /// Per-file tip versions, present only for branches. Index matches the
    /// database's file arena. Mutated during emission as the branch's
    /// commits are processed (spec.md §5).
    pub branch_versions: Option<Vec<Option<VersionId>>>,

    /// The changeset record this tag participates in the emission graph as.
    pub changeset: ChangesetId,

    /// The changeset this tag was attached to as a child (its "branch
    /// point" changeset on the chosen parent branch), set by the tag-point
    /// assigner (spec.md §4.E).
    pub parent_changeset: Option<ChangesetId>,

    /// Most recently emitted changeset on this branch (used to skip emitting
    /// a no-op commit, spec.md `original_source/crap-clone.c: print_commit`
    /// "nil" case).
    pub last: Option<ChangesetId>,

    /// True once a fix-up commit had to be synthesized for this tag
    /// (spec.md §8: "a tag's `fixup == false` iff ... equals the parent
    /// branch's tip").
    pub fixup: bool,

    pub deleted: bool,

    pub parents: Vec<ParentBranch>,
    pub children: Vec<BranchTag>,

    pub released: bool,
}

impl Tag {
    pub(crate) fn new(name: Arc<str>, is_branch: bool, changeset: ChangesetId) -> Self {
        Tag {
            name,
            branch_versions: is_branch.then(Vec::new),
            changeset,
            parent_changeset: None,
            last: None,
            fixup: false,
            deleted: false,
            parents: Vec::new(),
            children: Vec::new(),
            released: false,
        }
    }

    pub fn is_branch(&self) -> bool {
        self.branch_versions.is_some()
    }

    pub(crate) fn init_branch_versions(&mut self, num_files: usize) {
        if let Some(v) = &mut self.branch_versions {
            v.resize(num_files, None);
        }
    }

    pub fn tip(&self, file: FileId) -> Option<VersionId> {
        self.branch_versions.as_ref()?.get(file.index())?.as_ref().copied()
    }
}

/// The fully-qualified ref a tag/branch would be emitted under, used only by
/// the test-only `OutputSink` fake and by callers formatting diagnostics —
/// the wire format itself is the output sink collaborator's concern.
pub fn ref_name(tag: &Tag) -> String {
    if tag.is_branch() {
        format!("refs/heads/{}", tag.name)
    } else {
        format!("refs/tags/{}", tag.name)
    }
}
