//! Tag-point assignment (component E, spec.md §4.E).
//!
//! For every tag (plain tag or branch), finds the version it points to on
//! each file and, where those versions sit on some other branch, picks the
//! best candidate parent branch and the changeset on it to attach as a
//! meta-parent. Grounded in `original_source/branch.c`'s
//! `assign_tag_point` and the `better_than` tie-break stub (left
//! unimplemented upstream; resolved here per `Config::tie_break`, see
//! `DESIGN.md`). Requires [`Database::init_branch_tips`] and
//! [`crate::branch::analyse`] to have already run.

use std::collections::HashMap;

use crate::changeset::ChangesetKind;
use crate::config::{Config, TieBreak};
use crate::database::Database;
use crate::error::InvariantViolation;
use crate::ids::{ChangesetId, FileId, TagId, VersionId};

/// The versions `tag` points to, one per file that has a resolved
/// [`crate::file::FileTag`] for it. For a branch this is its per-file
/// branch-point version; for a plain tag, the exact tagged version.
fn tagged_versions(db: &Database, tag: TagId) -> HashMap<FileId, VersionId> {
    let mut out = HashMap::new();
    for (file_index, file) in db.files.iter().enumerate() {
        if let Some(ft) = file.file_tags.iter().find(|ft| ft.tag == tag) {
            if let Some(resolved) = ft.resolved {
                out.insert(FileId::new(file_index), resolved);
            }
        }
    }
    out
}

/// How many of `tag`'s own versions currently match `candidate`'s per-file
/// tip. Mirrors the overlap count `assign_tag_point` uses to rank parents.
fn overlap_count(
    own: &HashMap<FileId, VersionId>,
    db: &Database,
    candidate: TagId,
) -> usize {
    own.iter()
        .filter(|&(&file, &version)| db.tags[candidate.index()].tip(file) == Some(version))
        .count()
}

fn pick_parent_branch(
    db: &Database,
    own: &HashMap<FileId, VersionId>,
    candidates: &[TagId],
    config: &Config,
) -> Option<TagId> {
    let mut best: Option<(TagId, usize)> = None;
    for &candidate in candidates {
        let score = overlap_count(own, db, candidate);
        best = Some(match best {
            None => (candidate, score),
            Some((current, current_score)) if score > current_score => (candidate, score),
            Some((current, current_score)) if score == current_score => {
                match config.tie_break {
                    TieBreak::LexicalBranchName => {
                        if db.tags[candidate.index()].name < db.tags[current.index()].name {
                            (candidate, score)
                        } else {
                            (current, current_score)
                        }
                    }
                }
            }
            Some(current_best) => current_best,
        });
    }
    best.map(|(tag, _)| tag)
}

/// The distinct branches `tag`'s own versions sit on (per `Version::branch`),
/// restricted to branches already released, so the walk below never looks
/// forward in the release order.
fn candidate_parents(db: &Database, own: &HashMap<FileId, VersionId>, released: &[bool]) -> Vec<TagId> {
    let mut seen = Vec::new();
    for &version in own.values() {
        if let Some(branch) = db.versions[version.index()].branch {
            if released[branch.index()] && !seen.contains(&branch) {
                seen.push(branch);
            }
        }
    }
    seen
}

/// Every branch's own commit-kind changesets (`Commit`/`ImplicitMerge`,
/// never `Tag`), keyed by branch and kept in the chronological order
/// [`crate::changeset::cluster`] already sorted `db.changesets` into.
/// Mirrors `original_source/branch.c`'s per-branch `tag->changesets` array,
/// which this crate builds on demand instead of threading a side list
/// through clustering, since tag-point assignment is its only consumer.
/// A changeset's branch is read off its representative (first) member,
/// matching the convention [`crate::emission`] already uses when updating
/// branch tips.
fn branch_commit_chains(db: &Database) -> HashMap<TagId, Vec<ChangesetId>> {
    let mut chains: HashMap<TagId, Vec<ChangesetId>> = HashMap::new();
    for (index, cs) in db.changesets.iter().enumerate() {
        if !matches!(cs.kind, ChangesetKind::Commit | ChangesetKind::ImplicitMerge) {
            continue;
        }
        let Some(&first) = cs.members.first() else {
            continue;
        };
        let Some(branch) = db.versions[first.index()].branch else {
            continue;
        };
        chains.entry(branch).or_default().push(ChangesetId::new(index));
    }
    chains
}

/// Walks `parent_branch`'s own commit chain (`chains`) looking for the
/// changeset whose running effect on `own` achieves the maximum overlap;
/// that changeset becomes the attachment point. Mirrors the running
/// increment/decrement counter in `original_source/branch.c:244-267`'s loop
/// over `best_branch->changesets`.
fn walk_to_attachment_point(
    db: &Database,
    own: &HashMap<FileId, VersionId>,
    parent_branch: TagId,
    chains: &HashMap<TagId, Vec<ChangesetId>>,
) -> ChangesetId {
    let mut best = db.tags[parent_branch.index()].changeset;
    let mut best_overlap: isize = 0;
    let mut running: isize = 0;

    let chain = chains.get(&parent_branch).map(Vec::as_slice).unwrap_or(&[]);
    for &cs_id in chain {
        let cs = &db.changesets[cs_id.index()];
        let mut delta: isize = 0;
        for &member in &cs.members {
            let version = &db.versions[member.index()];
            let file_id = version.file;
            match own.get(&file_id) {
                Some(&wanted) if wanted == member => delta += 1,
                Some(&wanted) if Some(wanted) == version.parent => delta -= 1,
                _ => {}
            }
        }
        running += delta;
        if running > best_overlap {
            best_overlap = running;
            best = cs_id;
        }
    }
    best
}

/// Assigns every tag's attachment point. `release_order` is the order
/// branches were released by [`crate::branch::analyse`]; a tag may only
/// consider parents that appear earlier in it. Tags whose own versions sit
/// entirely on trunk get no meta-parent (`parent_changeset` stays `None`):
/// they are already correctly ordered by their member versions' own place in
/// the commit chain, so no explicit attachment point is needed.
pub fn assign(
    db: &mut Database,
    release_order: &[TagId],
    config: &Config,
) -> crate::error::Result<()> {
    let mut released = vec![false; db.tags.len()];
    let chains = branch_commit_chains(db);
    for &tag in release_order {
        let own = tagged_versions(db, tag);
        let candidates = candidate_parents(db, &own, &released);

        if !candidates.is_empty() {
            let Some(parent_branch) = pick_parent_branch(db, &own, &candidates, config) else {
                return Err(InvariantViolation::UnreachableTag(tag).into());
            };
            let attach_changeset = walk_to_attachment_point(db, &own, parent_branch, &chains);
            db.tags[tag.index()].parent_changeset = Some(attach_changeset);

            let tag_changeset = db.tags[tag.index()].changeset;
            db.changesets[attach_changeset.index()]
                .children
                .push(tag_changeset);
            db.changesets[tag_changeset.index()].parent = Some(attach_changeset);
        }

        released[tag.index()] = true;
    }
    Ok(())
}
