//! Emission scheduling (component F, spec.md §4.F).
//!
//! Walks the version/changeset dependency graph in topological order via a
//! pair of readiness heaps, one over individual file-versions and one over
//! changesets, splitting any changeset caught in a cross-file cycle.
//! Grounded in `original_source/emission.c`: `changeset_release`,
//! `version_release`, `changeset_emitted`, `can_replace_with_implicit_merge`,
//! `changeset_update_branch_versions`, `preceed`, `cycle_split`,
//! `next_changeset_split` and `prepare_for_emission`.

use std::cmp::Ordering;

use tracing::warn;

use crate::changeset::{Changeset, ChangesetKind};
use crate::config::Config;
use crate::database::Database;
use crate::error::InvariantViolation;
use crate::file::live;
use crate::heap::IndexedHeap;
use crate::ids::ChangesetId;
use crate::ids::VersionId;

fn version_less(db: &Database) -> impl Fn(&VersionId, &VersionId) -> Ordering + '_ {
    move |&a, &b| {
        db.versions[a.index()]
            .time
            .cmp(&db.versions[b.index()].time)
            .then(a.index().cmp(&b.index()))
    }
}

fn changeset_less(db: &Database) -> impl Fn(&ChangesetId, &ChangesetId) -> Ordering + '_ {
    move |&a, &b| {
        db.changesets[a.index()]
            .time
            .cmp(&db.changesets[b.index()].time)
            .then(a.index().cmp(&b.index()))
    }
}

fn changeset_release(db: &mut Database, ready_changesets: &mut IndexedHeap<ChangesetId>, cs: ChangesetId) {
    let count = &mut db.changesets[cs.index()].unready_count;
    debug_assert!(*count != 0, "changeset released more times than it has preconditions");
    *count -= 1;
    if *count == 0 {
        let less = changeset_less(db);
        ready_changesets.insert(cs, less);
    }
}

fn version_release(
    db: &mut Database,
    ready_versions: &mut IndexedHeap<VersionId>,
    ready_changesets: &mut IndexedHeap<ChangesetId>,
    version: VersionId,
) {
    let less = version_less(db);
    ready_versions.insert(version, less);
    let cs = db.versions[version.index()]
        .changeset
        .expect("every version is assigned a changeset before emission");
    changeset_release(db, ready_changesets, cs);
}

/// Whether a vendor-import trunk revision (`1.1`, live, with CVS's canned
/// "Initial revision" log) may stand in for `v` when `v` turns out to be the
/// implicit-merge half of a vendor import. `v == None` (no prior tip on this
/// branch) is always an acceptable replacement. Mirrors
/// `can_replace_with_implicit_merge`.
fn can_replace_with_implicit_merge(db: &Database, config: &Config, v: Option<VersionId>) -> bool {
    let Some(id) = v else { return true };
    if let Some(cs) = db.versions[id.index()].changeset {
        if db.changesets[cs.index()].kind == ChangesetKind::ImplicitMerge {
            return true;
        }
    }
    let version = &db.versions[id.index()];
    version.version.to_string() == "1.1" && !version.dead && version.log.as_ref() == config.vendor_initial_log
}

/// Advances the branch this changeset's members live on, setting each
/// member's `used` flag (suppressing the redundant half of a vendor-import
/// implicit merge) and returning how many files actually changed tip.
/// Mirrors `changeset_update_branch_versions`. Trunk commits (`branch` is
/// `None`) have no stored tip array to maintain, but still need the `used`
/// computation: a trunk member's own parent link already *is* its previous
/// tip, so it stands in for the branch-tip lookup a real branch would use.
fn update_branch_tips(db: &mut Database, config: &Config, cs: ChangesetId) -> usize {
    let kind = db.changesets[cs.index()].kind;
    let members = db.changesets[cs.index()].members.clone();
    let Some(&first) = members.first() else {
        return 0;
    };
    let branch = db.versions[first.index()].branch;

    let mut changes = 0;
    for member in members {
        let file = db.versions[member.index()].file;
        let previous_tip = match branch {
            Some(b) => db.tags[b.index()]
                .branch_versions
                .as_ref()
                .expect("branch tag has branch_versions")[file.index()],
            None => db.versions[member.index()].parent,
        };

        let used = kind != ChangesetKind::ImplicitMerge || can_replace_with_implicit_merge(db, config, previous_tip);
        db.versions[member.index()].used = used;
        if !used {
            continue;
        }

        if live(previous_tip, &db.versions) != live(Some(member), &db.versions) {
            changes += 1;
        }
        if let Some(b) = branch {
            db.tags[b.index()].branch_versions.as_mut().unwrap()[file.index()] = Some(member);
        }
    }
    changes
}

/// Finds a version that is ready to emit but blocked from doing so because
/// some sibling in its changeset has not yet been released: walks each
/// not-yet-released member's ancestor chain until hitting one that has been.
/// Mirrors `preceed`.
fn find_blocking_ready_ancestor(db: &Database, ready_versions: &IndexedHeap<VersionId>, cs: ChangesetId) -> VersionId {
    for &member in &db.changesets[cs.index()].members {
        if ready_versions.contains(member) {
            continue;
        }
        let mut cursor = db.versions[member.index()].parent;
        while let Some(p) = cursor {
            if ready_versions.contains(p) {
                return p;
            }
            cursor = db.versions[p.index()].parent;
        }
    }
    unreachable!("a changeset absent from both ready heaps must have a blocked member with a ready ancestor")
}

/// Splits `cs` into its ready members (emitted as a freshly minted
/// changeset, pushed onto the ready heap) and its still-blocked members
/// (left behind under `cs`'s original id). Mirrors `cycle_split`.
fn split_changeset(db: &mut Database, ready_versions: &IndexedHeap<VersionId>, ready_changesets: &mut IndexedHeap<ChangesetId>, cs: ChangesetId) {
    let time = db.changesets[cs.index()].time;
    let members = std::mem::take(&mut db.changesets[cs.index()].members);
    let (ready, blocked): (Vec<VersionId>, Vec<VersionId>) =
        members.into_iter().partition(|&m| ready_versions.contains(m));

    warn!(
        blocked = blocked.len(),
        split_off = ready.len(),
        time = %crate::time::format_epoch(time),
        "breaking emission cycle by splitting a changeset",
    );

    db.changesets[cs.index()].members = blocked;

    let new_id = ChangesetId::new(db.changesets.len());
    for &m in &ready {
        db.versions[m.index()].changeset = Some(new_id);
    }
    db.changesets.push(Changeset::new_commit(time, ready));

    let less = changeset_less(db);
    ready_changesets.insert(new_id, less);
}

/// Everything the emission pass produced, in final emission order.
pub struct EmissionPlan {
    pub order: Vec<ChangesetId>,
}

/// Runs emission scheduling to completion: every changeset (commit, tag, or
/// implicit merge) appears exactly once in the returned order, respecting
/// every version's parent/child links and every tag's meta-parent edge.
/// Requires [`Database::init_branch_tips`], [`crate::branch::analyse`] and
/// [`crate::tagpoint::assign`] to have already run. Mirrors
/// `prepare_for_emission` followed by the
/// `next_changeset_split` driver loop.
pub fn run(db: &mut Database, config: &Config) -> crate::error::Result<EmissionPlan> {
    for (index, cs) in db.changesets.iter().enumerate() {
        if cs.kind == ChangesetKind::Commit && cs.members.is_empty() {
            return Err(InvariantViolation::EmptyChangeset(ChangesetId::new(index)).into());
        }
    }

    for cs in &mut db.changesets {
        cs.unready_count += cs.members.len() as u32;
    }
    let child_lists: Vec<Vec<ChangesetId>> = db.changesets.iter().map(|cs| cs.children.clone()).collect();
    for children in &child_lists {
        for &child in children {
            db.changesets[child.index()].unready_count += 1;
        }
    }

    let mut ready_versions: IndexedHeap<VersionId> = IndexedHeap::new();
    let mut ready_changesets: IndexedHeap<ChangesetId> = IndexedHeap::new();

    let roots: Vec<VersionId> = (0..db.versions.len())
        .map(VersionId::new)
        .filter(|&id| db.versions[id.index()].parent.is_none())
        .collect();
    for id in roots {
        version_release(db, &mut ready_versions, &mut ready_changesets, id);
    }

    // Changesets with no members and no meta-parent (a tag or branch whose
    // own versions all sit on trunk, see `crate::tagpoint`) never get
    // released by a version becoming ready, so seed them directly.
    let dangling_tags: Vec<ChangesetId> = (0..db.changesets.len())
        .map(ChangesetId::new)
        .filter(|&id| {
            db.changesets[id.index()].kind == ChangesetKind::Tag
                && db.changesets[id.index()].unready_count == 0
                && !ready_changesets.contains(id)
        })
        .collect();
    for id in dangling_tags {
        let less = changeset_less(db);
        ready_changesets.insert(id, less);
    }

    let mut order = Vec::new();
    let mut split_attempts = 0usize;
    const MAX_SPLIT_ATTEMPTS: usize = 1 << 20;

    loop {
        if ready_changesets.is_empty() {
            if ready_versions.is_empty() {
                break;
            }
            split_attempts += 1;
            if split_attempts > MAX_SPLIT_ATTEMPTS {
                return Err(InvariantViolation::UnbreakableCycle {
                    attempts: split_attempts,
                }
                .into());
            }

            let mut slow = ready_versions.front().expect("checked non-empty");
            let mut fast = slow;
            loop {
                let slow_cs = db.versions[slow.index()].changeset.unwrap();
                slow = find_blocking_ready_ancestor(db, &ready_versions, slow_cs);
                for _ in 0..2 {
                    let fast_cs = db.versions[fast.index()].changeset.unwrap();
                    fast = find_blocking_ready_ancestor(db, &ready_versions, fast_cs);
                }
                if slow == fast {
                    break;
                }
            }
            let stuck_cs = db.versions[slow.index()].changeset.unwrap();
            split_changeset(db, &ready_versions, &mut ready_changesets, stuck_cs);
        }

        let less = changeset_less(db);
        let cs = ready_changesets.pop(less).expect("checked non-empty above");

        if matches!(
            db.changesets[cs.index()].kind,
            ChangesetKind::Commit | ChangesetKind::ImplicitMerge
        ) {
            update_branch_tips(db, config, cs);
            let members = db.changesets[cs.index()].members.clone();
            for member in members {
                let less = version_less(db);
                ready_versions.remove(member, less);
                let children = db.versions[member.index()].children.clone();
                for child in children {
                    version_release(db, &mut ready_versions, &mut ready_changesets, child);
                }
            }
        }

        let meta_children = db.changesets[cs.index()].children.clone();
        for child in meta_children {
            changeset_release(db, &mut ready_changesets, child);
        }

        order.push(cs);
    }

    Ok(EmissionPlan { order })
}
