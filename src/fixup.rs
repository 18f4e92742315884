//! Tag/branch fix-up commits (component G, spec.md §4.G).
//!
//! A tag (or the start of a branch) can disagree with the state of the
//! parent branch at the point it was attached: files added, removed or
//! modified purely by the tagging operation itself, with no corresponding
//! CVS commit. This module detects those differences and carries them in a
//! time- and file-indexed deferred queue so they can be folded into whatever
//! real commits eventually touch the same file, only synthesizing an
//! explicit fix-up commit for whatever is left over at the end. Grounded in
//! `original_source/fixup.c`: `create_fixups`, `fixup_list`,
//! `fixup_commit_comment`.

use crate::database::Database;
use crate::file::live;
use crate::ids::{ChangesetId, FileId, TagId, VersionId};

/// One file's fix-up: the version the tag wants there (`None` for "file
/// should not exist"), and the time the discrepancy should be considered for
/// folding into a real commit. `file` is set to a tombstone sentinel once the
/// fix-up has been folded into some changeset, marking the slot as done
/// without shrinking the backing `Vec` on every fold (mirrors the original's
/// `file = NULL` tombstone on a `fixup_ver_t` whose slot is otherwise reused
/// in place).
#[derive(Debug, Clone, Copy)]
pub struct FixupVersion {
    pub file: FileId,
    pub version: Option<VersionId>,
    pub time: i64,
}

/// `None` reads as `i64::MIN`: a fix-up assumed present from the start of
/// the branch, eligible to fold into the very first real commit it meets.
/// Mirrors the original's `TIME_MIN` sentinel.
const TIME_MIN: i64 = i64::MIN;

/// Computes every per-file discrepancy between `tag`'s own tagged versions
/// and `branch_versions` (the parent branch's tip at the tag's attachment
/// point), sorted by fix-up time. Mirrors `create_fixups`.
pub fn create_fixups(db: &Database, tag: TagId, branch_versions: Option<&[Option<VersionId>]>) -> Vec<FixupVersion> {
    let mut fixups = Vec::new();
    for (file_index, _file) in db.files.iter().enumerate() {
        let file_id = FileId::new(file_index);
        let bv = branch_versions.map(|bv| bv[file_index]).unwrap_or(None);
        let tv = db.tags[tag.index()].tip(file_id);

        let bv_live = live(bv, &db.versions);
        let tv_live = live(tv, &db.versions);
        if bv_live == tv_live {
            continue;
        }

        // Only defer fix-ups for a file that spontaneously appears on the
        // tag with no prior version on the parent branch at all; everything
        // else is assumed present from the branch's creation.
        let time = if tv.is_some() && branch_versions.is_some() && bv.is_none() {
            db.versions[tv.unwrap().index()].time
        } else {
            TIME_MIN
        };

        fixups.push(FixupVersion {
            file: file_id,
            version: tv_live,
            time,
        });
    }
    fixups.sort_by_key(|f| f.time);
    fixups
}

/// A tag's queue of not-yet-applied fix-ups, walked forward in lockstep with
/// emission: each real commit on the branch gets first refusal on folding in
/// any outstanding fix-up for a file it already touches, so a synthetic
/// fix-up commit only has to carry whatever is left over. Mirrors the
/// `tag->fixups`/`fixups_curr`/`fixups_end` triple plus `fixup_list`'s
/// repack-when-half-remaining heuristic.
pub struct FixupQueue {
    fixups: Vec<FixupVersion>,
    /// Index of the first not-yet-considered-by-time entry.
    cursor: usize,
}

impl FixupQueue {
    pub fn new(fixups: Vec<FixupVersion>) -> Self {
        FixupQueue { fixups, cursor: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.fixups[self.cursor..]
            .iter()
            .all(|f| f.file == FileId::sentinel())
    }

    /// Returns the fix-ups that should be folded into `cs` (or, if `cs` is
    /// `None`, the final synthetic fix-up commit): every fix-up whose time
    /// has arrived and whose file is touched by `cs`, plus every
    /// time-arrived fix-up regardless of file when `cs` is `None`. Drops
    /// matched entries from the queue and periodically repacks it. Mirrors
    /// `fixup_list`.
    pub fn next_batch(&mut self, db: &Database, cs: Option<ChangesetId>) -> Vec<FixupVersion> {
        const SENTINEL: FileId = FileId::sentinel();

        let time = cs.map(|id| db.changesets[id.index()].time).unwrap_or(i64::MAX);
        let mut out = Vec::new();

        while self.cursor < self.fixups.len() && self.fixups[self.cursor].time <= time {
            if self.fixups[self.cursor].file != SENTINEL {
                out.push(self.fixups[self.cursor]);
                self.fixups[self.cursor].file = SENTINEL;
            }
            self.cursor += 1;
        }

        let mut remaining = 0usize;
        for i in self.cursor..self.fixups.len() {
            if self.fixups[i].file == SENTINEL {
                continue;
            }
            let touched = cs.is_some_and(|cs_id| {
                db.changesets[cs_id.index()]
                    .members
                    .iter()
                    .any(|&m| db.versions[m.index()].file == self.fixups[i].file)
            });
            if touched {
                out.push(self.fixups[i]);
                self.fixups[i].file = SENTINEL;
            } else {
                remaining += 1;
            }
        }

        out.sort_by(|a, b| a.file.index().cmp(&b.file.index()));

        let total_outstanding = self.fixups.len() - self.cursor;
        if remaining > total_outstanding / 2 {
            return out;
        }
        if remaining == 0 {
            self.fixups.clear();
            self.cursor = 0;
            return out;
        }

        let mut repacked = Vec::with_capacity(remaining);
        for i in self.cursor..self.fixups.len() {
            if self.fixups[i].file != SENTINEL {
                repacked.push(self.fixups[i]);
            }
        }
        self.fixups = repacked;
        self.cursor = 0;
        out
    }
}

/// Generates the commit message for a synthesized fix-up commit, in the same
/// `(~modified +added -deleted =kept)` accounting the original tool reports.
/// Mirrors `fixup_commit_comment`.
pub fn commit_comment(db: &Database, base_versions: Option<&[Option<VersionId>]>, fixups: &[FixupVersion]) -> String {
    let mut keep = 0usize;
    let mut added = 0usize;
    let mut deleted = 0usize;
    let mut modified = 0usize;

    let mut cursor = 0usize;
    let effective = |file_index: usize, cursor: &mut usize| -> (Option<VersionId>, Option<VersionId>) {
        let bv = base_versions
            .map(|bv| live(bv[file_index], &db.versions))
            .unwrap_or(None);
        let tv = if *cursor < fixups.len() && fixups[*cursor].file.index() == file_index {
            let v = fixups[*cursor].version;
            *cursor += 1;
            v
        } else {
            bv
        };
        (bv, tv)
    };

    for (file_index, _) in db.files.iter().enumerate() {
        let (bv, tv) = effective(file_index, &mut cursor);
        if bv == tv {
            if bv.is_some() {
                keep += 1;
            }
            continue;
        }
        if tv.is_none() {
            deleted += 1;
        } else if bv.is_none() {
            added += 1;
        } else {
            modified += 1;
        }
    }

    let mut out = format!(
        "Fix-up commit generated by crap-clone.  (~{modified} +{added} -{deleted} ={keep})\n"
    );

    let mut cursor = 0usize;
    for (file_index, file) in db.files.iter().enumerate() {
        let (bv, tv) = effective(file_index, &mut cursor);
        if bv == tv {
            if bv.is_some() && keep <= deleted {
                let v = &db.versions[bv.unwrap().index()];
                out.push_str(&format!("{} KEEP {}\n", file.path, v.version));
            }
            continue;
        }
        if tv.is_some() || deleted <= keep {
            let bv_str = bv.map(|id| db.versions[id.index()].version.to_string());
            let tv_str = tv.map(|id| db.versions[id.index()].version.to_string());
            out.push_str(&format!(
                "{} {}->{}\n",
                file.path,
                bv_str.as_deref().unwrap_or("ADD"),
                tv_str.as_deref().unwrap_or("DELETE"),
            ));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn no_branch_tip_means_everything_is_a_deferred_addition() {
        let mut db = Database::new();
        let f = db.new_file("a.c", "a.c,v");
        let v = db
            .add_version(f, "1.1", "alice", None, "x\n", 5, 0, false, false)
            .unwrap();
        db.resolve().unwrap();
        db.cluster_changesets(&Config::default());

        let tag = db.new_tag("B1", true);
        db.tags[tag.index()].init_branch_versions(db.files.len());
        db.tags[tag.index()].branch_versions.as_mut().unwrap()[0] = Some(v);

        let fixups = create_fixups(&db, tag, None);
        assert_eq!(fixups.len(), 1);
        assert_eq!(fixups[0].time, TIME_MIN);
    }

    #[test]
    fn matching_tip_produces_no_fixup() {
        let mut db = Database::new();
        let f = db.new_file("a.c", "a.c,v");
        let v = db
            .add_version(f, "1.1", "alice", None, "x\n", 5, 0, false, false)
            .unwrap();
        db.resolve().unwrap();
        db.cluster_changesets(&Config::default());

        let tag = db.new_tag("B1", true);
        db.tags[tag.index()].init_branch_versions(db.files.len());
        db.tags[tag.index()].branch_versions.as_mut().unwrap()[0] = Some(v);

        let branch_versions = vec![Some(v)];
        let fixups = create_fixups(&db, tag, Some(&branch_versions));
        assert!(fixups.is_empty());
    }

    #[test]
    fn commit_comment_counts_added_file() {
        let mut db = Database::new();
        let f = db.new_file("a.c", "a.c,v");
        let v = db
            .add_version(f, "1.1", "alice", None, "x\n", 5, 0, false, false)
            .unwrap();
        db.resolve().unwrap();
        db.cluster_changesets(&Config::default());

        let fixups = vec![FixupVersion {
            file: FileId::new(0),
            version: Some(v),
            time: 5,
        }];
        let comment = commit_comment(&db, None, &fixups);
        assert!(comment.starts_with("Fix-up commit generated by crap-clone.  (~0 +1 -0 =0)\n"));
    }

    /// Snapshot of a fix-up message spanning all four classifications at
    /// once (kept, added, deleted, modified), pinning the exact layout of
    /// `commit_comment`'s per-file lines rather than just the summary counts.
    /// File ids are looked up again after `resolve()` since that pass
    /// reorders `Database::files` by archival path; ids captured from
    /// `new_file` before `resolve()` would otherwise go stale.
    #[test]
    fn commit_comment_full_layout_snapshot() {
        let mut db = Database::new();
        let kept_pre = db.new_file("keep.c", "keep.c,v");
        let modified_pre = db.new_file("mod.c", "mod.c,v");
        let added_pre = db.new_file("add.c", "add.c,v");
        let deleted_pre = db.new_file("del.c", "del.c,v");

        let kept_v = db
            .add_version(kept_pre, "1.1", "alice", None, "k\n", 0, 0, false, false)
            .unwrap();
        let mod_old = db
            .add_version(modified_pre, "1.1", "alice", None, "m\n", 0, 0, false, false)
            .unwrap();
        let mod_new = db
            .add_version(modified_pre, "1.2", "alice", None, "m2\n", 1, 0, false, false)
            .unwrap();
        let add_v = db
            .add_version(added_pre, "1.1", "alice", None, "a\n", 2, 0, false, false)
            .unwrap();
        let del_v = db
            .add_version(deleted_pre, "1.1", "alice", None, "d\n", 3, 0, false, false)
            .unwrap();
        db.resolve().unwrap();
        db.cluster_changesets(&Config::default());

        // Post-resolve order (sorted by archival path): add.c, del.c,
        // keep.c, mod.c.
        let added = db.find_file("add.c").unwrap();
        let deleted = db.find_file("del.c").unwrap();
        let kept = db.find_file("keep.c").unwrap();
        let modified = db.find_file("mod.c").unwrap();

        let mut base_versions = vec![None; db.files.len()];
        base_versions[added.index()] = None;
        base_versions[deleted.index()] = Some(del_v);
        base_versions[kept.index()] = Some(kept_v);
        base_versions[modified.index()] = Some(mod_old);

        let mut fixups = vec![
            FixupVersion {
                file: added,
                version: Some(add_v),
                time: 2,
            },
            FixupVersion {
                file: deleted,
                version: None,
                time: 3,
            },
            FixupVersion {
                file: modified,
                version: Some(mod_new),
                time: 1,
            },
        ];
        fixups.sort_by_key(|f| f.file.index());

        let comment = commit_comment(&db, Some(&base_versions), &fixups);
        insta::assert_snapshot!(comment, @r###"
        Fix-up commit generated by crap-clone.  (~1 +1 -1 =1)
        add.c ADD->1.1
        del.c 1.1->DELETE
        keep.c KEEP 1.1
        mod.c 1.1->1.2
        "###);
    }
}
