//! Changesets and the clusterer (component C, spec.md §4.C).
//!
//! A [`Changeset`] is the Rust-model realization of the original's tagged
//! union `changeset_t` (`original_source/changeset.h`): `Commit` carries
//! member versions, `Tag` carries a [`crate::tag::Tag`] reference,
//! `ImplicitMerge` carries the suppressed vendor-import version. All three
//! share the same header fields (`time`, `unready_count`, meta
//! parent/children) so the emission scheduler (component F) can treat them
//! uniformly, exactly as the original does by embedding one `changeset_t` in
//! every `tag_t`.

use itertools::Itertools;

use crate::config::Config;
use crate::ids::{ChangesetId, Mark, TagId, VersionId};
use crate::file::Version;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangesetKind {
    /// A normal commit: one or more per-file versions with identical
    /// author/commit-id/log clustered within the fuzz window.
    Commit,
    /// A tag or branch point. Carries no member versions of its own; its
    /// identity is the [`crate::tag::Tag`] it belongs to.
    Tag,
    /// An implicit merge of a vendor-branch import into trunk: a dead trunk
    /// `1.1` coincident with a live vendor revision (spec.md §4.F, scenario
    /// 4 in §8).
    ImplicitMerge,
}

#[derive(Debug)]
pub struct Changeset {
    pub kind: ChangesetKind,
    pub time: i64,

    /// Member versions, chained in the original via `cs_sibling`; here a
    /// plain `Vec` owned by the changeset (arena ownership, non-owning
    /// links elsewhere). Empty for `Tag`.
    pub members: Vec<VersionId>,

    /// Set for `Tag`-kind changesets.
    pub tag: Option<TagId>,

    /// Number of unresolved predecessor obligations (spec.md §4.F);
    /// decremented as parents/meta-parents emit, and the changeset becomes
    /// emittable once this reaches zero.
    pub unready_count: u32,

    /// Whether this changeset currently sits in the emission readiness heap.
    /// Equivalent to the original's `ready_index != SENTINEL` check; the
    /// heap's side table (see `heap.rs`) is the actual index store.
    pub in_ready_heap: bool,

    /// Parent in the meta-DAG: a tag's branch-point changeset, or an
    /// implicit merge's suppressing commit.
    pub parent: Option<ChangesetId>,
    /// Children in the meta-DAG (cannot emit before `self` emits).
    pub children: Vec<ChangesetId>,

    pub mark: Option<Mark>,
}

impl Changeset {
    pub(crate) fn new_commit(time: i64, members: Vec<VersionId>) -> Self {
        Changeset {
            kind: ChangesetKind::Commit,
            time,
            members,
            tag: None,
            unready_count: 0,
            in_ready_heap: false,
            parent: None,
            children: Vec::new(),
            mark: None,
        }
    }

    pub(crate) fn new_tag(time: i64, tag: TagId) -> Self {
        Changeset {
            kind: ChangesetKind::Tag,
            time,
            members: Vec::new(),
            tag: Some(tag),
            unready_count: 0,
            in_ready_heap: false,
            parent: None,
            children: Vec::new(),
            mark: None,
        }
    }

    pub(crate) fn new_implicit_merge(time: i64, members: Vec<VersionId>) -> Self {
        Changeset {
            kind: ChangesetKind::ImplicitMerge,
            time,
            members,
            tag: None,
            unready_count: 0,
            in_ready_heap: false,
            parent: None,
            children: Vec::new(),
            mark: None,
        }
    }

    /// The first member version, used as the changeset's representative for
    /// sorting and for author/log display. Per spec.md §3 invariant, a
    /// commit-kind changeset always has at least one member.
    pub fn representative(&self) -> Option<VersionId> {
        self.members.first().copied()
    }
}

/// Deterministic, platform- and run-independent hash used to pre-screen log
/// equality before the byte-wise comparison (spec.md §4.C: "log equality is
/// screened by hash then confirmed byte-wise"). Plain FNV-1a rather than
/// `std`'s randomly-seeded `SipHash`, so that changeset ordering is
/// reproducible across process invocations (spec.md §8 "Round-trip /
/// idempotence").
pub fn log_hash(s: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in s.bytes() {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

fn commit_id_key(v: &Version) -> &str {
    v.commit_id.as_deref().unwrap_or("")
}

fn match_equivalent(a: &Version, b: &Version) -> bool {
    a.author == b.author && commit_id_key(a) == commit_id_key(b) && a.log == b.log
}

/// Total sort key matching `original_source/changeset.c: version_compare`:
/// `(author, commit-id, log-hash, log, time, file, version)`. The final two
/// components stand in for the original's pointer-address tie-break, giving
/// the same role (a total, deterministic order over otherwise-identical
/// versions) without relying on allocation addresses.
fn version_sort_key(v: &Version, id: VersionId) -> (String, String, u64, String, i64, u32, u32) {
    (
        v.author.to_string(),
        commit_id_key(v).to_string(),
        log_hash(&v.log),
        v.log.to_string(),
        v.time,
        v.file.index() as u32,
        id.index() as u32,
    )
}

/// Clusters every version in `versions` into changesets (spec.md §4.C).
/// Returns the changesets in final `(time, match-key)` order and sets each
/// [`Version::changeset`] to the id of the changeset it was clustered into.
pub fn cluster(versions: &mut [Version], config: &Config) -> Vec<Changeset> {
    if versions.is_empty() {
        return Vec::new();
    }

    let mut order: Vec<VersionId> = (0..versions.len()).map(VersionId::new).collect();
    order.sort_by(|&a, &b| {
        version_sort_key(&versions[a.index()], a).cmp(&version_sort_key(&versions[b.index()], b))
    });

    let fuzz = i64::try_from(config.fuzz_window.as_secs()).unwrap_or(i64::MAX);

    let mut groups: Vec<Vec<VersionId>> = Vec::new();
    let mut current = vec![order[0]];
    let mut group_start_time = versions[order[0].index()].time;

    for &id in &order[1..] {
        let last = *current.last().unwrap();
        let matches = match_equivalent(&versions[last.index()], &versions[id.index()]);
        let within_window = versions[id.index()].time - group_start_time < fuzz;
        if matches && within_window {
            current.push(id);
        } else {
            groups.push(std::mem::take(&mut current));
            current.push(id);
            group_start_time = versions[id.index()].time;
        }
    }
    groups.push(current);

    let mut changesets: Vec<Changeset> = groups
        .into_iter()
        .map(|members| {
            let time = versions[members[0].index()].time;
            Changeset::new_commit(time, members)
        })
        .collect();

    // Final changeset order: (time, match-key of representative). Matches
    // `original_source/changeset.c: cs_compare`.
    changesets.sort_by(|a, b| {
        let ra = a.representative().unwrap();
        let rb = b.representative().unwrap();
        versions[ra.index()]
            .time
            .cmp(&versions[rb.index()].time)
            .then_with(|| {
                version_sort_key(&versions[ra.index()], ra)
                    .cmp(&version_sort_key(&versions[rb.index()], rb))
            })
    });

    for (index, cs) in changesets.iter().enumerate() {
        let cs_id = ChangesetId::new(index);
        for &member in &cs.members {
            versions[member.index()].changeset = Some(cs_id);
        }
    }

    changesets
}

/// Re-clustering an already-clustered version set must reproduce the same
/// grouping (spec.md §8 "Re-clustering an already-clustered set... yields
/// the identical grouping"). Exposed for tests and for a caller that wants
/// to verify idempotence against its own data.
pub fn groups_match(a: &[Changeset], b: &[Changeset]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .all(|(x, y)| x.time == y.time && x.members.iter().sorted().eq(y.members.iter().sorted()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn make(author: &str, commit_id: Option<&str>, log: &str, time: i64, file: u32) -> Version {
        use crate::dotted::DottedVersion;
        use crate::ids::FileId;
        Version {
            version: DottedVersion::parse("1.1").unwrap(),
            dead: false,
            author: Arc::from(author),
            commit_id: commit_id.map(Arc::from),
            log: Arc::from(log),
            time,
            tz_offset_minutes: 0,
            executable: false,
            file: FileId::new(file as usize),
            parent: None,
            children: Default::default(),
            branch: None,
            changeset: None,
            used: true,
            mark: None,
        }
    }

    #[test]
    fn two_files_one_commit_cluster_together() {
        let mut versions = vec![
            make("alice", None, "init\n", 0, 0),
            make("alice", None, "init\n", 0, 1),
        ];
        let cs = cluster(&mut versions, &Config::default());
        assert_eq!(cs.len(), 1);
        assert_eq!(cs[0].members.len(), 2);
    }

    #[test]
    fn fuzz_window_boundary() {
        let mut within = vec![
            make("alice", None, "init\n", 0, 0),
            make("alice", None, "init\n", 299, 1),
        ];
        assert_eq!(cluster(&mut within, &Config::default()).len(), 1);

        let mut outside = vec![
            make("alice", None, "init\n", 0, 0),
            make("alice", None, "init\n", 301, 1),
        ];
        assert_eq!(cluster(&mut outside, &Config::default()).len(), 2);
    }

    #[test]
    fn differing_author_never_clusters() {
        let mut versions = vec![
            make("alice", None, "init\n", 0, 0),
            make("bob", None, "init\n", 0, 1),
        ];
        assert_eq!(cluster(&mut versions, &Config::default()).len(), 2);
    }

    #[test]
    fn commit_id_distinguishes_otherwise_identical_logs() {
        let mut versions = vec![
            make("alice", Some("c1"), "init\n", 0, 0),
            make("alice", Some("c2"), "init\n", 0, 1),
        ];
        assert_eq!(cluster(&mut versions, &Config::default()).len(), 2);
    }

    #[test]
    fn reclustering_is_idempotent() {
        let mut versions = vec![
            make("alice", None, "a\n", 0, 0),
            make("bob", None, "b\n", 10, 1),
            make("alice", None, "a\n", 5, 2),
        ];
        let first = cluster(&mut versions, &Config::default());
        let second = cluster(&mut versions, &Config::default());
        assert!(groups_match(&first, &second));
    }
}
