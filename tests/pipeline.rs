//! End-to-end pipeline tests: resolution through emission and fix-up,
//! driven against the in-memory `testutil` fakes instead of a real
//! transport or fast-import writer. Covers the scenarios in spec.md §8.

use histgraph_core::config::Config;
use histgraph_core::database::Database;
use histgraph_core::fixup::{commit_comment, create_fixups, FixupQueue};
use histgraph_core::interfaces::{ContentFetcher, FileChange, OutputSink};
use histgraph_core::testutil::{FakeContentFetcher, RecordingSink};
use histgraph_core::{branch, emission, tagpoint};

/// Runs the pipeline up through emission scheduling; branch analysis and
/// tag-point assignment are no-ops when there are no branches/tags, so this
/// helper is safe to call for every scenario below.
fn run_pipeline(db: &mut Database, config: &Config) -> emission::EmissionPlan {
    db.resolve().unwrap();
    db.cluster_changesets(config);
    db.init_branch_tips();
    let release_order = branch::analyse(db).unwrap();
    tagpoint::assign(db, &release_order, config).unwrap();
    emission::run(db, config).unwrap()
}

/// Scenario 1: two files, one commit. Identical author/log/time on two
/// files with no commit-id cluster into a single changeset with both
/// members, and emission drives a `ContentFetcher`/`OutputSink` pair
/// exactly once per file.
#[test]
fn two_files_one_commit_emits_a_single_commit_record() {
    let mut db = Database::new();
    let f1 = db.new_file("a.c", "a.c,v");
    let f2 = db.new_file("b.c", "b.c,v");
    let v1 = db
        .add_version(f1, "1.1", "alice", None, "init\n", 0, 0, false, false)
        .unwrap();
    let v2 = db
        .add_version(f2, "1.1", "alice", None, "init\n", 0, 0, false, false)
        .unwrap();

    let config = Config::default();
    let plan = run_pipeline(&mut db, &config);
    assert_eq!(plan.order.len(), 1);

    let cs = plan.order[0];
    assert_eq!(db.changesets[cs.index()].members.len(), 2);

    let mut fetcher = FakeContentFetcher::new();
    fetcher.put(f1, v1, b"x\n".to_vec());
    fetcher.put(f2, v2, b"x\n".to_vec());
    let mut sink = RecordingSink::new();

    sink.reset("refs/heads/master", None).unwrap();
    let mut changes = Vec::new();
    for &member in &db.changesets[cs.index()].members {
        let file = db.versions[member.index()].file;
        let mark = db.next_mark();
        let content = fetcher.fetch(file, member).unwrap();
        sink.blob(mark, &content).unwrap();
        changes.push(FileChange::Modify {
            path: db.files[file.index()].path.to_string(),
            executable: db.versions[member.index()].executable,
            blob: mark,
        });
    }
    let commit_mark = db.next_mark();
    sink.commit("refs/heads/master", commit_mark, "alice", 0, "init\n", &changes)
        .unwrap();
    sink.progress_done().unwrap();

    assert_eq!(sink.records.len(), 5); // reset, 2 blobs, commit, progress_done
}

/// Scenario 2: the fuzz window boundary. Within 300s and identical metadata
/// clusters together; at or past 300s it does not.
#[test]
fn fuzz_window_boundary_splits_commits() {
    let mut within = Database::new();
    let f1 = within.new_file("a.c", "a.c,v");
    let f2 = within.new_file("b.c", "b.c,v");
    within
        .add_version(f1, "1.1", "alice", None, "init\n", 0, 0, false, false)
        .unwrap();
    within
        .add_version(f2, "1.1", "alice", None, "init\n", 299, 0, false, false)
        .unwrap();
    let config = Config::default();
    let plan = run_pipeline(&mut within, &config);
    assert_eq!(plan.order.len(), 1);

    let mut outside = Database::new();
    let f1 = outside.new_file("a.c", "a.c,v");
    let f2 = outside.new_file("b.c", "b.c,v");
    outside
        .add_version(f1, "1.1", "alice", None, "init\n", 0, 0, false, false)
        .unwrap();
    outside
        .add_version(f2, "1.1", "alice", None, "init\n", 301, 0, false, false)
        .unwrap();
    let plan = run_pipeline(&mut outside, &config);
    assert_eq!(plan.order.len(), 2);
}

/// Scenario 3: branch addition. A branch tag whose predecessor does not
/// exist on the file resolves to no branch point and releases with no
/// parent; emission still succeeds and the branch's changeset carries no
/// meta-parent.
#[test]
fn branch_addition_with_no_predecessor_releases_with_no_parent() {
    let mut db = Database::new();
    let f = db.new_file("a.c", "a.c,v");
    let branch_tag = db.new_tag("newbranch", true);
    // "1.2.0.2" normalizes to branch "1.2.2"; its branch point "1.2" does
    // not exist on this file (only "1.1" does).
    db.add_version(f, "1.1", "alice", None, "init\n", 0, 0, false, false)
        .unwrap();
    db.add_file_tag(f, branch_tag, "1.2.0.2", true).unwrap();

    let config = Config::default();
    let plan = run_pipeline(&mut db, &config);

    assert_eq!(db.files[0].file_tags[0].resolved, None);
    assert_eq!(db.tags[branch_tag.index()].parent_changeset, None);
    assert!(plan.order.contains(&db.tags[branch_tag.index()].changeset));

    let mut sink = RecordingSink::new();
    sink.reset("refs/heads/newbranch", None).unwrap();
    assert!(matches!(sink.records[0], histgraph_core::testutil::Record::Reset { ref from, .. } if from.is_none()));
}

/// Scenario 4: vendor import implicit merge. A dead trunk 1.1 with CVS's
/// canned "Initial revision" log, coincident with a live 1.1.1.1 on an
/// auto-created vendor branch, is suppressed during emission rather than
/// emitted as a real (empty) commit.
#[test]
fn vendor_import_implicit_merge_suppresses_the_dead_placeholder() {
    let mut db = Database::new();
    let f = db.new_file("a.c", "a.c,v");
    db.add_version(f, "1.1", "vendor", None, "Initial revision\n", 0, 0, true, false)
        .unwrap();
    db.add_version(f, "1.1.1.1", "vendor", None, "import\n", 5, 0, false, false)
        .unwrap();
    let vendor_branch = db.new_tag("vendor", true);
    db.add_file_tag(f, vendor_branch, "1.1.0.1", true).unwrap();

    let config = Config::default();
    run_pipeline(&mut db, &config);

    let trunk_root = db.find_version(f, "1.1").unwrap();
    assert!(!db.versions[trunk_root.index()].used);

    let vendor_head = db.find_version(f, "1.1.1.1").unwrap();
    assert!(db.versions[vendor_head.index()].used);
}

/// Scenario 5: tag fix-up. A tag's chosen branch tip differs from the tag's
/// own file-version set by one modification and one deletion; the
/// generated fix-up commit message reports the exact counts.
#[test]
fn tag_fixup_reports_exact_discrepancy_counts() {
    let mut db = Database::new();
    let f1 = db.new_file("a.c", "a.c,v");
    let f2 = db.new_file("b.c", "b.c,v");
    let v1_old = db
        .add_version(f1, "1.1", "alice", None, "init\n", 0, 0, false, false)
        .unwrap();
    let v1_new = db
        .add_version(f1, "1.2", "alice", None, "update\n", 10, 0, false, false)
        .unwrap();
    db.add_version(f2, "1.1", "alice", None, "init\n", 0, 0, false, false)
        .unwrap();
    let config = Config::default();
    db.resolve().unwrap();
    db.cluster_changesets(&config);

    let tag = db.new_tag("REL1", true);
    db.init_branch_tips();
    db.tags[tag.index()].branch_versions.as_mut().unwrap()[f1.index()] = Some(v1_new);

    // Branch tip (as if REL1 branched off after both files existed at 1.1):
    // a.c at 1.1 (REL1 wants 1.2 -> modified), b.c at 1.1 (REL1 omits it ->
    // deleted).
    let branch_versions = vec![Some(v1_old), db.find_version(f2, "1.1")];

    let fixups = create_fixups(&db, tag, Some(&branch_versions));
    let mut queue = FixupQueue::new(fixups.clone());
    let batch = queue.next_batch(&db, None);

    let comment = commit_comment(&db, Some(&branch_versions), &batch);
    assert!(comment.starts_with("Fix-up commit generated by crap-clone.  (~1 +0 -1 =0)\n"));
}

/// Scenario 6: a changeset cycle. `p1` (a.c 1.1) and `v2` (b.c 1.2) share
/// one metadata key and cluster together; `v1` (a.c 1.2) and `p2` (b.c 1.1)
/// share the other and cluster together. Since `v1`'s parent is `p1` (in
/// the first changeset) and `v2`'s parent is `p2` (in the second), each
/// changeset depends on the other: a genuine two-changeset cycle that the
/// scheduler must split to make progress. Every version still emits, in an
/// order consistent with its own parent-child edges.
#[test]
fn changeset_cycle_is_split_and_every_version_still_emits() {
    let mut db = Database::new();
    let f1 = db.new_file("a.c", "a.c,v");
    let f2 = db.new_file("b.c", "b.c,v");

    db.add_version(f1, "1.1", "alice", None, "X\n", 0, 0, false, false)
        .unwrap(); // p1
    db.add_version(f1, "1.2", "alice", None, "Y\n", 5, 0, false, false)
        .unwrap(); // v1, parent p1
    db.add_version(f2, "1.1", "alice", None, "Y\n", 0, 0, false, false)
        .unwrap(); // p2: matches v1's metadata
    db.add_version(f2, "1.2", "alice", None, "X\n", 5, 0, false, false)
        .unwrap(); // v2, parent p2: matches p1's metadata

    let config = Config::default();
    let plan = run_pipeline(&mut db, &config);

    // Every version ends up in exactly one emitted changeset's member list.
    let total_members: usize = plan
        .order
        .iter()
        .map(|&cs| db.changesets[cs.index()].members.len())
        .sum();
    assert_eq!(total_members, 4);

    // Parent-before-child holds: for every emitted changeset, every
    // member's parent (if any) was emitted in some strictly earlier
    // changeset.
    let mut emitted_position = std::collections::HashMap::new();
    for (pos, &cs) in plan.order.iter().enumerate() {
        for &member in &db.changesets[cs.index()].members {
            emitted_position.insert(member, pos);
        }
    }
    for (&member, &pos) in &emitted_position {
        if let Some(parent) = db.versions[member.index()].parent {
            assert!(emitted_position[&parent] < pos);
        }
    }
}

/// Boundary behavior: an empty database emits nothing.
#[test]
fn empty_database_produces_no_changesets() {
    let mut db = Database::new();
    let plan = run_pipeline(&mut db, &Config::default());
    assert!(plan.order.is_empty());
}
