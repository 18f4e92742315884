//! The database (component H, spec.md §4.H).
//!
//! Owns every arena (files, versions, tags, changesets), provides
//! `find_file`/`find_tag` lookup, and drives resolution (component B),
//! clustering (component C) and branch analysis (component D) as one
//! `Database::build` pipeline. Components E (tag points), F (emission) and G
//! (fix-ups) operate on an already-built `Database` and live in their own
//! modules so each keeps its own focused test suite, matching how
//! `examples/jj-vcs-jj/lib/src/default_index` separates the index itself
//! from the revset machinery that walks it.

use std::collections::BTreeMap;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::warn;

use crate::changeset::{self, Changeset, ChangesetKind};
use crate::config::Config;
use crate::dotted::DottedVersion;
use crate::error::MalformedInput;
use crate::file::{ArchivePath, File, FileTag, Version};
use crate::ids::{ChangesetId, FileId, Mark, MarkCounter, TagId, VersionId};
use crate::interner::Interner;
use crate::tag::Tag;

pub struct Database {
    pub files: Vec<File>,
    pub versions: Vec<Version>,
    pub tags: Vec<Tag>,
    pub changesets: Vec<Changeset>,

    // Insertion order preserved (rather than sorted) so diagnostics can walk
    // files/tags in the order the parser collaborator registered them,
    // matching `examples/jj-vcs-jj`'s use of `IndexMap` for id-keyed lookup
    // tables that still need a stable iteration order.
    file_by_path: IndexMap<ArchivePath, FileId>,
    tag_by_name: IndexMap<Arc<str>, TagId>,

    interner: Interner,
    marks: MarkCounter,
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

impl Database {
    pub fn new() -> Self {
        Database {
            files: Vec::new(),
            versions: Vec::new(),
            tags: Vec::new(),
            changesets: Vec::new(),
            file_by_path: IndexMap::new(),
            tag_by_name: IndexMap::new(),
            interner: Interner::new(),
            marks: MarkCounter::default(),
        }
    }

    pub fn intern(&mut self, s: &str) -> Arc<str> {
        self.interner.intern(s)
    }

    pub fn next_mark(&mut self) -> Mark {
        self.marks.next()
    }

    // ---- population, used by the (out-of-scope) parser collaborator ----

    /// Registers a new file. Paths must be unique; re-registering an
    /// existing path returns the existing id rather than erroring, since a
    /// parser may revisit a directory listing more than once.
    pub fn new_file(&mut self, path: &str, archive_path: &str) -> FileId {
        if let Some(&id) = self.file_by_path.get(path) {
            return id;
        }
        let path: ArchivePath = self.interner.intern(path);
        let archive_path: ArchivePath = self.interner.intern(archive_path);
        let id = FileId::new(self.files.len());
        self.file_by_path.insert(path.clone(), id);
        self.files.push(File::new(path, archive_path));
        id
    }

    /// Registers a new tag or branch by name, returning its id. A paired
    /// changeset is created immediately so the tag can participate in the
    /// emission heap uniformly with commits (spec.md §3).
    pub fn new_tag(&mut self, name: &str, is_branch: bool) -> TagId {
        if let Some(&id) = self.tag_by_name.get(name) {
            return id;
        }
        let name: Arc<str> = self.interner.intern(name);
        let id = TagId::new(self.tags.len());
        let cs_id = ChangesetId::new(self.changesets.len());
        self.changesets.push(Changeset::new_tag(0, id));
        self.tags.push(Tag::new(name.clone(), is_branch, cs_id));
        self.tag_by_name.insert(name, id);
        id
    }

    /// Adds a version to `file`. Versions may be added in any order; they
    /// are sorted during [`Database::resolve`].
    pub fn add_version(
        &mut self,
        file: FileId,
        version: &str,
        author: &str,
        commit_id: Option<&str>,
        log: &str,
        time: i64,
        tz_offset_minutes: i32,
        dead: bool,
        executable: bool,
    ) -> crate::error::Result<VersionId> {
        let parsed = DottedVersion::parse(version).map_err(MalformedInput::Version)?;
        let id = VersionId::new(self.versions.len());
        let mut v = Version::new(file, parsed);
        v.author = self.interner.intern(author);
        v.commit_id = commit_id.map(|s| self.interner.intern(s));
        v.log = self.interner.intern(log);
        v.time = time;
        v.tz_offset_minutes = tz_offset_minutes;
        v.dead = dead;
        v.executable = executable;
        self.versions.push(v);
        self.files[file.index()].version_ids.push(id);
        Ok(id)
    }

    pub fn add_file_tag(
        &mut self,
        file: FileId,
        tag: TagId,
        raw_version: &str,
        is_branch: bool,
    ) -> crate::error::Result<()> {
        let raw_version = DottedVersion::parse(raw_version).map_err(MalformedInput::Version)?;
        self.files[file.index()].file_tags.push(FileTag {
            tag,
            raw_version,
            resolved: None,
            is_branch,
        });
        Ok(())
    }

    // ---- lookup ----

    pub fn find_file(&self, path: &str) -> Option<FileId> {
        self.file_by_path.get(path).copied()
    }

    pub fn find_tag(&self, name: &str) -> Option<TagId> {
        self.tag_by_name.get(name).copied()
    }

    pub fn find_version(&self, file: FileId, version: &str) -> Option<VersionId> {
        let parsed = DottedVersion::parse(version).ok()?;
        self.files[file.index()].find_version(&self.versions, &parsed)
    }

    // ---- component B: resolution ----

    /// Runs file/version/tag resolution (spec.md §4.B): sorts files by
    /// archival path, sorts each file's versions, links parent/children,
    /// resolves `FileTag`s, computes each file's unique branch set, and sets
    /// each `Version::branch`.
    pub fn resolve(&mut self) -> crate::error::Result<()> {
        self.sort_files();
        for file_index in 0..self.files.len() {
            self.sort_and_link_versions(file_index);
            self.resolve_file_tags(file_index);
            self.compute_file_branches(file_index);
            self.assign_version_branches(file_index);
        }
        Ok(())
    }

    fn sort_files(&mut self) {
        let mut order: Vec<usize> = (0..self.files.len()).collect();
        order.sort_by(|&a, &b| self.files[a].path.cmp(&self.files[b].path));

        // Build the permutation and remap every FileId referenced anywhere.
        let mut new_index_of = vec![0usize; order.len()];
        for (new_pos, &old_pos) in order.iter().enumerate() {
            new_index_of[old_pos] = new_pos;
        }

        let mut files: Vec<File> = Vec::with_capacity(self.files.len());
        for &old_pos in &order {
            files.push(std::mem::replace(
                &mut self.files[old_pos],
                File::new(Arc::from(""), Arc::from("")),
            ));
        }
        self.files = files;

        for v in &mut self.versions {
            v.file = FileId::new(new_index_of[v.file.index()]);
        }
        for (path, id) in self.file_by_path.iter_mut() {
            let _ = path;
            *id = FileId::new(new_index_of[id.index()]);
        }
        for tag in &mut self.tags {
            if let Some(bv) = &mut tag.branch_versions {
                let mut remapped = vec![None; bv.len()];
                for (old_pos, v) in bv.drain(..).enumerate() {
                    remapped[new_index_of[old_pos]] = v;
                }
                *bv = remapped;
            }
        }
    }

    fn sort_and_link_versions(&mut self, file_index: usize) {
        let file_id = FileId::new(file_index);
        self.files[file_index]
            .version_ids
            .sort_by(|&a, &b| self.versions[a.index()].version.cmp(&self.versions[b.index()].version));

        let ids = self.files[file_index].version_ids.clone();
        for &id in &ids {
            let mut candidate = self.versions[id.index()].version.predecessor();
            let parent = loop {
                match candidate {
                    None => break None,
                    Some(c) => match self.files[file_index].find_version(&self.versions, &c) {
                        Some(p) => break Some(p),
                        None => candidate = c.predecessor(),
                    },
                }
            };
            self.versions[id.index()].parent = parent;
            if let Some(p) = parent {
                self.versions[p.index()].children.push(id);
            }
            let _ = file_id;
        }
    }

    fn resolve_file_tags(&mut self, file_index: usize) {
        let tags = std::mem::take(&mut self.files[file_index].file_tags);
        let mut kept = Vec::with_capacity(tags.len());
        for mut ft in tags {
            if ft.is_branch {
                let branch_point = ft.branch_number().drop_last();
                ft.resolved = self.files[file_index].find_version(&self.versions, &branch_point);
                // `None` here is a legitimate branch addition (spec.md §4.B).
            } else {
                ft.resolved = self.files[file_index].find_version(&self.versions, &ft.raw_version);
                if let Some(v) = ft.resolved {
                    if self.versions[v.index()].dead {
                        warn!(
                            file = %self.files[file_index].path,
                            tag = %self.tags[ft.tag.index()].name,
                            "dropping tag attached to a dead version",
                        );
                        continue;
                    }
                } else {
                    warn!(
                        file = %self.files[file_index].path,
                        tag = %self.tags[ft.tag.index()].name,
                        version = %ft.raw_version,
                        "tag references a version this file does not have",
                    );
                }
            }
            kept.push(ft);
        }
        kept.sort_by(|a, b| self.tags[a.tag.index()].name.cmp(&self.tags[b.tag.index()].name));
        self.files[file_index].file_tags = kept;
    }

    fn compute_file_branches(&mut self, file_index: usize) {
        let mut by_branch_number: BTreeMap<String, TagId> = BTreeMap::new();
        let mut branches = Vec::new();
        for ft in &self.files[file_index].file_tags {
            if !ft.is_branch {
                continue;
            }
            let key = ft.branch_number().to_string();
            if let Some(&existing) = by_branch_number.get(&key) {
                warn!(
                    file = %self.files[file_index].path,
                    branch_number = %key,
                    first = %self.tags[existing.index()].name,
                    duplicate = %self.tags[ft.tag.index()].name,
                    "duplicate branch point for this file; keeping the first tag",
                );
                continue;
            }
            by_branch_number.insert(key, ft.tag);
            branches.push(ft.tag);
        }
        branches.sort_by_key(|&tag| {
            self.files[file_index]
                .file_tags
                .iter()
                .find(|ft| ft.tag == tag)
                .map(|ft| ft.branch_number())
        });
        self.files[file_index].branches = branches;
    }

    fn assign_version_branches(&mut self, file_index: usize) {
        let ids = self.files[file_index].version_ids.clone();
        for id in ids {
            let depth = self.versions[id.index()].version.depth();
            if depth <= 2 {
                continue; // trunk
            }
            let branch_number = self.versions[id.index()].version.drop_last();
            let found = self.files[file_index].file_tags.iter().find(|ft| {
                ft.is_branch && ft.branch_number() == branch_number
            });
            match found {
                Some(ft) => self.versions[id.index()].branch = Some(ft.tag),
                None => warn!(
                    file = %self.files[file_index].path,
                    version = %self.versions[id.index()].version,
                    "revision is on an untagged branch",
                ),
            }
        }
    }

    /// Seeds every branch's per-file tip with its own branch-point version
    /// (the revision the branch forked from), ahead of any commits being
    /// emitted on it. The tag-point assigner (component E) reads these tips
    /// to rank candidate parent branches; emission (component F) advances
    /// them as the branch's own commits are processed.
    pub fn init_branch_tips(&mut self) {
        let num_files = self.files.len();
        for tag in &mut self.tags {
            if tag.is_branch() {
                tag.init_branch_versions(num_files);
            }
        }
        for (file_index, file) in self.files.iter().enumerate() {
            for ft in &file.file_tags {
                if !ft.is_branch {
                    continue;
                }
                if let Some(bv) = &mut self.tags[ft.tag.index()].branch_versions {
                    bv[file_index] = ft.resolved;
                }
            }
        }
    }

    // ---- component C: clustering ----

    pub fn cluster_changesets(&mut self, config: &Config) {
        let commit_changesets = changeset::cluster(&mut self.versions, config);
        // Tag-kind changesets created in `new_tag` keep their ids; commit
        // changesets are appended after them, and every `Version::changeset`
        // value produced by `changeset::cluster` must be offset to account
        // for the tags that came first.
        let offset = self.changesets.len();
        for v in &mut self.versions {
            if let Some(cs) = v.changeset {
                v.changeset = Some(ChangesetId::new(cs.index() + offset));
            }
        }
        self.changesets.extend(commit_changesets);
        self.mark_vendor_imports(config);
    }

    /// Reclassifies commit-kind changesets that are entirely made up of
    /// vendor-import placeholder revisions as `ImplicitMerge` (spec.md §4.F
    /// "used filter", scenario 4 in §8). A file's trunk `1.1` is such a
    /// placeholder when it is dead, carries the canned
    /// `config.vendor_initial_log` text, and the same file has a live
    /// `1.1.1.1` — the first revision `cvs import` writes on the vendor
    /// branch it creates alongside that dead trunk marker. Once reclassified,
    /// the emission scheduler's `used` filter (`can_replace_with_implicit_merge`
    /// in `emission.rs`) suppresses emitting the placeholder's (non-)content
    /// in favor of whatever the vendor branch actually contributes.
    fn mark_vendor_imports(&mut self, config: &Config) {
        let trunk_root = DottedVersion::parse("1.1").expect("valid literal");
        let vendor_first = DottedVersion::parse("1.1.1.1").expect("valid literal");

        let mut placeholders: std::collections::HashSet<VersionId> = std::collections::HashSet::new();
        for file in &self.files {
            let Some(root_id) = file.find_version(&self.versions, &trunk_root) else {
                continue;
            };
            let root = &self.versions[root_id.index()];
            if !root.dead || root.log.as_ref() != config.vendor_initial_log {
                continue;
            }
            let Some(vendor_id) = file.find_version(&self.versions, &vendor_first) else {
                continue;
            };
            if self.versions[vendor_id.index()].dead {
                continue;
            }
            placeholders.insert(root_id);
        }

        if placeholders.is_empty() {
            return;
        }

        for cs in &mut self.changesets {
            if cs.kind == ChangesetKind::Commit
                && !cs.members.is_empty()
                && cs.members.iter().all(|m| placeholders.contains(m))
            {
                cs.kind = ChangesetKind::ImplicitMerge;
            }
        }
    }
}
