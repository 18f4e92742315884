//! In-memory fakes of the three external collaborators (spec.md §6), used
//! to exercise the scheduler and fix-up generator end-to-end without a real
//! CVS server or fast-import writer. Only compiled for this crate's own
//! tests or by downstream crates that opt in with the `testing` feature,
//! mirroring `examples/jj-vcs-jj/lib`'s own `testing` Cargo feature.

use std::collections::HashMap;

use crate::ids::{FileId, Mark, VersionId};
use crate::interfaces::{ContentFetcher, FetchError, FileChange, OutputSink, SinkError};

/// A [`ContentFetcher`] backed by an in-memory table populated ahead of
/// time, standing in for a real connection to the legacy server.
#[derive(Debug, Default)]
pub struct FakeContentFetcher {
    blobs: HashMap<(FileId, VersionId), Vec<u8>>,
}

impl FakeContentFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, file: FileId, version: VersionId, content: impl Into<Vec<u8>>) {
        self.blobs.insert((file, version), content.into());
    }
}

impl ContentFetcher for FakeContentFetcher {
    fn fetch(&mut self, file: FileId, version: VersionId) -> Result<Vec<u8>, FetchError> {
        self.blobs
            .get(&(file, version))
            .cloned()
            .ok_or_else(|| FetchError::ProtocolDeviation(format!("no fake blob for {file}/{version}")))
    }
}

/// One record captured by [`RecordingSink`], in the shape spec.md §6
/// describes for the fast-import-style stream.
#[derive(Debug, Clone)]
pub enum Record {
    Blob { mark: Mark, len: usize },
    Commit {
        ref_name: String,
        mark: Mark,
        author: String,
        epoch: i64,
        message: String,
        changes: Vec<FileChange>,
    },
    Reset { ref_name: String, from: Option<Mark> },
    ProgressDone,
}

/// An [`OutputSink`] that records every call instead of writing bytes, so
/// integration tests can assert on the emitted sequence directly.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub records: Vec<Record>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OutputSink for RecordingSink {
    fn blob(&mut self, mark: Mark, data: &[u8]) -> Result<(), SinkError> {
        self.records.push(Record::Blob {
            mark,
            len: data.len(),
        });
        Ok(())
    }

    fn commit(
        &mut self,
        ref_name: &str,
        mark: Mark,
        author: &str,
        epoch: i64,
        message: &str,
        changes: &[FileChange],
    ) -> Result<(), SinkError> {
        self.records.push(Record::Commit {
            ref_name: ref_name.to_string(),
            mark,
            author: author.to_string(),
            epoch,
            message: message.to_string(),
            changes: changes.to_vec(),
        });
        Ok(())
    }

    fn reset(&mut self, ref_name: &str, from: Option<Mark>) -> Result<(), SinkError> {
        self.records.push(Record::Reset {
            ref_name: ref_name.to_string(),
            from,
        });
        Ok(())
    }

    fn progress_done(&mut self) -> Result<(), SinkError> {
        self.records.push(Record::ProgressDone);
        Ok(())
    }
}
