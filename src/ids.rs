//! Arena index newtypes.
//!
//! Every entity the core owns (file, version, tag, changeset) lives in a
//! `Vec` inside [`crate::database::Database`]; these newtypes are the
//! non-owning handles entities use to refer to each other. This avoids the
//! intrusive-pointer cycles the original C model relies on (version -> branch
//! -> tag -> changeset -> version) while keeping O(1) lookup.

use std::fmt;

macro_rules! arena_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(u32);

        impl $name {
            pub(crate) fn new(index: usize) -> Self {
                Self(index.try_into().expect("arena index overflowed u32"))
            }

            pub fn index(self) -> usize {
                self.0 as usize
            }

            /// A value that never occurs as a real arena index, used as a
            /// tombstone sentinel by callers that need one without widening
            /// every reference into an `Option`.
            pub const fn sentinel() -> Self {
                Self(u32::MAX)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}:{}", stringify!($name), self.0)
            }
        }
    };
}

arena_id!(FileId);
arena_id!(VersionId);
arena_id!(TagId);
arena_id!(ChangesetId);

/// A monotonically increasing external identity assigned to an emitted blob
/// or commit, corresponding to a fast-import `mark`. Unassigned marks are
/// represented by `Option<Mark>` rather than a sentinel value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Mark(u64);

impl Mark {
    pub fn get(self) -> u64 {
        self.0
    }

    /// Constructs an arbitrary `Mark` directly, bypassing [`MarkCounter`].
    /// Only meaningful for tests and test fakes, which need to hand out
    /// marks without running a full emission pass.
    #[cfg(any(test, feature = "testing"))]
    pub fn for_test(value: u64) -> Self {
        Self(value)
    }
}

/// Hands out strictly increasing [`Mark`]s, starting at 1 (mark 0 is never
/// used so that `Option<Mark>` and a hypothetical sentinel never collide).
#[derive(Debug, Default)]
pub struct MarkCounter(u64);

impl MarkCounter {
    pub fn next(&mut self) -> Mark {
        self.0 += 1;
        Mark(self.0)
    }

    pub fn last_issued(&self) -> u64 {
        self.0
    }
}
