//! Dotted-decimal RCS version numbers (`1.2`, `1.2.3.4`, ...).
//!
//! CVS/RCS encode both ordinary revisions and branch numbers in the same
//! dotted-decimal form. This module implements parsing, predecessor
//! computation, and the `X.Y.0.Z` "magic branch number" normalization
//! described in spec.md §3/§4.B.

use std::cmp::Ordering;
use std::fmt;

/// A parsed dotted-decimal version, e.g. `1.2.3.4` -> `[1, 2, 3, 4]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DottedVersion(Vec<u32>);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("malformed revision number `{0}`")]
pub struct ParseError(pub String);

impl DottedVersion {
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        if s.is_empty() {
            return Err(ParseError(s.to_string()));
        }
        let mut parts = Vec::new();
        for piece in s.split('.') {
            let n: u32 = piece.parse().map_err(|_| ParseError(s.to_string()))?;
            parts.push(n);
        }
        if parts.len() < 2 {
            return Err(ParseError(s.to_string()));
        }
        Ok(DottedVersion(parts))
    }

    pub fn components(&self) -> &[u32] {
        &self.0
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Is this an `X.Y.0.Z` magic branch number (second-to-last component is
    /// literal zero)?
    pub fn is_magic_branch(&self) -> bool {
        self.0.len() >= 2 && self.0[self.0.len() - 2] == 0
    }

    /// Normalizes `X.Y.0.Z` to branch form `X.Y.Z`. Non-magic versions are
    /// returned unchanged. Per spec.md §3.
    pub fn normalize_branch(&self) -> DottedVersion {
        if !self.is_magic_branch() {
            return self.clone();
        }
        let n = self.0.len();
        let mut out = self.0[..n - 2].to_vec();
        out.push(self.0[n - 1]);
        DottedVersion(out)
    }

    /// The RCS lexical predecessor of this revision, or `None` if this is a
    /// trunk root (depth 2, last component == 1). For a branch revision
    /// (depth > 2, last component == 1), the predecessor is the branch
    /// point: the same number with its last two components dropped.
    /// Per spec.md §4.B ("resolve each version's parent by repeatedly
    /// computing the lexical predecessor ... until a present version is
    /// found, or none exists").
    pub fn predecessor(&self) -> Option<DottedVersion> {
        let n = self.0.len();
        let last = self.0[n - 1];
        if last > 1 {
            let mut out = self.0.clone();
            out[n - 1] -= 1;
            Some(DottedVersion(out))
        } else if n == 2 {
            None
        } else {
            Some(DottedVersion(self.0[..n - 2].to_vec()))
        }
    }

    /// Drops the last component, e.g. `1.2.4.3` -> `1.2.4`. Used twice over
    /// in branch handling: applied to a branch-revision version number it
    /// yields the branch's own (odd-depth) number; applied to a branch
    /// number it yields the branch point (the even-depth revision the
    /// branch forks from).
    pub fn drop_last(&self) -> DottedVersion {
        debug_assert!(self.0.len() > 1);
        DottedVersion(self.0[..self.0.len() - 1].to_vec())
    }

    /// True if `self` is a direct branch revision off `branch_point`, i.e.
    /// `branch_point` appended with two more components ending in 1
    /// (`1.2` -> first rev on that branch is `1.2.x.1`).
    pub fn is_first_on_branch_from(&self, branch_point: &DottedVersion) -> bool {
        let n = self.0.len();
        n == branch_point.0.len() + 2
            && self.0[..n - 2] == branch_point.0[..]
            && self.0[n - 1] == 1
    }
}

impl fmt::Display for DottedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, c) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

impl PartialOrd for DottedVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DottedVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}
