use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Opaque reference to a finalized audio resource (a file path for the
/// device backends). Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClipHandle(String);

impl ClipHandle {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// A blank handle can never name a resource.
    pub fn is_resolvable(&self) -> bool {
        !self.0.trim().is_empty()
    }

    pub fn to_path(&self) -> PathBuf {
        PathBuf::from(&self.0)
    }
}

impl From<&Path> for ClipHandle {
    fn from(path: &Path) -> Self {
        Self(path.to_string_lossy().into_owned())
    }
}

impl fmt::Display for ClipHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Saved clips in insertion order, which is also display and play order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClipList(Vec<ClipHandle>);

impl ClipList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, handle: ClipHandle) {
        self.0.push(handle);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Look up a clip by its 1-based display position.
    pub fn get_numbered(&self, number: usize) -> Option<&ClipHandle> {
        number.checked_sub(1).and_then(|i| self.0.get(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClipHandle> {
        self.0.iter()
    }
}

#[cfg(test)]
impl From<Vec<ClipHandle>> for ClipList {
    fn from(handles: Vec<ClipHandle>) -> Self {
        Self(handles)
    }
}

impl FromIterator<ClipHandle> for ClipList {
    fn from_iter<I: IntoIterator<Item = ClipHandle>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
