//! Git reference descriptions.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Kind of a git reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefKind {
    /// A branch head.
    Branch,
    /// A tag.
    Tag,
}

impl fmt::Display for RefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Branch => write!(f, "branch"),
            Self::Tag => write!(f, "tag"),
        }
    }
}

/// A reference whose tip is a particular commit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RefDescription {
    /// Short reference name (`main`, `v1.2.3`).
    pub name: String,
    /// Branch or tag.
    pub kind: RefKind,
}

impl RefDescription {
    /// Describes a branch.
    #[must_use]
    pub fn branch(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: RefKind::Branch,
        }
    }

    /// Describes a tag.
    #[must_use]
    pub fn tag(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: RefKind::Tag,
        }
    }
}

/// Map from commit hash to the references tipping that commit.
pub type RefDescriptions = HashMap<String, Vec<RefDescription>>;
