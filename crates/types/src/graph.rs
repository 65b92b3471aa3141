//! Dependency graph edges

use serde::{Deserialize, Serialize};

/// The parent side of a graph edge.
///
/// Root parents are flavored by whether the child was declared under the
/// project's normal or build dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Parent {
    RootNormal,
    RootBuild,
    Dep(usize),
}

impl Parent {
    #[must_use]
    pub fn is_root(self) -> bool {
        matches!(self, Self::RootNormal | Self::RootBuild)
    }
}

/// A parent -> child relation in the dependency graph.
///
/// `to` is an index into the engine's dependency table. Edges are
/// recorded in processing order: breadth-first across batches,
/// per-source in row order within a batch. The emitters rely on every
/// child edge appearing at a strictly greater index than its parent's
/// edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub parent: Parent,
    pub to: usize,
    pub alias: String,
}

impl Edge {
    pub fn new(parent: Parent, to: usize, alias: impl Into<String>) -> Self {
        Self {
            parent,
            to,
            alias: alias.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_flavors_are_roots() {
        assert!(Parent::RootNormal.is_root());
        assert!(Parent::RootBuild.is_root());
        assert!(!Parent::Dep(0).is_root());
    }
}
