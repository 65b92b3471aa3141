//! Append-only dependency table
//!
//! Every dependency encountered during a run gets a stable 0-based
//! index here. Entries are never reordered or removed before engine
//! teardown; edges and resolution back-references index into this
//! table.

use pakt_types::{Dependency, Parent};

#[derive(Debug, Default)]
pub(crate) struct DepTable {
    deps: Vec<Dependency>,
    /// Parent of each dep, same indexing as `deps`
    parents: Vec<Parent>,
}

impl DepTable {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            deps: Vec::with_capacity(capacity),
            parents: Vec::with_capacity(capacity),
        }
    }

    /// Append a dependency, returning its index
    pub fn push(&mut self, dep: Dependency, parent: Parent) -> usize {
        let idx = self.deps.len();
        self.deps.push(dep);
        self.parents.push(parent);
        idx
    }

    pub fn get(&self, idx: usize) -> &Dependency {
        &self.deps[idx]
    }

    pub fn parent(&self, idx: usize) -> Parent {
        self.parents[idx]
    }

    pub fn len(&self) -> usize {
        self.deps.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pakt_types::{LocalSource, Source};

    fn local_dep(alias: &str) -> Dependency {
        Dependency::new(
            alias,
            Source::Local(LocalSource {
                path: alias.into(),
            }),
        )
    }

    #[test]
    fn indices_are_stable_and_monotonic() {
        let mut table = DepTable::with_capacity(2);
        assert_eq!(table.push(local_dep("a"), Parent::RootNormal), 0);
        assert_eq!(table.push(local_dep("b"), Parent::RootBuild), 1);
        assert_eq!(table.push(local_dep("c"), Parent::Dep(0)), 2);

        assert_eq!(table.len(), 3);
        assert_eq!(table.get(2).alias, "c");
        assert_eq!(table.parent(2), Parent::Dep(0));
        assert_eq!(table.parent(0), Parent::RootNormal);
    }
}
