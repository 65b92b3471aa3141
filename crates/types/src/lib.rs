#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Shared type definitions for pakt
//!
//! The vocabulary of the fetch engine: declared dependencies, their
//! source descriptors, and the parent/child edges of the resolved graph.

mod graph;
mod source;

pub use graph::{Edge, Parent};
pub use source::{Dependency, GitSource, LocalSource, PkgSource, Source, SourceKind, UrlSource};
