#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Dependency resolution and fetch engine for pakt
//!
//! The engine takes a project's declared dependencies, resolves each
//! one against the prior lockfile, fetches the transitive closure
//! breadth-first with one worker per queued dependency, and emits a
//! refreshed `pakt.lock` plus the generated `deps.zig` consumed by the
//! Zig build system.

mod emit;
mod engine;
mod lockfile;
mod queue;
mod table;

pub use emit::BuildPkg;
pub use engine::{Engine, CACHE_DIR, DEPS_FILE, LOCKFILE};
