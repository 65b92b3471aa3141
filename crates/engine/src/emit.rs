//! Generated build-graph output
//!
//! Two consumers walk the engine's accumulated edge list: the textual
//! `deps.zig` for normal dependencies, and an in-memory package tree
//! for build dependencies. Both rely on the edge-order invariant that
//! every child edge sits at a strictly greater index than its parent's
//! edge.

use pakt_manifest::{Project, DEFAULT_ROOT};
use pakt_types::{Edge, Parent};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// One node of the build-dependency tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPkg {
    pub name: String,
    pub path: PathBuf,
    pub dependencies: Vec<BuildPkg>,
}

/// Render the generated deps.zig source
pub(crate) fn render_deps_file(
    project: &Project,
    edges: &[Edge],
    paths: &HashMap<usize, PathBuf>,
) -> String {
    let mut out = String::new();
    out.push_str("const std = @import(\"std\");\n");
    out.push_str("const Pkg = std.build.Pkg;\n");
    out.push_str("const FileSource = std.build.FileSource;\n\n");
    out.push_str("pub const pkgs = struct {\n");

    let roots: Vec<usize> = edges
        .iter()
        .enumerate()
        .filter(|(_, edge)| edge.parent == Parent::RootNormal)
        .map(|(idx, _)| idx)
        .collect();

    for &root_idx in &roots {
        write_tree(&mut out, edges, paths, root_idx);
        out.push('\n');
    }

    out.push_str("    pub fn addAllTo(artifact: *std.build.LibExeObjStep) void {\n");
    for &root_idx in &roots {
        let _ = writeln!(
            out,
            "        artifact.addPackage(pkgs.{});",
            escape_ident(&edges[root_idx].alias)
        );
    }
    out.push_str("    }\n};\n");

    if !project.packages.is_empty() {
        write_exports(&mut out, project, edges, &roots);
    }

    out
}

/// Expand the build-dependency subtrees into owned records
pub(crate) fn build_graph(edges: &[Edge], paths: &HashMap<usize, PathBuf>) -> Vec<BuildPkg> {
    edges
        .iter()
        .enumerate()
        .filter(|(_, edge)| edge.parent == Parent::RootBuild)
        .map(|(idx, _)| expand(edges, paths, idx))
        .collect()
}

/// Node indentation schedule, in 4-space levels: the root package sits
/// one level in; the first descent adds two levels, every deeper
/// descent adds three. Part of the generated-file contract.
fn node_indent(depth: usize) -> usize {
    match depth {
        0 => 1,
        1 => 3,
        deeper => 3 * deeper,
    }
}

fn push_indent(out: &mut String, levels: usize) {
    for _ in 0..levels {
        out.push_str("    ");
    }
}

fn write_field(out: &mut String, levels: usize, name: &str, value: &str) {
    push_indent(out, levels);
    let _ = writeln!(out, ".{name} = {value},");
}

fn write_node_open(out: &mut String, edges: &[Edge], paths: &HashMap<usize, PathBuf>, edge_idx: usize, depth: usize) {
    let edge = &edges[edge_idx];
    let fields = node_indent(depth) + 1;
    write_field(out, fields, "name", &format!("\"{}\"", edge.alias));
    write_field(
        out,
        fields,
        "path",
        &format!(
            "FileSource{{ .path = \"{}\" }}",
            paths
                .get(&edge.to)
                .map(|path| escape_path(path))
                .unwrap_or_default()
        ),
    );
}

/// Write one root package and its whole subtree, using an explicit
/// work stack over the edge list.
fn write_tree(out: &mut String, edges: &[Edge], paths: &HashMap<usize, PathBuf>, root_idx: usize) {
    struct Frame {
        current: usize,
        cursor: usize,
        has_deps: bool,
    }

    let root = &edges[root_idx];
    push_indent(out, 1);
    let _ = writeln!(out, "pub const {} = Pkg{{", escape_ident(&root.alias));
    write_node_open(out, edges, paths, root_idx, 0);

    let mut stack: Vec<Frame> = Vec::new();
    let mut current = root.to;
    let mut cursor = root_idx + 1;
    let mut has_deps = false;
    let mut depth = 0usize;

    loop {
        if cursor >= edges.len() {
            let Some(frame) = stack.pop() else {
                break;
            };
            // Close the node we were expanding, then resume scanning
            // for further children of its parent.
            if has_deps {
                push_indent(out, node_indent(depth) + 1);
                out.push_str("},\n");
            }
            push_indent(out, node_indent(depth));
            out.push_str("},\n");
            current = frame.current;
            cursor = frame.cursor + 1;
            has_deps = frame.has_deps;
            depth -= 1;
            continue;
        }

        if edges[cursor].parent == Parent::Dep(current) {
            if !has_deps {
                push_indent(out, node_indent(depth) + 1);
                out.push_str(".dependencies = &[_]Pkg{\n");
                has_deps = true;
            }
            push_indent(out, node_indent(depth + 1));
            out.push_str("Pkg{\n");
            write_node_open(out, edges, paths, cursor, depth + 1);

            stack.push(Frame {
                current,
                cursor,
                has_deps,
            });
            current = edges[cursor].to;
            depth += 1;
            cursor += 1;
            has_deps = false;
        } else {
            cursor += 1;
        }
    }

    if has_deps {
        push_indent(out, 2);
        out.push_str("},\n");
    }
    push_indent(out, 1);
    out.push_str("};\n");
}

fn write_exports(out: &mut String, project: &Project, edges: &[Edge], roots: &[usize]) {
    out.push_str("\npub const exports = struct {\n");
    for (name, package) in &project.packages {
        push_indent(out, 1);
        let _ = writeln!(out, "pub const {} = Pkg{{", escape_ident(name));
        write_field(out, 2, "name", &format!("\"{name}\""));
        let root = package
            .root
            .as_deref()
            .map_or_else(|| DEFAULT_ROOT.to_string(), escape_path);
        write_field(out, 2, "path", &format!("FileSource{{ .path = \"{root}\" }}"));

        if roots.is_empty() {
            write_field(out, 2, "dependencies", "&[_]Pkg{}");
        } else {
            push_indent(out, 2);
            out.push_str(".dependencies = &[_]Pkg{\n");
            for &root_idx in roots {
                push_indent(out, 3);
                let _ = writeln!(out, "pkgs.{},", escape_ident(&edges[root_idx].alias));
            }
            push_indent(out, 2);
            out.push_str("},\n");
        }
        push_indent(out, 1);
        out.push_str("};\n");
    }
    out.push_str("};\n");
}

fn expand(edges: &[Edge], paths: &HashMap<usize, PathBuf>, root_idx: usize) -> BuildPkg {
    let make = |edge: &Edge| BuildPkg {
        name: edge.alias.clone(),
        path: paths.get(&edge.to).cloned().unwrap_or_default(),
        dependencies: Vec::new(),
    };

    let mut node = make(&edges[root_idx]);
    let mut stack: Vec<(usize, usize, BuildPkg)> = Vec::new();
    let mut current = edges[root_idx].to;
    let mut cursor = root_idx + 1;

    loop {
        if cursor >= edges.len() {
            let Some((saved_cursor, saved_current, mut parent)) = stack.pop() else {
                break;
            };
            parent.dependencies.push(node);
            node = parent;
            cursor = saved_cursor + 1;
            current = saved_current;
            continue;
        }

        if edges[cursor].parent == Parent::Dep(current) {
            stack.push((cursor, current, node));
            node = make(&edges[cursor]);
            current = edges[cursor].to;
            cursor += 1;
        } else {
            cursor += 1;
        }
    }

    node
}

const ZIG_KEYWORDS: &[&str] = &[
    "addrspace",
    "align",
    "allowzero",
    "and",
    "anyframe",
    "anytype",
    "asm",
    "async",
    "await",
    "break",
    "callconv",
    "catch",
    "comptime",
    "const",
    "continue",
    "defer",
    "else",
    "enum",
    "errdefer",
    "error",
    "export",
    "extern",
    "fn",
    "for",
    "if",
    "inline",
    "linksection",
    "noalias",
    "noinline",
    "nosuspend",
    "opaque",
    "or",
    "orelse",
    "packed",
    "pub",
    "resume",
    "return",
    "struct",
    "suspend",
    "switch",
    "test",
    "threadlocal",
    "try",
    "union",
    "unreachable",
    "usingnamespace",
    "var",
    "volatile",
    "while",
];

/// Quote an alias that is not a valid bare Zig identifier
fn escape_ident(alias: &str) -> String {
    let mut chars = alias.chars();
    let bare = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
                && !ZIG_KEYWORDS.contains(&alias)
        }
        _ => false,
    };
    if bare {
        alias.to_string()
    } else {
        format!("@\"{alias}\"")
    }
}

/// Double path separators that would collide with the string escape
/// in the generated literal.
fn escape_path(path: &Path) -> String {
    path.display().to_string().replace('\\', "\\\\")
}
