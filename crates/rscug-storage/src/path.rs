//! Path utilities for the content tree.
//!
//! Paths are absolute, `/`-separated and never end with a slash, except for
//! the root path `/` itself.

use crate::error::{StorageError, StorageResult};

/// The root path.
pub const ROOT_PATH: &str = "/";

/// Validates a single node or property name.
pub fn validate_name(name: &str) -> StorageResult<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') {
        return Err(StorageError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Validates an absolute path.
pub fn validate_path(path: &str) -> StorageResult<()> {
    if path == ROOT_PATH {
        return Ok(());
    }
    if !path.starts_with('/') || path.ends_with('/') {
        return Err(StorageError::InvalidPath {
            path: path.to_string(),
        });
    }
    for element in path[1..].split('/') {
        validate_name(element).map_err(|_| StorageError::InvalidPath {
            path: path.to_string(),
        })?;
    }
    Ok(())
}

/// Returns true for the root path.
pub fn denotes_root(path: &str) -> bool {
    path == ROOT_PATH
}

/// Iterates over the names of a path, root first.
pub fn elements(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|e| !e.is_empty())
}

/// Number of elements in the path; the root has depth 0.
pub fn depth(path: &str) -> usize {
    elements(path).count()
}

/// Returns the parent path, or `None` for the root.
pub fn parent(path: &str) -> Option<&str> {
    if denotes_root(path) {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some(ROOT_PATH),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

/// Returns the last element of the path (empty for the root).
pub fn name(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Joins a parent path and a relative path.
pub fn concat(parent: &str, relative: &str) -> String {
    if relative.is_empty() {
        return parent.to_string();
    }
    if denotes_root(parent) {
        format!("/{relative}")
    } else {
        format!("{parent}/{relative}")
    }
}

/// True when `ancestor` is a strict ancestor of `path`.
pub fn is_ancestor(ancestor: &str, path: &str) -> bool {
    if ancestor == path {
        return false;
    }
    if denotes_root(ancestor) {
        return !denotes_root(path);
    }
    path.len() > ancestor.len()
        && path.starts_with(ancestor)
        && path.as_bytes()[ancestor.len()] == b'/'
}

/// True when `ancestor` equals `path` or is one of its ancestors.
pub fn is_ancestor_or_self(ancestor: &str, path: &str) -> bool {
    ancestor == path || is_ancestor(ancestor, path)
}

/// Returns `path` relative to `ancestor`, or `None` if it is not a descendant.
///
/// The result for `path == ancestor` is the empty string.
pub fn relative_to<'a>(ancestor: &str, path: &'a str) -> Option<&'a str> {
    if ancestor == path {
        return Some("");
    }
    if !is_ancestor(ancestor, path) {
        return None;
    }
    if denotes_root(ancestor) {
        Some(&path[1..])
    } else {
        Some(&path[ancestor.len() + 1..])
    }
}

/// Returns the path and all of its ancestors, nearest first, ending with `/`.
pub fn ancestors_or_self(path: &str) -> Vec<&str> {
    let mut chain = vec![path];
    let mut current = path;
    while let Some(p) = parent(current) {
        chain.push(p);
        current = p;
    }
    chain
}
