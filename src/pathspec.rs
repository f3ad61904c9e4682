//! Pathspec parsing
//!
//! A pathspec is a space-separated list of `path` or `path:alias` tokens.
//! Each token becomes one entry of the [`AliasMap`], keyed by its alias.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

/// Alias to absolute filesystem path mapping
///
/// Immutable once parsed. Shared read-only between the alias filesystem
/// and the request router.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasMap {
    entries: HashMap<String, PathBuf>,
}

impl AliasMap {
    pub fn get(&self, alias: &str) -> Option<&Path> {
        self.entries.get(alias).map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The only alias, if exactly one is configured
    pub fn sole_alias(&self) -> Option<&str> {
        if self.entries.len() == 1 {
            self.entries.keys().next().map(String::as_str)
        } else {
            None
        }
    }

    /// Alias names in sorted order
    pub fn aliases(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.entries
            .iter()
            .map(|(alias, path)| (alias.as_str(), path.as_path()))
    }
}

impl FromIterator<(String, PathBuf)> for AliasMap {
    fn from_iter<I: IntoIterator<Item = (String, PathBuf)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Parse a pathspec into an [`AliasMap`]
///
/// Later tokens overwrite earlier ones that share an alias. Paths are made
/// absolute against the current working directory but are not required to
/// exist.
///
/// # Examples
/// ```
/// let map = fileserver::pathspec::parse("/srv/docs /tmp/notes.txt:notes").unwrap();
/// assert_eq!(map.get("docs"), Some(std::path::Path::new("/srv/docs")));
/// assert_eq!(map.get("notes"), Some(std::path::Path::new("/tmp/notes.txt")));
/// ```
pub fn parse(pathspec: &str) -> Result<AliasMap> {
    let mut entries = HashMap::new();
    for token in pathspec.split(' ') {
        let (alias, path) = parse_token(token)?;
        entries.insert(alias, path);
    }
    Ok(AliasMap { entries })
}

/// Parse one `path` or `path:alias` token
fn parse_token(token: &str) -> Result<(String, PathBuf)> {
    if token.is_empty() {
        return Err(Error::malformed("empty path entry"));
    }

    let parts: Vec<&str> = token.split(':').collect();
    let (path, explicit_alias) = match parts.as_slice() {
        [path] => (*path, None),
        [path, alias] => (*path, Some(*alias)),
        _ => {
            return Err(Error::malformed(format!(
                "too many delimiters in '{token}'"
            )))
        }
    };

    if path.is_empty() {
        return Err(Error::malformed(format!("missing path in '{token}'")));
    }

    let absolute = clean_lexically(&std::path::absolute(path)?);

    let alias = match explicit_alias {
        Some(alias) => {
            validate_alias(alias, token)?;
            alias.to_string()
        }
        None => derive_alias(Path::new(path), &absolute)
            .ok_or_else(|| Error::malformed(format!("cannot derive an alias from '{token}'")))?,
    };

    Ok((alias, absolute))
}

/// Final path component of the token, falling back to the absolute form
/// for tokens such as `.` that have none
fn derive_alias(path: &Path, absolute: &Path) -> Option<String> {
    path.file_name()
        .or_else(|| absolute.file_name())
        .map(|name| name.to_string_lossy().into_owned())
}

/// Drop `.` and resolve `..` against the preceding component without
/// touching the filesystem; `..` at the root stays at the root
fn clean_lexically(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                cleaned.pop();
            }
            other => cleaned.push(other),
        }
    }
    cleaned
}

fn validate_alias(alias: &str, token: &str) -> Result<()> {
    if alias.is_empty() || alias == "." || alias == ".." || alias.contains('/') {
        return Err(Error::malformed(format!(
            "alias in '{token}' must be a single path segment"
        )));
    }
    Ok(())
}
