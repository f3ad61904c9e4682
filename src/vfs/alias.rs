//! Alias filesystem backend.
//!
//! The root lists the configured aliases. `/<alias>/<rest>` resolves to
//! `<target>/<rest>` on the real filesystem. An alias whose target is a
//! regular file is presented as a directory holding just that file, so
//! `/<alias>/<file name>` serves it and every alias can be traversed the
//! same way.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::path;
use super::{DirEntry, FileSystem, Metadata, VfsError, VfsFile, VfsResult};
use crate::pathspec::AliasMap;

/// Where a virtual path lands after alias resolution
#[derive(Debug, PartialEq, Eq)]
enum Resolved {
    /// The virtual root, listing aliases
    Root,
    /// A real filesystem entry
    Real(PathBuf),
    /// Synthetic directory wrapping a file alias
    FileAlias { file: PathBuf, name: String },
}

/// Filesystem that maps aliases onto real directories and files.
#[derive(Debug, Clone)]
pub struct AliasFs {
    aliases: Arc<AliasMap>,
}

impl AliasFs {
    pub const fn new(aliases: Arc<AliasMap>) -> Self {
        Self { aliases }
    }

    pub fn aliases(&self) -> &AliasMap {
        &self.aliases
    }

    fn resolve(&self, virtual_path: &str) -> VfsResult<Resolved> {
        let segments = path::segments(virtual_path);
        let Some((alias, rest)) = segments.split_first() else {
            return Ok(Resolved::Root);
        };

        let target = self
            .aliases
            .get(alias)
            .ok_or_else(|| VfsError::not_found(virtual_path))?;

        let meta = fs::metadata(target).map_err(|e| VfsError::from_io(e, target))?;
        if meta.is_dir() {
            let real = rest.iter().fold(target.to_path_buf(), |p, s| p.join(s));
            return Ok(Resolved::Real(real));
        }

        let name = file_name(target);
        match rest {
            [] => Ok(Resolved::FileAlias {
                file: target.to_path_buf(),
                name,
            }),
            [only] if *only == name => Ok(Resolved::Real(target.to_path_buf())),
            _ => Err(VfsError::not_found(virtual_path)),
        }
    }
}

impl FileSystem for AliasFs {
    fn open(&self, virtual_path: &str) -> VfsResult<VfsFile> {
        match self.resolve(virtual_path)? {
            Resolved::Root | Resolved::FileAlias { .. } => {
                Err(VfsError::IsADirectory(virtual_path.to_string()))
            }
            Resolved::Real(real) => {
                let meta = fs::metadata(&real).map_err(|e| VfsError::from_io(e, &real))?;
                if meta.is_dir() {
                    return Err(VfsError::IsADirectory(virtual_path.to_string()));
                }
                let file = fs::File::open(&real).map_err(|e| VfsError::from_io(e, &real))?;
                Ok(Box::new(file))
            }
        }
    }

    fn stat(&self, virtual_path: &str) -> VfsResult<Metadata> {
        match self.resolve(virtual_path)? {
            Resolved::Root => Ok(Metadata::directory(None)),
            Resolved::FileAlias { file, .. } => {
                let meta = fs::metadata(&file).map_err(|e| VfsError::from_io(e, &file))?;
                Ok(Metadata::directory(meta.modified().ok()))
            }
            Resolved::Real(real) => fs::metadata(&real)
                .map(|m| Metadata::from_std(&m))
                .map_err(|e| VfsError::from_io(e, &real)),
        }
    }

    fn read_dir(&self, virtual_path: &str) -> VfsResult<Vec<DirEntry>> {
        match self.resolve(virtual_path)? {
            Resolved::Root => Ok(self
                .aliases
                .aliases()
                .into_iter()
                .map(DirEntry::directory)
                .collect()),
            Resolved::FileAlias { name, .. } => Ok(vec![DirEntry::file(name)]),
            Resolved::Real(real) => list_real_dir(&real, virtual_path),
        }
    }

    fn name(&self) -> &'static str {
        "alias"
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn list_real_dir(dir: &Path, virtual_path: &str) -> VfsResult<Vec<DirEntry>> {
    let meta = fs::metadata(dir).map_err(|e| VfsError::from_io(e, dir))?;
    if !meta.is_dir() {
        return Err(VfsError::NotADirectory(virtual_path.to_string()));
    }

    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| VfsError::from_io(e, dir))? {
        let entry = entry.map_err(|e| VfsError::from_io(e, dir))?;
        // Follow symlinks; dangling links are skipped
        let Ok(meta) = fs::metadata(entry.path()) else {
            continue;
        };
        let name = entry.file_name().to_string_lossy().into_owned();
        entries.push(if meta.is_dir() {
            DirEntry::directory(name)
        } else {
            DirEntry::file(name)
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}
