//! Zip archive backend.
//!
//! The central directory is indexed once at construction. Stored and
//! deflated entries are read straight from the archive file at their own
//! offset, so concurrent requests never wait on each other and a range only
//! decodes up to its end.

use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use zip::result::ZipError;
use zip::{CompressionMethod, ZipArchive};

use super::entry::{DeflatedEntry, SharedFile, StoredEntry};
use super::path;
use super::{DirEntry, FileSystem, FileType, Metadata, VfsError, VfsFile, VfsResult};
use crate::error::Error;

const LOCAL_HEADER_LEN: usize = 30;
const LOCAL_HEADER_SIGNATURE: u32 = 0x0403_4b50;

/// How an entry's bytes are laid out in the archive file
#[derive(Debug, Clone, Copy)]
enum Layout {
    Stored { start: u64 },
    Deflated { start: u64, compressed: u64 },
    /// Anything else is decompressed through the zip crate
    Other,
}

/// Regular file recorded in the archive
#[derive(Debug, Clone, Copy)]
struct Entry {
    /// Position in the central directory
    index: usize,
    layout: Layout,
}

/// Indexed archive entry
#[derive(Debug, Clone)]
struct Node {
    meta: Metadata,
    /// `None` for directories
    entry: Option<Entry>,
}

/// Read-only filesystem over the entries of one zip archive.
pub struct ZipFs {
    source: PathBuf,
    nodes: HashMap<String, Node>,
    children: HashMap<String, BTreeSet<String>>,
    file: SharedFile,
    // cloned per read for `Layout::Other`; clones share the parsed directory
    archive: ZipArchive<SharedFile>,
}

impl std::fmt::Debug for ZipFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipFs")
            .field("source", &self.source)
            .field("entries", &self.nodes.len())
            .finish_non_exhaustive()
    }
}

impl ZipFs {
    /// Open and index an archive
    ///
    /// Fails with [`Error::ArchiveOpen`] when the file is missing or its
    /// central directory cannot be read.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let source = path.as_ref().to_path_buf();
        let archive_error = |source_err| Error::ArchiveOpen {
            path: source.clone(),
            source: source_err,
        };

        let file = File::open(&source)
            .and_then(SharedFile::new)
            .map_err(|e| archive_error(ZipError::Io(e)))?;
        let mut archive = ZipArchive::new(file.clone()).map_err(archive_error)?;

        let locate = |header_start| {
            data_start(&file, header_start).map_err(|e| archive_error(ZipError::Io(e)))
        };

        let mut index = ArchiveIndex::default();
        for i in 0..archive.len() {
            let entry = archive.by_index_raw(i).map_err(archive_error)?;
            // Names that would escape the archive root are not served
            if entry.enclosed_name().is_none() {
                continue;
            }
            let name = entry.name().to_string();
            let modified = entry.last_modified().and_then(dos_time);
            if entry.is_dir() {
                index.insert(&name, Metadata::directory(modified), None);
                continue;
            }

            let size = entry.size();
            let method = entry.compression();
            let compressed = entry.compressed_size();
            let header_start = entry.header_start();
            let encrypted = entry.encrypted();
            drop(entry);

            let layout = match method {
                _ if encrypted => Layout::Other,
                CompressionMethod::Stored => Layout::Stored {
                    start: locate(header_start)?,
                },
                CompressionMethod::Deflated => Layout::Deflated {
                    start: locate(header_start)?,
                    compressed,
                },
                _ => Layout::Other,
            };
            index.insert(
                &name,
                Metadata::file(size, modified),
                Some(Entry { index: i, layout }),
            );
        }

        Ok(Self {
            source,
            nodes: index.nodes,
            children: index.children,
            file,
            archive,
        })
    }

    /// Path of the archive on disk
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Number of regular files in the archive
    pub fn file_count(&self) -> usize {
        self.nodes.values().filter(|n| n.entry.is_some()).count()
    }

    fn node(&self, virtual_path: &str) -> VfsResult<(String, &Node)> {
        let key = path::clean(virtual_path);
        match self.nodes.get(&key) {
            Some(node) => Ok((key, node)),
            None => Err(VfsError::not_found(virtual_path)),
        }
    }

    /// Decompress a whole entry through the zip crate
    fn read_buffered(&self, index: usize, virtual_path: &str) -> VfsResult<VfsFile> {
        let mut archive = self.archive.clone();
        let mut entry = archive
            .by_index(index)
            .map_err(|e| VfsError::Other(format!("failed to read '{virtual_path}': {e}")))?;

        let capacity = usize::try_from(entry.size()).unwrap_or(0);
        let mut data = Vec::with_capacity(capacity);
        entry.read_to_end(&mut data)?;
        Ok(Box::new(Cursor::new(data)))
    }
}

impl FileSystem for ZipFs {
    fn open(&self, virtual_path: &str) -> VfsResult<VfsFile> {
        let (_, node) = self.node(virtual_path)?;
        let Some(entry) = node.entry else {
            return Err(VfsError::IsADirectory(virtual_path.to_string()));
        };

        let size = node.meta.size;
        match entry.layout {
            Layout::Stored { start } => {
                Ok(Box::new(StoredEntry::new(self.file.clone(), start, size)))
            }
            Layout::Deflated { start, compressed } => Ok(Box::new(DeflatedEntry::new(
                self.file.clone(),
                start,
                compressed,
                size,
            )?)),
            Layout::Other => self.read_buffered(entry.index, virtual_path),
        }
    }

    fn stat(&self, virtual_path: &str) -> VfsResult<Metadata> {
        self.node(virtual_path).map(|(_, node)| node.meta.clone())
    }

    fn read_dir(&self, virtual_path: &str) -> VfsResult<Vec<DirEntry>> {
        let (key, node) = self.node(virtual_path)?;
        if !node.meta.is_dir() {
            return Err(VfsError::NotADirectory(virtual_path.to_string()));
        }

        let Some(names) = self.children.get(&key) else {
            return Ok(Vec::new());
        };
        Ok(names
            .iter()
            .map(|name| {
                let child = path::join(&key, name);
                match self.nodes.get(&child).map(|n| n.meta.kind) {
                    Some(FileType::Directory) => DirEntry::directory(name.as_str()),
                    _ => DirEntry::file(name.as_str()),
                }
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "zip"
    }
}

/// Offset of an entry's data, read from its local file header
fn data_start(file: &SharedFile, header_start: u64) -> io::Result<u64> {
    let mut header = [0u8; LOCAL_HEADER_LEN];
    file.read_exact_at(&mut header, header_start)?;
    let signature = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    if signature != LOCAL_HEADER_SIGNATURE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "bad local file header signature",
        ));
    }
    let name_len = u16::from_le_bytes([header[26], header[27]]);
    let extra_len = u16::from_le_bytes([header[28], header[29]]);
    Ok(header_start + LOCAL_HEADER_LEN as u64 + u64::from(name_len) + u64::from(extra_len))
}

/// Tree built from the flat list of recorded entry names
struct ArchiveIndex {
    nodes: HashMap<String, Node>,
    children: HashMap<String, BTreeSet<String>>,
}

impl Default for ArchiveIndex {
    fn default() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            "/".to_string(),
            Node {
                meta: Metadata::directory(None),
                entry: None,
            },
        );
        Self {
            nodes,
            children: HashMap::new(),
        }
    }
}

impl ArchiveIndex {
    /// Record an entry, synthesizing any parent directory the archive omits
    fn insert(&mut self, name: &str, meta: Metadata, entry: Option<Entry>) {
        let segments = path::segments(name);
        let Some((leaf, parents)) = segments.split_last() else {
            return;
        };

        let mut dir = "/".to_string();
        for segment in parents {
            self.link(&dir, segment);
            dir = path::join(&dir, segment);
            self.nodes.entry(dir.clone()).or_insert(Node {
                meta: Metadata::directory(None),
                entry: None,
            });
        }

        self.link(&dir, leaf);
        self.nodes.insert(path::join(&dir, leaf), Node { meta, entry });
    }

    fn link(&mut self, dir: &str, name: &str) {
        self.children
            .entry(dir.to_string())
            .or_default()
            .insert(name.to_string());
    }
}

/// Zip DOS timestamps carry no zone; they are read as UTC
fn dos_time(dt: zip::DateTime) -> Option<SystemTime> {
    let date = chrono::NaiveDate::from_ymd_opt(
        i32::from(dt.year()),
        u32::from(dt.month()),
        u32::from(dt.day()),
    )?;
    let naive = date.and_hms_opt(
        u32::from(dt.hour()),
        u32::from(dt.minute()),
        u32::from(dt.second()),
    )?;
    Some(SystemTime::from(naive.and_utc()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn build_archive(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("site.zip");
        let mut writer = zip::ZipWriter::new(File::create(&path).unwrap());
        let options = SimpleFileOptions::default();

        writer.start_file("index.html", options).unwrap();
        writer.write_all(b"<html>home</html>").unwrap();
        writer.add_directory("assets/", options).unwrap();
        // `assets/css/` is never recorded explicitly
        writer.start_file("assets/css/site.css", options).unwrap();
        writer.write_all(b"body { margin: 0 }").unwrap();
        writer.start_file("assets/logo.svg", options).unwrap();
        writer.write_all(b"<svg/>").unwrap();
        writer.finish().unwrap();
        path
    }

    fn read_all(fs: &ZipFs, path: &str) -> Vec<u8> {
        let mut buf = Vec::new();
        fs.open(path).unwrap().read_to_end(&mut buf).unwrap();
        buf
    }

    #[test]
    fn test_open_recorded_entries() {
        let dir = tempfile::tempdir().unwrap();
        let fs = ZipFs::open(build_archive(&dir)).unwrap();
        assert_eq!(read_all(&fs, "/index.html"), b"<html>home</html>");
        assert_eq!(read_all(&fs, "/assets/css/site.css"), b"body { margin: 0 }");
        assert_eq!(fs.stat("/assets/logo.svg").unwrap().size, 6);
        assert_eq!(fs.file_count(), 3);
    }

    #[test]
    fn test_directories_and_listing() {
        let dir = tempfile::tempdir().unwrap();
        let fs = ZipFs::open(build_archive(&dir)).unwrap();

        assert_eq!(
            fs.read_dir("/").unwrap(),
            vec![DirEntry::directory("assets"), DirEntry::file("index.html")]
        );
        assert_eq!(
            fs.read_dir("/assets/").unwrap(),
            vec![DirEntry::directory("css"), DirEntry::file("logo.svg")]
        );
        assert!(fs.stat("/assets/css").unwrap().is_dir());
        assert!(matches!(fs.open("/assets"), Err(VfsError::IsADirectory(_))));
        assert!(matches!(
            fs.read_dir("/index.html"),
            Err(VfsError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_missing_entry_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let fs = ZipFs::open(build_archive(&dir)).unwrap();
        assert!(matches!(fs.stat("/nope.txt"), Err(VfsError::NotFound(_))));
        assert!(matches!(
            fs.open("/assets/nope.css"),
            Err(VfsError::NotFound(_))
        ));
    }

    #[test]
    fn test_recorded_mtime_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dated.zip");
        let mut writer = zip::ZipWriter::new(File::create(&path).unwrap());
        let stamp = zip::DateTime::from_date_and_time(2021, 6, 15, 12, 30, 0).unwrap();
        writer
            .start_file(
                "a.txt",
                SimpleFileOptions::default().last_modified_time(stamp),
            )
            .unwrap();
        writer.write_all(b"a").unwrap();
        writer.finish().unwrap();

        let fs = ZipFs::open(&path).unwrap();
        let modified = fs.stat("/a.txt").unwrap().modified.unwrap();
        let expected = chrono::NaiveDate::from_ymd_opt(2021, 6, 15)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap()
            .and_utc();
        assert_eq!(chrono::DateTime::<chrono::Utc>::from(modified), expected);
    }

    #[test]
    fn test_open_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ZipFs::open(dir.path().join("missing.zip")),
            Err(Error::ArchiveOpen { .. })
        ));

        let bogus = dir.path().join("bogus.zip");
        std::fs::write(&bogus, b"this is not a zip archive").unwrap();
        assert!(matches!(ZipFs::open(&bogus), Err(Error::ArchiveOpen { .. })));
    }

    fn build_mixed(dir: &TempDir, body: &[u8]) -> PathBuf {
        let path = dir.path().join("mixed.zip");
        let mut writer = zip::ZipWriter::new(File::create(&path).unwrap());
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        writer.start_file("stored.bin", stored).unwrap();
        writer.write_all(body).unwrap();
        writer.start_file("packed.bin", deflated).unwrap();
        writer.write_all(body).unwrap();
        writer.finish().unwrap();
        path
    }

    fn body() -> Vec<u8> {
        (0..100_000u32).flat_map(u32::to_be_bytes).collect()
    }

    #[test]
    fn test_entries_seek_without_full_read() {
        use std::io::{Seek, SeekFrom};

        let dir = tempfile::tempdir().unwrap();
        let body = body();
        let fs = ZipFs::open(build_mixed(&dir, &body)).unwrap();

        for name in ["/stored.bin", "/packed.bin"] {
            assert_eq!(fs.stat(name).unwrap().size, body.len() as u64);
            let mut file = fs.open(name).unwrap();
            let mut buf = [0u8; 4];

            file.seek(SeekFrom::Start(200_000)).unwrap();
            file.read_exact(&mut buf).unwrap();
            assert_eq!(&buf[..], &body[200_000..200_004], "{name}");

            file.seek(SeekFrom::Start(8)).unwrap();
            file.read_exact(&mut buf).unwrap();
            assert_eq!(&buf[..], &body[8..12], "{name}");

            file.seek(SeekFrom::Start(0)).unwrap();
            let mut all = Vec::new();
            file.read_to_end(&mut all).unwrap();
            assert_eq!(all, body, "{name}");
        }
    }

    #[test]
    fn test_open_readers_do_not_block_each_other() {
        let dir = tempfile::tempdir().unwrap();
        let body = body();
        let fs = ZipFs::open(build_mixed(&dir, &body)).unwrap();

        // a reader left half-way must not hold anything the others need
        let mut parked = fs.open("/packed.bin").unwrap();
        let mut head = [0u8; 16];
        parked.read_exact(&mut head).unwrap();

        std::thread::scope(|scope| {
            let workers: Vec<_> = (0..4)
                .map(|i| {
                    let fs = &fs;
                    let name = if i % 2 == 0 { "/stored.bin" } else { "/packed.bin" };
                    scope.spawn(move || read_all(fs, name).len())
                })
                .collect();
            for worker in workers {
                assert_eq!(worker.join().unwrap(), body.len());
            }
        });

        let mut rest = Vec::new();
        parked.read_to_end(&mut rest).unwrap();
        assert_eq!(head.len() + rest.len(), body.len());
        assert_eq!(&rest[..4], &body[16..20]);
    }
}
