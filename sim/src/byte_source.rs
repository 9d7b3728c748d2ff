//! Resolving bare ROM file names to bytes.
//!
//! ROM sets come either unpacked in a directory or as a MAME-style `.zip`.
//! [`FileSearch`] looks through an ordered list of both; the first entry
//! that has the name wins.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use zip::ZipArchive;
use zip::result::ZipError;

use crate::error::{Result, SimError};

/// Anything that can turn a logical file name into its contents.
pub trait ByteSource {
    /// Returns the full contents of `name`, or [`SimError::NotFound`].
    fn fetch(&mut self, name: &str) -> Result<Vec<u8>>;
}

enum SearchEntry {
    Directory(PathBuf),
    Archive {
        path: PathBuf,
        archive: ZipArchive<BufReader<File>>,
    },
}

#[derive(Default)]
pub struct FileSearch {
    entries: Vec<SearchEntry>,
}

impl FileSearch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a directory or a `.zip` file to the search list. Archives
    /// are opened once here and kept open.
    pub fn add_search_path(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let invalid = |reason: &str| SimError::InvalidSearchPath {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };

        if path.is_dir() {
            self.entries.push(SearchEntry::Directory(path.to_path_buf()));
            tracing::info!("Added directory to search path: {}", path.display());
            return Ok(());
        }

        if !path.is_file() {
            return Err(invalid("does not exist"));
        }

        let is_zip = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
        if !is_zip {
            return Err(invalid("file is not a zip archive"));
        }

        let archive = ZipArchive::new(BufReader::new(File::open(path)?))?;
        self.entries.push(SearchEntry::Archive {
            path: path.to_path_buf(),
            archive,
        });
        tracing::info!("Added zip file to search path: {}", path.display());
        Ok(())
    }

    pub fn clear_search_paths(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ByteSource for FileSearch {
    fn fetch(&mut self, name: &str) -> Result<Vec<u8>> {
        for entry in &mut self.entries {
            match entry {
                SearchEntry::Directory(dir) => {
                    let candidate = dir.join(name);
                    if candidate.is_file() {
                        let data = fs::read(&candidate)?;
                        tracing::debug!("Loaded file from directory: {}", candidate.display());
                        return Ok(data);
                    }
                }
                SearchEntry::Archive { path, archive } => match archive.by_name(name) {
                    Ok(mut file) => {
                        let mut data = Vec::new();
                        file.read_to_end(&mut data)?;
                        tracing::debug!("Loaded file from zip: {} -> {name}", path.display());
                        return Ok(data);
                    }
                    Err(ZipError::FileNotFound) => {}
                    Err(e) => {
                        tracing::warn!(
                            "Failed to extract {name} from zip {}: {e}",
                            path.display()
                        );
                    }
                },
            }
        }

        Err(SimError::NotFound {
            name: name.to_string(),
        })
    }
}

/// Name to bytes map, for tests and for callers that already hold the
/// images.
#[derive(Debug, Default, Clone)]
pub struct InMemorySource {
    files: HashMap<String, Vec<u8>>,
}

impl InMemorySource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, data: Vec<u8>) {
        self.files.insert(name.into(), data);
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, data: Vec<u8>) -> Self {
        self.insert(name, data);
        self
    }
}

impl ByteSource for InMemorySource {
    fn fetch(&mut self, name: &str) -> Result<Vec<u8>> {
        self.files
            .get(name)
            .cloned()
            .ok_or_else(|| SimError::NotFound {
                name: name.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use pretty_assertions::assert_eq;
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    use super::*;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("f2sim-{tag}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_zip(path: &Path, files: &[(&str, &[u8])]) {
        let mut zip = ZipWriter::new(File::create(path).unwrap());
        for (name, data) in files {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn first_search_path_wins() {
        let root = scratch_dir("search-order");
        let dir = root.join("unpacked");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("b82-09.ic23"), [1, 2, 3]).unwrap();

        let zip_path = root.join("finalb.zip");
        write_zip(
            &zip_path,
            &[("b82-09.ic23", &[9, 9]), ("b82-17.ic11", &[4, 5, 6, 7])],
        );

        let mut fs_search = FileSearch::new();
        fs_search.add_search_path(&dir).unwrap();
        fs_search.add_search_path(&zip_path).unwrap();
        assert_eq!(fs_search.len(), 2);

        assert_eq!(fs_search.fetch("b82-09.ic23").unwrap(), vec![1, 2, 3]);
        assert_eq!(fs_search.fetch("b82-17.ic11").unwrap(), vec![4, 5, 6, 7]);
        assert!(matches!(
            fs_search.fetch("b82-10.ic5"),
            Err(SimError::NotFound { .. })
        ));

        fs_search.clear_search_paths();
        assert!(fs_search.is_empty());
        assert!(fs_search.fetch("b82-09.ic23").is_err());

        fs::remove_dir_all(root).unwrap();
    }

    #[test]
    fn rejects_invalid_paths() {
        let root = scratch_dir("invalid-paths");
        let plain = root.join("notes.txt");
        fs::write(&plain, b"hello").unwrap();

        let mut fs_search = FileSearch::new();
        assert!(matches!(
            fs_search.add_search_path(root.join("missing")),
            Err(SimError::InvalidSearchPath { .. })
        ));
        assert!(matches!(
            fs_search.add_search_path(&plain),
            Err(SimError::InvalidSearchPath { .. })
        ));
        assert!(fs_search.is_empty());

        fs::remove_dir_all(root).unwrap();
    }

    #[test]
    fn in_memory_source() {
        let mut source = InMemorySource::new().with("d48-09", vec![0xAA; 4]);

        assert_eq!(source.fetch("d48-09").unwrap(), vec![0xAA; 4]);
        assert!(source.fetch("d48-10").is_err());
    }
}
