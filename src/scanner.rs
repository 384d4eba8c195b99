use crate::volume_loader::VolumeLoaderError;

use std::{
    fs,
    path::{Path, PathBuf},
};

pub const DEFAULT_EXTENSION: &str = "dcm";

/// Lists slice files directly inside a folder.
#[derive(Debug, Clone)]
pub struct DirectoryScanner {
    extension: String,
}

impl Default for DirectoryScanner {
    fn default() -> Self {
        Self::new(DEFAULT_EXTENSION)
    }
}

impl DirectoryScanner {
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
        }
    }

    /// Regular files, or symlinks to them, whose extension matches, sorted
    /// by path.
    ///
    /// Directory iteration order is platform dependent; sorting keeps the
    /// baseline choice reproducible.
    pub fn scan(&self, folder: impl AsRef<Path>) -> Result<Vec<PathBuf>, VolumeLoaderError> {
        let folder = folder.as_ref();
        let entries = fs::read_dir(folder).map_err(|source| {
            if folder.exists() && !folder.is_dir() {
                VolumeLoaderError::NotADirectory(folder.to_path_buf())
            } else {
                VolumeLoaderError::Directory {
                    path: folder.to_path_buf(),
                    source,
                }
            }
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|source| VolumeLoaderError::Directory {
                    path: folder.to_path_buf(),
                    source,
                })?
                .path();
            // `is_file` follows symlinks.
            if self.matches(&path) && path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();

        Ok(paths)
    }

    fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(&self.extension))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    #[test]
    fn picks_matching_regular_files_only() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.dcm", "a.DCM", "notes.txt", "c.dcm.bak"] {
            File::create(dir.path().join(name)).unwrap();
        }
        fs::create_dir(dir.path().join("nested.dcm")).unwrap();
        File::create(dir.path().join("nested.dcm").join("d.dcm")).unwrap();

        let paths = DirectoryScanner::default().scan(dir.path()).unwrap();
        let names: Vec<_> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a.DCM", "b.dcm"]);
    }

    #[cfg(unix)]
    #[test]
    fn follows_symlinked_files() {
        let storage = tempfile::tempdir().unwrap();
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.dcm", "b.dcm"] {
            File::create(storage.path().join(name)).unwrap();
            std::os::unix::fs::symlink(storage.path().join(name), dir.path().join(name)).unwrap();
        }
        std::os::unix::fs::symlink(storage.path().join("gone.dcm"), dir.path().join("c.dcm"))
            .unwrap();

        let paths = DirectoryScanner::default().scan(dir.path()).unwrap();
        assert_eq!(paths, vec![dir.path().join("a.dcm"), dir.path().join("b.dcm")]);
    }

    #[test]
    fn custom_extension() {
        let dir = tempfile::tempdir().unwrap();
        File::create(dir.path().join("a.ima")).unwrap();
        File::create(dir.path().join("b.dcm")).unwrap();

        let paths = DirectoryScanner::new("ima").scan(dir.path()).unwrap();
        assert_eq!(paths, vec![dir.path().join("a.ima")]);
    }

    #[test]
    fn empty_folder_is_an_empty_scan() {
        let dir = tempfile::tempdir().unwrap();
        assert!(DirectoryScanner::default().scan(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn missing_folder() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        assert!(matches!(
            DirectoryScanner::default().scan(&missing),
            Err(VolumeLoaderError::Directory { path, .. }) if path == missing
        ));
    }

    #[test]
    fn file_instead_of_folder() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.dcm");
        File::create(&file).unwrap();
        assert!(matches!(
            DirectoryScanner::default().scan(&file),
            Err(VolumeLoaderError::NotADirectory(path)) if path == file
        ));
    }
}
