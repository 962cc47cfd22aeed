//! Storage root: filename validation and file access under one directory

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tokio::fs::{self, File};

use super::StorageError;

/// Media type reported for every stored file.
pub const VIDEO_MIME_TYPE: &str = "video/mp4";

/// Metadata for a regular file under the storage root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub filename: String,
    pub path: PathBuf,
    pub size_bytes: u64,
}

impl StoredFile {
    /// Media type served for this file.
    pub fn mime_hint(&self) -> &'static str {
        VIDEO_MIME_TYPE
    }
}

/// Directory that holds every stored media file.
///
/// Cheap to clone; components receive their own handle at construction so
/// tests can point each one at an isolated directory.
#[derive(Debug, Clone)]
pub struct StorageRoot {
    root: Arc<PathBuf>,
}

impl StorageRoot {
    /// Creates a handle for `root`. The directory is not touched.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Arc::new(root.into()),
        }
    }

    /// Directory this root points at.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Creates the root directory if it does not exist yet.
    ///
    /// # Errors
    /// - `StorageError::Io` - Directory could not be created
    pub async fn ensure_exists(&self) -> Result<(), StorageError> {
        fs::create_dir_all(self.path())
            .await
            .map_err(|e| StorageError::io("create_dir_all", self.path(), e))
    }

    /// Resolves `filename` to a path directly inside the root.
    ///
    /// # Errors
    /// - `StorageError::FilenameInvalid` - Filename is not a single plain path component
    pub fn resolve(&self, filename: &str) -> Result<PathBuf, StorageError> {
        validate_filename(filename)?;
        Ok(self.root.join(filename))
    }

    /// Looks up a regular file by name.
    ///
    /// Only metadata is read; no file handle is opened.
    ///
    /// # Errors
    /// - `StorageError::FilenameInvalid` - Filename failed validation
    /// - `StorageError::NotFound` - Nothing at that name, or not a regular file
    /// - `StorageError::Io` - Metadata could not be read for another reason
    pub async fn stat(&self, filename: &str) -> Result<StoredFile, StorageError> {
        let path = self.resolve(filename)?;
        let metadata = match fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
                return Err(StorageError::NotFound {
                    filename: filename.to_string(),
                });
            }
            Err(e) => return Err(StorageError::io("stat", path, e)),
        };

        if !metadata.is_file() {
            return Err(StorageError::NotFound {
                filename: filename.to_string(),
            });
        }

        Ok(StoredFile {
            filename: filename.to_string(),
            path,
            size_bytes: metadata.len(),
        })
    }

    /// Opens a previously stat'ed file for reading.
    ///
    /// # Errors
    /// - `StorageError::NotFound` - File disappeared since it was stat'ed
    /// - `StorageError::Io` - File could not be opened
    pub async fn open(&self, file: &StoredFile) -> Result<File, StorageError> {
        File::open(&file.path).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                StorageError::NotFound {
                    filename: file.filename.clone(),
                }
            } else {
                StorageError::io("open", &file.path, e)
            }
        })
    }

    /// Creates (or truncates) a file for writing.
    ///
    /// Existing content is overwritten in place; concurrent writers of the
    /// same name are not arbitrated.
    ///
    /// # Errors
    /// - `StorageError::FilenameInvalid` - Filename failed validation
    /// - `StorageError::Io` - File could not be created
    pub async fn create(&self, filename: &str) -> Result<(File, PathBuf), StorageError> {
        let path = self.resolve(filename)?;
        let file = File::create(&path)
            .await
            .map_err(|e| StorageError::io("create", &path, e))?;
        Ok((file, path))
    }
}

/// Checks that `filename` names exactly one plain entry of a directory.
///
/// Rejects empty names, path separators, `.`/`..`, absolute paths, drive
/// prefixes and NUL bytes.
///
/// # Errors
/// - `StorageError::FilenameInvalid` - Filename is unsafe to join onto the root
pub fn validate_filename(filename: &str) -> Result<(), StorageError> {
    let invalid = || StorageError::FilenameInvalid {
        filename: filename.to_string(),
    };

    if filename.is_empty() || filename.contains(['/', '\\', '\0']) {
        return Err(invalid());
    }

    let mut components = Path::new(filename).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(name)), None) if name == filename => Ok(()),
        _ => Err(invalid()),
    }
}
