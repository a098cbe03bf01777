//! Backing file: the durable mirror of the memory image.
//!
//! The file is an unstructured flat binary image, exactly `MEM_SIZE` bytes
//! when valid. There is no header, version, or checksum: whatever is on disk
//! at restore time is authoritative, and persist overwrites it wholesale.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Default location of the backing file, relative to the working directory.
pub const DEFAULT_BACKING_PATH: &str = "system/systemdata.dat";

/// Backing file I/O failures.
///
/// These never abort machine construction or reset; `Machine` turns them
/// into diagnostics and carries on with whatever image it has.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to create backing file {}: {source}", path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to open backing file {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read backing file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write backing file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// How much of the image a restore recovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// The full image was read.
    Complete,
    /// The file was shorter than the image; only `read` bytes were loaded.
    Partial { read: usize },
    /// The file could not be opened or read; the image was left as is.
    Unavailable,
}

/// Handle on the backing file path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackingFile {
    path: PathBuf,
}

impl BackingFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create an empty backing file (and its parent directories) if none exists.
    ///
    /// Returns `true` if a file was created.
    pub fn ensure_exists(&self) -> Result<bool, PersistError> {
        if self.path.exists() {
            return Ok(false);
        }
        let create_err = |source| PersistError::Create {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(create_err)?;
        }
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
            .map_err(create_err)?;
        Ok(true)
    }

    /// Fill `buf` from the start of the file, stopping early at end of file.
    ///
    /// Returns the number of bytes read. Bytes of `buf` past that count are
    /// left untouched.
    pub fn read_into(&self, buf: &mut [u8]) -> Result<usize, PersistError> {
        let mut file = File::open(&self.path).map_err(|source| PersistError::Open {
            path: self.path.clone(),
            source,
        })?;
        let mut filled = 0;
        while filled < buf.len() {
            match file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(source) => {
                    return Err(PersistError::Read {
                        path: self.path.clone(),
                        source,
                    })
                }
            }
        }
        Ok(filled)
    }

    /// Replace the file contents with `image`.
    pub fn write_image(&self, image: &[u8]) -> Result<(), PersistError> {
        let mut file = File::create(&self.path).map_err(|source| PersistError::Open {
            path: self.path.clone(),
            source,
        })?;
        file.write_all(image)
            .and_then(|()| file.flush())
            .map_err(|source| PersistError::Write {
                path: self.path.clone(),
                source,
            })
    }
}
