//! Owning file handle with explicit descriptor lifecycle

use crate::error::{ForbiddenReason, ServeError};
use crate::fs::FileBody;
use log::debug;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};

/// Immutable result of a stat call
#[derive(Debug, Clone, Copy)]
pub struct ResourceDescriptor {
    /// Byte size
    pub len: u64,
    /// Modification time
    pub modified: SystemTime,
    /// Inode number on unix, 0 elsewhere
    pub ino: u64,
    /// Directory flag; callers must never stream a directory
    pub is_dir: bool,
}

impl ResourceDescriptor {
    /// Modification time as milliseconds since the unix epoch
    pub fn mtime_millis(&self) -> u128 {
        self.modified
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_millis()
    }
}

/// Descriptor lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    Open,
    Transferred,
    Closed,
}

/// One opened file with exclusive descriptor ownership.
///
/// The descriptor is owned by exactly one entity at a time: this handle, or
/// the body stream it was transferred into. `close` is idempotent and safe
/// after transfer; `Drop` closes as a safety net so an aborted request can
/// never leak the descriptor.
#[derive(Debug)]
pub struct FileHandle {
    path: PathBuf,
    file: Option<File>,
    state: HandleState,
}

impl FileHandle {
    /// Open `path`, classifying the failure per the serving taxonomy.
    pub async fn open(path: PathBuf) -> Result<Self, ServeError> {
        match File::open(&path).await {
            Ok(file) => Ok(Self {
                path,
                file: Some(file),
                state: HandleState::Open,
            }),
            Err(err) => {
                debug!("open failed for {}: {err}", path.display());
                Err(ServeError::from_io(&path, err))
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> HandleState {
        self.state
    }

    /// Stat the open descriptor. Runs exactly one fstat.
    ///
    /// A directory closes the handle before the `Forbidden` failure is
    /// returned, so no descriptor survives this error path.
    pub async fn stat(&mut self) -> Result<ResourceDescriptor, ServeError> {
        let meta_result = match self.file.as_ref() {
            Some(file) => file.metadata().await,
            None => {
                return Err(ServeError::internal(
                    self.path.clone(),
                    io::Error::other("stat on a closed handle"),
                ))
            }
        };
        let meta = match meta_result {
            Ok(meta) => meta,
            Err(err) => {
                let failure = ServeError::internal(self.path.clone(), err);
                self.close();
                return Err(failure);
            }
        };

        if meta.is_dir() {
            self.close();
            return Err(ServeError::forbidden(ForbiddenReason::IsDirectory));
        }

        Ok(ResourceDescriptor {
            len: meta.len(),
            modified: meta.modified().unwrap_or(UNIX_EPOCH),
            ino: inode(&meta),
            is_dir: false,
        })
    }

    /// Release the descriptor. Idempotent, tolerates never-opened and
    /// already-transferred handles; the underlying close is fire-and-forget.
    pub fn close(&mut self) {
        if let Some(file) = self.file.take() {
            drop(file);
        }
        if self.state == HandleState::Open {
            self.state = HandleState::Closed;
        }
    }

    /// Move the descriptor out of the handle. After this the handle no
    /// longer closes it; the caller becomes sole owner.
    pub fn transfer(&mut self) -> Option<File> {
        let file = self.file.take();
        if file.is_some() {
            self.state = HandleState::Transferred;
        }
        file
    }

    /// Transfer the descriptor into a body stream covering `len` bytes
    /// starting at `start`.
    ///
    /// On seek failure the descriptor has already been moved out and drops
    /// here, so the failure path releases it too.
    pub async fn into_body(mut self, start: u64, len: u64) -> Result<FileBody, ServeError> {
        let path = self.path.clone();
        let Some(mut file) = self.transfer() else {
            return Err(ServeError::internal(
                path,
                io::Error::other("stream requested from a closed handle"),
            ));
        };

        if start > 0 {
            if let Err(err) = file.seek(SeekFrom::Start(start)).await {
                return Err(ServeError::internal(path, err));
            }
        }

        Ok(FileBody::new(file.take(len)))
    }
}

impl Drop for FileHandle {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(unix)]
fn inode(meta: &std::fs::Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    meta.ino()
}

#[cfg(not(unix))]
fn inode(_meta: &std::fs::Metadata) -> u64 {
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_file(content: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content).unwrap();
        file.flush().unwrap();
        file
    }

    #[tokio::test]
    async fn test_open_missing_is_not_found() {
        let err = FileHandle::open(PathBuf::from("/definitely/not/here.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServeError::NotFound));
    }

    #[tokio::test]
    async fn test_stat_reports_len_and_identity() {
        let file = temp_file(b"0123456789");
        let mut handle = FileHandle::open(file.path().to_path_buf()).await.unwrap();
        let stat = handle.stat().await.unwrap();
        assert_eq!(stat.len, 10);
        assert!(!stat.is_dir);
        #[cfg(unix)]
        assert_ne!(stat.ino, 0);
        handle.close();
    }

    #[tokio::test]
    async fn test_stat_directory_closes_and_forbids() {
        let dir = tempfile::tempdir().unwrap();
        let mut handle = FileHandle::open(dir.path().to_path_buf()).await.unwrap();
        let err = handle.stat().await.unwrap_err();
        assert!(matches!(
            err,
            ServeError::Forbidden {
                reason: ForbiddenReason::IsDirectory
            }
        ));
        assert_eq!(handle.state(), HandleState::Closed);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let file = temp_file(b"x");
        let mut handle = FileHandle::open(file.path().to_path_buf()).await.unwrap();
        handle.close();
        handle.close();
        assert_eq!(handle.state(), HandleState::Closed);
    }

    #[tokio::test]
    async fn test_transfer_detaches_ownership() {
        let file = temp_file(b"abc");
        let mut handle = FileHandle::open(file.path().to_path_buf()).await.unwrap();
        let moved = handle.transfer();
        assert!(moved.is_some());
        assert_eq!(handle.state(), HandleState::Transferred);
        // closing after transfer is a no-op, not a double close
        handle.close();
        assert_eq!(handle.state(), HandleState::Transferred);
        assert!(handle.transfer().is_none());
    }
}
