//! Buffer sources the poll loop reads from.
//!
//! The pipeline only needs "the current bytes, starting at offset 0". How the
//! bytes are obtained is up to the source.

use memmap2::Mmap;
use std::fs::{File, Metadata};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Result, TelemetryError};

/// Read access to an externally populated byte region.
pub trait BufferSource {
    /// Returns the current contents of the region.
    ///
    /// Fails with [`TelemetryError::SourceUnavailable`] once the region is gone
    /// for good; any other error is treated as transient by the poll loop.
    fn read(&mut self) -> Result<&[u8]>;
}

/// A file or shared-memory segment mapped read-only.
///
/// On Linux a POSIX shared-memory segment lives under `/dev/shm`, so the
/// producer's segment can be opened by path. The producer may keep writing
/// while we read; reads are not synchronized with it.
///
/// The mapping is refreshed whenever the file at `path` changes size or is
/// replaced by a different file.
#[derive(Debug)]
pub struct MmapSource {
    path: PathBuf,
    mmap: Mmap,
    identity: Option<(u64, u64)>,
}

impl MmapSource {
    /// Map the file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let (mmap, identity) = Self::map(&path)?;
        debug!(path = %path.display(), len = mmap.len(), "mapped buffer source");
        Ok(Self {
            path,
            mmap,
            identity,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    fn map(path: &Path) -> Result<(Mmap, Option<(u64, u64)>)> {
        let file = File::open(path).map_err(|e| Self::open_error(path, e))?;
        let identity = file_identity(&file.metadata()?);
        let mmap = unsafe { Mmap::map(&file)? };
        Ok((mmap, identity))
    }

    fn open_error(path: &Path, err: std::io::Error) -> TelemetryError {
        if err.kind() == ErrorKind::NotFound {
            TelemetryError::SourceUnavailable(format!("{} no longer exists", path.display()))
        } else {
            TelemetryError::Io(err)
        }
    }
}

impl BufferSource for MmapSource {
    fn read(&mut self) -> Result<&[u8]> {
        let metadata =
            std::fs::metadata(&self.path).map_err(|e| Self::open_error(&self.path, e))?;
        let len = metadata.len() as usize;
        let identity = file_identity(&metadata);

        // The producer may create the segment small and grow it later, or
        // unlink it and create a fresh one under the same name.
        if len != self.mmap.len() || identity != self.identity {
            debug!(
                path = %self.path.display(),
                old_len = self.mmap.len(),
                new_len = len,
                replaced = identity != self.identity,
                "remapping buffer source"
            );
            let (mmap, identity) = Self::map(&self.path)?;
            self.mmap = mmap;
            self.identity = identity;
        }

        Ok(&self.mmap[..])
    }
}

/// Device and inode of a file, where the platform exposes them.
#[cfg(unix)]
fn file_identity(metadata: &Metadata) -> Option<(u64, u64)> {
    use std::os::unix::fs::MetadataExt;
    Some((metadata.dev(), metadata.ino()))
}

#[cfg(not(unix))]
fn file_identity(_metadata: &Metadata) -> Option<(u64, u64)> {
    None
}

/// An in-memory buffer, useful for tests and replaying captured dumps.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    data: Vec<u8>,
    closed: bool,
}

impl MemorySource {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            closed: false,
        }
    }

    /// Load a captured buffer dump from disk.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(std::fs::read(path)?))
    }

    /// Mutable access, standing in for the external producer.
    pub fn bytes_mut(&mut self) -> &mut Vec<u8> {
        &mut self.data
    }

    pub fn replace(&mut self, data: Vec<u8>) {
        self.data = data;
    }

    /// Make every later read fail as if the producer went away.
    pub fn close(&mut self) {
        self.closed = true;
    }
}

impl BufferSource for MemorySource {
    fn read(&mut self) -> Result<&[u8]> {
        if self.closed {
            return Err(TelemetryError::SourceUnavailable(
                "memory source closed".to_string(),
            ));
        }
        Ok(&self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_memory_source() {
        let mut source = MemorySource::new(vec![1, 2, 3]);
        assert_eq!(source.read().unwrap(), &[1, 2, 3]);

        source.bytes_mut()[0] = 9;
        assert_eq!(source.read().unwrap(), &[9, 2, 3]);

        source.close();
        assert!(source.read().unwrap_err().is_source_loss());
    }

    #[test]
    fn test_mmap_source_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0xAA; 16]).unwrap();
        file.flush().unwrap();

        let mut source = MmapSource::open(file.path()).unwrap();
        assert_eq!(source.len(), 16);
        assert_eq!(source.read().unwrap(), &[0xAA; 16]);
    }

    #[test]
    fn test_mmap_source_sees_writes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0u8; 8]).unwrap();
        file.flush().unwrap();

        let mut source = MmapSource::open(file.path()).unwrap();
        assert_eq!(source.read().unwrap()[0], 0);

        std::fs::write(file.path(), [7u8; 8]).unwrap();
        assert_eq!(source.read().unwrap()[0], 7);
    }

    #[test]
    fn test_mmap_source_remaps_on_growth() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[1u8; 4]).unwrap();
        file.flush().unwrap();

        let mut source = MmapSource::open(file.path()).unwrap();
        std::fs::write(file.path(), [2u8; 12]).unwrap();

        assert_eq!(source.read().unwrap().len(), 12);
    }

    #[cfg(unix)]
    #[test]
    fn test_mmap_source_follows_recreated_segment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("segment");
        std::fs::write(&path, [1u8; 8]).unwrap();

        let mut source = MmapSource::open(&path).unwrap();
        assert_eq!(source.read().unwrap(), &[1u8; 8]);

        // Same size, new file: the old mapping still points at the unlinked one.
        std::fs::remove_file(&path).unwrap();
        std::fs::write(&path, [2u8; 8]).unwrap();

        assert_eq!(source.read().unwrap(), &[2u8; 8]);
    }

    #[test]
    fn test_mmap_source_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("segment");
        std::fs::write(&path, [0u8; 4]).unwrap();

        let mut source = MmapSource::open(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert!(source.read().unwrap_err().is_source_loss());
        assert!(MmapSource::open(&path).unwrap_err().is_source_loss());
    }
}
