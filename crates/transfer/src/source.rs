use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use blockwise_protocol::ResourcePath;

use crate::TransferError;

/// Default burst size for file-backed resources: 4 KiB.
pub const DEFAULT_FILE_BURST: usize = 4 * 1024;

/// An open, forward-only byte stream produced in bursts.
pub trait ResourceStream {
    /// Produces the next burst. `None` means the stream is exhausted.
    ///
    /// Bursts may be empty; readers must keep pulling until `None`.
    fn next_burst(&mut self) -> Result<Option<Vec<u8>>, TransferError>;

    /// Discards the next `n` bytes.
    ///
    /// Returns whatever the last pulled burst held beyond the skipped range,
    /// which is empty when the skip ends on a burst boundary or past the end.
    /// The default drains bursts; seekable streams override it.
    fn skip(&mut self, n: u64) -> Result<Vec<u8>, TransferError> {
        let mut remaining = n;
        while remaining > 0 {
            let Some(burst) = self.next_burst()? else {
                break;
            };
            let len = burst.len() as u64;
            if len > remaining {
                return Ok(burst[remaining as usize..].to_vec());
            }
            remaining -= len;
        }
        Ok(Vec::new())
    }

    /// Total length, when known before streaming.
    fn size_hint(&self) -> Option<u64> {
        None
    }
}

/// A single readable resource instance.
pub trait Resource: Send + Sync {
    /// Opens a fresh stream positioned at byte 0.
    fn open(&self) -> Result<Box<dyn ResourceStream>, TransferError>;
}

/// Resolves resource paths to byte streams.
pub trait ResourceSource: Send + Sync {
    /// Opens the resource at `path`.
    ///
    /// Fails with [`TransferError::ResourceUnavailable`] if nothing lives there.
    fn open(&self, path: &ResourcePath) -> Result<Box<dyn ResourceStream>, TransferError>;
}

// ---------------------------------------------------------------------------
// SourceRegistry
// ---------------------------------------------------------------------------

/// Maps resource paths to [`Resource`] instances.
#[derive(Default)]
pub struct SourceRegistry {
    resources: HashMap<ResourcePath, Arc<dyn Resource>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `resource` at `path`, replacing any previous one.
    pub fn register(&mut self, path: ResourcePath, resource: Arc<dyn Resource>) {
        self.resources.insert(path, resource);
    }

    pub fn contains(&self, path: &ResourcePath) -> bool {
        self.resources.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl ResourceSource for SourceRegistry {
    fn open(&self, path: &ResourcePath) -> Result<Box<dyn ResourceStream>, TransferError> {
        let resource = self
            .resources
            .get(path)
            .ok_or_else(|| TransferError::ResourceUnavailable(path.clone()))?;
        resource.open()
    }
}

// ---------------------------------------------------------------------------
// PatternResource
// ---------------------------------------------------------------------------

/// Synthetic resource of `size` bytes where byte `i` is `i % 128`.
///
/// Size and burst can be changed while the resource is registered; the next
/// `open` picks up the new values.
#[derive(Debug)]
pub struct PatternResource {
    size: AtomicUsize,
    burst: AtomicUsize,
}

impl PatternResource {
    /// Creates a pattern resource. A `burst` of 0 is treated as 1.
    pub fn new(size: usize, burst: usize) -> Self {
        Self {
            size: AtomicUsize::new(size),
            burst: AtomicUsize::new(burst.max(1)),
        }
    }

    pub fn set_size(&self, size: usize) {
        self.size.store(size, Ordering::Relaxed);
    }

    pub fn set_burst(&self, burst: usize) {
        self.burst.store(burst.max(1), Ordering::Relaxed);
    }

    pub fn size(&self) -> usize {
        self.size.load(Ordering::Relaxed)
    }

    pub fn burst(&self) -> usize {
        self.burst.load(Ordering::Relaxed)
    }

    /// The full content, for comparison in tests and tools.
    pub fn expected_content(&self) -> Vec<u8> {
        (0..self.size()).map(|i| (i % 128) as u8).collect()
    }
}

impl Resource for PatternResource {
    fn open(&self) -> Result<Box<dyn ResourceStream>, TransferError> {
        Ok(Box::new(PatternStream {
            position: 0,
            size: self.size(),
            burst: self.burst(),
        }))
    }
}

struct PatternStream {
    position: usize,
    size: usize,
    burst: usize,
}

impl ResourceStream for PatternStream {
    fn next_burst(&mut self) -> Result<Option<Vec<u8>>, TransferError> {
        if self.position >= self.size {
            return Ok(None);
        }
        let end = self.size.min(self.position + self.burst);
        let burst = (self.position..end).map(|i| (i % 128) as u8).collect();
        self.position = end;
        Ok(Some(burst))
    }

    fn skip(&mut self, n: u64) -> Result<Vec<u8>, TransferError> {
        self.position = advance(self.position, n, self.size);
        Ok(Vec::new())
    }

    fn size_hint(&self) -> Option<u64> {
        Some(self.size as u64)
    }
}

// ---------------------------------------------------------------------------
// MemoryResource
// ---------------------------------------------------------------------------

/// Fixed in-memory content served in bursts.
#[derive(Debug, Clone)]
pub struct MemoryResource {
    data: Arc<[u8]>,
    burst: usize,
}

impl MemoryResource {
    /// A `burst` of 0 is treated as 1.
    pub fn new(data: impl Into<Arc<[u8]>>, burst: usize) -> Self {
        Self {
            data: data.into(),
            burst: burst.max(1),
        }
    }
}

impl Resource for MemoryResource {
    fn open(&self) -> Result<Box<dyn ResourceStream>, TransferError> {
        Ok(Box::new(MemoryStream {
            data: Arc::clone(&self.data),
            position: 0,
            burst: self.burst,
        }))
    }
}

struct MemoryStream {
    data: Arc<[u8]>,
    position: usize,
    burst: usize,
}

impl ResourceStream for MemoryStream {
    fn next_burst(&mut self) -> Result<Option<Vec<u8>>, TransferError> {
        if self.position >= self.data.len() {
            return Ok(None);
        }
        let end = self.data.len().min(self.position + self.burst);
        let burst = self.data[self.position..end].to_vec();
        self.position = end;
        Ok(Some(burst))
    }

    fn skip(&mut self, n: u64) -> Result<Vec<u8>, TransferError> {
        self.position = advance(self.position, n, self.data.len());
        Ok(Vec::new())
    }

    fn size_hint(&self) -> Option<u64> {
        Some(self.data.len() as u64)
    }
}

// ---------------------------------------------------------------------------
// FileResource
// ---------------------------------------------------------------------------

/// A file on disk, read in fixed-size bursts.
///
/// The file is reopened for every stream, so edits between transfers are
/// picked up. A missing file reads as an unavailable resource.
#[derive(Debug, Clone)]
pub struct FileResource {
    path: PathBuf,
    resource: ResourcePath,
    burst: usize,
}

impl FileResource {
    /// If `burst` is 0, [`DEFAULT_FILE_BURST`] is used.
    pub fn new(path: &Path, resource: ResourcePath, burst: usize) -> Self {
        let burst = if burst == 0 { DEFAULT_FILE_BURST } else { burst };
        Self {
            path: path.to_path_buf(),
            resource,
            burst,
        }
    }
}

impl Resource for FileResource {
    fn open(&self) -> Result<Box<dyn ResourceStream>, TransferError> {
        let file = match std::fs::File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TransferError::ResourceUnavailable(self.resource.clone()));
            }
            Err(e) => return Err(e.into()),
        };
        let file_size = file.metadata()?.len();
        Ok(Box::new(FileStream {
            file,
            burst: self.burst,
            file_size,
        }))
    }
}

struct FileStream {
    file: std::fs::File,
    burst: usize,
    file_size: u64,
}

impl ResourceStream for FileStream {
    fn next_burst(&mut self) -> Result<Option<Vec<u8>>, TransferError> {
        let mut buf = vec![0u8; self.burst];
        let n = self.file.read(&mut buf)?;
        if n == 0 {
            return Ok(None);
        }
        buf.truncate(n);
        Ok(Some(buf))
    }

    fn skip(&mut self, n: u64) -> Result<Vec<u8>, TransferError> {
        let delta = i64::try_from(n).map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "skip beyond i64 range")
        })?;
        self.file.seek(SeekFrom::Current(delta))?;
        Ok(Vec::new())
    }

    fn size_hint(&self) -> Option<u64> {
        Some(self.file_size)
    }
}

/// Moves an in-memory cursor `n` bytes forward, stopping at `len`.
fn advance(position: usize, n: u64, len: usize) -> usize {
    let n = usize::try_from(n).unwrap_or(usize::MAX);
    position.saturating_add(n).min(len)
}
