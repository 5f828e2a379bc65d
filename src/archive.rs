//! Archive readers used by [`ArchiveProvider`](crate::providers::ArchiveProvider)

use std::collections::HashMap;
use std::io::{self, Read};

use bytes::Bytes;
use thiserror::Error;
use tracing::debug;

use crate::stream::{MemoryStream, ResourceStream};

/// Largest member [`TarArchive`] keeps in memory
pub const MAX_MEMBER_SIZE: u64 = 256 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("password-protected archives are not supported by this reader")]
    PasswordUnsupported,

    #[error("invalid archive member: {0}")]
    InvalidMember(String),
}

/// Loads an archive once, then serves its members by relative path
pub trait ArchiveReader: Send + Sync {
    /// Read the whole archive from `stream`, returning the member count
    fn load(&mut self, stream: &mut dyn Read, password: Option<&str>) -> Result<usize, ArchiveError>;

    /// Open the member stored under `relative_path`
    fn open(&self, relative_path: &str) -> Option<Box<dyn ResourceStream>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Tar archive held fully in memory.
///
/// Only regular files are kept. Member names lose any leading `./` and are
/// matched case-insensitively.
#[derive(Debug, Default)]
pub struct TarArchive {
    files: HashMap<String, Bytes>,
}

impl TarArchive {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ArchiveReader for TarArchive {
    fn load(&mut self, stream: &mut dyn Read, password: Option<&str>) -> Result<usize, ArchiveError> {
        if password.is_some_and(|p| !p.is_empty()) {
            return Err(ArchiveError::PasswordUnsupported);
        }

        let mut archive = tar::Archive::new(stream);
        for entry in archive.entries()? {
            let mut entry = entry?;
            if !entry.header().entry_type().is_file() {
                continue;
            }

            let path = entry.path()?;
            let name = path
                .to_str()
                .ok_or_else(|| ArchiveError::InvalidMember(path.display().to_string()))?;
            let key = member_key(name);

            // Header sizes are untrusted: check the claim, then cap the read.
            if entry.size() > MAX_MEMBER_SIZE {
                return Err(ArchiveError::InvalidMember(format!(
                    "{key}: {} bytes exceeds the {MAX_MEMBER_SIZE} byte limit",
                    entry.size()
                )));
            }
            let mut data = Vec::new();
            (&mut entry).take(MAX_MEMBER_SIZE).read_to_end(&mut data)?;
            debug!(member = %key, size = data.len(), "Loaded archive member");
            self.files.insert(key, Bytes::from(data));
        }

        Ok(self.files.len())
    }

    fn open(&self, relative_path: &str) -> Option<Box<dyn ResourceStream>> {
        self.files
            .get(&member_key(relative_path))
            .map(|data| Box::new(MemoryStream::new(data.clone())) as Box<dyn ResourceStream>)
    }

    fn len(&self) -> usize {
        self.files.len()
    }
}

fn member_key(name: &str) -> String {
    name.trim_start_matches("./").to_lowercase()
}
