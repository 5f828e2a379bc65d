use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, error, info, warn};

use super::{Provider, normalize_url_path};
use crate::archive::{ArchiveError, ArchiveReader, TarArchive};
use crate::handler::{ResponseMetadata, StreamResourceHandler};
use crate::manager::Request;
use crate::stream::FileStream;

/// Builds an empty reader for each archive load
pub type ArchiveReaderFactory = Arc<dyn Fn() -> Box<dyn ArchiveReader> + Send + Sync>;

type LoadedArchive = Option<Arc<dyn ArchiveReader>>;

enum ArchiveState {
    NotStarted,
    /// Requests waiting for the load to finish
    Loading(Vec<Request>),
    /// `None` if the load failed or the archive was empty
    Loaded(LoadedArchive),
}

/// Serves archive members for URLs under a prefix.
///
/// The archive is read once, on the worker lane, when the first matching
/// request arrives. Requests arriving meanwhile are queued and answered
/// together when the load finishes.
pub struct ArchiveProvider {
    url_path: String,
    archive_path: PathBuf,
    password: Option<String>,
    reader_factory: ArchiveReaderFactory,
    state: Arc<Mutex<ArchiveState>>,
}

impl ArchiveProvider {
    /// Provider reading a tar archive
    pub fn new(
        url_path: impl Into<String>,
        archive_path: impl Into<PathBuf>,
        password: Option<String>,
    ) -> Self {
        Self::with_reader(
            url_path,
            archive_path,
            password,
            Arc::new(|| Box::new(TarArchive::new()) as Box<dyn ArchiveReader>),
        )
    }

    /// Provider reading the archive with readers built by `reader_factory`
    pub fn with_reader(
        url_path: impl Into<String>,
        archive_path: impl Into<PathBuf>,
        password: Option<String>,
        reader_factory: ArchiveReaderFactory,
    ) -> Self {
        Self {
            url_path: normalize_url_path(url_path),
            archive_path: archive_path.into(),
            password,
            reader_factory,
            state: Arc::new(Mutex::new(ArchiveState::NotStarted)),
        }
    }

    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    fn start_load(&self, request: &Request) {
        let url_path = self.url_path.clone();
        let archive_path = self.archive_path.clone();
        let password = self.password.clone();
        let reader_factory = Arc::clone(&self.reader_factory);
        let state = Arc::clone(&self.state);

        request.worker_lane().post(move || {
            // A panicking reader must still settle the queued requests.
            let loaded = panic::catch_unwind(AssertUnwindSafe(|| {
                load_archive(&archive_path, password.as_deref(), &reader_factory)
            }));
            let archive = match loaded {
                Ok(Ok(Some(archive))) => Some(archive),
                Ok(Ok(None)) => {
                    warn!(path = %archive_path.display(), "Archive has no entries");
                    None
                }
                Ok(Err(err)) => {
                    warn!(path = %archive_path.display(), error = %err, "Failed to load archive");
                    None
                }
                Err(_) => {
                    error!(path = %archive_path.display(), "Archive reader panicked");
                    None
                }
            };

            let queued = match std::mem::replace(&mut *lock(&state), ArchiveState::Loaded(archive.clone())) {
                ArchiveState::Loading(queued) => queued,
                _ => Vec::new(),
            };
            debug!(queued = queued.len(), "Replaying requests queued on archive load");

            for request in queued {
                if !respond_from_archive(archive.as_deref(), &url_path, &request) {
                    request.decline();
                }
            }
        });
    }
}

impl Provider for ArchiveProvider {
    fn on_request(&self, request: Request) -> bool {
        if !request.url().starts_with(&self.url_path) {
            return false;
        }

        let mut state = lock(&self.state);
        match &mut *state {
            ArchiveState::Loaded(archive) => {
                let archive = archive.clone();
                drop(state);
                respond_from_archive(archive.as_deref(), &self.url_path, &request)
            }
            ArchiveState::Loading(queued) => {
                queued.push(request);
                true
            }
            ArchiveState::NotStarted => {
                *state = ArchiveState::Loading(vec![request.clone()]);
                drop(state);
                self.start_load(&request);
                true
            }
        }
    }

    fn on_request_canceled(&self, request: &Request) {
        if let ArchiveState::Loading(queued) = &mut *lock(&self.state) {
            queued.retain(|queued| !queued.ptr_eq(request));
        }
    }
}

fn load_archive(
    path: &Path,
    password: Option<&str>,
    reader_factory: &ArchiveReaderFactory,
) -> Result<LoadedArchive, ArchiveError> {
    let mut stream = FileStream::open(path)?;
    let mut reader = reader_factory();
    let count = reader.load(&mut stream, password)?;
    if count == 0 {
        return Ok(None);
    }
    info!(path = %path.display(), entries = count, "Loaded archive");
    Ok(Some(Arc::from(reader)))
}

/// Claim `request` with its archive member. False if there is no such member
/// or no archive.
fn respond_from_archive(archive: Option<&dyn ArchiveReader>, url_path: &str, request: &Request) -> bool {
    let Some(archive) = archive else {
        return false;
    };
    let Some(relative_path) = request.url().strip_prefix(url_path) else {
        return false;
    };
    let Some(stream) = archive.open(relative_path) else {
        debug!(url = %request.url(), "No such archive member");
        return false;
    };

    let handler = StreamResourceHandler::with_metadata(ResponseMetadata::ok(request.mime_type()), stream);
    request.respond(handler);
    true
}

fn lock(state: &Mutex<ArchiveState>) -> MutexGuard<'_, ArchiveState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::tests::{oversized_tar, write_tar};
    use crate::manager::ResourceManager;
    use crate::providers::test_support::fetch;
    use tempfile::TempDir;

    fn site_archive(temp_dir: &TempDir) -> PathBuf {
        let path = temp_dir.path().join("site.tar");
        write_tar(
            &path,
            &[
                ("index.html", &b"<p>archived</p>"[..]),
                ("img/logo.png", &b"PNG"[..]),
            ],
        );
        path
    }

    #[tokio::test]
    async fn test_serves_archive_members() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ResourceManager::new();
        manager.add_archive_provider("http://test/zip", site_archive(&temp_dir), None, 0, "");

        let (mime_type, body) = fetch(&manager, "http://test/zip/index.html").await.unwrap();
        assert_eq!(mime_type, "text/html");
        assert_eq!(body, b"<p>archived</p>");

        // Answered from the loaded index
        let (mime_type, body) = fetch(&manager, "http://test/zip/img/logo.png").await.unwrap();
        assert_eq!(mime_type, "image/png");
        assert_eq!(body, b"PNG");

        assert!(fetch(&manager, "http://test/zip/missing.html").await.is_none());
        assert!(fetch(&manager, "http://test/other/index.html").await.is_none());
    }

    #[tokio::test]
    async fn test_unreadable_archive_declines() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ResourceManager::new();
        manager.add_archive_provider("http://test/", temp_dir.path().join("none.tar"), None, 0, "");
        manager.add_content_provider("http://test/index.html", "fallback", None, 1, "");

        let (_, body) = fetch(&manager, "http://test/index.html").await.unwrap();
        assert_eq!(body, b"fallback");
        // Second request is declined synchronously from the failed state
        let (_, body) = fetch(&manager, "http://test/index.html").await.unwrap();
        assert_eq!(body, b"fallback");
    }

    #[tokio::test]
    async fn test_empty_archive_declines() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("empty.tar");
        write_tar(&path, &[]);

        let manager = ResourceManager::new();
        manager.add_archive_provider("http://test/", path, None, 0, "");
        assert!(fetch(&manager, "http://test/index.html").await.is_none());
    }

    #[tokio::test]
    async fn test_oversized_member_declines() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("huge.tar");
        std::fs::write(&path, oversized_tar(1 << 62)).unwrap();

        let manager = ResourceManager::new();
        manager.add_archive_provider("http://test/", path, None, 0, "");
        manager.add_content_provider("http://test/huge.bin", "fallback", None, 1, "");

        let (_, body) = fetch(&manager, "http://test/huge.bin").await.unwrap();
        assert_eq!(body, b"fallback");
    }

    /// Reader that panics while loading
    struct PanickingReader;

    impl ArchiveReader for PanickingReader {
        fn load(&mut self, _: &mut dyn std::io::Read, _: Option<&str>) -> Result<usize, ArchiveError> {
            panic!("corrupt archive");
        }

        fn open(&self, _: &str) -> Option<Box<dyn crate::stream::ResourceStream>> {
            None
        }

        fn len(&self) -> usize {
            0
        }
    }

    #[tokio::test]
    async fn test_panicking_reader_declines_queued_requests() {
        let temp_dir = TempDir::new().unwrap();
        let provider = ArchiveProvider::with_reader(
            "http://test/",
            site_archive(&temp_dir),
            None,
            Arc::new(|| Box::new(PanickingReader) as Box<dyn ArchiveReader>),
        );

        let manager = ResourceManager::new();
        manager.add_provider(provider, 0, "");
        manager.add_content_provider("http://test/index.html", "fallback", None, 1, "");

        let first = fetch(&manager, "http://test/index.html");
        let second = fetch(&manager, "http://test/index.html");
        let (first, second) = tokio::join!(first, second);
        assert_eq!(first.unwrap().1, b"fallback");
        assert_eq!(second.unwrap().1, b"fallback");
        // Settled as a failed load
        let (_, body) = fetch(&manager, "http://test/index.html").await.unwrap();
        assert_eq!(body, b"fallback");
    }

    #[tokio::test]
    async fn test_password_on_tar_declines() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ResourceManager::new();
        manager.add_archive_provider("http://test/", site_archive(&temp_dir), Some("secret"), 0, "");
        assert!(fetch(&manager, "http://test/index.html").await.is_none());
    }
}
