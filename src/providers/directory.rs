use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

use super::{Provider, normalize_url_path};
use crate::handler::{ResourceHandler, StreamResourceHandler};
use crate::manager::Request;
use crate::stream::FileStream;

/// Serves files below a directory for URLs under a prefix.
///
/// `http://app.local/static/css/site.css` with prefix
/// `http://app.local/static` maps to `<directory>/css/site.css`. Files are
/// opened on the worker lane; a failed open declines.
#[derive(Debug)]
pub struct DirectoryProvider {
    url_path: String,
    directory: PathBuf,
}

impl DirectoryProvider {
    pub fn new(url_path: impl Into<String>, directory: impl Into<PathBuf>) -> Self {
        Self {
            url_path: normalize_url_path(url_path),
            directory: directory.into(),
        }
    }

    pub fn url_path(&self) -> &str {
        &self.url_path
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Filesystem path for a relative URL path.
    ///
    /// Every segment must be one plain file name: parent references,
    /// backslashes, roots and drive prefixes are refused on every platform.
    fn file_path(&self, relative: &str) -> Option<PathBuf> {
        let mut path = self.directory.clone();
        let mut pushed = false;
        for segment in relative.split('/') {
            match segment {
                "" | "." => continue,
                segment if is_file_name(segment) => {
                    path.push(segment);
                    pushed = true;
                }
                _ => return None,
            }
        }
        pushed.then_some(path)
    }
}

impl Provider for DirectoryProvider {
    fn on_request(&self, request: Request) -> bool {
        let Some(relative) = request.url().strip_prefix(&self.url_path) else {
            return false;
        };
        let Some(path) = self.file_path(relative) else {
            debug!(url = %request.url(), "Refusing directory path");
            return false;
        };

        let mime_type = request.mime_type();
        let lane = request.worker_lane().clone();
        lane.clone().post(move || {
            let handler = match FileStream::open(&path) {
                Ok(stream) => {
                    let handler = StreamResourceHandler::new(mime_type, stream).with_worker_lane(lane);
                    Some(Box::new(handler) as Box<dyn ResourceHandler>)
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "Failed to open file");
                    None
                }
            };
            request.continue_with(handler);
        });
        true
    }
}

fn is_file_name(segment: &str) -> bool {
    if segment.contains(['\\', ':']) {
        return false;
    }
    let mut components = Path::new(segment).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
