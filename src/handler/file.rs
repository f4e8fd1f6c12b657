//! File-backed session handler.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, warn};

use super::SessionHandler;
use crate::session::SessionId;

/// Stores each session as a file named after its id under a storage
/// directory.
#[derive(Debug, Clone)]
pub struct FileSessionHandler {
    path: PathBuf,
}

impl FileSessionHandler {
    /// Create a handler rooted at the given storage directory.
    ///
    /// The directory is created on first write if it does not exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The storage directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn session_path(&self, id: &SessionId) -> PathBuf {
        self.path.join(id.as_str())
    }
}

impl SessionHandler for FileSessionHandler {
    fn read(&mut self, id: &SessionId) -> String {
        match fs::read_to_string(self.session_path(id)) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => {
                warn!(session = %id, error = %e, "failed to read session file");
                String::new()
            }
        }
    }

    fn write(&mut self, id: &SessionId, data: &str) -> bool {
        if let Err(e) = fs::create_dir_all(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to create session directory");
            return false;
        }
        match fs::write(self.session_path(id), data) {
            Ok(()) => true,
            Err(e) => {
                warn!(session = %id, error = %e, "failed to write session file");
                false
            }
        }
    }

    fn destroy(&mut self, id: &SessionId) -> bool {
        match fs::remove_file(self.session_path(id)) {
            Ok(()) => true,
            // Nothing to destroy counts as destroyed.
            Err(e) if e.kind() == ErrorKind::NotFound => true,
            Err(e) => {
                warn!(session = %id, error = %e, "failed to destroy session file");
                false
            }
        }
    }

    fn gc(&mut self, max_lifetime_secs: u64) -> usize {
        let entries = match fs::read_dir(&self.path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return 0,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to scan session directory");
                return 0;
            }
        };

        let max_age = Duration::from_secs(max_lifetime_secs);
        let mut deleted = 0;

        for entry in entries.flatten() {
            let stale = entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .and_then(|mtime| mtime.elapsed().ok())
                .is_some_and(|age| age >= max_age);

            if stale && fs::remove_file(entry.path()).is_ok() {
                deleted += 1;
            }
        }

        if deleted > 0 {
            debug!(deleted, "session gc swept file store");
        }
        deleted
    }
}
