//! Versioned-store adapter.
//!
//! Every accepted write is bundled into an audit-trail commit on an
//! underlying content-addressed store. The store is an interface so tests
//! can swap the git-backed default for an in-memory recorder.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;

use tracing::debug;

/// Error raised by versioned-store operations.
#[derive(Debug, thiserror::Error)]
pub enum VcsError {
    /// The store binary could not be launched.
    #[error("running {action}: {source}")]
    Spawn {
        /// The sub-operation being attempted.
        action: &'static str,
        /// The underlying error.
        source: std::io::Error,
    },

    /// The store refused the operation.
    #[error("{action}: {detail}")]
    Refused {
        /// The sub-operation being attempted.
        action: &'static str,
        /// Store output explaining the refusal.
        detail: String,
    },
}

/// A commit-oriented persistence layer giving the ledger its audit trail.
pub trait VersionedStore {
    /// Initialize a store rooted at `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be created.
    fn init(&self, dir: &Path) -> Result<(), VcsError>;

    /// Stage every tracked and untracked change under `dir` (honoring the
    /// store's ignore file) and create one commit with the given author
    /// identity. Returns the short content hash. Atomic from the caller's
    /// perspective: a refused commit leaves no partial state behind.
    ///
    /// # Errors
    ///
    /// Returns an error if staging or committing fails.
    fn commit_all(
        &self,
        dir: &Path,
        message: &str,
        author_name: &str,
        author_email: &str,
    ) -> Result<String, VcsError>;

    /// Whether `dir` already hosts a store.
    fn is_initialized(&self, dir: &Path) -> bool;
}

/// The default store: shells out to `git`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitStore;

impl GitStore {
    fn run(dir: &Path, action: &'static str, args: &[&str]) -> Result<String, VcsError> {
        let output = Command::new("git")
            .args(args)
            .current_dir(dir)
            .output()
            .map_err(|source| VcsError::Spawn { action, source })?;

        if !output.status.success() {
            let mut detail = String::from_utf8_lossy(&output.stdout).into_owned();
            detail.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(VcsError::Refused {
                action,
                detail: detail.trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl VersionedStore for GitStore {
    fn init(&self, dir: &Path) -> Result<(), VcsError> {
        Self::run(dir, "git init", &["init"])?;
        Ok(())
    }

    fn commit_all(
        &self,
        dir: &Path,
        message: &str,
        author_name: &str,
        author_email: &str,
    ) -> Result<String, VcsError> {
        Self::run(dir, "git add", &["add", "-A"])?;

        // The author identity doubles as the committer so commits work in
        // environments with no global git identity configured.
        let author = format!("{author_name} <{author_email}>");
        Self::run(
            dir,
            "git commit",
            &[
                "-c",
                &format!("user.name={author_name}"),
                "-c",
                &format!("user.email={author_email}"),
                "commit",
                "-m",
                message,
                "--author",
                &author,
            ],
        )?;

        let hash = Self::run(dir, "git rev-parse", &["rev-parse", "--short", "HEAD"])?;
        let hash = hash.trim().to_string();
        debug!(%hash, "committed");
        Ok(hash)
    }

    fn is_initialized(&self, dir: &Path) -> bool {
        dir.join(".git").exists()
    }
}

/// One commit recorded by [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCommit {
    /// Directory the commit was made in.
    pub dir: PathBuf,
    /// Commit message.
    pub message: String,
    /// Author name.
    pub author_name: String,
    /// Author email.
    pub author_email: String,
}

/// In-memory store for tests: records commits and hands back synthetic
/// short hashes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    commits: Mutex<Vec<RecordedCommit>>,
}

impl MemoryStore {
    /// An empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every commit recorded so far, oldest first.
    #[must_use]
    pub fn commits(&self) -> Vec<RecordedCommit> {
        self.commits.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl VersionedStore for MemoryStore {
    fn init(&self, _dir: &Path) -> Result<(), VcsError> {
        Ok(())
    }

    fn commit_all(
        &self,
        dir: &Path,
        message: &str,
        author_name: &str,
        author_email: &str,
    ) -> Result<String, VcsError> {
        let mut commits = self.commits.lock().unwrap_or_else(|e| e.into_inner());
        commits.push(RecordedCommit {
            dir: dir.to_path_buf(),
            message: message.to_string(),
            author_name: author_name.to_string(),
            author_email: author_email.to_string(),
        });
        Ok(format!("{:07x}", commits.len()))
    }

    fn is_initialized(&self, _dir: &Path) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn git_available() -> bool {
        Command::new("git")
            .arg("--version")
            .output()
            .map(|out| out.status.success())
            .unwrap_or(false)
    }

    #[test]
    fn test_memory_store_records_commits() {
        let store = MemoryStore::new();
        let dir = Path::new("/books");

        let hash = store
            .commit_all(dir, "import: chase january", "Tally Agent", "agent@tally.dev")
            .unwrap();
        assert!(!hash.is_empty());

        let commits = store.commits();
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].message, "import: chase january");
        assert_eq!(commits[0].author_email, "agent@tally.dev");
    }

    #[test]
    fn test_git_store_init_and_commit() {
        if !git_available() {
            eprintln!("git not available, skipping");
            return;
        }

        let dir = TempDir::new().unwrap();
        let store = GitStore;

        assert!(!store.is_initialized(dir.path()));
        store.init(dir.path()).unwrap();
        assert!(store.is_initialized(dir.path()));

        std::fs::write(dir.path().join("ledger.txt"), "hello").unwrap();
        let hash = store
            .commit_all(dir.path(), "init: test commit", "Test Author", "test@example.com")
            .unwrap();
        assert!(!hash.is_empty());

        let log = Command::new("git")
            .args(["log", "--format=%s|%an <%ae>", "-1"])
            .current_dir(dir.path())
            .output()
            .unwrap();
        let log = String::from_utf8_lossy(&log.stdout);
        assert!(log.contains("init: test commit"));
        assert!(log.contains("Test Author <test@example.com>"));
    }

    #[test]
    fn test_git_commit_with_nothing_staged_is_refused() {
        if !git_available() {
            eprintln!("git not available, skipping");
            return;
        }

        let dir = TempDir::new().unwrap();
        let store = GitStore;
        store.init(dir.path()).unwrap();

        let err = store
            .commit_all(dir.path(), "noop", "Test Author", "test@example.com")
            .unwrap_err();
        assert!(matches!(err, VcsError::Refused { .. }));
    }
}
