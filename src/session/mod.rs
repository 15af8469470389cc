//! Session transcript storage: `SessionStore` and the text format in
//! [`transcript`].
//!
//! The transcript is a single plain-text file that is only ever
//! appended to.  `SessionStore` carries no state of its own; every
//! operation takes the file path so the caller decides which file a
//! run talks to.

pub mod transcript;

use std::path::Path;

use anyhow::Context as _;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

pub use transcript::{Role, Transcript, Turn};

// ── SessionStore ─────────────────────────────────────────────

/// Stateless helper over the transcript file.
pub struct SessionStore;

impl SessionStore {
    /// Create the file at `path` holding `default_content` unless it
    /// already exists.
    ///
    /// Missing parent directories are created.  Returns `true` when the
    /// file was created by this call and `false` when a regular file was
    /// already present (its content is left untouched).  A path that
    /// exists but is not a regular file is an error.
    pub async fn ensure_exists(path: &Path, default_content: &str) -> anyhow::Result<bool> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create session dir {}", parent.display()))?;
        }

        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await
        {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let meta = fs::metadata(path)
                    .await
                    .with_context(|| format!("stat session file {}", path.display()))?;
                if !meta.is_file() {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        "path exists but is not a regular file",
                    ))
                    .with_context(|| format!("session file {}", path.display()));
                }
                return Ok(false);
            }
            Err(e) => {
                return Err(e).with_context(|| format!("create session file {}", path.display()))
            }
        };

        file.write_all(default_content.as_bytes())
            .await
            .with_context(|| format!("write default content to {}", path.display()))?;
        file.sync_all()
            .await
            .with_context(|| format!("sync session file {}", path.display()))?;

        debug!(path = %path.display(), "session file created");
        Ok(true)
    }

    /// Read the whole transcript as one string.
    ///
    /// Fails when the file is missing or unreadable, and with
    /// `ErrorKind::InvalidData` when the content is not UTF-8.
    pub async fn read_all(path: &Path) -> anyhow::Result<String> {
        let bytes = fs::read(path)
            .await
            .with_context(|| format!("read session file {}", path.display()))?;

        let text = String::from_utf8(bytes)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
            .with_context(|| {
                format!(
                    "session file {} is not valid UTF-8, check the file encoding",
                    path.display()
                )
            })?;

        debug!(path = %path.display(), bytes = text.len(), "session file read");
        Ok(text)
    }

    /// Append `text` to the end of an existing transcript.
    ///
    /// The file is never created here: appending to a missing file fails
    /// with `ErrorKind::NotFound`, so callers run
    /// [`ensure_exists`](SessionStore::ensure_exists) first.  The text is
    /// handed to the OS in one append-mode write and synced before
    /// returning.
    pub async fn append(path: &Path, text: &str) -> anyhow::Result<()> {
        let mut file = fs::OpenOptions::new()
            .append(true)
            .open(path)
            .await
            .with_context(|| format!("open session file {}", path.display()))?;

        file.write_all(text.as_bytes())
            .await
            .with_context(|| format!("append to session file {}", path.display()))?;
        file.flush()
            .await
            .with_context(|| format!("append to session file {}", path.display()))?;
        file.sync_data()
            .await
            .with_context(|| format!("sync session file {}", path.display()))?;

        debug!(path = %path.display(), bytes = text.len(), "transcript appended");
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tmp() -> TempDir {
        TempDir::new().unwrap()
    }

    #[tokio::test]
    async fn ensure_exists_creates_with_default() {
        let dir = tmp();
        let path = dir.path().join("session.txt");

        let created = SessionStore::ensure_exists(&path, "# header\n\n")
            .await
            .unwrap();
        assert!(created);
        assert_eq!(SessionStore::read_all(&path).await.unwrap(), "# header\n\n");
    }

    #[tokio::test]
    async fn ensure_exists_creates_parent_dirs() {
        let dir = tmp();
        let path = dir.path().join("a").join("b").join("session.txt");

        SessionStore::ensure_exists(&path, "").await.unwrap();
        assert!(path.is_file());
    }

    #[tokio::test]
    async fn ensure_exists_keeps_existing() {
        let dir = tmp();
        let path = dir.path().join("session.txt");
        std::fs::write(&path, "keep me\n").unwrap();

        let created = SessionStore::ensure_exists(&path, "default").await.unwrap();
        assert!(!created);
        assert_eq!(SessionStore::read_all(&path).await.unwrap(), "keep me\n");
    }

    #[tokio::test]
    async fn ensure_exists_rejects_directory() {
        let dir = tmp();
        let err = SessionStore::ensure_exists(dir.path(), "").await.unwrap_err();
        let io = err.root_cause().downcast_ref::<std::io::Error>().unwrap();
        assert_eq!(io.kind(), std::io::ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn read_all_empty_file() {
        let dir = tmp();
        let path = dir.path().join("empty.txt");
        SessionStore::ensure_exists(&path, "").await.unwrap();
        assert_eq!(SessionStore::read_all(&path).await.unwrap(), "");
    }

    #[tokio::test]
    async fn read_all_rejects_invalid_utf8() {
        let dir = tmp();
        let path = dir.path().join("bad.txt");
        std::fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();

        let err = SessionStore::read_all(&path).await.unwrap_err();
        let io = err.root_cause().downcast_ref::<std::io::Error>().unwrap();
        assert_eq!(io.kind(), std::io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn append_preserves_order() {
        let dir = tmp();
        let path = dir.path().join("session.txt");
        SessionStore::ensure_exists(&path, "").await.unwrap();

        for i in 0..5 {
            SessionStore::append(&path, &format!("line-{i}\n"))
                .await
                .unwrap();
        }

        assert_eq!(
            SessionStore::read_all(&path).await.unwrap(),
            "line-0\nline-1\nline-2\nline-3\nline-4\n"
        );
    }

    #[tokio::test]
    async fn append_missing_file_is_not_found() {
        let dir = tmp();
        let path = dir.path().join("nope.txt");

        let err = SessionStore::append(&path, "x").await.unwrap_err();
        let io = err.downcast_ref::<std::io::Error>().unwrap();
        assert_eq!(io.kind(), std::io::ErrorKind::NotFound);
        assert!(!path.exists());
    }
}
