//! Integration tests for the transcript `SessionStore`.

use std::io::ErrorKind;

use eli::session::SessionStore;
use tempfile::TempDir;

fn tmp() -> TempDir {
    TempDir::new().unwrap()
}

fn io_kind(err: &anyhow::Error) -> ErrorKind {
    err.root_cause()
        .downcast_ref::<std::io::Error>()
        .expect("expected an io::Error at the root")
        .kind()
}

// ── ensure_exists ────────────────────────────────────────────

#[tokio::test]
async fn ensure_exists_then_read_returns_default() {
    let dir = tmp();
    for (i, default) in ["", "# Therapy Session History\n\n", "ünïcødé ✓\n"]
        .iter()
        .enumerate()
    {
        let path = dir.path().join(format!("s{i}.txt"));
        assert!(SessionStore::ensure_exists(&path, default).await.unwrap());
        assert_eq!(SessionStore::read_all(&path).await.unwrap(), *default);
    }
}

#[tokio::test]
async fn ensure_exists_leaves_prior_session_untouched() {
    let dir = tmp();
    let path = dir.path().join("session.txt");
    std::fs::write(&path, "prior session\n").unwrap();

    let created = SessionStore::ensure_exists(&path, "").await.unwrap();
    assert!(!created);
    assert_eq!(
        SessionStore::read_all(&path).await.unwrap(),
        "prior session\n"
    );
}

#[tokio::test]
async fn ensure_exists_is_idempotent() {
    let dir = tmp();
    let path = dir.path().join("session.txt");
    assert!(SessionStore::ensure_exists(&path, "first\n").await.unwrap());
    assert!(!SessionStore::ensure_exists(&path, "second\n").await.unwrap());
    assert_eq!(SessionStore::read_all(&path).await.unwrap(), "first\n");
}

// ── append / read_all ────────────────────────────────────────

#[tokio::test]
async fn two_turns_on_empty_file() {
    let dir = tmp();
    let path = dir.path().join("session.txt");
    SessionStore::ensure_exists(&path, "").await.unwrap();

    SessionStore::append(&path, "Eli: Hello!\n").await.unwrap();
    SessionStore::append(&path, "User: Hi\n").await.unwrap();

    assert_eq!(
        SessionStore::read_all(&path).await.unwrap(),
        "Eli: Hello!\nUser: Hi\n"
    );
}

#[tokio::test]
async fn many_appends_read_back_in_order() {
    let dir = tmp();
    let path = dir.path().join("session.txt");
    SessionStore::ensure_exists(&path, "# header\n").await.unwrap();

    let turns: Vec<String> = (0..50)
        .map(|i| {
            if i % 2 == 0 {
                format!("User: message {i}\n")
            } else {
                format!("Eli: reply {i}\nspanning two lines\n")
            }
        })
        .collect();
    for t in &turns {
        SessionStore::append(&path, t).await.unwrap();
    }

    let expected = format!("# header\n{}", turns.concat());
    assert_eq!(SessionStore::read_all(&path).await.unwrap(), expected);
}

#[tokio::test]
async fn append_empty_text_is_noop() {
    let dir = tmp();
    let path = dir.path().join("session.txt");
    SessionStore::ensure_exists(&path, "x\n").await.unwrap();
    SessionStore::append(&path, "").await.unwrap();
    assert_eq!(SessionStore::read_all(&path).await.unwrap(), "x\n");
}

// ── error kinds ──────────────────────────────────────────────

#[tokio::test]
async fn append_without_ensure_fails_not_found() {
    let dir = tmp();
    let path = dir.path().join("missing.txt");

    let err = SessionStore::append(&path, "User: Hi\n").await.unwrap_err();
    assert_eq!(io_kind(&err), ErrorKind::NotFound);
    assert!(!path.exists(), "append must not create the file");
    assert!(err.to_string().contains("missing.txt"));
}

#[tokio::test]
async fn read_missing_file_fails_not_found() {
    let dir = tmp();
    let err = SessionStore::read_all(&dir.path().join("nope.txt"))
        .await
        .unwrap_err();
    assert_eq!(io_kind(&err), ErrorKind::NotFound);
}

#[cfg(unix)]
#[tokio::test]
async fn read_unreadable_file_fails() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tmp();
    let path = dir.path().join("locked.txt");
    std::fs::write(&path, "secret\n").unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o000)).unwrap();

    // Root ignores permission bits; nothing to assert there.
    if std::fs::read(&path).is_ok() {
        return;
    }
    let err = SessionStore::read_all(&path).await.unwrap_err();
    assert_eq!(io_kind(&err), ErrorKind::PermissionDenied);
}

/// Write errors surface on flush and still name the file.
#[cfg(target_os = "linux")]
#[tokio::test]
async fn append_write_failure_names_the_file() {
    let full = std::path::Path::new("/dev/full");
    if !full.exists() {
        return;
    }
    let err = SessionStore::append(full, "User: Hi\n").await.unwrap_err();
    assert!(
        format!("{err:#}").contains("/dev/full"),
        "missing path in: {err:#}"
    );
}
