use super::*;
use tempfile::{tempdir, TempDir};

// -------------------- Helpers --------------------

fn setup(table: &str) -> (TempDir, BlobStore, PathBuf) {
    let dir = tempdir().unwrap();
    let cfg = StorageConfig::new(dir.path()).with_sync(false);
    let blob_dir = cfg.blob_dir(table).unwrap();
    fs::create_dir_all(&blob_dir).unwrap();
    (dir, BlobStore::new(cfg), blob_dir)
}

fn file_count(dir: &Path) -> usize {
    fs::read_dir(dir).unwrap().filter_map(|e| e.ok()).count()
}

// -------------------- Tokens --------------------

#[test]
fn generated_tokens_are_valid() {
    for _ in 0..100 {
        let t = generate_token();
        assert_eq!(t.len(), TOKEN_LEN);
        assert!(is_valid_token(&t), "{t}");
    }
}

#[test]
fn token_validation_rejects_paths_and_case() {
    assert!(is_valid_token("0123456789abcdef"));
    assert!(!is_valid_token("0123456789ABCDEF"));
    assert!(!is_valid_token("0123456789abcde"));
    assert!(!is_valid_token("../../etc/passwd"));
    assert!(!is_valid_token(""));
}

// -------------------- put / get --------------------

#[test]
fn put_then_get_returns_payload() {
    let (_tmp, store, blob_dir) = setup("if_posts");
    let token = store.put("if_posts", b"hello world").unwrap();

    assert!(blob_dir.join(&token).is_file());
    assert_eq!(store.get("if_posts", &token).unwrap(), b"hello world");
    assert_eq!(fs::read(blob_dir.join(&token)).unwrap(), b"hello world");
}

#[test]
fn put_empty_payload_still_creates_file() {
    let (_tmp, store, blob_dir) = setup("t");
    let token = store.put("t", b"").unwrap();
    assert!(blob_dir.join(&token).is_file());
    assert!(store.get("t", &token).unwrap().is_empty());
}

#[test]
fn put_twice_gives_distinct_tokens() {
    let (_tmp, store, blob_dir) = setup("t");
    let a = store.put("t", b"same").unwrap();
    let b = store.put("t", b"same").unwrap();
    assert_ne!(a, b);
    assert_eq!(file_count(&blob_dir), 2);
}

#[test]
fn put_into_missing_blob_dir_is_io_not_found() {
    let dir = tempdir().unwrap();
    let store = BlobStore::new(StorageConfig::new(dir.path()));
    match store.put("nosuch", b"x").unwrap_err() {
        BlobError::Io { source, .. } => assert_eq!(source.kind(), io::ErrorKind::NotFound),
        other => panic!("expected Io, got {other:?}"),
    }
}

#[test]
fn get_missing_blob_is_not_found() {
    let (_tmp, store, _) = setup("t");
    assert!(matches!(
        store.get("t", "0000000000000000"),
        Err(BlobError::NotFound { .. })
    ));
}

#[test]
fn get_rejects_invalid_token() {
    let (_tmp, store, _) = setup("t");
    assert!(matches!(store.get("t", "../definition"), Err(BlobError::InvalidToken(_))));
}

// -------------------- delete --------------------

#[test]
fn delete_removes_file() {
    let (_tmp, store, blob_dir) = setup("t");
    let token = store.put("t", b"bye").unwrap();
    store.delete("t", &token).unwrap();
    assert!(!blob_dir.join(&token).exists());
    assert!(!store.exists("t", &token).unwrap());
}

#[test]
fn delete_twice_reports_not_found() {
    let (_tmp, store, _) = setup("t");
    let token = store.put("t", b"bye").unwrap();
    store.delete("t", &token).unwrap();
    match store.delete("t", &token).unwrap_err() {
        BlobError::NotFound { token: t, .. } => assert_eq!(t, token),
        other => panic!("expected NotFound, got {other:?}"),
    }
}

// -------------------- truncate --------------------

#[test]
fn truncate_removes_every_file() {
    let (_tmp, store, blob_dir) = setup("t");
    for i in 0..5u8 {
        store.put("t", &[i; 10]).unwrap();
    }
    // Files not created by the store are removed too.
    fs::write(blob_dir.join("stray"), b"?").unwrap();

    assert_eq!(store.truncate("t").unwrap(), 6);
    assert_eq!(file_count(&blob_dir), 0);
}

#[test]
fn truncate_is_idempotent() {
    let (_tmp, store, blob_dir) = setup("t");
    store.put("t", b"x").unwrap();
    assert_eq!(store.truncate("t").unwrap(), 1);
    assert_eq!(store.truncate("t").unwrap(), 0);
    assert!(blob_dir.is_dir());
}

#[test]
fn truncate_missing_dir_is_io_error() {
    let dir = tempdir().unwrap();
    let store = BlobStore::new(StorageConfig::new(dir.path()));
    assert!(matches!(store.truncate("ghost"), Err(BlobError::Io { .. })));
}
