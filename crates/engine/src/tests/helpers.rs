use std::fs;
use std::path::{Path, PathBuf};

use crate::{Engine, StorageConfig};

pub const USERS: &str = "int user_id primary\nstr32 user_name\nstr64 user_email\n";
pub const DOCS: &str = "int doc_id primary\nstr32 doc_title\nblob doc_body\n";

/// Provisions `<root>/<name>.table/` with a definition, an empty data file
/// and an empty blob directory. Returns the table directory.
pub fn create_table(root: &Path, name: &str, definition: &str) -> PathBuf {
    let dir = root.join(format!("{name}.table"));
    fs::create_dir_all(dir.join("blobs")).unwrap();
    fs::write(dir.join("definition"), definition).unwrap();
    fs::write(dir.join("data"), b"").unwrap();
    dir
}

pub fn open_engine(root: &Path) -> Engine {
    Engine::new(StorageConfig::new(root).with_sync(false)).unwrap()
}

pub fn count_blob_files(table_dir: &Path) -> usize {
    fs::read_dir(table_dir.join("blobs"))
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .count()
}

pub fn data_len(table_dir: &Path) -> u64 {
    fs::metadata(table_dir.join("data")).unwrap().len()
}
