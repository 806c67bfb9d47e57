use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

/// Key prefixes shared by the store and the cache-backed fallback path.
pub fn entry_key(id: &str) -> String {
    format!("entries/{id}")
}

pub fn folder_key(id: &str) -> String {
    format!("folders/{id}")
}

pub const INDEX_KEY: &str = "semantic/index.json";

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The fallback store is full. There is no further fallback, so this
    /// must reach the user instead of being logged away.
    #[error("local cache exhausted: {0}")]
    Exhausted(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Synchronous key/value shadow store. Holds the same logical records as
/// the remote and becomes authoritative while the remote is unreachable.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Vec<u8>>;
    fn put(&self, key: &str, data: &[u8]) -> Result<(), CacheError>;
    fn remove(&self, key: &str);
    fn keys(&self) -> Vec<String>;
}

/// File-backed cache under a base directory. Keys map to relative paths;
/// writes go through a temp file and rename so readers never observe a
/// half-written record.
pub struct FileCache {
    base_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileCache {
    pub fn new(base_dir: &str) -> std::io::Result<Self> {
        let path = PathBuf::from(base_dir);
        std::fs::create_dir_all(&path)?;
        Ok(FileCache {
            base_dir: path,
            write_lock: Mutex::new(()),
        })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let mut path = self.base_dir.clone();
        for part in key.split('/').filter(|p| !p.is_empty() && *p != "..") {
            path.push(part);
        }
        path
    }
}

impl CacheStore for FileCache {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        std::fs::read(self.path_for(key)).ok()
    }

    fn put(&self, key: &str, data: &[u8]) -> Result<(), CacheError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let temp = path.with_extension("tmp");
        let write = std::fs::write(&temp, data).and_then(|_| std::fs::rename(&temp, &path));

        match write {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::StorageFull => {
                let _ = std::fs::remove_file(&temp);
                Err(CacheError::Exhausted(err.to_string()))
            }
            Err(err) => {
                let _ = std::fs::remove_file(&temp);
                Err(err.into())
            }
        }
    }

    fn remove(&self, key: &str) {
        let _ = std::fs::remove_file(self.path_for(key));
    }

    fn keys(&self) -> Vec<String> {
        fn walk(dir: &std::path::Path, prefix: &str, out: &mut Vec<String>) {
            let Ok(entries) = std::fs::read_dir(dir) else {
                return;
            };
            for entry in entries.filter_map(|e| e.ok()) {
                let Some(name) = entry.file_name().to_str().map(String::from) else {
                    continue;
                };
                let key = if prefix.is_empty() {
                    name
                } else {
                    format!("{prefix}/{name}")
                };
                let path = entry.path();
                if path.is_dir() {
                    walk(&path, &key, out);
                } else {
                    out.push(key);
                }
            }
        }

        let mut keys = Vec::new();
        walk(&self.base_dir, "", &mut keys);
        keys.sort();
        keys
    }
}

/// Process-wide default cache location, used by the CLI wiring.
pub fn default_base_path() -> &'static str {
    static BASE: OnceLock<String> = OnceLock::new();
    BASE.get_or_init(|| {
        std::env::var("JOT_BASE_PATH").unwrap_or_else(|_| {
            let home = homedir::my_home()
                .ok()
                .flatten()
                .map(|p| p.to_string_lossy().to_string())
                .unwrap_or_else(|| ".".to_string());
            format!("{home}/.local/share/jot")
        })
    })
}
