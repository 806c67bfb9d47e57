//! In-memory doubles for the remote backend, the cache, and the
//! embedding provider. Each test builds its own `Harness` so parallel
//! tests never share state.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::cache::{CacheError, CacheStore};
use crate::remote::{RemoteDirEntry, RemoteError, RemoteFile, RemoteRepository, RepoInfo};
use crate::semantic::{EmbedError, EmbeddingProvider};
use crate::store::DocumentStore;

pub const PREFIX: &str = "jot-notes-";

type Files = HashMap<String, (Vec<u8>, String)>;

/// Remote backend double. Repositories are maps of path to
/// (content, version token); tokens come from a global counter so a
/// rewrite always changes them.
pub struct MockRemote {
    login: String,
    repos: Mutex<HashMap<String, Files>>,
    /// Names that collide on create without showing up anywhere else,
    /// like a name squatted by a repository the identity cannot see.
    hidden_names: Mutex<HashSet<String>>,
    reject_all_creates: AtomicBool,
    offline: AtomicBool,
    sha_counter: AtomicU64,
}

impl MockRemote {
    pub fn new(login: &str) -> Self {
        MockRemote {
            login: login.to_string(),
            repos: Mutex::new(HashMap::new()),
            hidden_names: Mutex::new(HashSet::new()),
            reject_all_creates: AtomicBool::new(false),
            offline: AtomicBool::new(false),
            sha_counter: AtomicU64::new(1),
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn hide_name(&self, name: &str) {
        self.hidden_names.lock().unwrap().insert(name.to_string());
    }

    pub fn reject_all_creates(&self) {
        self.reject_all_creates.store(true, Ordering::SeqCst);
    }

    pub fn repo_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.repos.lock().unwrap().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn file_exists(&self, repo: &str, path: &str) -> bool {
        self.repos
            .lock()
            .unwrap()
            .get(repo)
            .map(|files| files.contains_key(path))
            .unwrap_or(false)
    }

    fn check_online(&self) -> Result<(), RemoteError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(RemoteError::Unreachable("connection refused".to_string()));
        }
        Ok(())
    }

    fn next_sha(&self) -> String {
        format!("sha-{}", self.sha_counter.fetch_add(1, Ordering::SeqCst))
    }
}

impl RemoteRepository for MockRemote {
    fn viewer_login(&self) -> Result<String, RemoteError> {
        self.check_online()?;
        Ok(self.login.clone())
    }

    fn list_repositories(&self) -> Result<Vec<RepoInfo>, RemoteError> {
        self.check_online()?;
        Ok(self
            .repos
            .lock()
            .unwrap()
            .keys()
            .map(|name| RepoInfo {
                name: name.clone(),
                private: true,
            })
            .collect())
    }

    fn get_repository(&self, name: &str) -> Result<RepoInfo, RemoteError> {
        self.check_online()?;
        if self.repos.lock().unwrap().contains_key(name) {
            Ok(RepoInfo {
                name: name.to_string(),
                private: true,
            })
        } else {
            Err(RemoteError::NotFound)
        }
    }

    fn create_repository(
        &self,
        name: &str,
        _description: &str,
        _private: bool,
    ) -> Result<RepoInfo, RemoteError> {
        self.check_online()?;

        if self.reject_all_creates.load(Ordering::SeqCst)
            || self.hidden_names.lock().unwrap().contains(name)
        {
            return Err(RemoteError::AlreadyExists);
        }

        let mut repos = self.repos.lock().unwrap();
        if repos.contains_key(name) {
            return Err(RemoteError::AlreadyExists);
        }

        // auto-initialized with a readme, like the production backend
        let mut files = Files::new();
        files.insert(
            "README.md".to_string(),
            (b"# jot".to_vec(), self.next_sha()),
        );
        repos.insert(name.to_string(), files);

        Ok(RepoInfo {
            name: name.to_string(),
            private: true,
        })
    }

    fn get_file(&self, repo: &str, path: &str) -> Result<RemoteFile, RemoteError> {
        self.check_online()?;
        let repos = self.repos.lock().unwrap();
        let files = repos.get(repo).ok_or(RemoteError::NotFound)?;
        let (content, sha) = files.get(path).ok_or(RemoteError::NotFound)?;
        Ok(RemoteFile {
            content: content.clone(),
            sha: sha.clone(),
        })
    }

    fn put_file(
        &self,
        repo: &str,
        path: &str,
        content: &[u8],
        sha: Option<&str>,
        _message: &str,
    ) -> Result<String, RemoteError> {
        self.check_online()?;
        let mut repos = self.repos.lock().unwrap();
        let files = repos.get_mut(repo).ok_or(RemoteError::NotFound)?;

        match (files.get(path), sha) {
            (Some((_, current)), Some(sha)) if current == sha => {}
            (Some(_), _) => return Err(RemoteError::Conflict),
            (None, Some(_)) => return Err(RemoteError::Conflict),
            (None, None) => {}
        }

        let new_sha = self.next_sha();
        files.insert(path.to_string(), (content.to_vec(), new_sha.clone()));
        Ok(new_sha)
    }

    fn delete_file(
        &self,
        repo: &str,
        path: &str,
        sha: &str,
        _message: &str,
    ) -> Result<(), RemoteError> {
        self.check_online()?;
        let mut repos = self.repos.lock().unwrap();
        let files = repos.get_mut(repo).ok_or(RemoteError::NotFound)?;

        match files.get(path) {
            None => Err(RemoteError::NotFound),
            Some((_, current)) if current != sha => Err(RemoteError::Conflict),
            Some(_) => {
                files.remove(path);
                Ok(())
            }
        }
    }

    fn list_dir(&self, repo: &str, path: &str) -> Result<Vec<RemoteDirEntry>, RemoteError> {
        self.check_online()?;
        let repos = self.repos.lock().unwrap();
        let files = repos.get(repo).ok_or(RemoteError::NotFound)?;

        let prefix = if path.is_empty() {
            String::new()
        } else {
            format!("{path}/")
        };

        let mut seen_dirs = HashSet::new();
        let mut out = Vec::new();
        for full in files.keys() {
            let Some(rest) = full.strip_prefix(&prefix) else {
                continue;
            };
            match rest.split_once('/') {
                None => out.push(RemoteDirEntry {
                    name: rest.to_string(),
                    path: full.clone(),
                    is_file: true,
                }),
                Some((dir, _)) => {
                    if seen_dirs.insert(dir.to_string()) {
                        out.push(RemoteDirEntry {
                            name: dir.to_string(),
                            path: format!("{prefix}{dir}"),
                            is_file: false,
                        });
                    }
                }
            }
        }

        if out.is_empty() && !path.is_empty() {
            return Err(RemoteError::NotFound);
        }
        Ok(out)
    }
}

/// Cache double. An optional key capacity simulates a full disk.
pub struct MemoryCache {
    map: Mutex<HashMap<String, Vec<u8>>>,
    capacity: Option<usize>,
}

impl MemoryCache {
    pub fn new() -> Self {
        MemoryCache {
            map: Mutex::new(HashMap::new()),
            capacity: None,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        MemoryCache {
            map: Mutex::new(HashMap::new()),
            capacity: Some(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.map.lock().unwrap().len()
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.map.lock().unwrap().get(key).cloned()
    }

    fn put(&self, key: &str, data: &[u8]) -> Result<(), CacheError> {
        let mut map = self.map.lock().unwrap();
        if let Some(capacity) = self.capacity {
            if !map.contains_key(key) && map.len() >= capacity {
                return Err(CacheError::Exhausted("no space left".to_string()));
            }
        }
        map.insert(key.to_string(), data.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) {
        self.map.lock().unwrap().remove(key);
    }

    fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.map.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }
}

/// Embedding double. Texts map to configured vectors by substring match;
/// unmatched texts all share one default vector.
pub struct MockEmbedder {
    model: String,
    vectors: Mutex<Vec<(String, Vec<f32>)>>,
    failing: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl MockEmbedder {
    pub fn new(model: &str) -> Self {
        MockEmbedder {
            model: model.to_string(),
            vectors: Mutex::new(Vec::new()),
            failing: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Texts containing `needle` embed to `vector`.
    pub fn map(&self, needle: &str, vector: Vec<f32>) {
        self.vectors
            .lock()
            .unwrap()
            .push((needle.to_string(), vector));
    }

    /// Texts containing `needle` fail to embed.
    pub fn fail_on(&self, needle: &str) {
        self.failing.lock().unwrap().push(needle.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn reset_calls(&self) {
        self.calls.store(0, Ordering::SeqCst);
    }
}

impl EmbeddingProvider for MockEmbedder {
    fn model_id(&self) -> String {
        self.model.clone()
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self
            .failing
            .lock()
            .unwrap()
            .iter()
            .any(|needle| text.contains(needle.as_str()))
        {
            return Err(EmbedError::Failed("mock failure".to_string()));
        }

        let vectors = self.vectors.lock().unwrap();
        for (needle, vector) in vectors.iter() {
            if text.contains(needle.as_str()) {
                return Ok(vector.clone());
            }
        }
        Ok(vec![1.0, 1.0, 1.0])
    }
}

pub struct Harness {
    pub remote: Arc<MockRemote>,
    pub cache: Arc<MemoryCache>,
    pub embedder: Arc<MockEmbedder>,
    pub store: DocumentStore,
}

pub fn build(
    remote: Arc<MockRemote>,
    cache: Arc<MemoryCache>,
    embedder: Arc<MockEmbedder>,
) -> Harness {
    let store = DocumentStore::new(remote.clone(), cache.clone(), embedder.clone(), PREFIX);
    Harness {
        remote,
        cache,
        embedder,
        store,
    }
}

pub fn harness() -> Harness {
    build(
        Arc::new(MockRemote::new("alice")),
        Arc::new(MemoryCache::new()),
        Arc::new(MockEmbedder::new("test-model")),
    )
}
