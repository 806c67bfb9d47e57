//! The document store: CRUD over entries and folders against the remote
//! backing repository, with the local cache as fallback and shadow copy.
//!
//! Every operation follows the same shape: derive the backend mode, act
//! on the remote when available, and on an unexpected remote failure
//! mid-operation downgrade to the cache and finish the same logical
//! operation there. Expected conditions (not found, unreachable,
//! embedding unavailable) come back as normal values, never as errors.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

use anyhow::anyhow;

use crate::cache::{self, CacheStore};
use crate::codec;
use crate::eid::Eid;
use crate::entries::{
    self, Entry, EntryCreate, EntryUpdate, Folder, FolderCreate, FolderUpdate,
};
use crate::provision::{ProvisionError, ProvisionState, Provisioner};
use crate::remote::{RemoteError, RemoteRepository};
use crate::semantic::{self, EmbeddingProvider, RebuildReport, VectorIndex};

use super::errors::StoreError;

/// The currently-active backend, derived at the start of each operation.
/// `Unchecked` only exists before the first derivation.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendMode {
    Unchecked,
    Remote(String),
    LocalOnly,
}

pub struct DocumentStore {
    remote: Arc<dyn RemoteRepository>,
    cache: Arc<dyn CacheStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    provisioner: Provisioner,
    /// Lazily-loaded vector index; persisted as one blob through the
    /// same backend-with-fallback path as every other record.
    index: Mutex<Option<VectorIndex>>,
    /// Last observed mode, for status display only. Never consulted when
    /// deciding where an operation goes.
    last_mode: RwLock<BackendMode>,
}

fn entry_file(id: &Eid) -> String {
    format!("{id}.md")
}

fn folder_file(id: &Eid) -> String {
    format!("folders/{id}.json")
}

/// Ids that can never name an entry. Rejected before any remote call.
fn is_reserved(id: &str) -> bool {
    id.eq_ignore_ascii_case("readme") || id.eq_ignore_ascii_case("readme.md")
}

impl DocumentStore {
    pub fn new(
        remote: Arc<dyn RemoteRepository>,
        cache: Arc<dyn CacheStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        store_prefix: &str,
    ) -> Self {
        let provisioner = Provisioner::new(remote.clone(), store_prefix);
        DocumentStore {
            remote,
            cache,
            embedder,
            provisioner,
            index: Mutex::new(None),
            last_mode: RwLock::new(BackendMode::Unchecked),
        }
    }

    /// Derive the backend mode for one operation. A failed provisioning
    /// attempt means local-only for this call; nothing is cached, so a
    /// later call can find the remote healthy again.
    fn backend(&self) -> BackendMode {
        let mode = match self.provisioner.ensure_ready() {
            Ok(repo) => BackendMode::Remote(repo),
            Err(err) => {
                log::warn!("backing store unavailable, operating locally: {err}");
                BackendMode::LocalOnly
            }
        };
        *self.last_mode.write().unwrap_or_else(|e| e.into_inner()) = mode.clone();
        mode
    }

    fn downgrade(&self) {
        *self.last_mode.write().unwrap_or_else(|e| e.into_inner()) = BackendMode::LocalOnly;
    }

    /// Last observed backend mode. For status display.
    pub fn backend_mode(&self) -> BackendMode {
        self.last_mode
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn provision_state(&self) -> ProvisionState {
        self.provisioner.state()
    }

    /// Force provisioning now; used by the explicit `init` action.
    pub fn ensure_remote(&self) -> Result<String, ProvisionError> {
        self.provisioner.ensure_ready()
    }

    /// Shadow-copy write; failures are logged, never fatal.
    fn mirror(&self, key: &str, bytes: &[u8]) {
        if let Err(err) = self.cache.put(key, bytes) {
            log::warn!("cache mirror of {key} failed: {err}");
        }
    }

    /// Write a record remotely, mirroring into the cache; on a transport
    /// failure, downgrade and finish the write against the cache alone.
    fn put_record(
        &self,
        repo: &str,
        path: &str,
        key: &str,
        bytes: &[u8],
        sha: Option<&str>,
        message: &str,
    ) -> Result<(), StoreError> {
        match self.remote.put_file(repo, path, bytes, sha, message) {
            Ok(_) => {
                self.mirror(key, bytes);
                Ok(())
            }
            Err(RemoteError::Conflict) => Err(StoreError::Conflict),
            Err(err) if err.degrades_backend() => {
                log::warn!("remote write of {path} failed, falling back to cache: {err}");
                self.downgrade();
                self.cache.put(key, bytes)?;
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}

// entry operations
impl DocumentStore {
    pub fn create_entry(&self, create: EntryCreate) -> Result<Entry, StoreError> {
        let now = entries::now();
        let entry = Entry {
            id: Eid::new(),
            title: create.title,
            content: create.content,
            created_at: now,
            updated_at: now,
            folder_id: create.folder_id,
        };

        let payload = codec::encode(&entry);
        let key = cache::entry_key(&entry.id);

        match self.backend() {
            BackendMode::Remote(repo) => {
                // fresh ULID, so this never overwrites an existing file
                self.put_record(
                    &repo,
                    &entry_file(&entry.id),
                    &key,
                    payload.as_bytes(),
                    None,
                    &format!("add entry {}", entry.id),
                )?;
            }
            _ => self.cache.put(&key, payload.as_bytes())?,
        }

        self.index_entry(&entry);
        Ok(entry)
    }

    /// All entries, newest first. Individual records that fail to decode
    /// are skipped, not fatal to the listing.
    pub fn get_all_entries(&self) -> Result<Vec<Entry>, StoreError> {
        let mut result = match self.backend() {
            BackendMode::Remote(repo) => match self.remote_entries(&repo) {
                Ok(list) => list,
                Err(RemoteError::NotFound) => Vec::new(),
                Err(err) if err.degrades_backend() => {
                    log::warn!("remote listing failed, serving from cache: {err}");
                    self.downgrade();
                    self.cached_entries()
                }
                Err(err) => return Err(err.into()),
            },
            _ => self.cached_entries(),
        };

        result.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(result)
    }

    pub fn get_entry(&self, id: &Eid) -> Result<Option<Entry>, StoreError> {
        if is_reserved(id) {
            return Ok(None);
        }

        match self.backend() {
            BackendMode::Remote(repo) => match self.remote.get_file(&repo, &entry_file(id)) {
                Ok(file) => match codec::decode(id, &file.content) {
                    Ok(entry) => {
                        self.mirror(&cache::entry_key(id), &file.content);
                        Ok(Some(entry))
                    }
                    Err(err) => {
                        log::warn!("entry {id} does not decode, skipping: {err}");
                        Ok(None)
                    }
                },
                Err(RemoteError::NotFound) => Ok(None),
                Err(err) if err.degrades_backend() => {
                    log::warn!("remote read of {id} failed, serving from cache: {err}");
                    self.downgrade();
                    Ok(self.cached_entry(id))
                }
                Err(err) => Err(err.into()),
            },
            _ => Ok(self.cached_entry(id)),
        }
    }

    pub fn update_entry(
        &self,
        id: &Eid,
        update: EntryUpdate,
    ) -> Result<Option<Entry>, StoreError> {
        if is_reserved(id) {
            return Ok(None);
        }

        match self.backend() {
            BackendMode::Remote(repo) => {
                let file = match self.remote.get_file(&repo, &entry_file(id)) {
                    Ok(file) => file,
                    Err(RemoteError::NotFound) => return Ok(None),
                    Err(err) if err.degrades_backend() => {
                        log::warn!("remote read of {id} failed, updating cache copy: {err}");
                        self.downgrade();
                        return self.update_cached_entry(id, update);
                    }
                    Err(err) => return Err(err.into()),
                };

                let mut entry = codec::decode(id, &file.content)?;
                apply_entry_update(&mut entry, update);
                entry.updated_at = entries::now();

                let payload = codec::encode(&entry);
                self.put_record(
                    &repo,
                    &entry_file(id),
                    &cache::entry_key(id),
                    payload.as_bytes(),
                    Some(&file.sha),
                    &format!("update entry {id}"),
                )?;

                self.index_entry(&entry);
                Ok(Some(entry))
            }
            _ => self.update_cached_entry(id, update),
        }
    }

    pub fn delete_entry(&self, id: &Eid) -> Result<bool, StoreError> {
        if is_reserved(id) {
            return Ok(false);
        }

        match self.backend() {
            BackendMode::Remote(repo) => match self.remote.get_file(&repo, &entry_file(id)) {
                Ok(file) => match self.remote.delete_file(
                    &repo,
                    &entry_file(id),
                    &file.sha,
                    &format!("delete entry {id}"),
                ) {
                    Ok(()) => {
                        self.cache.remove(&cache::entry_key(id));
                        self.deindex_entry(id);
                        Ok(true)
                    }
                    Err(RemoteError::Conflict) => Err(StoreError::Conflict),
                    Err(RemoteError::NotFound) => {
                        self.cache.remove(&cache::entry_key(id));
                        self.deindex_entry(id);
                        Ok(false)
                    }
                    Err(err) if err.degrades_backend() => {
                        log::warn!("remote delete of {id} failed, removing cache copy: {err}");
                        self.downgrade();
                        Ok(self.delete_cached_entry(id))
                    }
                    Err(err) => Err(err.into()),
                },
                Err(RemoteError::NotFound) => Ok(false),
                Err(err) if err.degrades_backend() => {
                    log::warn!("remote read of {id} failed, removing cache copy: {err}");
                    self.downgrade();
                    Ok(self.delete_cached_entry(id))
                }
                Err(err) => Err(err.into()),
            },
            _ => Ok(self.delete_cached_entry(id)),
        }
    }

    /// List and decode all entry files in the repository root. Non-entry
    /// files (the readme, directories) are filtered out.
    fn remote_entries(&self, repo: &str) -> Result<Vec<Entry>, RemoteError> {
        let listing = self.remote.list_dir(repo, "")?;

        let mut result = Vec::new();
        for item in listing {
            if !item.is_file {
                continue;
            }
            let Some(stem) = item.name.strip_suffix(".md") else {
                continue;
            };
            if is_reserved(stem) {
                continue;
            }

            let id = Eid::from(stem);
            let file = match self.remote.get_file(repo, &item.path) {
                Ok(file) => file,
                Err(RemoteError::NotFound) => continue, // deleted mid-listing
                Err(err) => return Err(err),
            };

            match codec::decode(&id, &file.content) {
                Ok(entry) => {
                    self.mirror(&cache::entry_key(&id), &file.content);
                    result.push(entry);
                }
                Err(err) => log::warn!("skipping undecodable entry {id}: {err}"),
            }
        }

        Ok(result)
    }

    fn cached_entries(&self) -> Vec<Entry> {
        self.cache
            .keys()
            .into_iter()
            .filter_map(|key| {
                let id = Eid::from(key.strip_prefix("entries/")?);
                let bytes = self.cache.get(&key)?;
                match codec::decode(&id, &bytes) {
                    Ok(entry) => Some(entry),
                    Err(err) => {
                        log::warn!("skipping undecodable cached entry {id}: {err}");
                        None
                    }
                }
            })
            .collect()
    }

    fn cached_entry(&self, id: &Eid) -> Option<Entry> {
        let bytes = self.cache.get(&cache::entry_key(id))?;
        match codec::decode(id, &bytes) {
            Ok(entry) => Some(entry),
            Err(err) => {
                log::warn!("cached entry {id} does not decode: {err}");
                None
            }
        }
    }

    fn update_cached_entry(
        &self,
        id: &Eid,
        update: EntryUpdate,
    ) -> Result<Option<Entry>, StoreError> {
        let Some(mut entry) = self.cached_entry(id) else {
            return Ok(None);
        };

        apply_entry_update(&mut entry, update);
        entry.updated_at = entries::now();

        let payload = codec::encode(&entry);
        self.cache.put(&cache::entry_key(id), payload.as_bytes())?;

        self.index_entry(&entry);
        Ok(Some(entry))
    }

    fn delete_cached_entry(&self, id: &Eid) -> bool {
        let existed = self.cache.get(&cache::entry_key(id)).is_some();
        if existed {
            self.cache.remove(&cache::entry_key(id));
            self.deindex_entry(id);
        }
        existed
    }
}

fn apply_entry_update(entry: &mut Entry, update: EntryUpdate) {
    if let Some(title) = update.title {
        entry.title = title;
    }
    if let Some(content) = update.content {
        entry.content = content;
    }
    if let Some(folder_id) = update.folder_id {
        entry.folder_id = folder_id;
    }
}

// folder operations
impl DocumentStore {
    pub fn create_folder(&self, create: FolderCreate) -> Result<Folder, StoreError> {
        let now = entries::now();
        let folder = Folder {
            id: Eid::new(),
            name: create.name,
            description: create.description,
            color: create.color,
            parent_id: create.parent_id,
            created_at: now,
            updated_at: now,
        };

        self.write_folder(&folder, None, &format!("add folder {}", folder.id))?;
        Ok(folder)
    }

    pub fn get_folder(&self, id: &Eid) -> Result<Option<Folder>, StoreError> {
        match self.backend() {
            BackendMode::Remote(repo) => match self.remote.get_file(&repo, &folder_file(id)) {
                Ok(file) => Ok(decode_folder(id, &file.content)),
                Err(RemoteError::NotFound) => Ok(None),
                Err(err) if err.degrades_backend() => {
                    log::warn!("remote read of folder {id} failed, serving from cache: {err}");
                    self.downgrade();
                    Ok(self.cached_folder(id))
                }
                Err(err) => Err(err.into()),
            },
            _ => Ok(self.cached_folder(id)),
        }
    }

    pub fn update_folder(
        &self,
        id: &Eid,
        update: FolderUpdate,
    ) -> Result<Option<Folder>, StoreError> {
        let Some(mut folder) = self.get_folder(id)? else {
            return Ok(None);
        };

        if let Some(name) = update.name {
            folder.name = name;
        }
        if let Some(description) = update.description {
            folder.description = Some(description);
        }
        if let Some(color) = update.color {
            folder.color = Some(color);
        }
        folder.updated_at = entries::now();

        self.save_folder(&folder, &format!("update folder {id}"))?;
        Ok(Some(folder))
    }

    pub fn delete_folder(&self, id: &Eid) -> Result<bool, StoreError> {
        match self.backend() {
            BackendMode::Remote(repo) => match self.remote.get_file(&repo, &folder_file(id)) {
                Ok(file) => match self.remote.delete_file(
                    &repo,
                    &folder_file(id),
                    &file.sha,
                    &format!("delete folder {id}"),
                ) {
                    Ok(()) => {
                        self.cache.remove(&cache::folder_key(id));
                        Ok(true)
                    }
                    Err(RemoteError::Conflict) => Err(StoreError::Conflict),
                    Err(RemoteError::NotFound) => {
                        self.cache.remove(&cache::folder_key(id));
                        Ok(false)
                    }
                    Err(err) if err.degrades_backend() => {
                        log::warn!("remote delete of folder {id} failed: {err}");
                        self.downgrade();
                        Ok(self.delete_cached_folder(id))
                    }
                    Err(err) => Err(err.into()),
                },
                Err(RemoteError::NotFound) => Ok(false),
                Err(err) if err.degrades_backend() => {
                    log::warn!("remote read of folder {id} failed: {err}");
                    self.downgrade();
                    Ok(self.delete_cached_folder(id))
                }
                Err(err) => Err(err.into()),
            },
            _ => Ok(self.delete_cached_folder(id)),
        }
    }

    /// Re-parent a folder. Refused when the new parent sits below the
    /// folder itself, which would manufacture a cycle.
    pub fn move_folder(
        &self,
        id: &Eid,
        new_parent: Option<Eid>,
    ) -> Result<Option<Folder>, StoreError> {
        let Some(mut folder) = self.get_folder(id)? else {
            return Ok(None);
        };

        if let Some(parent) = &new_parent {
            if parent == id {
                return Err(StoreError::CycleDetected(id.clone()));
            }
            let ancestors = self.get_folder_path(parent)?;
            if ancestors.iter().any(|f| &f.id == id) {
                return Err(StoreError::CycleDetected(id.clone()));
            }
        }

        folder.parent_id = new_parent;
        folder.updated_at = entries::now();

        self.save_folder(&folder, &format!("move folder {id}"))?;
        Ok(Some(folder))
    }

    pub fn get_root_folders(&self) -> Result<Vec<Folder>, StoreError> {
        let mut folders: Vec<Folder> = self
            .get_all_folders()?
            .into_iter()
            .filter(|f| f.parent_id.is_none())
            .collect();
        folders.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(folders)
    }

    pub fn get_subfolders(&self, parent: &Eid) -> Result<Vec<Folder>, StoreError> {
        let mut folders: Vec<Folder> = self
            .get_all_folders()?
            .into_iter()
            .filter(|f| f.parent_id.as_ref() == Some(parent))
            .collect();
        folders.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(folders)
    }

    /// Walk the parent chain up to the root, returned root-first. A
    /// dangling parent ends the walk; a revisited id is a cycle and
    /// fails fast instead of looping.
    pub fn get_folder_path(&self, id: &Eid) -> Result<Vec<Folder>, StoreError> {
        let by_id: HashMap<String, Folder> = self
            .get_all_folders()?
            .into_iter()
            .map(|f| (f.id.to_string(), f))
            .collect();

        let mut path = Vec::new();
        let mut visited = HashSet::new();
        let mut current = Some(id.clone());

        while let Some(cur) = current {
            if !visited.insert(cur.clone()) {
                return Err(StoreError::CycleDetected(cur));
            }
            match by_id.get(&*cur) {
                Some(folder) => {
                    path.push(folder.clone());
                    current = folder.parent_id.clone();
                }
                None => break,
            }
        }

        path.reverse();
        Ok(path)
    }

    pub fn get_all_folders(&self) -> Result<Vec<Folder>, StoreError> {
        match self.backend() {
            BackendMode::Remote(repo) => match self.remote_folders(&repo) {
                Ok(list) => Ok(list),
                Err(RemoteError::NotFound) => Ok(Vec::new()), // no folders dir yet
                Err(err) if err.degrades_backend() => {
                    log::warn!("remote folder listing failed, serving from cache: {err}");
                    self.downgrade();
                    Ok(self.cached_folders())
                }
                Err(err) => Err(err.into()),
            },
            _ => Ok(self.cached_folders()),
        }
    }

    fn remote_folders(&self, repo: &str) -> Result<Vec<Folder>, RemoteError> {
        let listing = self.remote.list_dir(repo, "folders")?;

        let mut result = Vec::new();
        for item in listing {
            if !item.is_file {
                continue;
            }
            let Some(stem) = item.name.strip_suffix(".json") else {
                continue;
            };
            let id = Eid::from(stem);

            let file = match self.remote.get_file(repo, &item.path) {
                Ok(file) => file,
                Err(RemoteError::NotFound) => continue,
                Err(err) => return Err(err),
            };

            if let Some(folder) = decode_folder(&id, &file.content) {
                self.mirror(&cache::folder_key(&id), &file.content);
                result.push(folder);
            }
        }

        Ok(result)
    }

    fn cached_folders(&self) -> Vec<Folder> {
        self.cache
            .keys()
            .into_iter()
            .filter_map(|key| {
                let id = Eid::from(key.strip_prefix("folders/")?);
                let bytes = self.cache.get(&key)?;
                decode_folder(&id, &bytes)
            })
            .collect()
    }

    fn cached_folder(&self, id: &Eid) -> Option<Folder> {
        let bytes = self.cache.get(&cache::folder_key(id))?;
        decode_folder(id, &bytes)
    }

    fn delete_cached_folder(&self, id: &Eid) -> bool {
        let existed = self.cache.get(&cache::folder_key(id)).is_some();
        if existed {
            self.cache.remove(&cache::folder_key(id));
        }
        existed
    }

    fn write_folder(
        &self,
        folder: &Folder,
        sha: Option<&str>,
        message: &str,
    ) -> Result<(), StoreError> {
        let bytes =
            serde_json::to_vec_pretty(folder).map_err(|err| StoreError::Other(anyhow!(err)))?;
        let key = cache::folder_key(&folder.id);

        match self.backend() {
            BackendMode::Remote(repo) => {
                self.put_record(&repo, &folder_file(&folder.id), &key, &bytes, sha, message)
            }
            _ => Ok(self.cache.put(&key, &bytes)?),
        }
    }

    /// Overwrite an existing folder record, fetching the current version
    /// token first.
    fn save_folder(&self, folder: &Folder, message: &str) -> Result<(), StoreError> {
        match self.backend() {
            BackendMode::Remote(repo) => {
                let sha = match self.remote.get_file(&repo, &folder_file(&folder.id)) {
                    Ok(file) => Some(file.sha),
                    Err(RemoteError::NotFound) => None,
                    Err(err) if err.degrades_backend() => {
                        log::warn!("remote read of folder {} failed: {err}", folder.id);
                        self.downgrade();
                        let bytes = serde_json::to_vec_pretty(folder)
                            .map_err(|err| StoreError::Other(anyhow!(err)))?;
                        return Ok(self.cache.put(&cache::folder_key(&folder.id), &bytes)?);
                    }
                    Err(err) => return Err(err.into()),
                };
                let bytes = serde_json::to_vec_pretty(folder)
                    .map_err(|err| StoreError::Other(anyhow!(err)))?;
                self.put_record(
                    &repo,
                    &folder_file(&folder.id),
                    &cache::folder_key(&folder.id),
                    &bytes,
                    sha.as_deref(),
                    message,
                )
            }
            _ => {
                let bytes = serde_json::to_vec_pretty(folder)
                    .map_err(|err| StoreError::Other(anyhow!(err)))?;
                Ok(self.cache.put(&cache::folder_key(&folder.id), &bytes)?)
            }
        }
    }
}

fn decode_folder(id: &Eid, bytes: &[u8]) -> Option<Folder> {
    match serde_json::from_slice::<Folder>(bytes) {
        Ok(folder) => Some(folder),
        Err(err) => {
            log::warn!("skipping undecodable folder {id}: {err}");
            None
        }
    }
}

// semantic search
impl DocumentStore {
    /// Embed the query, rank all indexed ids, and resolve them against
    /// the live entry listing. Ids whose entry no longer exists are
    /// dropped. An unavailable embedder degrades to an empty result.
    pub fn semantic_search(&self, query: &str, k: usize) -> Result<Vec<Entry>, StoreError> {
        let query_vec = match self.embedder.embed(query) {
            Ok(vec) => vec,
            Err(err) => {
                log::warn!("semantic search unavailable: {err}");
                return Ok(Vec::new());
            }
        };

        let ranked = self.with_index(|index| index.search(&query_vec, k));
        if ranked.is_empty() {
            return Ok(Vec::new());
        }

        let entries = self.get_all_entries()?;
        let by_id: HashMap<&str, &Entry> =
            entries.iter().map(|e| (e.id.as_str(), e)).collect();

        Ok(ranked
            .iter()
            .filter_map(|(id, _)| by_id.get(id.as_str()).map(|e| (*e).clone()))
            .collect())
    }

    /// (Re)build the index over the current entries. Idempotent: already
    /// indexed ids are skipped without an embedding call. Per-entry
    /// failures bump the error counter and the job runs to completion;
    /// the index is persisted once at the end.
    pub fn reindex(
        &self,
        mut progress: impl FnMut(usize, usize),
    ) -> Result<RebuildReport, StoreError> {
        let entries = self.get_all_entries()?;
        let total = entries.len();

        let mut processed = 0;
        let mut errors = 0;

        let bytes = self.with_index(|index| {
            for entry in &entries {
                if !index.contains(&entry.id) {
                    let text = semantic::embedding_text(&entry.title, &entry.content);
                    match self.embedder.embed(&text) {
                        Ok(vec) => index.insert(&entry.id, vec),
                        Err(err) => {
                            log::warn!("embedding failed for {}: {err}", entry.id);
                            errors += 1;
                        }
                    }
                }
                processed += 1;
                progress(processed, total);
            }
            index.to_bytes()
        });

        self.persist_index_bytes(&bytes);
        Ok(RebuildReport { processed, errors })
    }

    /// Number of ids currently held by the index.
    pub fn indexed_count(&self) -> usize {
        self.with_index(|index| index.len())
    }

    /// Best-effort: an embedding failure leaves the index without this
    /// id, nothing more.
    fn index_entry(&self, entry: &Entry) {
        let text = semantic::embedding_text(&entry.title, &entry.content);
        let embedding = match self.embedder.embed(&text) {
            Ok(vec) => vec,
            Err(err) => {
                log::debug!("not embedding {}: {err}", entry.id);
                return;
            }
        };

        let bytes = self.with_index(|index| {
            index.insert(&entry.id, embedding);
            index.to_bytes()
        });
        self.persist_index_bytes(&bytes);
    }

    fn deindex_entry(&self, id: &Eid) {
        let (removed, bytes) = self.with_index(|index| (index.remove(id), index.to_bytes()));
        if removed {
            self.persist_index_bytes(&bytes);
        }
    }

    fn with_index<R>(&self, f: impl FnOnce(&mut VectorIndex) -> R) -> R {
        let mut guard = self.index.lock().unwrap_or_else(|e| e.into_inner());
        let index = guard.get_or_insert_with(|| self.load_index());
        f(index)
    }

    /// Load the index blob through the backend-with-fallback rule. A
    /// missing blob is an empty index, not an error; a blob from another
    /// model or version is discarded.
    fn load_index(&self) -> VectorIndex {
        let model = self.embedder.model_id();

        let bytes = match self.backend() {
            BackendMode::Remote(repo) => match self.remote.get_file(&repo, cache::INDEX_KEY) {
                Ok(file) => {
                    self.mirror(cache::INDEX_KEY, &file.content);
                    Some(file.content)
                }
                Err(RemoteError::NotFound) => None,
                Err(err) => {
                    log::warn!("remote index read failed, trying cache: {err}");
                    self.cache.get(cache::INDEX_KEY)
                }
            },
            _ => self.cache.get(cache::INDEX_KEY),
        };

        match bytes {
            Some(bytes) => match VectorIndex::from_bytes(&bytes, &model) {
                Ok(index) => index,
                Err(err) => {
                    log::warn!("discarding persisted vector index: {err}");
                    VectorIndex::new(&model)
                }
            },
            None => VectorIndex::new(&model),
        }
    }

    /// Index persistence is best-effort by contract; failures are logged
    /// and the in-memory index stays warm.
    fn persist_index_bytes(&self, bytes: &[u8]) {
        match self.backend() {
            BackendMode::Remote(repo) => {
                let sha = match self.remote.get_file(&repo, cache::INDEX_KEY) {
                    Ok(file) => Some(file.sha),
                    Err(_) => None,
                };
                if let Err(err) = self.remote.put_file(
                    &repo,
                    cache::INDEX_KEY,
                    bytes,
                    sha.as_deref(),
                    "update semantic index",
                ) {
                    log::warn!("failed to persist vector index remotely: {err}");
                }
                self.mirror(cache::INDEX_KEY, bytes);
            }
            _ => {
                if let Err(err) = self.cache.put(cache::INDEX_KEY, bytes) {
                    log::warn!("failed to persist vector index locally: {err}");
                }
            }
        }
    }
}

// explicit provisioning / migration
impl DocumentStore {
    /// Create a fresh backing store under a guaranteed-unique name and
    /// migrate records currently held only in the cache into it. The
    /// manual way out of a `Failed` provisioning state.
    pub fn reset_backing_store(&self) -> Result<String, StoreError> {
        let repo = self.provisioner.provision_fresh().map_err(|err| match err {
            ProvisionError::IdentityUnverified(_) => StoreError::IdentityUnverified,
            other => StoreError::Other(anyhow!(other)),
        })?;

        let migrated = self.migrate_cache(&repo);
        log::info!("migrated {migrated} cached records into {repo}");
        Ok(repo)
    }

    fn migrate_cache(&self, repo: &str) -> usize {
        let mut migrated = 0;

        for key in self.cache.keys() {
            let Some(path) = remote_path_for_key(&key) else {
                continue;
            };
            let Some(bytes) = self.cache.get(&key) else {
                continue;
            };

            match self.remote.get_file(repo, &path) {
                Err(RemoteError::NotFound) => {
                    match self
                        .remote
                        .put_file(repo, &path, &bytes, None, &format!("migrate {key}"))
                    {
                        Ok(_) => migrated += 1,
                        Err(err) => log::warn!("failed to migrate {key}: {err}"),
                    }
                }
                Ok(_) => {}
                Err(err) => log::warn!("skipping migration of {key}: {err}"),
            }
        }

        migrated
    }
}

fn remote_path_for_key(key: &str) -> Option<String> {
    if let Some(id) = key.strip_prefix("entries/") {
        return Some(format!("{id}.md"));
    }
    if let Some(id) = key.strip_prefix("folders/") {
        return Some(format!("folders/{id}.json"));
    }
    if key == cache::INDEX_KEY {
        return Some(key.to_string());
    }
    None
}
