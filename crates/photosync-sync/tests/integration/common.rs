//! Shared fixtures for sync engine integration tests
//!
//! [`MockDrive`] is an in-memory OneDrive: a tree of folders and files with
//! upload sessions, scripted failures and a log of every call made.

#![allow(dead_code)]

use std::cell::Cell;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use photosync_core::config::{RemoteConflictPolicy, UploadProfile};
use photosync_core::domain::{AuthError, CacheEntry, DriveError, RelativePath, RemotePath};
use photosync_core::ports::{
    ChunkAck, ConflictBehavior, IAuthenticator, IDriveClient, IDriveClientFactory, IUploadCache,
    RemoteItem, UploadSession,
};
use photosync_core::retry::RetryPolicy;
use photosync_sync::SyncSettings;

pub const MIB: usize = 1024 * 1024;

// ============================================================================
// MockDrive
// ============================================================================

/// One recorded drive call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    GetByPath(String),
    GetChild(String),
    List(String),
    CreateFolder(String),
    UploadSimple { name: String, conflict: ConflictBehavior },
    SessionStart { name: String, conflict: ConflictBehavior },
    Append { offset: u64, len: u64, total: u64 },
    Cancel,
    Delete(String),
    CameraRoll,
    Download(String),
}

#[derive(Debug, Clone)]
struct Node {
    id: String,
    name: String,
    parent: Option<String>,
    is_folder: bool,
    data: Vec<u8>,
    created: Option<DateTime<Utc>>,
    taken: Option<DateTime<Utc>>,
}

fn default_created() -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(1_600_000_000, 0)
}

struct Session {
    folder_id: String,
    name: String,
    received: Vec<u8>,
}

#[derive(Default)]
struct State {
    next_id: u64,
    nodes: HashMap<String, Node>,
    sessions: HashMap<String, Session>,
    calls: Vec<Call>,
    append_failures: HashMap<u64, VecDeque<DriveError>>,
    upload_failures: HashMap<String, DriveError>,
    create_folder_failures: HashMap<String, DriveError>,
    racing_folders: Vec<String>,
    size_overrides: HashMap<String, u64>,
    camera_roll: Vec<String>,
    cancel_after_uploads: Option<(usize, CancellationToken)>,
    completed_uploads: usize,
}

impl State {
    fn new_id(&mut self) -> String {
        self.next_id += 1;
        format!("ID{}", self.next_id)
    }

    fn child(&self, parent: &str, name: &str) -> Option<&Node> {
        self.nodes.values().find(|n| {
            n.parent.as_deref() == Some(parent) && n.name.eq_ignore_ascii_case(name)
        })
    }

    fn resolve(&self, path: &str) -> Option<&Node> {
        let mut current = self.nodes.get("root")?;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current = self.child(&current.id, segment)?;
        }
        Some(current)
    }

    fn item(&self, node: &Node) -> RemoteItem {
        let size = self
            .size_overrides
            .get(&node.name)
            .copied()
            .unwrap_or(node.data.len() as u64);
        RemoteItem {
            id: node.id.clone(),
            name: node.name.clone(),
            size: if node.is_folder { 0 } else { size },
            is_folder: node.is_folder,
            created: node.created,
            last_modified: None,
            taken: node.taken,
        }
    }

    fn insert_folder(&mut self, parent: &str, name: &str) -> String {
        let id = self.new_id();
        self.nodes.insert(
            id.clone(),
            Node {
                id: id.clone(),
                name: name.to_string(),
                parent: Some(parent.to_string()),
                is_folder: true,
                data: Vec::new(),
                created: default_created(),
                taken: None,
            },
        );
        id
    }

    /// Stores a file, replacing any existing one of the same name
    fn put_file(&mut self, parent: &str, name: &str, data: Vec<u8>) -> RemoteItem {
        let id = match self.child(parent, name) {
            Some(existing) => existing.id.clone(),
            None => self.new_id(),
        };
        let node = Node {
            id: id.clone(),
            name: name.to_string(),
            parent: Some(parent.to_string()),
            is_folder: false,
            data,
            created: default_created(),
            taken: None,
        };
        let item = self.item(&node);
        self.nodes.insert(id, node);
        item
    }

    /// Stores an uploaded file and fires the scripted cancellation
    fn finish_upload(&mut self, parent: &str, name: &str, data: Vec<u8>) -> RemoteItem {
        let item = self.put_file(parent, name, data);
        self.completed_uploads += 1;
        if let Some((after, token)) = &self.cancel_after_uploads {
            if self.completed_uploads >= *after {
                token.cancel();
            }
        }
        item
    }

    fn check_conflict(&self, parent: &str, name: &str, conflict: ConflictBehavior) -> Result<(), DriveError> {
        if conflict == ConflictBehavior::Fail && self.child(parent, name).is_some() {
            return Err(DriveError::Conflict(format!("{name} already exists")));
        }
        Ok(())
    }
}

pub struct MockDrive {
    state: Mutex<State>,
}

impl MockDrive {
    pub fn new() -> Arc<Self> {
        let mut state = State::default();
        state.nodes.insert(
            "root".to_string(),
            Node {
                id: "root".to_string(),
                name: "root".to_string(),
                parent: None,
                is_folder: true,
                data: Vec::new(),
                created: default_created(),
                taken: None,
            },
        );
        Arc::new(Self {
            state: Mutex::new(state),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Creates `path` and any missing parents, returning the folder id
    pub fn add_folder(&self, path: &str) -> String {
        let mut state = self.lock();
        let mut parent = "root".to_string();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            parent = match state.child(&parent, segment) {
                Some(node) => node.id.clone(),
                None => state.insert_folder(&parent, segment),
            };
        }
        parent
    }

    pub fn add_file(&self, path: &str, data: &[u8]) -> String {
        let (dir, name) = path.rsplit_once('/').unwrap_or(("", path));
        let parent = self.add_folder(dir);
        self.lock().put_file(&parent, name, data.to_vec()).id
    }

    pub fn file_data(&self, path: &str) -> Option<Vec<u8>> {
        let state = self.lock();
        state.resolve(path).filter(|n| !n.is_folder).map(|n| n.data.clone())
    }

    pub fn folder_exists(&self, path: &str) -> bool {
        self.lock().resolve(path).is_some_and(|n| n.is_folder)
    }

    pub fn add_camera_roll_item(&self, name: &str, data: &[u8], taken: Option<DateTime<Utc>>) -> String {
        let folder = self.add_folder("/Pictures/Camera Roll");
        let mut state = self.lock();
        let id = state.new_id();
        state.nodes.insert(
            id.clone(),
            Node {
                id: id.clone(),
                name: name.to_string(),
                parent: Some(folder),
                is_folder: false,
                data: data.to_vec(),
                created: None,
                taken,
            },
        );
        state.camera_roll.push(id.clone());
        id
    }

    pub fn item_exists(&self, id: &str) -> bool {
        self.lock().nodes.contains_key(id)
    }

    // ---- scripting ----

    /// Appends starting at `offset` fail with `errors`, in order
    pub fn fail_append_at(&self, offset: u64, errors: Vec<DriveError>) {
        self.lock()
            .append_failures
            .insert(offset, errors.into_iter().collect());
    }

    /// Every upload of a file called `name` fails with `err`
    pub fn fail_uploads_named(&self, name: &str, err: DriveError) {
        self.lock().upload_failures.insert(name.to_string(), err);
    }

    pub fn allow_uploads_named(&self, name: &str) {
        self.lock().upload_failures.remove(name);
    }

    pub fn fail_create_folder(&self, name: &str, err: DriveError) {
        self.lock()
            .create_folder_failures
            .insert(name.to_string(), err);
    }

    /// `create_folder(name)` creates the folder but answers 409
    pub fn race_create_folder(&self, name: &str) {
        self.lock().racing_folders.push(name.to_string());
    }

    /// Items called `name` report `size` regardless of content
    pub fn override_size(&self, name: &str, size: u64) {
        self.lock().size_overrides.insert(name.to_string(), size);
    }

    pub fn cancel_after_uploads(&self, uploads: usize, token: CancellationToken) {
        self.lock().cancel_after_uploads = Some((uploads, token));
    }

    // ---- inspection ----

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Calls that start sending file content
    pub fn transfer_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::UploadSimple { .. } | Call::SessionStart { .. }))
            .count()
    }

    pub fn append_offsets(&self) -> Vec<u64> {
        self.calls()
            .iter()
            .filter_map(|c| match c {
                Call::Append { offset, .. } => Some(*offset),
                _ => None,
            })
            .collect()
    }

    pub fn create_folder_calls(&self, name: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::CreateFolder(n) if n == name))
            .count()
    }
}

#[async_trait::async_trait]
impl IDriveClient for MockDrive {
    async fn get_item_by_path(&self, path: &RemotePath) -> Result<Option<RemoteItem>, DriveError> {
        let mut state = self.lock();
        state.calls.push(Call::GetByPath(path.to_string()));
        Ok(state.resolve(path.as_str()).map(|n| state.item(n)))
    }

    async fn get_child(&self, folder_id: &str, name: &str) -> Result<Option<RemoteItem>, DriveError> {
        let mut state = self.lock();
        state.calls.push(Call::GetChild(name.to_string()));
        Ok(state.child(folder_id, name).map(|n| state.item(n)))
    }

    async fn list_folder(&self, folder_id: &str) -> Result<Vec<RemoteItem>, DriveError> {
        let mut state = self.lock();
        state.calls.push(Call::List(folder_id.to_string()));
        if !state.nodes.contains_key(folder_id) {
            return Err(DriveError::NotFound(folder_id.to_string()));
        }
        let mut children: Vec<_> = state
            .nodes
            .values()
            .filter(|n| n.parent.as_deref() == Some(folder_id))
            .map(|n| state.item(n))
            .collect();
        children.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(children)
    }

    async fn create_folder(&self, parent_id: &str, name: &str) -> Result<RemoteItem, DriveError> {
        let mut state = self.lock();
        state.calls.push(Call::CreateFolder(name.to_string()));
        if let Some(err) = state.create_folder_failures.get(name) {
            return Err(err.clone());
        }
        if state.child(parent_id, name).is_some() {
            return Err(DriveError::Conflict(format!("{name} already exists")));
        }
        let id = state.insert_folder(parent_id, name);
        if state.racing_folders.iter().any(|n| n == name) {
            return Err(DriveError::Conflict(format!("{name} already exists")));
        }
        let node = state.nodes[&id].clone();
        Ok(state.item(&node))
    }

    async fn upload_simple(
        &self,
        folder_id: &str,
        name: &str,
        data: Vec<u8>,
        conflict: ConflictBehavior,
    ) -> Result<RemoteItem, DriveError> {
        let mut state = self.lock();
        state.calls.push(Call::UploadSimple {
            name: name.to_string(),
            conflict,
        });
        if let Some(err) = state.upload_failures.get(name) {
            return Err(err.clone());
        }
        state.check_conflict(folder_id, name, conflict)?;
        Ok(state.finish_upload(folder_id, name, data))
    }

    async fn upload_session_start(
        &self,
        folder_id: &str,
        name: &str,
        conflict: ConflictBehavior,
    ) -> Result<UploadSession, DriveError> {
        let mut state = self.lock();
        state.calls.push(Call::SessionStart {
            name: name.to_string(),
            conflict,
        });
        if let Some(err) = state.upload_failures.get(name) {
            return Err(err.clone());
        }
        state.check_conflict(folder_id, name, conflict)?;
        let url = format!("https://upload.example/{}", state.new_id());
        state.sessions.insert(
            url.clone(),
            Session {
                folder_id: folder_id.to_string(),
                name: name.to_string(),
                received: Vec::new(),
            },
        );
        Ok(UploadSession {
            upload_url: url,
            expires_at: None,
        })
    }

    async fn upload_session_append(
        &self,
        session: &UploadSession,
        offset: u64,
        total: u64,
        chunk: Vec<u8>,
    ) -> Result<ChunkAck, DriveError> {
        let mut state = self.lock();
        state.calls.push(Call::Append {
            offset,
            len: chunk.len() as u64,
            total,
        });
        if let Some(err) = state
            .append_failures
            .get_mut(&offset)
            .and_then(VecDeque::pop_front)
        {
            return Err(err);
        }

        let upload = state
            .sessions
            .get_mut(&session.upload_url)
            .ok_or_else(|| DriveError::NotFound("unknown session".into()))?;
        if offset != upload.received.len() as u64 {
            return Err(DriveError::InvalidResponse(format!(
                "expected offset {}, got {offset}",
                upload.received.len()
            )));
        }
        upload.received.extend_from_slice(&chunk);
        let received = upload.received.len() as u64;
        if received < total {
            return Ok(ChunkAck::Accepted {
                next_offset: received,
            });
        }

        let upload = state
            .sessions
            .remove(&session.upload_url)
            .ok_or_else(|| DriveError::NotFound("unknown session".into()))?;
        Ok(ChunkAck::Completed(state.finish_upload(
            &upload.folder_id,
            &upload.name,
            upload.received,
        )))
    }

    async fn upload_session_cancel(&self, session: &UploadSession) -> Result<(), DriveError> {
        let mut state = self.lock();
        state.calls.push(Call::Cancel);
        state.sessions.remove(&session.upload_url);
        Ok(())
    }

    async fn delete_item(&self, item_id: &str) -> Result<(), DriveError> {
        let mut state = self.lock();
        state.calls.push(Call::Delete(item_id.to_string()));
        state.camera_roll.retain(|id| id != item_id);
        state
            .nodes
            .remove(item_id)
            .map(|_| ())
            .ok_or_else(|| DriveError::NotFound(item_id.to_string()))
    }

    async fn camera_roll_items(&self) -> Result<Vec<RemoteItem>, DriveError> {
        let mut state = self.lock();
        state.calls.push(Call::CameraRoll);
        Ok(state
            .camera_roll
            .iter()
            .filter_map(|id| state.nodes.get(id))
            .map(|n| state.item(n))
            .collect())
    }

    async fn download_item(&self, item_id: &str, destination: &Path) -> Result<u64, DriveError> {
        let data = {
            let mut state = self.lock();
            state.calls.push(Call::Download(item_id.to_string()));
            state
                .nodes
                .get(item_id)
                .map(|n| n.data.clone())
                .ok_or_else(|| DriveError::NotFound(item_id.to_string()))?
        };
        tokio::fs::write(destination, &data)
            .await
            .map_err(|e| DriveError::InvalidResponse(e.to_string()))?;
        Ok(data.len() as u64)
    }
}

/// Hands out the same mock to every profile
pub struct MockFactory(pub Arc<MockDrive>);

impl IDriveClientFactory for MockFactory {
    fn create(
        &self,
        _profile: &str,
        _access_token: String,
        _authenticator: Arc<dyn IAuthenticator>,
    ) -> Arc<dyn IDriveClient> {
        self.0.clone()
    }
}

// ============================================================================
// Authenticators
// ============================================================================

/// Grants a token to every profile except those listed
#[derive(Default)]
pub struct StubAuth {
    pub denied: Vec<String>,
    pub hanging: Vec<String>,
}

#[async_trait::async_trait]
impl IAuthenticator for StubAuth {
    async fn get_access_token(&self, profile: &str) -> Result<String, AuthError> {
        if self.hanging.iter().any(|p| p == profile) {
            std::future::pending::<()>().await;
        }
        if self.denied.iter().any(|p| p == profile) {
            return Err(AuthError::Denied(format!("{profile} declined")));
        }
        Ok(format!("token-{profile}"))
    }
}

// ============================================================================
// Cache wrapper
// ============================================================================

/// Forwards to an inner cache and counts lookups
pub struct CountingCache<'a> {
    pub inner: &'a mut dyn IUploadCache,
    pub lookups: Cell<usize>,
}

impl<'a> CountingCache<'a> {
    pub fn new(inner: &'a mut dyn IUploadCache) -> Self {
        Self {
            inner,
            lookups: Cell::new(0),
        }
    }
}

#[async_trait::async_trait]
impl IUploadCache for CountingCache<'_> {
    fn lookup(&self, relative_path: &RelativePath) -> Option<CacheEntry> {
        self.lookups.set(self.lookups.get() + 1);
        self.inner.lookup(relative_path)
    }

    async fn record(&mut self, entry: CacheEntry) -> anyhow::Result<()> {
        self.inner.record(entry).await
    }

    async fn remove(&mut self, relative_path: &RelativePath) -> anyhow::Result<()> {
        self.inner.remove(relative_path).await
    }

    async fn flush(&mut self) -> anyhow::Result<()> {
        self.inner.flush().await
    }

    async fn clear(&mut self) -> anyhow::Result<()> {
        self.inner.clear().await
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn recovered_from_corruption(&self) -> bool {
        self.inner.recovered_from_corruption()
    }
}

// ============================================================================
// Local fixtures
// ============================================================================

/// Upload profile for `source` targeting `/Backup`
pub fn profile(source: &Path, patterns: &[&str]) -> UploadProfile {
    UploadProfile {
        name: "scans".to_string(),
        source_folder: source.to_path_buf(),
        onedrive_folder: "/Backup".to_string(),
        file_patterns: patterns.iter().map(|p| p.to_string()).collect(),
        preserve_structure: true,
        use_cache: true,
        use_watermark: true,
        remove_uploaded: false,
        on_remote_conflict: RemoteConflictPolicy::Replace,
    }
}

/// Fast retries and 1 MiB chunks
pub fn settings() -> SyncSettings {
    SyncSettings {
        retry: RetryPolicy::new(3, Duration::from_millis(1)),
        chunk_size: MIB,
        max_failure_ratio: 0.5,
    }
}

/// Writes `data` to `root/relative`, creating parent directories
pub fn write_file(root: &Path, relative: &str, data: &[u8]) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, data).unwrap();
    path
}

/// Sets a file's mtime to `secs` after the Unix epoch
pub fn set_mtime(path: &Path, secs: u64) {
    let file = std::fs::File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
        .unwrap();
}

/// Sets a directory's mtime to `secs` after the Unix epoch
pub fn set_dir_mtime(dir: &Path, secs: u64) {
    std::fs::File::open(dir)
        .unwrap()
        .set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
        .unwrap();
}

/// Writes a file and pins its mtime
pub fn write_file_at(root: &Path, relative: &str, data: &[u8], secs: u64) -> PathBuf {
    let path = write_file(root, relative, data);
    set_mtime(&path, secs);
    path
}

pub fn rel(path: &str) -> RelativePath {
    RelativePath::new(path).unwrap()
}
