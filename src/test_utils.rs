//! In-memory collaborators for tests.
//!
//! [`InMemoryFileSystem`] and [`InMemoryWebRequest`] stand in for the
//! production proxies so strategy behavior can be pinned without disk or
//! network; [`RecordingStrategy`] is a scriptable effective strategy that
//! counts the calls the decorators make to it.
//!
//! Available to unit tests via `cfg(test)` and to the integration suites
//! through the `test-utils` feature.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::core::BootstrapError;
use crate::proxy::fs::matches_pattern;
use crate::proxy::{FileSystemProxy, WebRequestProxy};
use crate::strategy::DownloadStrategy;
use crate::verification::HashFile;

/// Uppercase hex SHA-256 of a byte slice, matching the manifest format.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode_upper(Sha256::digest(data))
}

#[derive(Default)]
struct FsState {
    files: HashMap<PathBuf, Vec<u8>>,
    mtimes: HashMap<PathBuf, DateTime<Utc>>,
    dirs: Vec<PathBuf>,
    versions: HashMap<PathBuf, String>,
    /// Archive contents keyed by archive bytes, so extraction keeps
    /// working after the archive file is copied or moved around.
    archives: HashMap<Vec<u8>, Vec<(String, Vec<u8>)>>,
    executing_binary: Option<PathBuf>,
}

impl FsState {
    fn register_dirs(&mut self, path: &Path) {
        let mut current = path.to_path_buf();
        loop {
            if !self.dirs.contains(&current) {
                self.dirs.push(current.clone());
            }
            match current.parent() {
                Some(parent) if parent != Path::new("") => current = parent.to_path_buf(),
                _ => break,
            }
        }
    }

    fn insert_file(&mut self, path: &Path, bytes: Vec<u8>) {
        if let Some(parent) = path.parent() {
            self.register_dirs(parent);
        }
        self.files.insert(path.to_path_buf(), bytes);
        self.mtimes.insert(path.to_path_buf(), Utc::now());
    }
}

/// A filesystem held entirely in memory.
pub struct InMemoryFileSystem {
    state: Mutex<FsState>,
}

impl Default for InMemoryFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryFileSystem {
    pub fn new() -> InMemoryFileSystem {
        let fs = InMemoryFileSystem {
            state: Mutex::new(FsState::default()),
        };
        fs.create_dir(Path::new("/tmp"));
        fs
    }

    pub fn add_file(&self, path: &Path, bytes: Vec<u8>) {
        self.state.lock().unwrap().insert_file(path, bytes);
    }

    pub fn create_dir(&self, path: &Path) {
        self.state.lock().unwrap().register_dirs(path);
    }

    /// Teach the mock to "extract" any file whose bytes equal `content`.
    pub fn stub_archive(&self, content: &[u8], entries: &[(&str, &[u8])]) {
        let entries = entries
            .iter()
            .map(|(name, bytes)| (name.to_string(), bytes.to_vec()))
            .collect();
        self.state.lock().unwrap().archives.insert(content.to_vec(), entries);
    }

    pub fn set_executing_binary(&self, path: &Path) {
        self.state.lock().unwrap().executing_binary = Some(path.to_path_buf());
    }

    pub fn set_local_version(&self, path: &Path, version: &str) {
        self.state.lock().unwrap().versions.insert(path.to_path_buf(), version.to_string());
    }

    pub fn set_last_write_time(&self, path: &Path, time: DateTime<Utc>) {
        self.state.lock().unwrap().mtimes.insert(path.to_path_buf(), time);
    }

    pub fn last_write_time_of(&self, path: &Path) -> Option<DateTime<Utc>> {
        self.state.lock().unwrap().mtimes.get(path).copied()
    }

    pub fn file_content(&self, path: &Path) -> Option<Vec<u8>> {
        self.state.lock().unwrap().files.get(path).cloned()
    }

    pub fn files_under(&self, dir: &Path) -> Vec<PathBuf> {
        self.state
            .lock()
            .unwrap()
            .files
            .keys()
            .filter(|p| p.starts_with(dir))
            .cloned()
            .collect()
    }

    pub fn directories_under(&self, dir: &Path) -> Vec<PathBuf> {
        self.state
            .lock()
            .unwrap()
            .dirs
            .iter()
            .filter(|p| p.parent() == Some(dir))
            .cloned()
            .collect()
    }
}

impl FileSystemProxy for InMemoryFileSystem {
    fn file_exists(&self, path: &Path) -> bool {
        self.state.lock().unwrap().files.contains_key(path)
    }

    fn directory_exists(&self, path: &Path) -> bool {
        self.state.lock().unwrap().dirs.contains(&path.to_path_buf())
    }

    fn copy_file(&self, from: &Path, to: &Path, overwrite: bool) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let bytes = state
            .files
            .get(from)
            .cloned()
            .ok_or_else(|| anyhow!("no such file: {}", from.display()))?;
        if !overwrite && state.files.contains_key(to) {
            return Err(anyhow!("destination already exists: {}", to.display()));
        }
        state.insert_file(to, bytes);
        Ok(())
    }

    fn delete_file(&self, path: &Path) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .files
            .remove(path)
            .ok_or_else(|| anyhow!("no such file: {}", path.display()))?;
        state.mtimes.remove(path);
        state.versions.remove(path);
        Ok(())
    }

    fn move_file(&self, from: &Path, to: &Path) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let bytes = state
            .files
            .remove(from)
            .ok_or_else(|| anyhow!("no such file: {}", from.display()))?;
        state.mtimes.remove(from);
        let version = state.versions.remove(from);
        state.insert_file(to, bytes);
        if let Some(version) = version {
            state.versions.insert(to.to_path_buf(), version);
        }
        Ok(())
    }

    fn create_directory(&self, path: &Path) -> Result<()> {
        self.state.lock().unwrap().register_dirs(path);
        Ok(())
    }

    fn delete_directory(&self, path: &Path, recursive: bool) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if recursive {
            state.files.retain(|p, _| !p.starts_with(path));
            state.mtimes.retain(|p, _| !p.starts_with(path));
        }
        state.dirs.retain(|p| !p.starts_with(path));
        Ok(())
    }

    fn get_directories(&self, path: &Path) -> Result<Vec<String>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .dirs
            .iter()
            .filter(|p| p.parent() == Some(path))
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect())
    }

    fn enumerate_files(&self, path: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .files
            .keys()
            .filter(|p| p.parent() == Some(path))
            .filter(|p| {
                p.file_name()
                    .map(|n| matches_pattern(&n.to_string_lossy(), pattern))
                    .unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    fn last_write_time(&self, path: &Path) -> Result<DateTime<Utc>> {
        self.state
            .lock()
            .unwrap()
            .mtimes
            .get(path)
            .copied()
            .ok_or_else(|| anyhow!("no such file: {}", path.display()))
    }

    fn touch(&self, path: &Path) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if !state.files.contains_key(path) {
            return Err(anyhow!("no such file: {}", path.display()));
        }
        state.mtimes.insert(path.to_path_buf(), Utc::now());
        Ok(())
    }

    fn local_file_version(&self, path: &Path) -> String {
        let state = self.state.lock().unwrap();
        if !state.files.contains_key(path) {
            return String::new();
        }
        state.versions.get(path).cloned().unwrap_or_default()
    }

    fn read_all_lines(&self, path: &Path) -> Result<Vec<String>> {
        let state = self.state.lock().unwrap();
        let bytes = state
            .files
            .get(path)
            .ok_or_else(|| anyhow!("no such file: {}", path.display()))?;
        Ok(String::from_utf8_lossy(bytes)
            .lines()
            .map(|l| l.trim_end_matches('\r').to_string())
            .collect())
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        self.state
            .lock()
            .unwrap()
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow!("no such file: {}", path.display()))
    }

    fn write_file(&self, path: &Path, contents: &str) -> Result<()> {
        self.state.lock().unwrap().insert_file(path, contents.as_bytes().to_vec());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        PathBuf::from("/tmp")
    }

    fn executing_binary_path(&self) -> Result<PathBuf> {
        self.state
            .lock()
            .unwrap()
            .executing_binary
            .clone()
            .ok_or_else(|| anyhow!("no executing binary configured"))
    }

    fn extract_archive(&self, archive: &Path, dest: &Path) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let bytes = state
            .files
            .get(archive)
            .cloned()
            .ok_or_else(|| anyhow!("no such file: {}", archive.display()))?;
        let entries = state
            .archives
            .get(&bytes)
            .cloned()
            .ok_or_else(|| anyhow!("not an archive: {}", archive.display()))?;
        for (name, content) in entries {
            state.insert_file(&dest.join(name), content);
        }
        Ok(())
    }
}

enum FileStub {
    /// Responses served in order; the last one repeats.
    Queue(VecDeque<Vec<u8>>),
    NetworkError,
}

/// A scriptable HTTP collaborator that writes downloads into an
/// [`InMemoryFileSystem`].
pub struct InMemoryWebRequest {
    fs: Arc<InMemoryFileSystem>,
    strings: Mutex<HashMap<String, Result<String, ()>>>,
    files: Mutex<HashMap<String, FileStub>>,
    log: Mutex<Vec<String>>,
}

impl InMemoryWebRequest {
    pub fn new(fs: Arc<InMemoryFileSystem>) -> InMemoryWebRequest {
        InMemoryWebRequest {
            fs,
            strings: Mutex::new(HashMap::new()),
            files: Mutex::new(HashMap::new()),
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn stub_string(&self, url: &str, body: &str) {
        self.strings.lock().unwrap().insert(url.to_string(), Ok(body.to_string()));
    }

    pub fn stub_string_error(&self, url: &str) {
        self.strings.lock().unwrap().insert(url.to_string(), Err(()));
    }

    pub fn stub_file(&self, url: &str, bytes: Vec<u8>) {
        self.stub_file_sequence(url, vec![bytes]);
    }

    pub fn stub_file_sequence(&self, url: &str, responses: Vec<Vec<u8>>) {
        self.files
            .lock()
            .unwrap()
            .insert(url.to_string(), FileStub::Queue(responses.into()));
    }

    pub fn stub_file_error(&self, url: &str) {
        self.files.lock().unwrap().insert(url.to_string(), FileStub::NetworkError);
    }

    pub fn requested_urls(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn file_request_count(&self, url: &str) -> usize {
        self.log.lock().unwrap().iter().filter(|u| u.as_str() == url).count()
    }

    fn network_error(url: &str) -> anyhow::Error {
        BootstrapError::Network {
            url: url.to_string(),
            reason: "stubbed network failure".to_string(),
        }
        .into()
    }
}

impl WebRequestProxy for InMemoryWebRequest {
    fn download_string(&self, url: &str) -> Result<String> {
        self.log.lock().unwrap().push(url.to_string());
        match self.strings.lock().unwrap().get(url) {
            Some(Ok(body)) => Ok(body.clone()),
            _ => Err(Self::network_error(url)),
        }
    }

    fn download_file(&self, url: &str, target: &Path) -> Result<()> {
        self.log.lock().unwrap().push(url.to_string());
        let mut files = self.files.lock().unwrap();
        match files.get_mut(url) {
            Some(FileStub::Queue(queue)) => {
                let bytes = if queue.len() > 1 {
                    queue.pop_front().unwrap_or_default()
                } else {
                    queue.front().cloned().unwrap_or_default()
                };
                self.fs.add_file(target, bytes);
                Ok(())
            }
            Some(FileStub::NetworkError) | None => Err(Self::network_error(url)),
        }
    }
}

/// A scriptable effective strategy that records how it is driven.
pub struct RecordingStrategy {
    name: String,
    fs: Arc<InMemoryFileSystem>,
    latest: String,
    payload: Vec<u8>,
    hash_file: Option<String>,
    network_fail: bool,
    latest_calls: Arc<Mutex<usize>>,
    download_calls: Arc<Mutex<usize>>,
    hash_calls: Arc<Mutex<usize>>,
    self_update_calls: Arc<Mutex<usize>>,
}

impl RecordingStrategy {
    pub fn new(name: &str, fs: Arc<InMemoryFileSystem>) -> RecordingStrategy {
        RecordingStrategy {
            name: name.to_string(),
            fs,
            latest: "1.0.0".to_string(),
            payload: b"payload".to_vec(),
            hash_file: None,
            network_fail: false,
            latest_calls: Arc::new(Mutex::new(0)),
            download_calls: Arc::new(Mutex::new(0)),
            hash_calls: Arc::new(Mutex::new(0)),
            self_update_calls: Arc::new(Mutex::new(0)),
        }
    }

    pub fn with_latest(mut self, version: &str) -> RecordingStrategy {
        self.latest = version.to_string();
        self
    }

    pub fn with_payload(mut self, payload: &[u8]) -> RecordingStrategy {
        self.payload = payload.to_vec();
        self
    }

    pub fn with_hash_file(mut self, content: &str) -> RecordingStrategy {
        self.hash_file = Some(content.to_string());
        self
    }

    pub fn failing_with_network_error(mut self) -> RecordingStrategy {
        self.network_fail = true;
        self
    }

    pub fn latest_counter(&self) -> Arc<Mutex<usize>> {
        self.latest_calls.clone()
    }

    pub fn download_counter(&self) -> Arc<Mutex<usize>> {
        self.download_calls.clone()
    }

    pub fn hash_file_counter(&self) -> Arc<Mutex<usize>> {
        self.hash_calls.clone()
    }

    pub fn self_update_counter(&self) -> Arc<Mutex<usize>> {
        self.self_update_calls.clone()
    }

    fn network_error(&self) -> anyhow::Error {
        BootstrapError::Network {
            url: format!("stub://{}", self.name),
            reason: "stubbed network failure".to_string(),
        }
        .into()
    }
}

impl DownloadStrategy for RecordingStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn can_download_hash_file(&self) -> bool {
        self.hash_file.is_some()
    }

    fn get_latest_version(&self, _ignore_prerelease: bool) -> Result<String> {
        *self.latest_calls.lock().unwrap() += 1;
        if self.network_fail {
            return Err(self.network_error());
        }
        Ok(self.latest.clone())
    }

    fn download_version(
        &self,
        _version: &str,
        target: &Path,
        _hash_file: Option<&HashFile>,
    ) -> Result<()> {
        *self.download_calls.lock().unwrap() += 1;
        if self.network_fail {
            return Err(self.network_error());
        }
        self.fs.add_file(target, self.payload.clone());
        Ok(())
    }

    fn self_update(&self, _version: &str) -> Result<()> {
        *self.self_update_calls.lock().unwrap() += 1;
        if self.network_fail {
            return Err(self.network_error());
        }
        Ok(())
    }

    fn download_hash_file(&self, _version: &str) -> Result<Option<HashFile>> {
        *self.hash_calls.lock().unwrap() += 1;
        if self.network_fail {
            return Err(self.network_error());
        }
        Ok(self.hash_file.as_ref().map(|content| HashFile::parse(content.lines())))
    }
}
