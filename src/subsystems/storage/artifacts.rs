//! Artifact store: named Markdown artifacts in one folder per topic.
//!
//! Blocking filesystem work runs under `spawn_blocking`; commits to the same
//! `(topic, name)` key are serialized by an in-process lock and made atomic
//! on disk by temp-file + rename.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::error::AppError;
use super::{KeyLocks, Topic, write_atomic};

/// Logical name of the research artifact.
pub const RESEARCH: &str = "research";
/// Logical name of the roadmap artifact.
pub const ROADMAP: &str = "roadmap";

const ARTIFACT_EXT: &str = "md";

/// Logical name of the assembled module `n`.
pub fn module_name(n: u32) -> String {
    format!("module_{n}")
}

/// A committed artifact read back with its metadata.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub topic: Topic,
    pub name: String,
    pub content: String,
    pub path: PathBuf,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Result of [`ArtifactStore::ensure_topic_folder`].
#[derive(Debug, Clone)]
pub struct TopicFolder {
    pub path: PathBuf,
    /// `true` when this call created the folder.
    pub created: bool,
    /// Logical names of artifacts already present, sorted.
    pub existing: Vec<String>,
}

/// Filesystem-backed artifact store. Cheap to clone.
#[derive(Clone)]
pub struct ArtifactStore {
    inner: Arc<Inner>,
}

struct Inner {
    root: PathBuf,
    locks: KeyLocks,
}

impl ArtifactStore {
    /// Open (or create) the store rooted at `root`.
    ///
    /// The root is canonicalized so artifact paths handed to users are absolute.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, AppError> {
        let root = root.as_ref();
        fs::create_dir_all(root)
            .map_err(|e| AppError::Storage(format!("cannot create {}: {e}", root.display())))?;
        let root = fs::canonicalize(root)
            .map_err(|e| AppError::Storage(format!("cannot resolve {}: {e}", root.display())))?;
        info!(root = %root.display(), "artifact store ready");
        Ok(Self {
            inner: Arc::new(Inner { root, locks: KeyLocks::default() }),
        })
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    pub fn topic_dir(&self, topic: &Topic) -> PathBuf {
        self.inner.root.join(topic.as_str())
    }

    /// On-disk path for `(topic, name)`; fails for names that are not a plain key.
    pub fn artifact_path(&self, topic: &Topic, name: &str) -> Result<PathBuf, AppError> {
        validate_name(name)?;
        Ok(self.topic_dir(topic).join(format!("{name}.{ARTIFACT_EXT}")))
    }

    /// Create the topic folder if absent. Idempotent.
    pub async fn ensure_topic_folder(&self, topic: &Topic) -> Result<TopicFolder, AppError> {
        let dir = self.topic_dir(topic);
        run_blocking("ensure_topic_folder", move || ensure_dir(&dir)).await
    }

    /// Atomically replace the artifact at `(topic, name)` and return its path.
    pub async fn write(&self, topic: &Topic, name: &str, content: &str) -> Result<PathBuf, AppError> {
        let path = self.artifact_path(topic, name)?;
        let lock = self.inner.locks.lock_for(&format!("{topic}/{name}"));
        let _guard = lock.lock().await;

        let dir = self.topic_dir(topic);
        let target = path.clone();
        let bytes = content.as_bytes().to_vec();
        run_blocking("write", move || {
            ensure_dir(&dir)?;
            write_atomic(&target, &bytes)
        })
        .await?;

        info!(%topic, name, bytes = content.len(), "artifact committed");
        Ok(path)
    }

    /// Delete the artifact at `(topic, name)`. Already absent is not an error.
    pub async fn remove(&self, topic: &Topic, name: &str) -> Result<(), AppError> {
        let path = self.artifact_path(topic, name)?;
        let lock = self.inner.locks.lock_for(&format!("{topic}/{name}"));
        let _guard = lock.lock().await;

        let removed = run_blocking("remove", move || match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AppError::Storage(format!("cannot remove {}: {e}", path.display()))),
        })
        .await?;

        if removed {
            info!(%topic, name, "artifact removed");
        }
        Ok(())
    }

    /// Most recently committed content at `(topic, name)`.
    pub async fn read(&self, topic: &Topic, name: &str) -> Result<String, AppError> {
        Ok(self.read_artifact(topic, name).await?.content)
    }

    /// Like [`read`](Self::read) but with path and modification time.
    pub async fn read_artifact(&self, topic: &Topic, name: &str) -> Result<Artifact, AppError> {
        let path = self.artifact_path(topic, name)?;
        let target = path.clone();
        let (topic_key, key) = (topic.to_string(), name.to_string());
        let (content, updated_at) = run_blocking("read", move || {
            let content = fs::read_to_string(&target).map_err(|e| match e.kind() {
                ErrorKind::NotFound => AppError::NotFound { topic: topic_key, name: key },
                _ => AppError::Storage(format!("cannot read {}: {e}", target.display())),
            })?;
            let updated_at = fs::metadata(&target)
                .and_then(|m| m.modified())
                .ok()
                .map(DateTime::<Utc>::from);
            Ok((content, updated_at))
        })
        .await?;

        debug!(%topic, name, bytes = content.len(), "artifact read");
        Ok(Artifact {
            topic: topic.clone(),
            name: name.to_string(),
            content,
            path,
            updated_at,
        })
    }

    /// Non-failing existence probe; I/O trouble reads as "absent".
    pub async fn exists(&self, topic: &Topic, name: &str) -> bool {
        let Ok(path) = self.artifact_path(topic, name) else {
            return false;
        };
        tokio::task::spawn_blocking(move || path.is_file())
            .await
            .unwrap_or(false)
    }

    /// Logical names of the artifacts stored for `topic`, sorted.
    pub async fn list(&self, topic: &Topic) -> Result<Vec<String>, AppError> {
        let dir = self.topic_dir(topic);
        run_blocking("list", move || {
            if !dir.is_dir() {
                return Ok(Vec::new());
            }
            list_artifacts(&dir)
        })
        .await
    }
}

// ── blocking helpers ──────────────────────────────────────────────────────────

async fn run_blocking<T, F>(op: &'static str, f: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Storage(format!("{op} join: {e}")))?
}

fn ensure_dir(dir: &Path) -> Result<TopicFolder, AppError> {
    match fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => Ok(TopicFolder {
            path: dir.to_path_buf(),
            created: false,
            existing: list_artifacts(dir)?,
        }),
        Ok(_) => Err(AppError::Storage(format!(
            "{} exists but is not a directory",
            dir.display()
        ))),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            fs::create_dir_all(dir)
                .map_err(|e| AppError::Storage(format!("cannot create {}: {e}", dir.display())))?;
            info!(path = %dir.display(), "topic folder created");
            Ok(TopicFolder { path: dir.to_path_buf(), created: true, existing: Vec::new() })
        }
        Err(e) => Err(AppError::Storage(format!("cannot stat {}: {e}", dir.display()))),
    }
}

fn list_artifacts(dir: &Path) -> Result<Vec<String>, AppError> {
    let mut names = Vec::new();
    let entries = fs::read_dir(dir)
        .map_err(|e| AppError::Storage(format!("cannot read {}: {e}", dir.display())))?;
    for entry in entries {
        let entry = entry
            .map_err(|e| AppError::Storage(format!("cannot read entry in {}: {e}", dir.display())))?;
        let path = entry.path();
        if !path.is_file() || path.extension().and_then(|x| x.to_str()) != Some(ARTIFACT_EXT) {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            // Hidden files are never artifacts.
            if !stem.starts_with('.') {
                names.push(stem.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

fn validate_name(name: &str) -> Result<(), AppError> {
    let ok = !name.is_empty()
        && name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if ok {
        Ok(())
    } else {
        Err(AppError::Storage(format!("invalid artifact name: {name:?}")))
    }
}
