//! Progress ledger: one JSON document per user under `progress_dir`.
//!
//! `{progress_dir}/{user}.json`:
//! ```json
//! { "user_id": "learner_001",
//!   "topics": { "fastapi": { "completed_modules": [1], "milestones": {...},
//!                            "started_at": "...", "last_activity": "..." } } }
//! ```
//!
//! Every mutation is read-modify-commit under a per-user lock; the commit is
//! atomic, so a crash mid-mutation leaves the previous document intact.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::AppError;
use super::{Clock, KeyLocks, Topic, slugify, system_clock, write_atomic};

/// Milestone flag set when research is first stored for a topic.
pub const MILESTONE_RESEARCH: &str = "research_complete";
/// Milestone flag set when a roadmap is first stored for a topic.
pub const MILESTONE_ROADMAP: &str = "roadmap_ready";

/// Milestone flag for module `n`.
pub fn module_milestone(n: u32) -> String {
    format!("module_{n}_complete")
}

/// Per-(user, topic) learning progress.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    #[serde(default)]
    pub completed_modules: BTreeSet<u32>,
    /// Milestone flag → when it was first reached.
    #[serde(default)]
    pub milestones: BTreeMap<String, DateTime<Utc>>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_activity: Option<DateTime<Utc>>,
}

impl ProgressRecord {
    pub fn is_empty(&self) -> bool {
        self.completed_modules.is_empty() && self.milestones.is_empty()
    }

    pub fn has_milestone(&self, flag: &str) -> bool {
        self.milestones.contains_key(flag)
    }

    /// Highest completed module number, if any.
    pub fn last_module(&self) -> Option<u32> {
        self.completed_modules.iter().next_back().copied()
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.started_at.get_or_insert(now);
        self.last_activity = Some(now);
    }
}

/// On-disk shape of `{user}.json`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerFile {
    user_id: String,
    #[serde(default)]
    topics: BTreeMap<Topic, ProgressRecord>,
}

/// Durable per-user progress store. Cheap to clone.
#[derive(Clone)]
pub struct ProgressLedger {
    inner: Arc<Inner>,
}

struct Inner {
    dir: PathBuf,
    locks: KeyLocks,
    clock: Clock,
}

impl ProgressLedger {
    /// Open (or create) the ledger directory.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, AppError> {
        Self::with_clock(dir, system_clock())
    }

    /// Like [`open`](Self::open) with an explicit time source.
    pub fn with_clock(dir: impl AsRef<Path>, clock: Clock) -> Result<Self, AppError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .map_err(|e| AppError::Storage(format!("cannot create {}: {e}", dir.display())))?;
        Ok(Self {
            inner: Arc::new(Inner {
                dir: dir.to_path_buf(),
                locks: KeyLocks::default(),
                clock,
            }),
        })
    }

    /// Path of the progress document for `user`.
    pub fn document_path(&self, user: &str) -> Result<PathBuf, AppError> {
        let slug = slugify(user);
        if slug.is_empty() {
            return Err(AppError::Storage(format!("invalid user id: {user:?}")));
        }
        Ok(self.inner.dir.join(format!("{slug}.json")))
    }

    /// Mark module `n` complete. Completing the same module again changes
    /// nothing but the last-activity time.
    pub async fn record_module_completion(
        &self,
        user: &str,
        topic: &Topic,
        n: u32,
    ) -> Result<ProgressRecord, AppError> {
        let record = self
            .mutate(user, topic, move |record, now| {
                record.completed_modules.insert(n);
                record.milestones.entry(module_milestone(n)).or_insert(now);
            })
            .await?;
        info!(user, %topic, module = n, completed = record.completed_modules.len(), "module completion recorded");
        Ok(record)
    }

    /// Set a milestone flag; the first time it was reached is kept.
    pub async fn record_milestone(
        &self,
        user: &str,
        topic: &Topic,
        flag: &str,
    ) -> Result<ProgressRecord, AppError> {
        let flag = flag.to_string();
        let record = self
            .mutate(user, topic, move |record, now| {
                record.milestones.entry(flag).or_insert(now);
            })
            .await?;
        info!(user, %topic, milestones = record.milestones.len(), "milestone recorded");
        Ok(record)
    }

    /// Progress for `(user, topic)`; a zero record when nothing is stored.
    pub async fn get_progress(&self, user: &str, topic: &Topic) -> Result<ProgressRecord, AppError> {
        let mut all = self.summarize(user).await?;
        Ok(all.remove(topic).unwrap_or_default())
    }

    /// Every topic the user has progress on.
    pub async fn summarize(&self, user: &str) -> Result<BTreeMap<Topic, ProgressRecord>, AppError> {
        let path = self.document_path(user)?;
        let user = user.to_string();
        let file = run_blocking("summarize", move || load(&path, &user)).await?;
        Ok(file.topics)
    }

    async fn mutate<F>(&self, user: &str, topic: &Topic, f: F) -> Result<ProgressRecord, AppError>
    where
        F: FnOnce(&mut ProgressRecord, DateTime<Utc>) + Send + 'static,
    {
        let path = self.document_path(user)?;
        let lock = self.inner.locks.lock_for(&path.to_string_lossy());
        let _guard = lock.lock().await;

        let now = (self.inner.clock)();
        let user = user.to_string();
        let topic = topic.clone();
        run_blocking("mutate", move || {
            let mut file = load(&path, &user)?;
            let record = file.topics.entry(topic).or_default();
            f(record, now);
            record.touch(now);
            let snapshot = record.clone();

            let data = serde_json::to_string_pretty(&file)
                .map_err(|e| AppError::Storage(format!("serialise ledger: {e}")))?;
            write_atomic(&path, data.as_bytes())?;
            Ok(snapshot)
        })
        .await
    }
}

fn load(path: &Path, user: &str) -> Result<LedgerFile, AppError> {
    match fs::read_to_string(path) {
        Ok(data) => serde_json::from_str(&data)
            .map_err(|e| AppError::Storage(format!("malformed {}: {e}", path.display()))),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(LedgerFile {
            user_id: user.to_string(),
            topics: BTreeMap::new(),
        }),
        Err(e) => Err(AppError::Storage(format!("cannot read {}: {e}", path.display()))),
    }
}

async fn run_blocking<T, F>(op: &'static str, f: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Storage(format!("ledger {op} join: {e}")))?
}
