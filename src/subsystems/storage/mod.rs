//! Storage subsystem: topic-scoped artifacts and the per-user progress ledger.
//!
//! Both stores own a directory and commit every write with the same
//! discipline: write a uniquely-named temp file in the target directory,
//! `fsync` it, then `rename` it over the destination. Readers only ever see
//! the previous or the new committed value.
//!
//! ```text
//! {lessons_dir}/
//! └── {topic}/
//!     ├── research.md
//!     ├── roadmap.md
//!     └── module_{n}.md
//! {progress_dir}/
//! └── {user}.json
//! ```

pub mod artifacts;
pub mod ledger;

pub use artifacts::{ArtifactStore, TopicFolder};
pub use ledger::{ProgressLedger, ProgressRecord};

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

// ── Topic ────────────────────────────────────────────────────────────────────

/// Normalized storage key for a subject being learned.
///
/// Lowercase alphanumerics (any script) separated by single underscores,
/// e.g. `"Lang-Chain 2"` → `lang_chain_2`, `"C++"` → `c_plus_plus`.
/// Always non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topic(String);

impl Topic {
    /// Normalize `raw` into a topic key; `None` if nothing alphanumeric remains.
    pub fn parse(raw: &str) -> Option<Self> {
        let slug = slugify(raw);
        if slug.is_empty() { None } else { Some(Self(slug)) }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Symbols that carry meaning in subject names ("C++", "C#", "AT&T").
/// Each becomes its own word instead of a separator.
const SPELLED_SYMBOLS: &[(char, &str)] = &[('+', "plus"), ('#', "sharp"), ('&', "and"), ('@', "at")];

/// Lowercase, keep Unicode alphanumerics, spell out [`SPELLED_SYMBOLS`] and
/// replace every other run of characters with one `_`. Leading and trailing
/// separators are dropped.
pub fn slugify(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_sep = false;
    for c in raw.chars() {
        if c.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.extend(c.to_lowercase());
        } else if let Some(&(_, word)) = SPELLED_SYMBOLS.iter().find(|&&(sym, _)| sym == c) {
            if !out.is_empty() {
                out.push('_');
            }
            out.push_str(word);
            pending_sep = true;
        } else {
            pending_sep = true;
        }
    }
    out
}

// ── Clock ────────────────────────────────────────────────────────────────────

/// Time source for timestamps written by the stores and the orchestrator.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

// ── Atomic commit ────────────────────────────────────────────────────────────

/// Write `contents` to `path` via temp file + rename in the same directory.
///
/// Each call uses its own temp name, so concurrent writers never share a
/// partially-written file; the last rename wins whole.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), AppError> {
    let dir = path
        .parent()
        .ok_or_else(|| AppError::Storage(format!("{} has no parent directory", path.display())))?;
    let file_name = path
        .file_name()
        .ok_or_else(|| AppError::Storage(format!("{} has no file name", path.display())))?
        .to_string_lossy();
    let tmp = dir.join(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4().simple()));

    let result = (|| {
        let mut f = fs::File::create(&tmp)
            .map_err(|e| AppError::Storage(format!("cannot create {}: {e}", tmp.display())))?;
        f.write_all(contents)
            .map_err(|e| AppError::Storage(format!("write {}: {e}", tmp.display())))?;
        f.sync_all()
            .map_err(|e| AppError::Storage(format!("sync {}: {e}", tmp.display())))?;
        drop(f);
        fs::rename(&tmp, path).map_err(|e| {
            AppError::Storage(format!("cannot commit {}: {e}", path.display()))
        })
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

// ── Key locks ────────────────────────────────────────────────────────────────

/// Lazily-created async mutex per string key.
///
/// Serializes commits to the same key within the process; different keys
/// proceed in parallel. Entries nobody holds are dropped on the next
/// lookup, so the map only tracks keys with a live or waiting caller.
#[derive(Default)]
pub(crate) struct KeyLocks {
    inner: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyLocks {
    pub(crate) fn lock_for(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        map.retain(|k, lock| k == key || Arc::strong_count(lock) > 1);
        map.entry(key.to_string()).or_default().clone()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn topic_normalizes_case_and_separators() {
        assert_eq!(Topic::parse("FastAPI").unwrap().as_str(), "fastapi");
        assert_eq!(Topic::parse("Lang-Chain 2").unwrap().as_str(), "lang_chain_2");
        assert_eq!(Topic::parse("  --Vue.js!! ").unwrap().as_str(), "vue_js");
    }

    #[test]
    fn topic_keeps_symbols_that_distinguish_subjects() {
        let c = Topic::parse("C").unwrap();
        let cpp = Topic::parse("C++").unwrap();
        let csharp = Topic::parse("C#").unwrap();
        assert_eq!(cpp.as_str(), "c_plus_plus");
        assert_eq!(csharp.as_str(), "c_sharp");
        assert_ne!(c, cpp);
        assert_ne!(c, csharp);
        assert_ne!(cpp, csharp);
        assert_eq!(Topic::parse("Rust & WebAssembly").unwrap().as_str(), "rust_and_webassembly");
    }

    #[test]
    fn topic_keeps_non_ascii_letters() {
        assert_eq!(Topic::parse("Café").unwrap().as_str(), "café");
        assert_eq!(Topic::parse("日本語").unwrap().as_str(), "日本語");
        assert_eq!(Topic::parse("Ελληνικά Γλώσσα").unwrap().as_str(), "ελληνικά_γλώσσα");
        assert_ne!(Topic::parse("Café"), Topic::parse("Caf"));
    }

    #[test]
    fn topic_rejects_empty_slug() {
        assert!(Topic::parse("").is_none());
        assert!(Topic::parse("!!! ---").is_none());
    }

    #[test]
    fn topic_serializes_as_plain_string() {
        let t = Topic::parse("Rust Async").unwrap();
        assert_eq!(serde_json::to_string(&t).unwrap(), "\"rust_async\"");
    }

    #[test]
    fn write_atomic_replaces_and_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.md");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "second");

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["doc.md".to_string()]);
    }

    #[test]
    fn write_atomic_into_missing_dir_fails_cleanly() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent").join("doc.md");
        let err = write_atomic(&path, b"x").unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));
    }

    #[test]
    fn key_locks_share_per_key() {
        let locks = KeyLocks::default();
        let a = locks.lock_for("a");
        let a2 = locks.lock_for("a");
        let b = locks.lock_for("b");
        assert!(Arc::ptr_eq(&a, &a2));
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn key_locks_drop_idle_entries() {
        let locks = KeyLocks::default();
        let held = locks.lock_for("rust/module_1");
        let _guard = held.lock().await;
        for n in 0..50 {
            drop(locks.lock_for(&format!("topic_{n}/research")));
        }
        assert_eq!(locks.len(), 2);

        let again = locks.lock_for("rust/module_1");
        assert!(Arc::ptr_eq(&held, &again));
        assert!(again.try_lock().is_err());
    }
}
