//! Orchestrator: binds router, registry, store, assembler and ledger.
//!
//! Per-topic state machine:
//!
//! ```text
//! Idle ──start_topic──▶ Researching ──▶ RoadmapReady
//!                                           │ start_module(n)
//!                                           ▼
//!                    ModuleComplete(n) ◀── ModuleInProgress(n)
//! ```
//!
//! Requests for the same topic are serialized. A failed transition restores
//! the phase the topic had before the request. Research and roadmap
//! committed earlier in the request stay committed and are reused on retry;
//! a module file is only kept once the ledger has recorded it.

pub mod outcome;

pub use outcome::{HELP_TEXT, Outcome};

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::sync::Mutex;

use tracing::{info, warn};

use crate::error::AppError;
use crate::subsystems::agents::{SpecialistContext, SpecialistKind, SpecialistRegistry};
use crate::subsystems::assembler::{self, EXAMPLES, LESSON, QUIZ};
use crate::subsystems::router::{self, Intent, SessionState};
use crate::subsystems::storage::artifacts::{RESEARCH, ROADMAP, module_name};
use crate::subsystems::storage::ledger::{MILESTONE_RESEARCH, MILESTONE_ROADMAP};
use crate::subsystems::storage::{
    ArtifactStore, Clock, KeyLocks, ProgressLedger, ProgressRecord, Topic, system_clock,
};

/// Where a topic is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TopicPhase {
    #[default]
    Idle,
    Researching,
    RoadmapReady,
    ModuleInProgress(u32),
    ModuleComplete(u32),
}

impl fmt::Display for TopicPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopicPhase::Idle => f.write_str("idle"),
            TopicPhase::Researching => f.write_str("researching"),
            TopicPhase::RoadmapReady => f.write_str("roadmap_ready"),
            TopicPhase::ModuleInProgress(n) => write!(f, "module_{n}_in_progress"),
            TopicPhase::ModuleComplete(n) => write!(f, "module_{n}_complete"),
        }
    }
}

pub struct Orchestrator {
    store: ArtifactStore,
    ledger: ProgressLedger,
    registry: SpecialistRegistry,
    user_id: String,
    phases: Mutex<HashMap<Topic, TopicPhase>>,
    topic_locks: KeyLocks,
    clock: Clock,
    progress_commentary: bool,
}

impl Orchestrator {
    pub fn new(
        store: ArtifactStore,
        ledger: ProgressLedger,
        registry: SpecialistRegistry,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            ledger,
            registry,
            user_id: user_id.into(),
            phases: Mutex::new(HashMap::new()),
            topic_locks: KeyLocks::default(),
            clock: system_clock(),
            progress_commentary: true,
        }
    }

    /// Time source for generated-at stamps in documents.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Ask the tracker specialist for commentary on progress queries.
    pub fn with_progress_commentary(mut self, enabled: bool) -> Self {
        self.progress_commentary = enabled;
        self
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn ledger(&self) -> &ProgressLedger {
        &self.ledger
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Current phase of `topic`; `Idle` for topics never touched this run.
    pub fn phase(&self, topic: &Topic) -> TopicPhase {
        let phases = self.phases.lock().unwrap_or_else(|e| e.into_inner());
        phases.get(topic).copied().unwrap_or_default()
    }

    fn set_phase(&self, topic: &Topic, phase: TopicPhase) {
        let mut phases = self.phases.lock().unwrap_or_else(|e| e.into_inner());
        let previous = phases.insert(topic.clone(), phase).unwrap_or_default();
        if previous != phase {
            info!(%topic, from = %previous, to = %phase, "topic phase changed");
        }
    }

    /// Classify `utterance` and run it. Updates `session` on success.
    pub async fn handle(&self, utterance: &str, session: &mut SessionState) -> Result<Outcome, AppError> {
        let intent = router::classify(utterance, session)?;
        self.dispatch(intent, session).await
    }

    pub async fn dispatch(&self, intent: Intent, session: &mut SessionState) -> Result<Outcome, AppError> {
        match intent {
            Intent::StartTopic { topic, label } => {
                let outcome = self.start_topic(&topic, &label).await?;
                let last_module = self
                    .ledger
                    .get_progress(&self.user_id, &topic)
                    .await
                    .ok()
                    .and_then(|r| r.last_module());
                session.set_topic(topic, last_module);
                Ok(outcome)
            }
            Intent::StartModule { topic, number } => {
                let outcome = self.start_module(&topic, number).await?;
                if session.current_topic() == Some(&topic) {
                    session.set_last_module(number);
                } else {
                    session.set_topic(topic, Some(number));
                }
                Ok(outcome)
            }
            Intent::CheckProgress => self.check_progress().await,
            Intent::Help => Ok(Outcome::Help),
            Intent::Unrecognized { input } => {
                info!(%input, "unrecognized request");
                Ok(Outcome::Unrecognized { input })
            }
        }
    }

    // ── start_topic ─────────────────────────────────────────────────────────

    /// Research `topic` and build its roadmap, reusing whatever is stored.
    pub async fn start_topic(&self, topic: &Topic, label: &str) -> Result<Outcome, AppError> {
        let lock = self.topic_locks.lock_for(topic.as_str());
        let _guard = lock.lock().await;

        let previous = self.phase(topic);
        self.set_phase(topic, TopicPhase::Researching);
        match self.research_and_plan(topic, label).await {
            Ok(outcome) => {
                self.set_phase(topic, TopicPhase::RoadmapReady);
                Ok(outcome)
            }
            Err(e) => {
                warn!(%topic, error = %e, "start_topic aborted");
                self.set_phase(topic, previous);
                Err(e)
            }
        }
    }

    async fn research_and_plan(&self, topic: &Topic, label: &str) -> Result<Outcome, AppError> {
        let folder = self.store.ensure_topic_folder(topic).await?;
        let has = |name: &str| folder.existing.iter().any(|n| n == name);
        let mut reused = Vec::new();

        let mut ctx = SpecialistContext::new();
        ctx.insert("subject".into(), label.to_string());

        let research = if has(RESEARCH) {
            reused.push(RESEARCH.to_string());
            self.store.read(topic, RESEARCH).await?
        } else {
            let text = self.registry.invoke(SpecialistKind::Research, topic, &ctx).await?;
            self.store.write(topic, RESEARCH, &text).await?;
            self.milestone(topic, MILESTONE_RESEARCH).await;
            text
        };

        let roadmap_path = if has(ROADMAP) {
            reused.push(ROADMAP.to_string());
            self.store.artifact_path(topic, ROADMAP)?
        } else {
            ctx.insert(RESEARCH.into(), research);
            let plan = self.registry.invoke(SpecialistKind::Plan, topic, &ctx).await?;
            let doc = assembler::roadmap_document(label, (self.clock)(), &plan);
            let path = self.store.write(topic, ROADMAP, &doc).await?;
            self.milestone(topic, MILESTONE_ROADMAP).await;
            path
        };

        Ok(Outcome::RoadmapReady {
            topic: topic.clone(),
            label: label.to_string(),
            folder: folder.path,
            folder_created: folder.created,
            research_path: self.store.artifact_path(topic, RESEARCH)?,
            roadmap_path,
            reused,
        })
    }

    // ── start_module ────────────────────────────────────────────────────────

    /// Generate, assemble and persist module `number`, then record it.
    pub async fn start_module(&self, topic: &Topic, number: u32) -> Result<Outcome, AppError> {
        let lock = self.topic_locks.lock_for(topic.as_str());
        let _guard = lock.lock().await;

        let research = self.prerequisite(topic, RESEARCH).await?;
        let roadmap = self.prerequisite(topic, ROADMAP).await?;

        let previous = self.phase(topic);
        self.set_phase(topic, TopicPhase::ModuleInProgress(number));
        match self.build_module(topic, number, research, roadmap).await {
            Ok(outcome) => {
                self.set_phase(topic, TopicPhase::ModuleComplete(number));
                Ok(outcome)
            }
            Err(e) => {
                warn!(%topic, module = number, error = %e, "start_module aborted");
                self.set_phase(topic, previous);
                Err(e)
            }
        }
    }

    async fn prerequisite(&self, topic: &Topic, name: &str) -> Result<String, AppError> {
        self.store.read(topic, name).await.map_err(|e| match e {
            AppError::NotFound { topic, name } => AppError::PrerequisiteMissing { topic, missing: name },
            other => other,
        })
    }

    async fn build_module(
        &self,
        topic: &Topic,
        number: u32,
        research: String,
        roadmap: String,
    ) -> Result<Outcome, AppError> {
        let mut ctx = SpecialistContext::new();
        ctx.insert(RESEARCH.into(), research);
        ctx.insert(ROADMAP.into(), roadmap);
        ctx.insert("module".into(), number.to_string());

        // Fail before generating anything if the ledger is unreadable.
        self.ledger.get_progress(&self.user_id, topic).await?;

        let (lesson, examples, quiz) = tokio::try_join!(
            self.registry.invoke(SpecialistKind::Teach, topic, &ctx),
            self.registry.invoke(SpecialistKind::Exemplify, topic, &ctx),
            self.registry.invoke(SpecialistKind::Quiz, topic, &ctx),
        )?;

        let parts = BTreeMap::from([
            (LESSON.to_string(), lesson),
            (EXAMPLES.to_string(), examples),
            (QUIZ.to_string(), quiz),
        ]);
        let doc = assembler::assemble_module(number, (self.clock)(), &parts)?;
        let name = module_name(number);
        let prior = match self.store.read(topic, &name).await {
            Ok(content) => Some(content),
            Err(AppError::NotFound { .. }) => None,
            Err(e) => return Err(e),
        };
        let path = self.store.write(topic, &name, &doc).await?;
        let record = match self.ledger.record_module_completion(&self.user_id, topic, number).await {
            Ok(record) => record,
            Err(e) => {
                self.rollback_module(topic, &name, prior).await;
                return Err(e);
            }
        };

        let notice = self.notify(topic, number, &path).await;

        Ok(Outcome::ModuleComplete {
            topic: topic.clone(),
            number,
            path,
            completed: record.completed_modules.into_iter().collect(),
            notice,
        })
    }

    /// Put `name` back the way it was before this request wrote it.
    async fn rollback_module(&self, topic: &Topic, name: &str, prior: Option<String>) {
        let restored = match prior {
            Some(content) => self.store.write(topic, name, &content).await.map(|_| ()),
            None => self.store.remove(topic, name).await,
        };
        match restored {
            Ok(()) => info!(%topic, name, "module rolled back"),
            Err(e) => warn!(%topic, name, error = %e, "module rollback failed"),
        }
    }

    /// Best-effort: a failed notification is logged and dropped.
    async fn notify(&self, topic: &Topic, number: u32, path: &Path) -> Option<String> {
        if !self.registry.contains(SpecialistKind::Notify) {
            return None;
        }
        let mut ctx = SpecialistContext::new();
        ctx.insert("event".into(), "module_complete".into());
        ctx.insert("module".into(), number.to_string());
        ctx.insert("path".into(), path.display().to_string());

        match self.registry.invoke(SpecialistKind::Notify, topic, &ctx).await {
            Ok(text) => {
                info!(%topic, module = number, "learner notified");
                Some(text)
            }
            Err(e) => {
                warn!(%topic, module = number, error = %e, "notification dropped");
                None
            }
        }
    }

    async fn milestone(&self, topic: &Topic, flag: &str) {
        if let Err(e) = self.ledger.record_milestone(&self.user_id, topic, flag).await {
            warn!(%topic, flag, error = %e, "milestone not recorded");
        }
    }

    // ── check_progress ──────────────────────────────────────────────────────

    /// Read-only summary of every topic the user has touched.
    pub async fn check_progress(&self) -> Result<Outcome, AppError> {
        let topics = self.ledger.summarize(&self.user_id).await?;
        let commentary = self.commentary(&topics).await;
        Ok(Outcome::Progress {
            user_id: self.user_id.clone(),
            topics,
            commentary,
        })
    }

    async fn commentary(&self, topics: &BTreeMap<Topic, ProgressRecord>) -> Option<String> {
        if !self.progress_commentary || !self.registry.contains(SpecialistKind::Track) {
            return None;
        }
        // The tracker speaks about the most recently active topic.
        let (focus, _) = topics
            .iter()
            .filter(|(_, r)| !r.is_empty())
            .max_by_key(|(_, r)| r.last_activity)?;

        let mut ctx = SpecialistContext::new();
        ctx.insert("progress".into(), outcome::progress_table(topics));

        match self.registry.invoke(SpecialistKind::Track, focus, &ctx).await {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(topic = %focus, error = %e, "progress commentary skipped");
                None
            }
        }
    }
}
