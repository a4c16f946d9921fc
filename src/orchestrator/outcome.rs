//! User-facing results of one orchestration call, rendered as plain text.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::subsystems::assembler::format_timestamp;
use crate::subsystems::storage::{ProgressRecord, Topic};

pub const HELP_TEXT: &str = "\
Commands:
  learn <topic>            research a topic and build its learning roadmap
                           (also: \"I want to learn <topic>\", \"teach me <topic>\")
  start module <n>         generate module n for the current topic
  start module <n> of <t>  generate module n for topic t
  next module | continue   generate the module after the last completed one
  progress                 show your learning progress
  help                     show this message
  exit | quit              leave the console";

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    RoadmapReady {
        topic: Topic,
        label: String,
        folder: PathBuf,
        folder_created: bool,
        research_path: PathBuf,
        roadmap_path: PathBuf,
        /// Artifacts read back instead of regenerated.
        reused: Vec<String>,
    },
    ModuleComplete {
        topic: Topic,
        number: u32,
        path: PathBuf,
        completed: Vec<u32>,
        /// Notifier output, when it succeeded.
        notice: Option<String>,
    },
    Progress {
        user_id: String,
        topics: BTreeMap<Topic, ProgressRecord>,
        commentary: Option<String>,
    },
    Help,
    Unrecognized { input: String },
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::RoadmapReady {
                topic,
                label,
                folder,
                folder_created,
                research_path,
                roadmap_path,
                reused,
            } => {
                let tag = |name: &str| if reused.iter().any(|r| r == name) { " (existing)" } else { "" };
                writeln!(f, "Roadmap ready for {label} [{topic}].")?;
                writeln!(
                    f,
                    "  folder:   {}{}",
                    folder.display(),
                    if *folder_created { " (new)" } else { "" }
                )?;
                writeln!(f, "  research: {}{}", research_path.display(), tag("research"))?;
                writeln!(f, "  roadmap:  {}{}", roadmap_path.display(), tag("roadmap"))?;
                write!(f, "Say \"start module 1\" to begin.")
            }
            Outcome::ModuleComplete { topic, number, path, completed, notice } => {
                writeln!(f, "Module {number} of {topic} is ready.")?;
                writeln!(f, "  file: {}", path.display())?;
                write!(f, "  completed modules: {}", join_numbers(completed))?;
                if let Some(notice) = notice {
                    write!(f, "\n\n{}", notice.trim())?;
                }
                Ok(())
            }
            Outcome::Progress { user_id, topics, commentary } => {
                if topics.is_empty() {
                    return write!(f, "No progress yet for {user_id}. Say \"learn <topic>\" to begin.");
                }
                writeln!(f, "Progress for {user_id}:")?;
                write!(f, "{}", progress_table(topics).trim_end())?;
                if let Some(c) = commentary {
                    write!(f, "\n\n{}", c.trim())?;
                }
                Ok(())
            }
            Outcome::Help => f.write_str(HELP_TEXT),
            Outcome::Unrecognized { input } => {
                write!(f, "Sorry, I didn't understand {input:?}.\n\n{HELP_TEXT}")
            }
        }
    }
}

/// One line per topic: completed modules, milestones, last activity.
pub fn progress_table(topics: &BTreeMap<Topic, ProgressRecord>) -> String {
    let mut out = String::new();
    for (topic, record) in topics {
        let modules = if record.completed_modules.is_empty() {
            "none".to_string()
        } else {
            join_numbers(record.completed_modules.iter())
        };
        let milestones = record.milestones.keys().cloned().collect::<Vec<_>>().join(", ");
        out.push_str(&format!("  {topic}: modules completed: {modules}"));
        if !milestones.is_empty() {
            out.push_str(&format!("; milestones: {milestones}"));
        }
        if let Some(ts) = record.last_activity {
            out.push_str(&format!("; last activity {}", format_timestamp(ts)));
        }
        out.push('\n');
    }
    out
}

fn join_numbers<'a>(numbers: impl IntoIterator<Item = &'a u32>) -> String {
    numbers.into_iter().map(u32::to_string).collect::<Vec<_>>().join(", ")
}
