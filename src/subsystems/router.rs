//! Task router: classifies a free-form utterance into an [`Intent`].
//!
//! Matching order: help, progress, module commands, then new-topic
//! requests. Anything else is [`Intent::Unrecognized`], never an error.
//! The only error is a module command with no topic to attach it to.

use crate::error::AppError;
use crate::subsystems::storage::Topic;

/// What the user asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Research a subject and build its roadmap. `label` keeps the user's
    /// spelling for headings.
    StartTopic { topic: Topic, label: String },
    StartModule { topic: Topic, number: u32 },
    CheckProgress,
    Help,
    Unrecognized { input: String },
}

/// Per-session router input: the most recently started topic.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    topic: Option<Topic>,
    last_module: Option<u32>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_topic(&self) -> Option<&Topic> {
        self.topic.as_ref()
    }

    /// Highest module completed for the current topic.
    pub fn last_module(&self) -> Option<u32> {
        self.last_module
    }

    pub fn set_topic(&mut self, topic: Topic, last_module: Option<u32>) {
        self.topic = Some(topic);
        self.last_module = last_module;
    }

    pub fn set_last_module(&mut self, n: u32) {
        self.last_module = Some(self.last_module.map_or(n, |m| m.max(n)));
    }
}

const HELP_WORDS: &[&str] = &["help", "?", "h", "commands", "menu", "what can you do"];

const PROGRESS_WORDS: &[&str] = &["progress", "status"];
const PROGRESS_FILLER: &[&str] = &[
    "show", "check", "view", "see", "my", "me", "the", "what", "is", "what's", "whats", "how",
    "am", "i", "doing", "report", "learning", "overall",
];

const MODULE_LEAD: &[&str] = &["start", "begin", "open", "do", "take", "let's", "lets", "go", "to", "please"];
const TOPIC_CONNECTORS: &[&str] = &["of", "for", "on", "in", "about"];
const NEXT_PHRASES: &[&str] = &["next", "next module", "continue", "next lesson", "start next module"];

// Checked in order; the first match wins.
const LEARN_PREFIXES: &[&str] = &[
    "i would like to learn",
    "i'd like to learn",
    "i want to learn",
    "i wanna learn",
    "start learning",
    "let's learn",
    "lets learn",
    "teach me",
    "research",
    "study",
    "learn",
];

/// Classify `utterance` against the current session.
pub fn classify(utterance: &str, session: &SessionState) -> Result<Intent, AppError> {
    let trimmed = strip_trailing_punct(utterance.trim());
    let lower = trimmed.to_ascii_lowercase();

    if lower.is_empty() || HELP_WORDS.contains(&lower.as_str()) || lower.starts_with("help ") {
        return Ok(Intent::Help);
    }

    if is_progress_request(&lower) {
        return Ok(Intent::CheckProgress);
    }

    if NEXT_PHRASES.contains(&lower.as_str()) {
        let topic = session_topic(session, trimmed)?;
        let number = session.last_module().map_or(1, |n| n.saturating_add(1));
        return Ok(Intent::StartModule { topic, number });
    }

    if let Some(cmd) = parse_module_command(&lower) {
        return match cmd {
            ModuleCommand::Invalid => Ok(unrecognized(utterance)),
            ModuleCommand::Number { number, topic_at } => {
                let explicit = topic_at.and_then(|at| Topic::parse(&trimmed[at..]));
                let topic = match explicit {
                    Some(t) => t,
                    None => session_topic(session, trimmed)?,
                };
                Ok(Intent::StartModule { topic, number })
            }
        };
    }

    if let Some(label) = learn_label(trimmed, &lower) {
        return Ok(match Topic::parse(label) {
            Some(topic) => Intent::StartTopic { topic, label: label.to_string() },
            None => unrecognized(utterance),
        });
    }

    Ok(unrecognized(utterance))
}

fn unrecognized(utterance: &str) -> Intent {
    Intent::Unrecognized { input: utterance.trim().to_string() }
}

fn session_topic(session: &SessionState, utterance: &str) -> Result<Topic, AppError> {
    session
        .current_topic()
        .cloned()
        .ok_or_else(|| AppError::AmbiguousTopic(format!("no topic for {utterance:?}")))
}

fn strip_trailing_punct(s: &str) -> &str {
    s.trim_end_matches(['.', '!', '?', ',', ';', ':']).trim_end()
}

fn is_progress_request(lower: &str) -> bool {
    let mut saw_keyword = false;
    for word in lower.split_whitespace() {
        let word = word.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '\'');
        if word.is_empty() {
            continue;
        }
        if PROGRESS_WORDS.contains(&word) {
            saw_keyword = true;
        } else if !PROGRESS_FILLER.contains(&word) {
            return false;
        }
    }
    saw_keyword
}

enum ModuleCommand {
    /// `topic_at` is the byte offset of an explicitly named topic.
    Number { number: u32, topic_at: Option<usize> },
    /// Looked like a module command but the number was unusable.
    Invalid,
}

/// `[start|begin|...] module <n> [of|for|on <topic>]`.
fn parse_module_command(lower: &str) -> Option<ModuleCommand> {
    let words = word_spans(lower);
    let module_idx = words.iter().position(|&(_, w)| w == "module" || w == "lesson")?;
    if !words[..module_idx].iter().all(|&(_, w)| MODULE_LEAD.contains(&w)) {
        return None;
    }

    let Some(&(_, raw_number)) = words.get(module_idx + 1) else {
        return Some(ModuleCommand::Invalid);
    };
    let number = match raw_number.trim_start_matches('#').parse::<u32>() {
        Ok(n) if n > 0 => n,
        _ => return Some(ModuleCommand::Invalid),
    };

    let mut rest = &words[module_idx + 2..];
    if let Some(&(_, w)) = rest.first()
        && TOPIC_CONNECTORS.contains(&w)
    {
        rest = &rest[1..];
    }
    let topic_at = rest.first().map(|&(at, _)| at);
    Some(ModuleCommand::Number { number, topic_at })
}

/// Whitespace-separated words with their byte offsets.
fn word_spans(s: &str) -> Vec<(usize, &str)> {
    let mut out = Vec::new();
    let mut start = None;
    for (i, c) in s.char_indices() {
        match (c.is_whitespace(), start) {
            (true, Some(st)) => {
                out.push((st, &s[st..i]));
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(st) = start {
        out.push((st, &s[st..]));
    }
    out
}

/// The subject named after a learn prefix, in the user's original casing.
fn learn_label<'a>(original: &'a str, lower: &str) -> Option<&'a str> {
    let prefix = LEARN_PREFIXES.iter().find(|p| {
        lower.starts_with(*p) && lower[p.len()..].starts_with(char::is_whitespace)
    })?;
    let mut at = prefix.len();
    for filler in ["more about", "about", "how to use", "how to"] {
        let rest = lower[at..].trim_start();
        if rest.starts_with(filler) && rest[filler.len()..].starts_with(char::is_whitespace) {
            at = lower.len() - rest.len() + filler.len();
            break;
        }
    }
    let label = original[at..].trim();
    if label.is_empty() { None } else { Some(label) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> SessionState {
        SessionState::new()
    }

    fn with_topic(name: &str, last: Option<u32>) -> SessionState {
        let mut s = SessionState::new();
        s.set_topic(Topic::parse(name).unwrap(), last);
        s
    }

    fn topic(name: &str) -> Topic {
        Topic::parse(name).unwrap()
    }

    #[test]
    fn learn_request_starts_topic_and_keeps_label() {
        let intent = classify("I want to learn FastAPI", &fresh()).unwrap();
        assert_eq!(intent, Intent::StartTopic { topic: topic("fastapi"), label: "FastAPI".into() });
    }

    #[test]
    fn learn_variants() {
        for (input, label) in [
            ("teach me Rust async!", "Rust async"),
            ("learn about Vue.js", "Vue.js"),
            ("I'd like to learn more about LangChain.", "LangChain"),
            ("research Kubernetes operators", "Kubernetes operators"),
            ("Study how to use Docker", "Docker"),
        ] {
            match classify(input, &fresh()).unwrap() {
                Intent::StartTopic { label: l, .. } => assert_eq!(l, label, "{input}"),
                other => panic!("{input}: {other:?}"),
            }
        }
    }

    #[test]
    fn symbol_suffixes_name_different_topics() {
        let mut topics = Vec::new();
        for input in ["learn C++", "learn C#", "learn C"] {
            match classify(input, &fresh()).unwrap() {
                Intent::StartTopic { topic, .. } => topics.push(topic),
                other => panic!("{input}: {other:?}"),
            }
        }
        assert_eq!(topics, vec![topic("c_plus_plus"), topic("c_sharp"), topic("c")]);
    }

    #[test]
    fn non_ascii_subject_is_a_topic() {
        assert_eq!(
            classify("I want to learn 日本語", &fresh()).unwrap(),
            Intent::StartTopic { topic: topic("日本語"), label: "日本語".into() }
        );
        assert_eq!(
            classify("start module 2 of Café culture", &fresh()).unwrap(),
            Intent::StartModule { topic: topic("café_culture"), number: 2 }
        );
    }

    #[test]
    fn gibberish_is_unrecognized() {
        assert_eq!(
            classify("asdkjh", &fresh()).unwrap(),
            Intent::Unrecognized { input: "asdkjh".into() }
        );
        assert!(matches!(classify("learn !!!", &fresh()).unwrap(), Intent::Unrecognized { .. }));
    }

    #[test]
    fn help_and_progress() {
        assert_eq!(classify("help", &fresh()).unwrap(), Intent::Help);
        assert_eq!(classify("  ", &fresh()).unwrap(), Intent::Help);
        assert_eq!(classify("Progress", &fresh()).unwrap(), Intent::CheckProgress);
        assert_eq!(classify("show my progress", &fresh()).unwrap(), Intent::CheckProgress);
        assert_eq!(classify("how am I doing? status", &fresh()).unwrap(), Intent::CheckProgress);
    }

    #[test]
    fn commands_win_over_learning_requests() {
        assert_eq!(classify("help me learn Rust", &fresh()).unwrap(), Intent::Help);
        // A topic that merely mentions progress is still a topic.
        assert!(matches!(
            classify("learn progress bars", &fresh()).unwrap(),
            Intent::StartTopic { .. }
        ));
    }

    #[test]
    fn module_uses_session_topic() {
        let s = with_topic("FastAPI", None);
        assert_eq!(
            classify("Start module 1", &s).unwrap(),
            Intent::StartModule { topic: topic("fastapi"), number: 1 }
        );
        assert_eq!(
            classify("module #3.", &s).unwrap(),
            Intent::StartModule { topic: topic("fastapi"), number: 3 }
        );
    }

    #[test]
    fn module_with_explicit_topic_overrides_session() {
        let s = with_topic("FastAPI", None);
        assert_eq!(
            classify("start module 2 of Rust Async", &s).unwrap(),
            Intent::StartModule { topic: topic("rust_async"), number: 2 }
        );
        assert_eq!(
            classify("begin module 4 django", &fresh()).unwrap(),
            Intent::StartModule { topic: topic("django"), number: 4 }
        );
    }

    #[test]
    fn module_without_any_topic_is_ambiguous() {
        let err = classify("start module 1", &fresh()).unwrap_err();
        assert!(matches!(err, AppError::AmbiguousTopic(_)));
        assert!(matches!(classify("continue", &fresh()), Err(AppError::AmbiguousTopic(_))));
    }

    #[test]
    fn bad_module_number_is_unrecognized() {
        let s = with_topic("FastAPI", None);
        assert!(matches!(classify("start module 0", &s).unwrap(), Intent::Unrecognized { .. }));
        assert!(matches!(classify("start module one", &s).unwrap(), Intent::Unrecognized { .. }));
        assert!(matches!(classify("start module", &s).unwrap(), Intent::Unrecognized { .. }));
    }

    #[test]
    fn next_module_follows_last_completed() {
        assert_eq!(
            classify("next module", &with_topic("FastAPI", None)).unwrap(),
            Intent::StartModule { topic: topic("fastapi"), number: 1 }
        );
        assert_eq!(
            classify("Continue!", &with_topic("FastAPI", Some(2))).unwrap(),
            Intent::StartModule { topic: topic("fastapi"), number: 3 }
        );
    }

    #[test]
    fn session_last_module_only_grows() {
        let mut s = with_topic("rust", None);
        s.set_last_module(3);
        s.set_last_module(1);
        assert_eq!(s.last_module(), Some(3));
    }
}
