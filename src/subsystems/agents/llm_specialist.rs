//! Specialist backed by a single LLM completion.

use std::fmt::Write as _;

use tracing::debug;

use crate::llm::LlmProvider;
use crate::subsystems::storage::Topic;

use super::{Specialist, SpecialistContext, SpecialistFuture, SpecialistKind, prompts};

/// Renders the kind's instruction template as the system message and the
/// topic plus context as the user message.
#[derive(Debug, Clone)]
pub struct LlmSpecialist {
    kind: SpecialistKind,
    provider: LlmProvider,
    template: String,
}

impl LlmSpecialist {
    pub fn new(kind: SpecialistKind, provider: LlmProvider) -> Self {
        Self { kind, provider, template: prompts::template(kind).to_string() }
    }
}

impl Specialist for LlmSpecialist {
    fn generate(&self, topic: &Topic, context: &SpecialistContext) -> SpecialistFuture {
        let provider = self.provider.clone();
        let system = prompts::render(&self.template, topic.as_str());
        let content = user_message(topic, context);
        debug!(kind = %self.kind, provider = self.provider.name(), %topic, "llm specialist request");
        Box::pin(async move { Ok(provider.complete(&content, Some(&system)).await?) })
    }
}

/// `Topic: {topic}` followed by one `## {name}` section per context entry.
fn user_message(topic: &Topic, context: &SpecialistContext) -> String {
    let mut out = format!("Topic: {topic}\n");
    for (name, text) in context {
        let _ = write!(out, "\n## {name}\n\n{}\n", text.trim());
    }
    out
}
