//! Dummy LLM provider: echoes input back prefixed with `[echo]`.
//! Used to drive the whole orchestration loop without an API key.

use crate::llm::ProviderError;

#[derive(Debug, Clone)]
pub struct DummyProvider;

impl DummyProvider {
    /// The instruction is ignored; only the user content is echoed.
    pub async fn complete(&self, content: &str, _system: Option<&str>) -> Result<String, ProviderError> {
        Ok(format!("[echo] {content}"))
    }
}
