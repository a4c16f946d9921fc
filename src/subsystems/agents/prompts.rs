//! Instruction templates for LLM-backed specialists, embedded at build time.
//!
//! Templates may reference `{{topic}}`; see [`render`].

use super::SpecialistKind;

const RESEARCH: &str = include_str!("../../../config/prompts/research.txt");
const PLAN: &str = include_str!("../../../config/prompts/plan.txt");
const TEACH: &str = include_str!("../../../config/prompts/teach.txt");
const EXEMPLIFY: &str = include_str!("../../../config/prompts/exemplify.txt");
const QUIZ: &str = include_str!("../../../config/prompts/quiz.txt");
const TRACK: &str = include_str!("../../../config/prompts/track.txt");
const NOTIFY: &str = include_str!("../../../config/prompts/notify.txt");

pub fn template(kind: SpecialistKind) -> &'static str {
    match kind {
        SpecialistKind::Research => RESEARCH,
        SpecialistKind::Plan => PLAN,
        SpecialistKind::Teach => TEACH,
        SpecialistKind::Exemplify => EXEMPLIFY,
        SpecialistKind::Quiz => QUIZ,
        SpecialistKind::Track => TRACK,
        SpecialistKind::Notify => NOTIFY,
    }
}

/// Substitute `{{topic}}` in `template`.
pub fn render(template: &str, topic: &str) -> String {
    template.replace("{{topic}}", topic).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_a_topic_aware_template() {
        for kind in SpecialistKind::ALL {
            let t = template(kind);
            assert!(!t.trim().is_empty(), "{kind} template is empty");
            assert!(t.contains("{{topic}}"), "{kind} template lacks {{{{topic}}}}");
        }
    }

    #[test]
    fn render_substitutes_every_occurrence() {
        assert_eq!(render("learn {{topic}}; master {{topic}}\n", "rust"), "learn rust; master rust");
    }
}
