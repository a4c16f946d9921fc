//! Assembler: turns named section contributions into one Markdown document.
//!
//! Pure: same inputs, same bytes. Timestamps are passed in by the caller.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::error::AppError;

pub const LESSON: &str = "lesson";
pub const EXAMPLES: &str = "examples";
pub const QUIZ: &str = "quiz";

/// Sections every module needs, in document order.
pub const MODULE_SECTIONS: [&str; 3] = [LESSON, EXAMPLES, QUIZ];

const SEPARATOR: &str = "\n\n---\n\n";

fn heading(section: &str) -> String {
    match section {
        LESSON => "📚 Lesson".to_string(),
        EXAMPLES => "💻 Code Examples".to_string(),
        QUIZ => "📝 Quiz".to_string(),
        other => {
            let mut chars = other.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        }
    }
}

/// Join `required` sections of `parts` in order under `## ` headings.
///
/// Fails with [`AppError::IncompleteModule`] naming every required section
/// that is absent or blank. Sections in `parts` that are not required are
/// ignored.
pub fn assemble(
    title: &str,
    required: &[&str],
    parts: &BTreeMap<String, String>,
    footer: Option<&str>,
) -> Result<String, AppError> {
    let missing: Vec<String> = required
        .iter()
        .filter(|name| parts.get(**name).is_none_or(|text| text.trim().is_empty()))
        .map(|name| name.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(AppError::IncompleteModule { missing });
    }

    let sections: Vec<String> = required
        .iter()
        .filter_map(|name| {
            parts
                .get(*name)
                .map(|text| format!("## {}\n\n{}", heading(name), text.trim()))
        })
        .collect();

    let mut doc = format!("# {title}{SEPARATOR}{}", sections.join(SEPARATOR));
    if let Some(footer) = footer {
        doc.push_str(SEPARATOR);
        doc.push_str(footer);
    }
    doc.push('\n');
    Ok(doc)
}

/// The standard module document: lesson, examples, quiz.
pub fn assemble_module(
    number: u32,
    generated_at: DateTime<Utc>,
    parts: &BTreeMap<String, String>,
) -> Result<String, AppError> {
    let footer = format!("*Generated: {}*", format_timestamp(generated_at));
    assemble(&format!("Module {number}"), &MODULE_SECTIONS, parts, Some(&footer))
}

/// Wrap planner output with the roadmap header.
pub fn roadmap_document(label: &str, generated_at: DateTime<Utc>, body: &str) -> String {
    format!(
        "# Learning Roadmap: {label}\n\nGenerated: {}\n\n{}\n",
        format_timestamp(generated_at),
        body.trim()
    )
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn parts(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 14, 5, 9).unwrap()
    }

    #[test]
    fn module_sections_in_fixed_order() {
        // Map order is alphabetical (examples, lesson, quiz); output must not be.
        let p = parts(&[("quiz", "Q1?"), ("examples", "fn main() {}"), ("lesson", "Intro\n")]);
        let doc = assemble_module(1, at(), &p).unwrap();

        let lesson = doc.find("## 📚 Lesson").unwrap();
        let examples = doc.find("## 💻 Code Examples").unwrap();
        let quiz = doc.find("## 📝 Quiz").unwrap();
        assert!(doc.starts_with("# Module 1\n\n---\n\n"));
        assert!(lesson < examples && examples < quiz);
        assert!(doc.ends_with("*Generated: 2026-10-18 14:05:09 UTC*\n"));
        assert!(doc.contains("## 📚 Lesson\n\nIntro\n\n---"));
    }

    #[test]
    fn missing_section_is_incomplete() {
        let p = parts(&[("lesson", "L"), ("quiz", "Q")]);
        let err = assemble_module(2, at(), &p).unwrap_err();
        assert!(matches!(err, AppError::IncompleteModule { ref missing } if missing == &["examples"]));
    }

    #[test]
    fn blank_section_counts_as_missing() {
        let p = parts(&[("lesson", "  "), ("examples", "E")]);
        match assemble_module(1, at(), &p).unwrap_err() {
            AppError::IncompleteModule { missing } => assert_eq!(missing, vec!["lesson", "quiz"]),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn deterministic_and_ignores_extras() {
        let p = parts(&[("lesson", "L"), ("examples", "E"), ("quiz", "Q"), ("notes", "N")]);
        let a = assemble_module(3, at(), &p).unwrap();
        let b = assemble_module(3, at(), &p).unwrap();
        assert_eq!(a, b);
        assert!(!a.contains("Notes"));
    }

    #[test]
    fn generic_sections_get_capitalised_headings() {
        let p = parts(&[("summary", "S")]);
        let doc = assemble("Recap", &["summary"], &p, None).unwrap();
        assert_eq!(doc, "# Recap\n\n---\n\n## Summary\n\nS\n");
    }

    #[test]
    fn roadmap_header() {
        let doc = roadmap_document("FastAPI", at(), "1. Basics\n2. Routing\n");
        assert_eq!(
            doc,
            "# Learning Roadmap: FastAPI\n\nGenerated: 2026-10-18 14:05:09 UTC\n\n1. Basics\n2. Routing\n"
        );
    }
}
