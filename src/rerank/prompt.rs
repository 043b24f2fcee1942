//! Prompts for the generation backend.

use std::fmt::Write as _;

use crate::catalog::CatalogRecord;
use crate::rerank::intent::QueryIntent;
use crate::rerank::select::ResultBounds;

const DESCRIPTION_CHARS: usize = 400;

/// One generation request: chat messages plus the structured context they
/// were rendered from, so offline backends can answer without re-parsing
/// text.
#[derive(Debug, Clone)]
pub struct Prompt {
    pub system: String,
    pub user: String,
    pub query: String,
    pub intent: QueryIntent,
    pub candidates: Vec<CatalogRecord>,
    pub bounds: ResultBounds,
}

const SYSTEM: &str = "You are an HR assessment advisor. You pick assessments from a fixed \
candidate list for a hiring query and explain each pick. You only use facts stated in the \
candidate list. You reply with a JSON array and nothing else.";

/// Build the prompt for a first attempt, or for the retry when
/// `previous_error` is set.
#[must_use]
pub fn build(
    query: &str,
    intent: &QueryIntent,
    candidates: &[&CatalogRecord],
    bounds: ResultBounds,
    previous_error: Option<&str>,
) -> Prompt {
    let mut user = String::new();

    let _ = writeln!(user, "Hiring query:\n{query}\n");
    let _ = writeln!(user, "Detected requirements:");
    let _ = writeln!(user, "- technical skills: {}", facet_list(intent, true));
    let _ = writeln!(user, "- behavioral competencies: {}", facet_list(intent, false));
    if let Some(limit) = intent.duration_max {
        let _ = writeln!(user, "- maximum duration: {limit} minutes");
    }
    if let Some(level) = &intent.job_level {
        let _ = writeln!(user, "- job level: {level}");
    }

    let _ = writeln!(user, "\nCandidates:");
    for record in candidates {
        write_candidate(&mut user, record);
    }

    let _ = writeln!(user, "\nInstructions:");
    let _ = writeln!(
        user,
        "1. Select between {} and {} candidates, most relevant first.",
        bounds.min.min(candidates.len()),
        bounds.max
    );
    if intent.wants_balance() {
        let _ = writeln!(
            user,
            "2. The query needs both technical and behavioral coverage: include at least one \
             Knowledge & Skills and at least one Personality & Behavior candidate."
        );
    } else {
        let _ = writeln!(user, "2. Favor candidates that match the detected requirements.");
    }
    let _ = writeln!(
        user,
        "3. For each pick write why_fit: one or two sentences tying the query to that \
         candidate's own category, description or duration. Do not invent durations, \
         languages or features."
    );
    let _ = writeln!(
        user,
        "4. Respond with a JSON array only, in this shape:\n\
         [{{\"id\": \"<candidate id>\", \"why_fit\": \"<justification>\"}}]"
    );

    if let Some(reason) = previous_error {
        let ids: Vec<&str> = candidates.iter().map(|r| r.id.as_str()).collect();
        let _ = writeln!(
            user,
            "\nYour previous reply was rejected: {reason}.\n\
             Reply with ONLY the JSON array: no prose, no markdown fences. \
             Every id must be copied exactly from this list: {}",
            ids.join(", ")
        );
    }

    Prompt {
        system: SYSTEM.to_string(),
        user,
        query: query.to_string(),
        intent: intent.clone(),
        candidates: candidates.iter().map(|r| (*r).clone()).collect(),
        bounds,
    }
}

fn facet_list(intent: &QueryIntent, technical: bool) -> String {
    let facets = if technical {
        &intent.technical_skills
    } else {
        &intent.behavioral_competencies
    };
    if facets.is_empty() {
        return "none detected".to_string();
    }
    facets
        .iter()
        .map(|f| f.label.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn write_candidate(out: &mut String, record: &CatalogRecord) {
    let _ = writeln!(out, "- id: {}", record.id);
    let _ = writeln!(out, "  name: {}", record.name);
    let _ = writeln!(out, "  category: {}", record.category.label());
    match record.duration_label() {
        Some(duration) => {
            let _ = writeln!(out, "  duration: {duration}");
        }
        None => {
            let _ = writeln!(out, "  duration: not stated");
        }
    }
    if !record.job_levels.is_empty() {
        let levels: Vec<&str> = record.job_levels.iter().map(String::as_str).collect();
        let _ = writeln!(out, "  job levels: {}", levels.join(", "));
    }
    if !record.languages.is_empty() {
        let languages: Vec<&str> = record.languages.iter().map(String::as_str).collect();
        let _ = writeln!(out, "  languages: {}", languages.join(", "));
    }
    let description: String = record.description.chars().take(DESCRIPTION_CHARS).collect();
    let _ = writeln!(out, "  description: {}", description.trim());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Category;
    use std::collections::BTreeSet;

    fn record(id: &str, category: Category) -> CatalogRecord {
        CatalogRecord {
            id: id.to_string(),
            name: format!("{id} test"),
            url: format!("https://example.com/{id}"),
            description: "Measures things.".to_string(),
            category,
            job_levels: BTreeSet::new(),
            languages: ["English (USA)".to_string()].into_iter().collect(),
            duration_minutes: Some(20),
        }
    }

    #[test]
    fn prompt_lists_candidates_and_requirements() {
        let intent = QueryIntent::extract("Java developer who collaborates, 40 minutes");
        let a = record("java", Category::KnowledgeSkills);
        let b = record("team", Category::PersonalityBehavior);
        let prompt = build("q", &intent, &[&a, &b], ResultBounds::default(), None);

        assert!(prompt.user.contains("- id: java"));
        assert!(prompt.user.contains("- id: team"));
        assert!(prompt.user.contains("maximum duration: 40 minutes"));
        assert!(prompt.user.contains("languages: English (USA)"));
        assert!(prompt.user.contains("Select between 2 and 10"));
        assert!(prompt.user.contains("at least one Personality & Behavior"));
        assert!(!prompt.user.contains("previous reply"));
        assert_eq!(prompt.candidates.len(), 2);
    }

    #[test]
    fn retry_prompt_is_stricter() {
        let intent = QueryIntent::extract("sql");
        let a = record("sql-basics", Category::KnowledgeSkills);
        let prompt = build(
            "sql",
            &intent,
            &[&a],
            ResultBounds::default(),
            Some("reply is not a JSON array"),
        );
        assert!(prompt.user.contains("rejected: reply is not a JSON array"));
        assert!(prompt.user.contains("copied exactly from this list: sql-basics"));
    }
}
