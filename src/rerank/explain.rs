//! Justification text built only from record fields and matched query
//! facets, and the check that generated text claims nothing else.

use crate::catalog::{CatalogRecord, Category};
use crate::rerank::intent::{duration_mentions, matches_pattern, normalize, QueryIntent};

const FRAGMENT_CHARS: usize = 160;

/// Delivery languages recognized in generated text.
const LANGUAGES: &[&str] = &[
    "english", "french", "german", "spanish", "italian", "portuguese", "dutch", "swedish",
    "danish", "norwegian", "finnish", "russian", "turkish", "arabic", "hebrew", "hindi",
    "chinese", "mandarin", "cantonese", "japanese", "korean", "thai", "vietnamese",
    "indonesian", "malay", "greek", "czech", "hungarian", "romanian",
];

/// Compose a `why_fit` for `record` that states nothing the record does not
/// carry.
#[must_use]
pub fn synthesize(record: &CatalogRecord, intent: &QueryIntent) -> String {
    let haystack = normalize(&format!("{} {}", record.name, record.description));
    let matched: Vec<&str> = intent
        .facets()
        .filter(|facet| matches_pattern(&facet.pattern, &haystack))
        .map(|facet| facet.label.as_str())
        .collect();

    let mut parts = Vec::new();

    if matched.is_empty() {
        parts.push(format!(
            "Selected as a close match to your query among the {} assessments.",
            record.category.label()
        ));
    } else {
        parts.push(format!("Covers {} from your query.", join_labels(&matched)));
    }

    let mut facts = format!("It is a {} assessment", record.category.label());
    match (record.duration_minutes, intent.duration_max) {
        (Some(minutes), Some(limit)) => {
            facts.push_str(&format!(
                " taking {minutes} minutes, within your {limit}-minute limit"
            ));
        }
        (Some(minutes), None) => facts.push_str(&format!(" taking {minutes} minutes")),
        (None, _) => facts.push_str(" with no stated duration"),
    }
    facts.push('.');
    parts.push(facts);

    if let Some(level) = &intent.job_level {
        if record.job_levels.contains(level) {
            parts.push(format!("Listed for {level} roles."));
        }
    }

    if let Some(fragment) = description_fragment(&record.description) {
        parts.push(format!("Measures: {fragment}"));
    }

    parts.join(" ")
}

/// First claim in generated text that `record` does not support.
///
/// A stated duration must be the record's own or the query's budget. Wording
/// that files the record under the other balanced category, and language
/// names, must come from the record itself.
#[must_use]
pub fn grounding_issue(text: &str, record: &CatalogRecord, intent: &QueryIntent) -> Option<String> {
    let allowed = [record.duration_minutes, intent.duration_max];
    if let Some(minutes) = duration_mentions(text)
        .into_iter()
        .find(|minutes| !allowed.contains(&Some(*minutes)))
    {
        return Some(format!("states a {minutes}-minute duration"));
    }

    let said = normalize(text);
    let own = normalize(&format!("{} {}", record.name, record.description));

    for claimed in Category::BALANCED.iter().filter(|c| **c != record.category) {
        if let Some(cue) = category_cues(claimed)
            .iter()
            .copied()
            .find(|cue| matches_pattern(cue, &said) && !matches_pattern(cue, &own))
        {
            return Some(format!("files it under {} (\"{cue}\")", claimed.label()));
        }
    }

    let offered = normalize(
        &record
            .languages
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" "),
    );
    LANGUAGES
        .iter()
        .copied()
        .find(|lang| {
            matches_pattern(lang, &said)
                && !matches_pattern(lang, &offered)
                && !matches_pattern(lang, &own)
        })
        .map(|lang| format!("claims delivery in {lang}"))
}

/// Wording that files an assessment under `category`, in [`normalize`]d
/// form.
fn category_cues(category: &Category) -> &'static [&'static str] {
    match category {
        Category::KnowledgeSkills => &[
            "knowledge skills",
            "knowledge and skills",
            "knowledge test",
            "skills test",
            "technical test",
            "technical assessment",
            "coding test",
        ],
        Category::PersonalityBehavior => &[
            "personality behavio*",
            "personality and behavio*",
            "personality questionnaire",
            "personality test",
            "personality assessment",
            "behavioral assessment",
            "behavioural assessment",
            "behavioral questionnaire",
            "behavioural questionnaire",
        ],
        Category::Other(_) => &[],
    }
}

fn join_labels(labels: &[&str]) -> String {
    match labels {
        [] => String::new(),
        [one] => (*one).to_string(),
        [init @ .., last] => format!("{} and {last}", init.join(", ")),
    }
}

/// First sentence of the description, clipped on a char boundary.
fn description_fragment(description: &str) -> Option<String> {
    let trimmed = description.trim();
    if trimmed.is_empty() {
        return None;
    }
    let sentence = trimmed
        .split_inclusive(['.', '!', '?'])
        .next()
        .unwrap_or(trimmed)
        .trim();

    if sentence.chars().count() <= FRAGMENT_CHARS {
        let mut out = sentence.to_string();
        if !out.ends_with(['.', '!', '?']) {
            out.push('.');
        }
        return Some(out);
    }

    let clipped: String = sentence.chars().take(FRAGMENT_CHARS).collect();
    let clipped = clipped
        .rsplit_once(' ')
        .map_or(clipped.as_str(), |(head, _)| head);
    Some(format!("{}...", clipped.trim_end()))
}
