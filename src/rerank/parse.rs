//! Validation of generation output.
//!
//! The reply must be a non-empty JSON array of picks, each naming a
//! candidate by id, url or exact name. Anything else is malformed and goes
//! through [`FormatState`].

use serde_json::{Map, Value};

use crate::catalog::CatalogRecord;

/// A validated pick: candidate id plus the generator's justification (may
/// be empty).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pick {
    pub record_id: String,
    pub why_fit: String,
}

/// Output validation state for one rerank call.
///
/// `Pending → Validated`, or `Pending → RetryPending → Validated | Failed`.
/// Terminal states absorb further outcomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatState {
    Pending,
    RetryPending { reason: String },
    Validated { picks: Vec<Pick>, attempts: u8 },
    Failed { reason: String },
}

impl FormatState {
    #[must_use]
    pub fn advance(self, outcome: Result<Vec<Pick>, String>) -> Self {
        match (self, outcome) {
            (Self::Pending, Ok(picks)) => Self::Validated { picks, attempts: 1 },
            (Self::RetryPending { .. }, Ok(picks)) => Self::Validated { picks, attempts: 2 },
            (Self::Pending, Err(reason)) => Self::RetryPending { reason },
            (Self::RetryPending { .. }, Err(reason)) => Self::Failed { reason },
            (terminal, _) => terminal,
        }
    }

    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Validated { .. } | Self::Failed { .. })
    }

    /// Reason for the last rejection, when the previous attempt failed.
    #[must_use]
    pub fn rejection(&self) -> Option<&str> {
        match self {
            Self::RetryPending { reason } | Self::Failed { reason } => Some(reason),
            _ => None,
        }
    }
}

/// Parse and validate a raw reply against the candidates it was asked to
/// choose from.
pub fn parse_picks(raw: &str, candidates: &[&CatalogRecord]) -> Result<Vec<Pick>, String> {
    let payload = extract_array(raw).ok_or_else(|| "reply contains no JSON array".to_string())?;
    let value: Value =
        serde_json::from_str(payload).map_err(|err| format!("reply is not valid JSON: {err}"))?;
    let Value::Array(items) = value else {
        return Err("reply is not a JSON array".to_string());
    };
    if items.is_empty() {
        return Err("reply array is empty".to_string());
    }

    items
        .iter()
        .enumerate()
        .map(|(idx, item)| parse_item(idx, item, candidates))
        .collect()
}

fn parse_item(idx: usize, item: &Value, candidates: &[&CatalogRecord]) -> Result<Pick, String> {
    let (reference, why_fit) = match item {
        Value::String(id) => (Reference::Id(id.as_str()), String::new()),
        Value::Object(map) => {
            let text = |key: &str| field(map, key);
            let reference = text("id")
                .or_else(|| text("record_id"))
                .map(Reference::Id)
                .or_else(|| {
                    text("assessment_url")
                        .or_else(|| text("url"))
                        .map(Reference::Url)
                })
                .or_else(|| {
                    text("assessment_name")
                        .or_else(|| text("name"))
                        .map(Reference::Name)
                })
                .ok_or_else(|| format!("item {idx} does not name a candidate"))?;
            let why_fit = text("why_fit")
                .or_else(|| text("why_great_fit"))
                .or_else(|| text("reason"))
                .unwrap_or_default()
                .to_string();
            (reference, why_fit)
        }
        _ => return Err(format!("item {idx} is not an object")),
    };

    let record = candidates
        .iter()
        .find(|record| reference.matches(record))
        .ok_or_else(|| format!("item {idx} references unknown candidate '{}'", reference.text()))?;

    Ok(Pick {
        record_id: record.id.clone(),
        why_fit,
    })
}

fn field<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    map.get(key).and_then(Value::as_str).map(str::trim)
}

enum Reference<'a> {
    Id(&'a str),
    Url(&'a str),
    Name(&'a str),
}

impl Reference<'_> {
    fn matches(&self, record: &CatalogRecord) -> bool {
        match self {
            Self::Id(id) => record.id == *id,
            Self::Url(url) => record.url.trim_end_matches('/') == url.trim_end_matches('/'),
            Self::Name(name) => record.name.eq_ignore_ascii_case(name),
        }
    }

    const fn text(&self) -> &str {
        match self {
            Self::Id(text) | Self::Url(text) | Self::Name(text) => text,
        }
    }
}

/// Locate the JSON array in a reply that may carry a markdown fence or
/// surrounding prose.
fn extract_array(raw: &str) -> Option<&str> {
    let body = strip_fence(raw.trim());
    let start = body.find('[')?;
    let end = body.rfind(']')?;
    (end > start).then(|| &body[start..=end])
}

fn strip_fence(text: &str) -> &str {
    let Some(open) = text.find("```") else {
        return text;
    };
    let after_open = &text[open + 3..];
    let content_start = after_open.find('\n').map_or(0, |nl| nl + 1);
    let content = &after_open[content_start..];
    content.find("```").map_or(content, |close| &content[..close])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Category;
    use std::collections::BTreeSet;

    fn candidates() -> Vec<CatalogRecord> {
        ["core-java", "teamwork"]
            .iter()
            .map(|id| CatalogRecord {
                id: (*id).to_string(),
                name: format!("{id} Assessment"),
                url: format!("https://example.com/view/{id}/"),
                description: String::new(),
                category: Category::KnowledgeSkills,
                job_levels: BTreeSet::new(),
                languages: BTreeSet::new(),
                duration_minutes: None,
            })
            .collect()
    }

    fn parse(raw: &str) -> Result<Vec<Pick>, String> {
        let records = candidates();
        let refs: Vec<&CatalogRecord> = records.iter().collect();
        parse_picks(raw, &refs)
    }

    #[test]
    fn plain_array() {
        let picks = parse(r#"[{"id":"core-java","why_fit":"Tests Java."}]"#).unwrap();
        assert_eq!(
            picks,
            vec![Pick {
                record_id: "core-java".into(),
                why_fit: "Tests Java.".into()
            }]
        );
    }

    #[test]
    fn fenced_array_with_prose() {
        let raw = "Here you go:\n```json\n[{\"id\": \"teamwork\", \"why_fit\": \"x\"}]\n```\nDone.";
        assert_eq!(parse(raw).unwrap()[0].record_id, "teamwork");
    }

    #[test]
    fn legacy_field_names_resolve() {
        let raw = r#"[
            {"assessment_name": "TEAMWORK assessment", "why_great_fit": "a"},
            {"assessment_url": "https://example.com/view/core-java", "why_great_fit": "b"}
        ]"#;
        let picks = parse(raw).unwrap();
        assert_eq!(picks[0].record_id, "teamwork");
        assert_eq!(picks[1].record_id, "core-java");
        assert_eq!(picks[1].why_fit, "b");
    }

    #[test]
    fn bare_id_strings_are_accepted() {
        let picks = parse(r#"["core-java", "teamwork"]"#).unwrap();
        assert_eq!(picks.len(), 2);
        assert!(picks.iter().all(|p| p.why_fit.is_empty()));
    }

    #[test]
    fn malformed_replies() {
        assert!(parse("I recommend the Java test.").is_err());
        assert!(parse("[]").unwrap_err().contains("empty"));
        assert!(parse(r#"{"id":"core-java"}"#).is_err());
        assert!(parse(r#"[{"id":"made-up","why_fit":"x"}]"#)
            .unwrap_err()
            .contains("unknown candidate 'made-up'"));
        assert!(parse(r#"[{"why_fit":"x"}]"#).is_err());
        assert!(parse("[1, 2]").is_err());
        assert!(parse("[{\"id\": \"core-java\",").is_err());
    }

    #[test]
    fn state_machine_retries_once() {
        let ok = || Ok(vec![Pick { record_id: "a".into(), why_fit: String::new() }]);

        let first = FormatState::Pending.advance(ok());
        assert!(matches!(first, FormatState::Validated { attempts: 1, .. }));

        let retry = FormatState::Pending.advance(Err("bad".into()));
        assert_eq!(retry.rejection(), Some("bad"));
        assert!(!retry.is_terminal());
        assert!(matches!(retry.clone().advance(ok()), FormatState::Validated { attempts: 2, .. }));

        let failed = retry.advance(Err("worse".into()));
        assert_eq!(failed, FormatState::Failed { reason: "worse".into() });
        assert!(failed.is_terminal());
        assert_eq!(failed.clone().advance(ok()), failed);
    }
}
