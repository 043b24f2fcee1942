//! Assessment catalog records.
//!
//! A [`CatalogRecord`] is immutable once ingested. Its canonical text
//! rendering ([`render`]) is what gets embedded, so the rendering carries a
//! version ([`RENDER_VERSION`]) that persisted indexes are checked against.

mod loader;

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub use loader::{load_catalog, parse_catalog_str, parse_duration_minutes, CatalogFormat};

/// Version of [`render`]. Bump whenever the rendered text changes.
pub const RENDER_VERSION: u32 = 1;

/// Assessment category.
///
/// Only the two named categories take part in the balance rule; any other
/// label is carried through verbatim as [`Category::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    KnowledgeSkills,
    PersonalityBehavior,
    Other(String),
}

impl Category {
    /// Categories the balance rule requires, in the order they are repaired.
    /// Widening the rule to more categories starts here.
    pub const BALANCED: [Self; 2] = [Self::KnowledgeSkills, Self::PersonalityBehavior];

    /// Parse a free-form category label.
    ///
    /// Accepts "Knowledge & Skills", "Knowledge&Skills", "K", "Personality &
    /// Behavior", "Personality & Behaviour", "P" and similar spellings,
    /// case-insensitively.
    #[must_use]
    pub fn parse(label: &str) -> Self {
        let folded: String = label
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect();

        match folded.as_str() {
            "k" | "knowledgeskills" | "knowledgeandskills" | "knowledge" => Self::KnowledgeSkills,
            "p" | "personalitybehavior" | "personalitybehaviour" | "personalityandbehavior"
            | "personalityandbehaviour" | "personality" => Self::PersonalityBehavior,
            _ => Self::Other(label.trim().to_string()),
        }
    }

    /// Display label used in renderings and API output.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::KnowledgeSkills => "Knowledge & Skills",
            Self::PersonalityBehavior => "Personality & Behavior",
            Self::Other(label) => label,
        }
    }

    /// Whether this category participates in the balance rule.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        Self::BALANCED.contains(self)
    }
}

impl From<String> for Category {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<Category> for String {
    fn from(value: Category) -> Self {
        value.label().to_string()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One assessment in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub description: String,
    pub category: Category,
    #[serde(default)]
    pub job_levels: BTreeSet<String>,
    #[serde(default)]
    pub languages: BTreeSet<String>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
}

impl CatalogRecord {
    /// Check the fields the canonical rendering cannot do without.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("missing id".to_string());
        }
        if self.name.trim().is_empty() {
            return Err("missing name".to_string());
        }
        Ok(())
    }

    /// Duration as shown to users ("35 minutes"), if known.
    #[must_use]
    pub fn duration_label(&self) -> Option<String> {
        self.duration_minutes.map(|minutes| format!("{minutes} minutes"))
    }
}

/// Canonical text rendering of a record, in fixed field order.
///
/// Optional lines are omitted when empty. Set members are emitted in sorted
/// order so two equal records always render identically.
#[must_use]
pub fn render(record: &CatalogRecord) -> String {
    let mut lines = vec![
        format!("Name: {}", record.name.trim()),
        format!("Type: {}", record.category.label()),
        format!("Description: {}", record.description.trim()),
    ];

    if !record.job_levels.is_empty() {
        lines.push(format!("Job Levels: {}", join_set(&record.job_levels)));
    }
    if !record.languages.is_empty() {
        lines.push(format!("Languages: {}", join_set(&record.languages)));
    }
    if let Some(minutes) = record.duration_minutes {
        lines.push(format!("Assessment Length: {minutes} minutes"));
    }

    lines.join("\n")
}

fn join_set(values: &BTreeSet<String>) -> String {
    values.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

/// Fingerprint of a catalog: sha256 over every record id and rendering.
#[must_use]
pub fn fingerprint(records: &[CatalogRecord]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(RENDER_VERSION.to_le_bytes());
    for record in records {
        hasher.update(record.id.as_bytes());
        hasher.update([0u8]);
        hasher.update(render(record).as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}
