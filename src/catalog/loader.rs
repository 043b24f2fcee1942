//! Catalog ingestion from JSON, JSONL and CSV files.
//!
//! All three formats funnel through one field map so aliases, list parsing
//! and duration parsing behave identically regardless of the source.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::{CatalogRecord, Category};
use crate::error::{ArError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogFormat {
    Json,
    Jsonl,
    Csv,
}

impl CatalogFormat {
    /// Pick the format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "json" => Ok(Self::Json),
            "jsonl" | "ndjson" => Ok(Self::Jsonl),
            "csv" => Ok(Self::Csv),
            other => Err(ArError::Catalog(format!(
                "unsupported catalog extension '{other}' for {} (expected .json, .jsonl or .csv)",
                path.display()
            ))),
        }
    }
}

const ID_KEYS: &[&str] = &["id", "record_id", "slug"];
const NAME_KEYS: &[&str] = &["name", "assessment_name", "title"];
const URL_KEYS: &[&str] = &["url", "assessment_url", "link"];
const DESCRIPTION_KEYS: &[&str] = &["description", "assessment_description"];
const CATEGORY_KEYS: &[&str] = &["category", "assessment_type", "test_type", "type"];
const JOB_LEVEL_KEYS: &[&str] = &["job_levels", "job_level"];
const LANGUAGE_KEYS: &[&str] = &["languages", "language"];
const DURATION_KEYS: &[&str] = &[
    "duration_minutes",
    "duration",
    "assessment_length",
    "length",
];

static HOURS_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:\.\d+)?)\s*(?:hours?|hrs?|h)\b").expect("valid regex")
});

static NUMBER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("valid regex"));

/// Load a catalog file, choosing the decoder by extension.
pub fn load_catalog(path: &Path) -> Result<Vec<CatalogRecord>> {
    let format = CatalogFormat::from_path(path)?;
    let raw = std::fs::read_to_string(path)
        .map_err(|err| ArError::Catalog(format!("read {}: {err}", path.display())))?;
    let records = parse_catalog_str(&raw, format)?;
    info!(
        path = %path.display(),
        records = records.len(),
        "loaded catalog"
    );
    Ok(records)
}

/// Decode catalog records from an in-memory string.
///
/// Only decoding errors fail here. Records are returned as found, nameless
/// or duplicated ones included; [`CatalogIndex::build`] rejects those and
/// names the record.
///
/// [`CatalogIndex::build`]: crate::search::CatalogIndex::build
pub fn parse_catalog_str(raw: &str, format: CatalogFormat) -> Result<Vec<CatalogRecord>> {
    let maps = match format {
        CatalogFormat::Json => json_maps(raw)?,
        CatalogFormat::Jsonl => jsonl_maps(raw)?,
        CatalogFormat::Csv => csv_maps(raw)?,
    };

    let records: Vec<CatalogRecord> = maps.iter().map(record_from_map).collect();
    debug!(count = records.len(), ?format, "decoded catalog records");
    Ok(records)
}

fn json_maps(raw: &str) -> Result<Vec<Map<String, Value>>> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|err| ArError::Catalog(format!("parse JSON catalog: {err}")))?;
    let Value::Array(items) = value else {
        return Err(ArError::Catalog(
            "JSON catalog must be an array of records".to_string(),
        ));
    };
    items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| match item {
            Value::Object(map) => Ok(map),
            _ => Err(ArError::Catalog(format!("record {} is not an object", idx + 1))),
        })
        .collect()
}

fn jsonl_maps(raw: &str) -> Result<Vec<Map<String, Value>>> {
    let mut maps = Vec::new();
    for (idx, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(line)
            .map_err(|err| ArError::Catalog(format!("line {}: {err}", idx + 1)))?;
        match value {
            Value::Object(map) => maps.push(map),
            _ => {
                return Err(ArError::Catalog(format!(
                    "line {}: expected a JSON object",
                    idx + 1
                )));
            }
        }
    }
    Ok(maps)
}

fn csv_maps(raw: &str) -> Result<Vec<Map<String, Value>>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(raw.as_bytes());
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_lowercase().replace([' ', '-'], "_"))
        .collect();

    let mut maps = Vec::new();
    for row in reader.records() {
        let row = row?;
        let map = headers
            .iter()
            .zip(row.iter())
            .map(|(key, value)| (key.clone(), Value::String(value.to_string())))
            .collect();
        maps.push(map);
    }
    Ok(maps)
}

fn record_from_map(map: &Map<String, Value>) -> CatalogRecord {
    let name = lookup_text(map, NAME_KEYS).unwrap_or_default();
    let url = lookup_text(map, URL_KEYS).unwrap_or_default();
    let id = lookup_text(map, ID_KEYS)
        .or_else(|| id_from_url(&url))
        .or_else(|| slugify(&name))
        .unwrap_or_default();

    let duration_minutes = match lookup(map, DURATION_KEYS) {
        Some(Value::Number(n)) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Some(Value::String(text)) => parse_duration_minutes(text),
        _ => None,
    };

    CatalogRecord {
        id,
        name,
        url,
        description: lookup_text(map, DESCRIPTION_KEYS).unwrap_or_default(),
        category: Category::parse(&lookup_text(map, CATEGORY_KEYS).unwrap_or_default()),
        job_levels: lookup_set(map, JOB_LEVEL_KEYS),
        languages: lookup_set(map, LANGUAGE_KEYS),
        duration_minutes,
    }
}

fn lookup<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| map.get(*key))
        .find(|value| !value.is_null())
}

fn lookup_text(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    let text = match lookup(map, keys)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn lookup_set(map: &Map<String, Value>, keys: &[&str]) -> BTreeSet<String> {
    match lookup(map, keys) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        Some(Value::String(text)) => text
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        _ => BTreeSet::new(),
    }
}

fn id_from_url(url: &str) -> Option<String> {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty() && !segment.contains(':') && !segment.contains('.'))
        .map(str::to_string)
}

fn slugify(text: &str) -> Option<String> {
    let mut slug = String::with_capacity(text.len());
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            slug.extend(ch.to_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-').to_string();
    (!slug.is_empty()).then_some(slug)
}

/// Parse a free-text duration into minutes.
///
/// Ranges resolve to their upper bound ("15 to 35" is 35). Hours are
/// converted ("1.5 hours" is 90). "Untimed", "variable" and text without a
/// number yield `None`.
#[must_use]
pub fn parse_duration_minutes(text: &str) -> Option<u32> {
    let lowered = text.to_lowercase();
    if lowered.contains("untimed") || lowered.contains("variable") || lowered.contains("n/a") {
        return None;
    }

    if let Some(caps) = HOURS_REGEX.captures(&lowered) {
        let hours: f32 = caps[1].parse().ok()?;
        return Some((hours * 60.0).round() as u32);
    }

    NUMBER_REGEX
        .find_iter(&lowered)
        .filter_map(|m| m.as_str().parse::<u32>().ok())
        .max()
}
