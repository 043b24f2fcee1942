//! Offline evaluation against a labeled query set.
//!
//! Labels are CSV (one row per relevant URL, grouped by query) or JSONL
//! (`{"query": ..., "relevant_urls": [...]}` per line). The score is mean
//! Recall@K.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ArError, Result};
use crate::rerank::Recommendation;

pub const DEFAULT_K: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LabeledQuery {
    pub query: String,
    pub relevant_urls: BTreeSet<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryScore {
    pub query: String,
    pub relevant: usize,
    pub recommended_urls: Vec<String>,
    pub found: usize,
    pub recall: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvalReport {
    pub k: usize,
    pub mean_recall: f64,
    pub failures: usize,
    pub queries: Vec<QueryScore>,
}

/// Load labels, picking the format from the extension (`.jsonl`/`.ndjson`
/// or CSV otherwise).
pub fn load_labels(path: &Path) -> Result<Vec<LabeledQuery>> {
    let raw = std::fs::read_to_string(path)?;
    let is_jsonl = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jsonl") || ext.eq_ignore_ascii_case("ndjson"));
    if is_jsonl {
        parse_jsonl_labels(&raw)
    } else {
        parse_csv_labels(&raw)
    }
}

/// CSV labels: the first column whose header mentions "query" and the first
/// mentioning both "assessment" and "url" (or just "url").
pub fn parse_csv_labels(raw: &str) -> Result<Vec<LabeledQuery>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(raw.as_bytes());
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(str::to_ascii_lowercase)
        .collect();

    let query_col = headers
        .iter()
        .position(|h| h.contains("query"))
        .ok_or_else(|| ArError::Catalog("label file has no query column".to_string()))?;
    let url_col = headers
        .iter()
        .position(|h| h.contains("assessment") && h.contains("url"))
        .or_else(|| headers.iter().position(|h| h.contains("url")))
        .ok_or_else(|| ArError::Catalog("label file has no assessment url column".to_string()))?;

    let mut labels: Vec<LabeledQuery> = Vec::new();
    for row in reader.records() {
        let row = row?;
        let query = row.get(query_col).unwrap_or_default();
        let url = row.get(url_col).unwrap_or_default();
        if query.is_empty() {
            continue;
        }
        add_label(&mut labels, query, url);
    }
    Ok(labels)
}

pub fn parse_jsonl_labels(raw: &str) -> Result<Vec<LabeledQuery>> {
    let mut labels: Vec<LabeledQuery> = Vec::new();
    for (line_no, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let entry: LabeledQuery = serde_json::from_str(line).map_err(|err| {
            ArError::Catalog(format!("labels line {}: {err}", line_no + 1))
        })?;
        for url in &entry.relevant_urls {
            add_label(&mut labels, &entry.query, url);
        }
    }
    Ok(labels)
}

/// Group by query text, keeping first-appearance order.
fn add_label(labels: &mut Vec<LabeledQuery>, query: &str, url: &str) {
    let query = query.trim();
    let url = url.trim();
    let index = match labels.iter().position(|label| label.query == query) {
        Some(index) => index,
        None => {
            labels.push(LabeledQuery {
                query: query.to_string(),
                relevant_urls: BTreeSet::new(),
            });
            labels.len() - 1
        }
    };
    if !url.is_empty() {
        labels[index].relevant_urls.insert(url.to_string());
    }
}

/// Fraction of `relevant` found among the first `k` of `recommended`.
/// Zero when nothing is relevant.
#[must_use]
pub fn recall_at_k(recommended: &[String], relevant: &BTreeSet<String>, k: usize) -> f64 {
    if relevant.is_empty() {
        return 0.0;
    }
    let relevant: BTreeSet<String> = relevant.iter().map(|url| normalize_url(url)).collect();
    let found = recommended
        .iter()
        .take(k)
        .map(|url| normalize_url(url))
        .collect::<BTreeSet<_>>()
        .intersection(&relevant)
        .count();
    #[allow(clippy::cast_precision_loss)]
    let recall = found as f64 / relevant.len() as f64;
    recall
}

fn normalize_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_ascii_lowercase()
}

/// Score every labeled query with `recommend`. A failing query scores 0 and
/// is recorded, never aborting the run.
pub fn evaluate<F>(labels: &[LabeledQuery], k: usize, mut recommend: F) -> EvalReport
where
    F: FnMut(&str) -> Result<Vec<Recommendation>>,
{
    let mut queries = Vec::with_capacity(labels.len());
    for (idx, label) in labels.iter().enumerate() {
        let (recommended_urls, error) = match recommend(&label.query) {
            Ok(recs) => (recs.into_iter().map(|rec| rec.url).collect::<Vec<_>>(), None),
            Err(err) => {
                warn!(query = %label.query, error = %err, "evaluation query failed");
                (Vec::new(), Some(err.to_string()))
            }
        };
        let recall = recall_at_k(&recommended_urls, &label.relevant_urls, k);
        let relevant: BTreeSet<String> =
            label.relevant_urls.iter().map(|url| normalize_url(url)).collect();
        let found = recommended_urls
            .iter()
            .filter(|url| relevant.contains(&normalize_url(url)))
            .count();
        info!(
            n = idx + 1,
            total = labels.len(),
            recall,
            found,
            relevant = relevant.len(),
            "scored query"
        );
        queries.push(QueryScore {
            query: label.query.clone(),
            relevant: label.relevant_urls.len(),
            recommended_urls,
            found,
            recall,
            error,
        });
    }

    #[allow(clippy::cast_precision_loss)]
    let mean_recall = if queries.is_empty() {
        0.0
    } else {
        queries.iter().map(|q| q.recall).sum::<f64>() / queries.len() as f64
    };
    let failures = queries.iter().filter(|q| q.error.is_some()).count();

    EvalReport {
        k,
        mean_recall,
        failures,
        queries,
    }
}

/// Write `query,assessment_url` rows, one per recommendation.
pub fn write_predictions(path: &Path, report: &EvalReport) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["query", "assessment_url"])?;
    for score in &report.queries {
        for url in &score.recommended_urls {
            writer.write_record([score.query.as_str(), url.as_str()])?;
        }
    }
    writer.flush()?;
    Ok(())
}
