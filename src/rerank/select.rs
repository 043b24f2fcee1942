//! Candidate filtering, local relevance scoring and bounded, balanced
//! selection.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, warn};

use crate::catalog::{CatalogRecord, Category};
use crate::rerank::intent::{matches_pattern, normalize, QueryIntent};
use crate::rerank::parse::Pick;

/// Size bounds for a recommendation list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultBounds {
    pub min: usize,
    pub max: usize,
}

impl Default for ResultBounds {
    fn default() -> Self {
        Self { min: 5, max: 10 }
    }
}

/// How an item entered the final selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PickSource {
    Generated,
    Padded,
    Balanced,
}

/// Result of applying the balance rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "categories", rename_all = "snake_case")]
pub enum BalanceOutcome {
    NotRequired,
    Satisfied,
    Repaired(Vec<Category>),
    /// Best effort: these required categories had no candidate left after
    /// filtering.
    Degraded(Vec<Category>),
}

#[derive(Debug, Clone)]
pub struct Selected<'a> {
    pub record: &'a CatalogRecord,
    pub why_fit: Option<String>,
    pub source: PickSource,
}

#[derive(Debug, Clone)]
pub struct Selection<'a> {
    pub items: Vec<Selected<'a>>,
    pub balance: BalanceOutcome,
}

/// Drop candidates whose stated duration exceeds the query's budget.
/// Records without a duration always pass.
pub fn filter_by_duration<'a>(
    candidates: &'a [CatalogRecord],
    duration_max: Option<u32>,
) -> Vec<&'a CatalogRecord> {
    let Some(limit) = duration_max else {
        return candidates.iter().collect();
    };
    candidates
        .iter()
        .filter(|record| record.duration_minutes.is_none_or(|minutes| minutes <= limit))
        .collect()
}

/// Local relevance of a candidate, used for padding and balance repair.
///
/// Facet overlap dominates; retrieval rank contributes at most 1.0 so it
/// only orders candidates with equal overlap.
#[must_use]
pub fn relevance(record: &CatalogRecord, intent: &QueryIntent, rank: usize, total: usize) -> f32 {
    let name = normalize(&record.name);
    let description = normalize(&record.description);

    let mut score = 0.0;
    for facet in intent.facets() {
        if matches_pattern(&facet.pattern, &name) {
            score += 2.0;
        } else if matches_pattern(&facet.pattern, &description) {
            score += 1.0;
        }
    }

    if !intent.technical_skills.is_empty() && record.category == Category::KnowledgeSkills {
        score += 0.5;
    }
    if !intent.behavioral_competencies.is_empty()
        && record.category == Category::PersonalityBehavior
    {
        score += 0.5;
    }
    if let Some(level) = &intent.job_level {
        if record.job_levels.contains(level) {
            score += 0.5;
        }
    }

    #[allow(clippy::cast_precision_loss)]
    let prior = if total == 0 {
        0.0
    } else {
        (total - rank.min(total)) as f32 / total as f32
    };
    score + prior
}

/// Filtered candidates ordered by descending local relevance, ties kept in
/// retrieval order.
#[must_use]
pub fn rank_locally<'a>(
    filtered: &[&'a CatalogRecord],
    intent: &QueryIntent,
) -> Vec<&'a CatalogRecord> {
    let total = filtered.len();
    let mut scored: Vec<(f32, &CatalogRecord)> = filtered
        .iter()
        .enumerate()
        .map(|(rank, record)| (relevance(record, intent, rank, total), *record))
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.into_iter().map(|(_, record)| record).collect()
}

/// Build the final selection from the generator's validated picks.
///
/// `picks` must only reference records in `filtered`; unknown ids are
/// skipped.
pub fn select<'a>(
    picks: Vec<Pick>,
    filtered: &[&'a CatalogRecord],
    intent: &QueryIntent,
    bounds: ResultBounds,
) -> Selection<'a> {
    let mut seen = HashSet::new();
    let mut items: Vec<Selected<'a>> = Vec::new();

    for Pick { record_id, why_fit } in picks {
        if items.len() >= bounds.max {
            break;
        }
        let Some(record) = filtered.iter().copied().find(|r| r.id == record_id) else {
            continue;
        };
        if !seen.insert(record.id.as_str()) {
            debug!(id = %record.id, "dropping duplicate pick");
            continue;
        }
        items.push(Selected {
            record,
            why_fit: Some(why_fit).filter(|text| !text.trim().is_empty()),
            source: PickSource::Generated,
        });
    }

    let ranked = rank_locally(filtered, intent);

    let floor = bounds.min.min(filtered.len());
    if items.len() < floor {
        debug!(have = items.len(), floor, "padding selection");
        for &record in &ranked {
            if items.len() >= floor {
                break;
            }
            if seen.insert(record.id.as_str()) {
                items.push(Selected {
                    record,
                    why_fit: None,
                    source: PickSource::Padded,
                });
            }
        }
    }

    let balance = if intent.wants_balance() {
        enforce_balance(&mut items, &ranked, bounds.max)
    } else {
        BalanceOutcome::NotRequired
    };

    Selection { items, balance }
}

fn enforce_balance<'a>(
    items: &mut Vec<Selected<'a>>,
    ranked: &[&'a CatalogRecord],
    max: usize,
) -> BalanceOutcome {
    let mut repaired = Vec::new();
    let mut degraded = Vec::new();

    for required in Category::BALANCED {
        if items.iter().any(|item| item.record.category == required) {
            continue;
        }

        let Some(candidate) = ranked.iter().copied().find(|record| {
            record.category == required && !items.iter().any(|item| item.record.id == record.id)
        }) else {
            warn!(category = %required, "no candidate of required category after filtering");
            degraded.push(required);
            continue;
        };

        let inserted = Selected {
            record: candidate,
            why_fit: None,
            source: PickSource::Balanced,
        };

        if items.len() < max {
            items.push(inserted);
        } else if let Some(slot) = replaceable_slot(items) {
            debug!(
                removed = %items[slot].record.id,
                added = %candidate.id,
                "swapping for category balance"
            );
            items[slot] = inserted;
        } else {
            warn!(category = %required, "selection too small to rebalance");
            degraded.push(required);
            continue;
        }
        repaired.push(required);
    }

    if !degraded.is_empty() {
        BalanceOutcome::Degraded(degraded)
    } else if !repaired.is_empty() {
        BalanceOutcome::Repaired(repaired)
    } else {
        BalanceOutcome::Satisfied
    }
}

/// Lowest-ranked item whose category has another member in the list.
fn replaceable_slot(items: &[Selected<'_>]) -> Option<usize> {
    (0..items.len()).rev().find(|&idx| {
        let category = &items[idx].record.category;
        items
            .iter()
            .filter(|item| &item.record.category == category)
            .count()
            > 1
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn record(id: &str, name: &str, category: Category, minutes: Option<u32>) -> CatalogRecord {
        CatalogRecord {
            id: id.to_string(),
            name: name.to_string(),
            url: format!("https://example.com/{id}"),
            description: format!("{name} assessment"),
            category,
            job_levels: BTreeSet::new(),
            languages: BTreeSet::new(),
            duration_minutes: minutes,
        }
    }

    fn picks(ids: &[&str]) -> Vec<Pick> {
        ids.iter()
            .map(|id| Pick {
                record_id: (*id).to_string(),
                why_fit: "fits".to_string(),
            })
            .collect()
    }

    fn ids(selection: &Selection<'_>) -> Vec<String> {
        selection.items.iter().map(|i| i.record.id.clone()).collect()
    }

    fn java_pool() -> Vec<CatalogRecord> {
        let mut pool: Vec<CatalogRecord> = (0..8)
            .map(|i| {
                record(
                    &format!("java{i}"),
                    &format!("Java Test {i}"),
                    Category::KnowledgeSkills,
                    Some(20),
                )
            })
            .collect();
        pool.push(record(
            "team",
            "Teamwork and Collaboration Styles",
            Category::PersonalityBehavior,
            Some(25),
        ));
        pool
    }

    #[test]
    fn duration_filter_keeps_undated_records() {
        let pool = vec![
            record("a", "A", Category::KnowledgeSkills, Some(20)),
            record("b", "B", Category::KnowledgeSkills, Some(50)),
            record("c", "C", Category::KnowledgeSkills, None),
        ];
        let kept: Vec<_> = filter_by_duration(&pool, Some(30))
            .iter()
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(kept, vec!["a", "c"]);
        assert_eq!(filter_by_duration(&pool, None).len(), 3);
    }

    #[test]
    fn picks_are_deduplicated_and_truncated() {
        let pool = java_pool();
        let filtered: Vec<_> = pool.iter().collect();
        let intent = QueryIntent::extract("java");
        let picks = picks(&["java0", "java0", "java1", "java2", "java3"]);

        let selection = select(picks, &filtered, &intent, ResultBounds { min: 2, max: 3 });
        assert_eq!(ids(&selection), vec!["java0", "java1", "java2"]);
    }

    #[test]
    fn short_picks_are_padded_by_relevance() {
        let pool = java_pool();
        let filtered: Vec<_> = pool.iter().collect();
        let intent = QueryIntent::extract("teamwork");
        let picks = picks(&["java3"]);

        let selection = select(picks, &filtered, &intent, ResultBounds::default());
        assert_eq!(selection.items.len(), 5);
        assert_eq!(selection.items[1].record.id, "team");
        assert_eq!(selection.items[1].source, PickSource::Padded);
    }

    #[test]
    fn padding_is_capped_by_available_candidates() {
        let pool = java_pool();
        let filtered: Vec<_> = pool.iter().take(3).collect();
        let selection = select(
            Vec::new(),
            &filtered,
            &QueryIntent::default(),
            ResultBounds::default(),
        );
        assert_eq!(selection.items.len(), 3);
    }

    #[test]
    fn full_list_is_rebalanced_by_replacing_last_duplicate_category() {
        let pool = java_pool();
        let filtered: Vec<_> = pool.iter().collect();
        let intent = QueryIntent::extract("Java developer who collaborates well");
        let picks = picks(&["java0", "java1", "java2", "java3", "java4"]);

        let selection = select(picks, &filtered, &intent, ResultBounds { min: 5, max: 5 });
        assert_eq!(
            ids(&selection),
            vec!["java0", "java1", "java2", "java3", "team"]
        );
        assert_eq!(
            selection.balance,
            BalanceOutcome::Repaired(vec![Category::PersonalityBehavior])
        );
    }

    #[test]
    fn rebalancing_appends_when_room() {
        let pool = java_pool();
        let filtered: Vec<_> = pool.iter().collect();
        let intent = QueryIntent::extract("Java developer who collaborates well");
        let picks = picks(&["java0", "java1", "java2", "java3", "java4"]);

        let selection = select(picks, &filtered, &intent, ResultBounds::default());
        assert_eq!(selection.items.len(), 6);
        assert_eq!(selection.items[5].source, PickSource::Balanced);
    }

    #[test]
    fn missing_category_degrades() {
        let pool = java_pool();
        let filtered: Vec<_> = pool.iter().take(6).collect();
        let intent = QueryIntent::extract("Java developer who collaborates well");

        let selection = select(Vec::new(), &filtered, &intent, ResultBounds::default());
        assert_eq!(
            selection.balance,
            BalanceOutcome::Degraded(vec![Category::PersonalityBehavior])
        );
        assert_eq!(selection.items.len(), 5);
    }

    #[test]
    fn other_category_never_satisfies_balance() {
        let pool = vec![
            record("java", "Java", Category::KnowledgeSkills, None),
            record("sim", "Simulation", Category::Other("Simulations".into()), None),
        ];
        let filtered: Vec<_> = pool.iter().collect();
        let intent = QueryIntent::extract("java teamwork");
        let selection = select(Vec::new(), &filtered, &intent, ResultBounds::default());
        assert!(matches!(selection.balance, BalanceOutcome::Degraded(_)));
    }
}
