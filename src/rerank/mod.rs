//! Reranking and explanation of retrieved candidates.
//!
//! ```text
//! query ──► intent ──► duration filter ──► generator (validate, retry once)
//!                                               │
//!            recommendations ◄── explain ◄── select (bounds, balance)
//! ```

pub mod explain;
pub mod generator;
pub mod intent;
pub mod parse;
pub mod prompt;
pub mod select;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::catalog::{CatalogRecord, Category};
use crate::config::Config;
use crate::error::{ArError, Result};

pub use generator::{build_generator, Generator, HeuristicGenerator, OpenAiGenerator};
pub use intent::QueryIntent;
pub use parse::{FormatState, Pick};
pub use prompt::Prompt;
pub use select::{BalanceOutcome, PickSource, ResultBounds};

/// One recommended assessment. Every field except `why_fit` is copied from
/// the catalog record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub record_id: String,
    pub name: String,
    pub url: String,
    pub description: String,
    pub why_fit: String,
    pub duration_minutes: Option<u32>,
    pub category: Category,
}

impl Recommendation {
    #[must_use]
    pub fn from_record(record: &CatalogRecord, why_fit: String) -> Self {
        Self {
            record_id: record.id.clone(),
            name: record.name.clone(),
            url: record.url.clone(),
            description: record.description.clone(),
            why_fit,
            duration_minutes: record.duration_minutes,
            category: record.category.clone(),
        }
    }
}

/// Recommendations plus how they were reached.
#[derive(Debug, Clone, Serialize)]
pub struct RerankOutcome {
    pub recommendations: Vec<Recommendation>,
    pub sources: Vec<PickSource>,
    pub intent: QueryIntent,
    pub balance: BalanceOutcome,
    /// Generation calls made: 0 when nothing survived filtering.
    pub attempts: u8,
    pub filtered_out: usize,
}

pub struct Reranker {
    generator: Box<dyn Generator>,
    bounds: ResultBounds,
}

impl std::fmt::Debug for Reranker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reranker")
            .field("generator", &self.generator.name())
            .field("bounds", &self.bounds)
            .finish()
    }
}

impl Reranker {
    #[must_use]
    pub fn new(generator: Box<dyn Generator>, bounds: ResultBounds) -> Self {
        Self { generator, bounds }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let generator = build_generator(&config.generation)?;
        Ok(Self::new(
            generator,
            ResultBounds {
                min: config.rerank.min_results as usize,
                max: config.rerank.max_results as usize,
            },
        ))
    }

    #[must_use]
    pub fn generator_name(&self) -> &str {
        self.generator.name()
    }

    #[must_use]
    pub const fn bounds(&self) -> ResultBounds {
        self.bounds
    }

    /// Select, balance and explain recommendations from `candidates`
    /// (retrieval order).
    pub fn rerank(&self, query: &str, candidates: &[CatalogRecord]) -> Result<Vec<Recommendation>> {
        Ok(self.rerank_detailed(query, candidates)?.recommendations)
    }

    pub fn rerank_detailed(&self, query: &str, candidates: &[CatalogRecord]) -> Result<RerankOutcome> {
        let intent = QueryIntent::extract(query);
        let filtered = select::filter_by_duration(candidates, intent.duration_max);
        let filtered_out = candidates.len() - filtered.len();
        debug!(
            candidates = candidates.len(),
            kept = filtered.len(),
            duration_max = ?intent.duration_max,
            "applied duration filter"
        );

        if filtered.is_empty() {
            warn!("no candidates left after filtering; returning an empty list");
            return Ok(RerankOutcome {
                recommendations: Vec::new(),
                sources: Vec::new(),
                balance: if intent.wants_balance() {
                    BalanceOutcome::Degraded(Category::BALANCED.to_vec())
                } else {
                    BalanceOutcome::NotRequired
                },
                intent,
                attempts: 0,
                filtered_out,
            });
        }

        let (picks, attempts) = self.generate_picks(query, &intent, &filtered)?;
        let selection = select::select(picks, &filtered, &intent, self.bounds);

        let mut recommendations = Vec::with_capacity(selection.items.len());
        let mut sources = Vec::with_capacity(selection.items.len());
        for item in selection.items {
            let why_fit = match item.why_fit {
                Some(text) => match explain::grounding_issue(&text, item.record, &intent) {
                    None => text,
                    Some(issue) => {
                        debug!(id = %item.record.id, %issue, "generated justification not backed by record; replacing");
                        explain::synthesize(item.record, &intent)
                    }
                },
                None => explain::synthesize(item.record, &intent),
            };
            recommendations.push(Recommendation::from_record(item.record, why_fit));
            sources.push(item.source);
        }

        info!(
            generator = self.generator.name(),
            attempts,
            results = recommendations.len(),
            balance = ?selection.balance,
            "reranked candidates"
        );

        Ok(RerankOutcome {
            recommendations,
            sources,
            intent,
            balance: selection.balance,
            attempts,
            filtered_out,
        })
    }

    fn generate_picks(
        &self,
        query: &str,
        intent: &QueryIntent,
        filtered: &[&CatalogRecord],
    ) -> Result<(Vec<Pick>, u8)> {
        let mut state = FormatState::Pending;
        while !state.is_terminal() {
            let prompt = prompt::build(query, intent, filtered, self.bounds, state.rejection());
            let reply = self.generator.generate(&prompt)?;
            let outcome = parse::parse_picks(&reply, filtered);
            if let Err(reason) = &outcome {
                warn!(generator = self.generator.name(), %reason, "generation output rejected");
            }
            state = state.advance(outcome);
        }

        match state {
            FormatState::Validated { picks, attempts } => Ok((picks, attempts)),
            other => Err(ArError::RerankFormat(
                other
                    .rejection()
                    .unwrap_or("generation output rejected")
                    .to_string(),
            )),
        }
    }
}
