use std::collections::BTreeSet;
use std::path::PathBuf;

use tempfile::TempDir;

use crate::catalog::{CatalogRecord, Category};
use crate::recommend::{QueryResolver, Recommender};
use crate::rerank::{Generator, HeuristicGenerator, Reranker, ResultBounds};
use crate::search::{CatalogIndex, HashEmbedder};

fn record(
    id: &str,
    name: &str,
    category: Category,
    minutes: Option<u32>,
    levels: &[&str],
    description: &str,
) -> CatalogRecord {
    CatalogRecord {
        id: id.to_string(),
        name: name.to_string(),
        url: format!("https://catalog.example.com/view/{id}/"),
        description: description.to_string(),
        category,
        job_levels: levels.iter().map(|l| (*l).to_string()).collect(),
        languages: BTreeSet::from(["English (USA)".to_string()]),
        duration_minutes: minutes,
    }
}

/// A small catalog covering both balanced categories, an `Other`
/// category, long and untimed assessments.
#[must_use]
pub fn sample_catalog() -> Vec<CatalogRecord> {
    use Category::{KnowledgeSkills as KS, PersonalityBehavior as PB};
    let aptitude = || Category::parse("Ability & Aptitude");
    vec![
        record(
            "core-java-coding",
            "Core Java Coding Test",
            KS,
            Some(40),
            &["Mid-Professional", "Professional Individual Contributor"],
            "Measures Java programming knowledge: classes, collections, exceptions and multithreading.",
        ),
        record(
            "java-8-new",
            "Java 8 (New)",
            KS,
            Some(18),
            &["Entry-Level", "Mid-Professional"],
            "Multi-choice test of Java 8 language features, streams and lambdas.",
        ),
        record(
            "python-new",
            "Python (New)",
            KS,
            Some(11),
            &["Mid-Professional"],
            "Knowledge of Python programming, data structures and the standard library.",
        ),
        record(
            "sql-server",
            "SQL Server Queries",
            KS,
            Some(15),
            &["Entry-Level", "Mid-Professional"],
            "Writing and reading SQL queries: joins, grouping and subqueries.",
        ),
        record(
            "javascript-new",
            "JavaScript (New)",
            KS,
            Some(16),
            &["Mid-Professional"],
            "JavaScript language knowledge for front-end web development.",
        ),
        record(
            "automata-fix",
            "Automata Fix",
            KS,
            Some(20),
            &["Graduate", "Mid-Professional"],
            "Coding simulation where candidates debug and fix programs.",
        ),
        record(
            "teamwork-collab",
            "Teamwork & Collaboration Styles",
            PB,
            Some(25),
            &["Entry-Level", "Mid-Professional", "Manager"],
            "Assesses how candidates collaborate, communicate and work in a team.",
        ),
        record(
            "interpersonal-communications",
            "Interpersonal Communications",
            PB,
            Some(30),
            &["Entry-Level", "Supervisor"],
            "Measures communication skills and how candidates handle stakeholders.",
        ),
        record(
            "opq32r",
            "Occupational Personality Questionnaire OPQ32r",
            PB,
            Some(25),
            &["Manager", "Director", "Executive"],
            "Personality questionnaire covering leadership, teamwork and adaptability.",
        ),
        record(
            "sales-profile",
            "Sales Representative Profile",
            PB,
            None,
            &["Entry-Level"],
            "Behavioral profile for customer-facing sales roles.",
        ),
        record(
            "verify-numerical",
            "Verify Numerical Reasoning",
            aptitude(),
            Some(18),
            &["Graduate", "Mid-Professional", "Manager"],
            "Numerical reasoning with tables and charts for analyst roles.",
        ),
        record(
            "global-skills-assessment",
            "Global Skills Assessment",
            KS,
            Some(90),
            &["Mid-Professional", "Manager"],
            "Broad assessment of business skills, analytics and problem solving.",
        ),
        record(
            "leadership-report",
            "Enterprise Leadership Report",
            PB,
            Some(60),
            &["Director", "Executive"],
            "Leadership potential report for senior management hiring.",
        ),
    ]
}

/// Isolated `AREC_ROOT` directory with a catalog file written into it.
pub struct CatalogFixture {
    pub temp_dir: TempDir,
    pub root: PathBuf,
    pub catalog_path: PathBuf,
}

impl CatalogFixture {
    /// Fixture holding [`sample_catalog`] as `catalog.json`.
    ///
    /// # Panics
    /// When the temp directory cannot be created or written.
    #[must_use]
    pub fn new() -> Self {
        Self::with_records(&sample_catalog())
    }

    /// # Panics
    /// When the temp directory cannot be created or written.
    #[must_use]
    pub fn with_records(records: &[CatalogRecord]) -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let root = temp_dir.path().join(".arec");
        std::fs::create_dir_all(&root).expect("create root");
        let catalog_path = temp_dir.path().join("catalog.json");
        let json = serde_json::to_string_pretty(records).expect("serialize catalog");
        std::fs::write(&catalog_path, json).expect("write catalog");
        Self {
            temp_dir,
            root,
            catalog_path,
        }
    }

    /// Write `content` under the fixture directory and return its path.
    ///
    /// # Panics
    /// When the file cannot be written.
    #[must_use]
    pub fn write_file(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.temp_dir.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent dirs");
        }
        std::fs::write(&path, content).expect("write file");
        path
    }

    #[must_use]
    pub fn index_path(&self) -> PathBuf {
        self.root.join("index.db")
    }
}

impl Default for CatalogFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Recommender over `records` with the default hash embedder and the given
/// generator, index already installed.
///
/// # Panics
/// When the records cannot be indexed.
#[must_use]
pub fn recommender_with(records: Vec<CatalogRecord>, generator: Box<dyn Generator>) -> Recommender {
    let recommender = Recommender::new(
        Box::new(HashEmbedder::default()),
        Reranker::new(generator, ResultBounds::default()),
        QueryResolver::offline(),
        20,
        0,
    );
    let index = CatalogIndex::build(records, recommender.embedder()).expect("build index");
    recommender.install(index).expect("install index");
    recommender
}

/// [`recommender_with`] over [`sample_catalog`] and the offline generator.
#[must_use]
pub fn heuristic_recommender() -> Recommender {
    recommender_with(sample_catalog(), Box::new(HeuristicGenerator))
}
