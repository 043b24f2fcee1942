//! Lexicon-based intent extraction.
//!
//! Pulls technical skills, behavioral competencies, a time budget and a
//! seniority hint out of free query text. Missing facets impose no
//! constraint downstream.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// A matched lexicon entry. `pattern` is what gets matched against record
/// text; a trailing `*` makes it a word-prefix match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Facet {
    pub label: String,
    #[serde(skip)]
    pub pattern: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueryIntent {
    pub technical_skills: Vec<Facet>,
    pub behavioral_competencies: Vec<Facet>,
    pub duration_max: Option<u32>,
    pub job_level: Option<String>,
}

/// Skills, tools and aptitudes. The role nouns at the end are weak signals:
/// they name no skill but still mark the query as technical.
const TECHNICAL: &[(&str, &str)] = &[
    ("java", "java"),
    ("javascript", "javascript"),
    ("typescript", "typescript"),
    ("python", "python"),
    ("sql", "sql"),
    ("c++", "c++"),
    ("c#", "c#"),
    ("rust", "rust"),
    ("ruby", "ruby"),
    ("php", "php"),
    ("scala", "scala"),
    ("kotlin", "kotlin"),
    ("swift", "swift"),
    ("html", "html"),
    ("css", "css"),
    ("react", "react"),
    ("angular", "angular"),
    ("node", "node*"),
    ("selenium", "selenium"),
    ("excel", "excel"),
    ("tableau", "tableau"),
    ("aws", "aws"),
    ("azure", "azure"),
    ("devops", "devops"),
    ("linux", "linux"),
    ("cloud", "cloud"),
    ("automation", "automat*"),
    ("testing", "testing"),
    ("coding", "coding"),
    ("programming", "programm*"),
    ("data analysis", "data analys*"),
    ("data science", "data science"),
    ("machine learning", "machine learning"),
    ("statistics", "statistic*"),
    ("analytics", "analytic*"),
    ("accounting", "accounting"),
    ("finance", "financ*"),
    ("marketing", "marketing"),
    ("seo", "seo"),
    ("data entry", "data entry"),
    ("typing", "typing"),
    ("numerical reasoning", "numerical"),
    ("verbal reasoning", "verbal"),
    ("inductive reasoning", "inductive"),
    ("deductive reasoning", "deductive"),
    ("cognitive ability", "cognitive"),
    ("aptitude", "aptitude"),
    ("software development", "developer*"),
    ("software development", "programmer*"),
    ("software development", "software"),
    ("engineering", "engineer*"),
];

const BEHAVIORAL: &[(&str, &str)] = &[
    ("collaboration", "collaborat*"),
    ("teamwork", "teamwork"),
    ("teamwork", "team player"),
    ("teamwork", "team"),
    ("communication", "communicat*"),
    ("leadership", "leadership"),
    ("leadership", "leader"),
    ("interpersonal skills", "interpersonal"),
    ("personality", "personalit*"),
    ("behavior", "behavio*"),
    ("culture fit", "culture fit"),
    ("culture fit", "cultural fit"),
    ("motivation", "motivat*"),
    ("empathy", "empath*"),
    ("adaptability", "adaptab*"),
    ("resilience", "resilien*"),
    ("integrity", "integrity"),
    ("emotional intelligence", "emotional intelligence"),
    ("customer service", "customer service"),
    ("stakeholder management", "stakeholder*"),
    ("negotiation", "negotiat*"),
    ("soft skills", "soft skills"),
    ("work style", "work style"),
    ("attitude", "attitude"),
];

/// Ordered most specific first; the first hit wins.
const JOB_LEVELS: &[(&str, &str)] = &[
    ("front line manager", "Front Line Manager"),
    ("frontline manager", "Front Line Manager"),
    ("mid professional", "Mid-Professional"),
    ("mid level", "Mid-Professional"),
    ("entry level", "Entry-Level"),
    ("new grad", "Graduate"),
    ("director", "Director"),
    ("executive", "Executive"),
    ("supervisor", "Supervisor"),
    ("manager", "Manager"),
    ("graduate", "Graduate"),
    ("junior", "Entry-Level"),
    ("intern", "Entry-Level"),
    ("fresher", "Entry-Level"),
    ("senior", "Professional Individual Contributor"),
    ("experienced", "Professional Individual Contributor"),
];

static MINUTES_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)\s*-?\s*(?:minutes?|mins?)\b").expect("valid regex")
});

static HOURS_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:\.\d+)?)\s*-?\s*(?:hours?|hrs?)\b").expect("valid regex")
});

static WORD_HOUR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(half an|an|one|a)\s+hour\b").expect("valid regex")
});

impl QueryIntent {
    /// Parse intent from query text. Never fails; unknown text yields an
    /// intent with no facets.
    #[must_use]
    pub fn extract(query: &str) -> Self {
        let normalized = normalize(query);
        Self {
            technical_skills: collect_facets(TECHNICAL, &normalized),
            behavioral_competencies: collect_facets(BEHAVIORAL, &normalized),
            duration_max: duration_mentions(query).into_iter().max(),
            job_level: JOB_LEVELS
                .iter()
                .find(|(phrase, _)| normalized.contains(&format!(" {phrase} ")))
                .map(|(_, level)| (*level).to_string()),
        }
    }

    /// True when the query asks for both technical and behavioral coverage.
    #[must_use]
    pub fn wants_balance(&self) -> bool {
        !self.technical_skills.is_empty() && !self.behavioral_competencies.is_empty()
    }

    /// All matched facets, technical first.
    pub fn facets(&self) -> impl Iterator<Item = &Facet> {
        self.technical_skills
            .iter()
            .chain(self.behavioral_competencies.iter())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.technical_skills.is_empty()
            && self.behavioral_competencies.is_empty()
            && self.duration_max.is_none()
            && self.job_level.is_none()
    }
}

fn collect_facets(lexicon: &[(&str, &str)], normalized: &str) -> Vec<Facet> {
    let mut facets: Vec<Facet> = Vec::new();
    for (label, pattern) in lexicon {
        if facets.iter().any(|f| f.label == *label) {
            continue;
        }
        if matches_pattern(pattern, normalized) {
            facets.push(Facet {
                label: (*label).to_string(),
                pattern: (*pattern).to_string(),
            });
        }
    }
    facets
}

/// Every duration stated in `text`, in minutes: "40 minutes", "45-min",
/// "1.5 hours", "an hour", "half an hour".
#[must_use]
pub fn duration_mentions(text: &str) -> Vec<u32> {
    let lowered = text.to_lowercase();
    let minutes = MINUTES_REGEX
        .captures_iter(&lowered)
        .filter_map(|caps| caps[1].parse::<u32>().ok());
    let hours = HOURS_REGEX.captures_iter(&lowered).filter_map(|caps| {
        caps[1]
            .parse::<f32>()
            .ok()
            .map(|h| (h * 60.0).round() as u32)
    });
    let worded = WORD_HOUR_REGEX
        .captures_iter(&lowered)
        .map(|caps| if &caps[1] == "half an" { 30 } else { 60 });

    minutes.chain(hours).chain(worded).collect()
}

/// Lowercase, keep word characters plus `+` and `#`, collapse everything
/// else to single spaces, and pad both ends with a space.
#[must_use]
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push(' ');
    for ch in text.chars().flat_map(char::to_lowercase) {
        if ch.is_alphanumeric() || ch == '+' || ch == '#' {
            out.push(ch);
        } else if !out.ends_with(' ') {
            out.push(' ');
        }
    }
    if !out.ends_with(' ') {
        out.push(' ');
    }
    out
}

/// Match a lexicon pattern against text produced by [`normalize`].
#[must_use]
pub fn matches_pattern(pattern: &str, normalized: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => normalized.contains(&format!(" {prefix}")),
        None => normalized.contains(&format!(" {pattern} ")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(facets: &[Facet]) -> Vec<&str> {
        facets.iter().map(|f| f.label.as_str()).collect()
    }

    #[test]
    fn java_collaboration_query() {
        let intent =
            QueryIntent::extract("Java developer who can collaborate effectively, 40 minutes");
        assert_eq!(labels(&intent.technical_skills), vec!["java", "software development"]);
        assert_eq!(labels(&intent.behavioral_competencies), vec!["collaboration"]);
        assert_eq!(intent.duration_max, Some(40));
        assert!(intent.wants_balance());
    }

    #[test]
    fn sql_query_has_no_behavioral_facet() {
        let intent = QueryIntent::extract("SQL query writing test for analysts, under 30 minutes");
        assert_eq!(labels(&intent.technical_skills), vec!["sql"]);
        assert!(intent.behavioral_competencies.is_empty());
        assert_eq!(intent.duration_max, Some(30));
        assert!(!intent.wants_balance());
    }

    #[test]
    fn duration_forms() {
        let cases = [
            ("assessment within 1 hour", Some(60)),
            ("a 45-minute test", Some(45)),
            ("can take up to 1.5 hours", Some(90)),
            ("about half an hour", Some(30)),
            ("no more than an hour", Some(60)),
            ("between 30-40 mins", Some(40)),
            ("no time budget", None),
        ];
        for (query, expected) in cases {
            assert_eq!(QueryIntent::extract(query).duration_max, expected, "{query}");
        }
    }

    #[test]
    fn javascript_does_not_imply_java() {
        let intent = QueryIntent::extract("JavaScript engineer");
        assert_eq!(labels(&intent.technical_skills), vec!["javascript", "engineering"]);
    }

    #[test]
    fn role_nouns_count_as_technical() {
        let intent = QueryIntent::extract("software engineer who collaborates well");
        assert_eq!(
            labels(&intent.technical_skills),
            vec!["software development", "engineering"]
        );
        assert!(intent.wants_balance());
        assert!(!QueryIntent::extract("sales associate with great attitude").wants_balance());
    }

    #[test]
    fn duration_mentions_collects_every_form() {
        assert_eq!(
            duration_mentions("Takes 30 minutes, within your 45-minute budget"),
            vec![30, 45]
        );
        assert_eq!(duration_mentions("lasting 2 Hours"), vec![120]);
        assert_eq!(duration_mentions("about an hour"), vec![60]);
        assert!(duration_mentions("untimed").is_empty());
    }

    #[test]
    fn job_level_prefers_specific_phrase() {
        assert_eq!(
            QueryIntent::extract("front-line manager for retail").job_level.as_deref(),
            Some("Front Line Manager")
        );
        assert_eq!(
            QueryIntent::extract("entry-level sales associate").job_level.as_deref(),
            Some("Entry-Level")
        );
    }

    #[test]
    fn synonyms_collapse_to_one_label() {
        let intent = QueryIntent::extract("a team player with strong teamwork");
        assert_eq!(labels(&intent.behavioral_competencies), vec!["teamwork"]);
    }

    #[test]
    fn empty_query_has_no_facets() {
        assert!(QueryIntent::extract("   ").is_empty());
    }

    #[test]
    fn pattern_matching() {
        let text = normalize("Collaborative C++ developer");
        assert!(matches_pattern("collaborat*", &text));
        assert!(matches_pattern("c++", &text));
        assert!(!matches_pattern("java", &text));
    }
}
