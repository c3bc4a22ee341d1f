//! Skill matching against free-text requests
//!
//! Ranking is a heuristic. Results are suggestions for the agent, not directives.

// Token counts are small; precision loss from usize -> f64 is irrelevant here
#![allow(clippy::cast_precision_loss)]

use std::collections::BTreeSet;
use std::fmt::Debug;
use std::sync::Arc;

use crate::config::MatcherConfig;
use crate::skill::SkillMetadata;
use crate::store::Catalog;

/// Words carrying no signal for relevance
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "can", "do", "for", "from", "help", "i",
    "in", "is", "it", "me", "my", "of", "on", "or", "please", "should", "that", "the", "this",
    "to", "use", "when", "with", "you", "your",
];

/// Scores one skill against one query. Higher is more relevant, zero means no match.
pub trait ScoringStrategy: Send + Sync + Debug {
    /// Relevance of `metadata` for `query`
    fn score(&self, query: &str, metadata: &SkillMetadata) -> f64;
}

/// A ranked candidate
#[derive(Debug, Clone, PartialEq)]
pub struct RankedSkill {
    /// Skill identifier
    pub name: String,
    /// Score from the active strategy
    pub score: f64,
}

/// Keyword overlap plus identifier, action and domain bonuses
#[derive(Debug, Clone, Default)]
pub struct KeywordScorer {
    config: MatcherConfig,
}

impl KeywordScorer {
    /// Create a scorer with the bonuses and tables from `config`
    #[must_use]
    pub fn new(config: MatcherConfig) -> Self {
        Self { config }
    }

    fn any_phrase(text: &str, phrases: &[String]) -> bool {
        phrases.iter().any(|p| contains_phrase(text, p))
    }
}

impl ScoringStrategy for KeywordScorer {
    fn score(&self, query: &str, metadata: &SkillMetadata) -> f64 {
        let query_text = normalize(query);
        let name_text = normalize(&metadata.name);
        let description_text = normalize(&metadata.description);

        let query_tokens = tokenize(query);
        let description_tokens = tokenize(&metadata.description);
        let skill_tokens: BTreeSet<String> = description_tokens
            .iter()
            .cloned()
            .chain(tokenize(&metadata.name))
            .collect();

        // Overlap normalized by description length so verbose descriptions don't win by volume
        let overlap = query_tokens.intersection(&skill_tokens).count();
        let mut score = if overlap == 0 {
            0.0
        } else {
            overlap as f64 / (description_tokens.len().max(1) as f64).sqrt()
        };

        if query.to_lowercase().contains(&metadata.name.to_lowercase())
            || contains_phrase(&query_text, name_text.trim())
        {
            score += self.config.name_bonus;
        }

        for variants in self.config.actions.values() {
            if Self::any_phrase(&query_text, variants) && Self::any_phrase(&description_text, variants) {
                score += self.config.action_bonus;
            }
        }

        for phrases in self.config.indicators.values() {
            if Self::any_phrase(&query_text, phrases)
                && (Self::any_phrase(&name_text, phrases) || Self::any_phrase(&description_text, phrases))
            {
                score += self.config.indicator_bonus;
            }
        }

        score
    }
}

/// Ranks a catalog with a swappable [`ScoringStrategy`]
#[derive(Debug, Clone)]
pub struct SkillMatcher {
    strategy: Arc<dyn ScoringStrategy>,
    top_k: usize,
    min_score: f64,
}

impl SkillMatcher {
    /// Create a matcher with default settings
    #[must_use]
    pub fn new() -> Self {
        Self::from_config(&MatcherConfig::default())
    }

    /// Create a keyword matcher from configuration
    #[must_use]
    pub fn from_config(config: &MatcherConfig) -> Self {
        Self {
            strategy: Arc::new(KeywordScorer::new(config.clone())),
            top_k: config.top_k,
            min_score: config.min_score,
        }
    }

    /// Replace the scoring strategy
    #[must_use]
    pub fn with_strategy(mut self, strategy: Arc<dyn ScoringStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the maximum number of results
    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Set the exclusive minimum score
    #[must_use]
    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = min_score;
        self
    }

    /// Rank `catalog` for `query`.
    ///
    /// Sorted by score descending, ties by identifier. Only scores above the minimum
    /// survive, and at most `top_k` of them.
    #[must_use]
    pub fn rank(&self, query: &str, catalog: &Catalog) -> Vec<RankedSkill> {
        let mut ranked: Vec<RankedSkill> = catalog
            .iter()
            .map(|(name, metadata)| RankedSkill {
                name: name.clone(),
                score: self.strategy.score(query, metadata),
            })
            .filter(|r| r.score.is_finite() && r.score > self.min_score)
            .collect();

        ranked.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.name.cmp(&b.name)));
        ranked.truncate(self.top_k);
        ranked
    }
}

impl Default for SkillMatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowercase word set without stopwords, with a crude plural fold
#[must_use]
pub fn tokenize(text: &str) -> BTreeSet<String> {
    words(text)
        .filter(|w| w.len() > 1 && !STOPWORDS.contains(&w.as_str()))
        .map(|w| fold_plural(&w))
        .collect()
}

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}

fn fold_plural(word: &str) -> String {
    if word.len() > 3 && word.ends_with('s') && !word.ends_with("ss") {
        word[..word.len() - 1].to_string()
    } else {
        word.to_string()
    }
}

/// Words joined by single spaces and padded, so phrases match on word boundaries
fn normalize(text: &str) -> String {
    let joined: Vec<String> = words(text).collect();
    format!(" {} ", joined.join(" "))
}

fn contains_phrase(normalized: &str, phrase: &str) -> bool {
    let phrase = normalize(phrase);
    !phrase.trim().is_empty() && normalized.contains(&phrase)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn catalog(skills: &[(&str, &str)]) -> Catalog {
        skills
            .iter()
            .map(|(name, description)| {
                let metadata = SkillMetadata {
                    name: (*name).to_string(),
                    description: (*description).to_string(),
                    license: None,
                    compatibility: None,
                    metadata: BTreeMap::new(),
                    path: PathBuf::from(name),
                };
                ((*name).to_string(), Arc::new(metadata))
            })
            .collect()
    }

    #[test]
    fn test_mcp_query_prefers_mcp_skill() {
        let catalog = catalog(&[("a", "creates MCP servers"), ("b", "tests web applications")]);
        let ranked = SkillMatcher::new().rank("build me an MCP server", &catalog);

        assert_eq!(ranked[0].name, "a");
        if let Some(b) = ranked.iter().find(|r| r.name == "b") {
            assert!(b.score < ranked[0].score);
        }
    }

    #[test]
    fn test_name_in_query_gets_bonus() {
        let catalog = catalog(&[
            ("webapp-testing", "Toolkit for interacting with local web applications"),
            ("pdf", "Extract text and tables from documents"),
        ]);
        let ranked = SkillMatcher::new().rank("use webapp-testing on my site", &catalog);
        assert_eq!(ranked[0].name, "webapp-testing");
        assert!(ranked[0].score >= 10.0);
    }

    #[test]
    fn test_no_match_is_excluded() {
        let catalog = catalog(&[("pdf", "Extract text from PDF files")]);
        let ranked = SkillMatcher::new().rank("bake a chocolate cake", &catalog);
        assert!(ranked.is_empty());
    }

    #[test]
    fn test_top_k_and_threshold() {
        let catalog = catalog(&[
            ("one", "slack gif maker"),
            ("two", "slack message formatter"),
            ("three", "slack channel archiver"),
            ("four", "slack emoji helper"),
        ]);
        let matcher = SkillMatcher::new().with_top_k(2);
        let ranked = matcher.rank("post to slack", &catalog);
        assert_eq!(ranked.len(), 2);
        assert!(ranked.iter().all(|r| catalog.contains_key(&r.name)));

        let strict = SkillMatcher::new().with_min_score(1_000.0);
        assert!(strict.rank("post to slack", &catalog).is_empty());
    }

    #[test]
    fn test_ties_broken_by_name() {
        let catalog = catalog(&[("zeta", "slack helper"), ("alpha", "slack helper")]);
        let ranked = SkillMatcher::new().rank("slack", &catalog);
        assert_eq!(ranked[0].name, "alpha");
        assert_eq!(ranked[1].name, "zeta");
        assert!((ranked[0].score - ranked[1].score).abs() < f64::EPSILON);
    }

    #[test]
    fn test_custom_strategy() {
        #[derive(Debug)]
        struct LongestName;
        impl ScoringStrategy for LongestName {
            fn score(&self, _query: &str, metadata: &SkillMetadata) -> f64 {
                metadata.name.len() as f64
            }
        }

        let catalog = catalog(&[("ab", "x"), ("abcd", "y")]);
        let ranked = SkillMatcher::new()
            .with_strategy(Arc::new(LongestName))
            .rank("anything", &catalog);
        assert_eq!(ranked[0].name, "abcd");
    }

    #[test]
    fn test_tokenize() {
        let tokens = tokenize("Build me an MCP-Server, please!");
        assert_eq!(
            tokens.into_iter().collect::<Vec<_>>(),
            vec!["build", "mcp", "server"]
        );
        assert!(tokenize("servers").contains("server"));
        assert!(tokenize("process").contains("process"));
    }
}
