use std::collections::BTreeMap;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SpendError};
use crate::models::{CategorySource, Transaction};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    #[default]
    Contains,
    StartsWith,
    Regex,
}

impl MatchType {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::StartsWith => "starts_with",
            Self::Regex => "regex",
        }
    }
}

/// Pattern-to-category rule. Rules live in an ordered list; position is priority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub pattern: String,
    pub category: String,
    #[serde(default)]
    pub match_type: MatchType,
}

impl CategoryRule {
    pub fn contains(pattern: &str, category: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            category: category.to_string(),
            match_type: MatchType::Contains,
        }
    }

    /// One `contains` rule per comma-separated keyword.
    pub fn from_keywords(category: &str, keywords: &str) -> Vec<Self> {
        keywords
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(|k| Self::contains(k, category))
            .collect()
    }
}

/// Manual category assignments keyed by transaction id. They win over rules
/// until reset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryOverrides(BTreeMap<String, String>);

impl CategoryOverrides {
    pub fn set(&mut self, transaction_id: &str, category: &str) {
        self.0.insert(transaction_id.to_string(), category.to_string());
    }

    /// Returns whether an override existed.
    pub fn reset(&mut self, transaction_id: &str) -> bool {
        self.0.remove(transaction_id).is_some()
    }

    pub fn get(&self, transaction_id: &str) -> Option<&str> {
        self.0.get(transaction_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

enum Matcher {
    Contains(String),
    StartsWith(String),
    Regex(Regex),
}

impl Matcher {
    fn matches(&self, description: &str, lowered: &str) -> bool {
        match self {
            Self::Contains(p) => lowered.contains(p.as_str()),
            Self::StartsWith(p) => lowered.starts_with(p.as_str()),
            Self::Regex(re) => re.is_match(description),
        }
    }
}

struct CompiledRule {
    matcher: Matcher,
    category: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategorizeResult {
    pub by_rule: usize,
    pub by_override: usize,
    pub uncategorized: usize,
    /// Match count per rule, in rule order.
    pub hits: Vec<usize>,
}

impl CategorizeResult {
    pub fn categorized(&self) -> usize {
        self.by_rule + self.by_override
    }
}

pub struct Categorizer {
    rules: Vec<CompiledRule>,
}

impl Categorizer {
    /// Compile an ordered rule list. Empty patterns and bad regexes are rejected.
    pub fn new(rules: &[CategoryRule]) -> Result<Self> {
        let mut compiled = Vec::with_capacity(rules.len());
        for (i, rule) in rules.iter().enumerate() {
            let pattern = rule.pattern.trim();
            if pattern.is_empty() {
                return Err(SpendError::InvalidRule(format!("rule {} has an empty pattern", i + 1)));
            }
            if rule.category.trim().is_empty() {
                return Err(SpendError::InvalidRule(format!("rule {} has no category", i + 1)));
            }
            let matcher = match rule.match_type {
                MatchType::Contains => Matcher::Contains(pattern.to_lowercase()),
                MatchType::StartsWith => Matcher::StartsWith(pattern.to_lowercase()),
                MatchType::Regex => Matcher::Regex(
                    RegexBuilder::new(pattern)
                        .case_insensitive(true)
                        .build()
                        .map_err(|e| SpendError::InvalidRule(format!("rule {}: {e}", i + 1)))?,
                ),
            };
            compiled.push(CompiledRule {
                matcher,
                category: rule.category.trim().to_string(),
            });
        }
        Ok(Self { rules: compiled })
    }

    /// First matching rule as `(position, category)`.
    pub fn match_description(&self, description: &str) -> Option<(usize, &str)> {
        let lowered = description.to_lowercase();
        self.rules
            .iter()
            .enumerate()
            .find(|(_, r)| r.matcher.matches(description, &lowered))
            .map(|(i, r)| (i, r.category.as_str()))
    }

    /// Assign categories to every transaction. Overrides are applied as-is;
    /// everything else is re-evaluated from scratch against the rules.
    pub fn categorize(&self, transactions: &mut [Transaction], overrides: &CategoryOverrides) -> CategorizeResult {
        let mut result = CategorizeResult {
            hits: vec![0; self.rules.len()],
            ..CategorizeResult::default()
        };

        for txn in transactions.iter_mut() {
            if let Some(category) = overrides.get(&txn.id) {
                txn.category = Some(category.to_string());
                txn.category_source = Some(CategorySource::Manual);
                result.by_override += 1;
                continue;
            }
            match self.match_description(&txn.description) {
                Some((index, category)) => {
                    txn.category = Some(category.to_string());
                    txn.category_source = Some(CategorySource::Rule(index));
                    result.hits[index] += 1;
                    result.by_rule += 1;
                }
                None => {
                    txn.category = None;
                    txn.category_source = None;
                    result.uncategorized += 1;
                }
            }
        }

        tracing::info!(
            by_rule = result.by_rule,
            by_override = result.by_override,
            uncategorized = result.uncategorized,
            "categorized transactions"
        );
        result
    }
}
