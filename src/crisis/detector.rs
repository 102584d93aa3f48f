// Risk classifier
//
// Maps message text to a risk tier by substring containment against ordered
// signal lists. Crisis signals are checked first and always win; otherwise
// the first category in priority order with a match decides the result.
//
// Matching is plain substring containment ("hi" matches inside "this"), so
// partial-word false positives are expected.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

/// Coarse urgency bucket attached to every message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    None,
    Low,
    Medium,
    High,
}

impl RiskTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::None => "none",
            RiskTier::Low => "low",
            RiskTier::Medium => "medium",
            RiskTier::High => "high",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category name reported for crisis matches
pub const CRISIS_CATEGORY: &str = "crisis";
/// Category name reported when nothing matched
pub const GENERAL_CATEGORY: &str = "general";
/// The one secondary category that yields `medium`
pub const MEDIUM_CATEGORY: &str = "medium";

/// Classification result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskResult {
    pub tier: RiskTier,
    pub category: String,
    /// Matched signals in list order
    pub matched_signals: Vec<String>,
}

/// A named list of signal phrases
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalCategory {
    pub name: String,
    pub signals: Vec<String>,
}

impl SignalCategory {
    fn new(name: &str, signals: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            signals: signals.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn tier(&self) -> RiskTier {
        if self.name == MEDIUM_CATEGORY {
            RiskTier::Medium
        } else {
            RiskTier::Low
        }
    }
}

/// Signal configuration: crisis phrases plus secondary categories in priority order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalLists {
    pub crisis: Vec<String>,
    pub categories: Vec<SignalCategory>,
}

const CRISIS_SIGNALS: &[&str] = &[
    "suicide",
    "kill myself",
    "end my life",
    "want to die",
    "hang myself",
    "cut myself",
    "overdose",
    "end it all",
    "better off dead",
    "don't want to live",
    "no reason to live",
    "everyone would be better without me",
    "wish i was dead",
    "wish i hadn't been born",
    "want to sleep forever",
    "make it stop",
    "can't go on",
    "goodbye forever",
];

impl Default for SignalLists {
    fn default() -> Self {
        Self {
            crisis: CRISIS_SIGNALS.iter().map(|s| s.to_string()).collect(),
            categories: vec![
                SignalCategory::new(
                    MEDIUM_CATEGORY,
                    &[
                        "depressed",
                        "hopeless",
                        "lonely",
                        "sad",
                        "can't take it anymore",
                        "tired of life",
                        "worthless",
                        "giving up",
                    ],
                ),
                SignalCategory::new(
                    "anxiety",
                    &[
                        "anxiety",
                        "anxious",
                        "panic",
                        "heart racing",
                        "scared",
                        "worried",
                        "nervous",
                        "trembling",
                    ],
                ),
                SignalCategory::new(
                    "loneliness",
                    &["lonely", "alone", "no one to talk to", "isolated", "left out"],
                ),
                SignalCategory::new(
                    "sleep",
                    &["sleep", "insomnia", "nightmare", "can't sleep", "staying up"],
                ),
                SignalCategory::new(
                    "academic",
                    &[
                        "exam",
                        "grades",
                        "study",
                        "college",
                        "professor",
                        "fail",
                        "pressure",
                        "assignment",
                    ],
                ),
                SignalCategory::new(
                    "gratitude",
                    &["thank", "thanks", "grateful", "appreciate", "helpful"],
                ),
                SignalCategory::new(
                    "greeting",
                    &[
                        "hello",
                        "hi",
                        "hey",
                        "good morning",
                        "good afternoon",
                        "good evening",
                    ],
                ),
            ],
        }
    }
}

/// Pure, shareable classifier. Holds no mutable state.
#[derive(Debug, Clone, Default)]
pub struct RiskClassifier {
    lists: SignalLists,
}

impl RiskClassifier {
    pub fn new(lists: SignalLists) -> Self {
        let lists = SignalLists {
            crisis: lists.crisis.iter().map(|s| s.to_lowercase()).collect(),
            categories: lists
                .categories
                .into_iter()
                .map(|category| SignalCategory {
                    name: category.name,
                    signals: category.signals.iter().map(|s| s.to_lowercase()).collect(),
                })
                .collect(),
        };
        Self { lists }
    }

    /// Load signal lists from a JSON file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read signal lists file: {}", path.display()))?;

        let lists: SignalLists =
            serde_json::from_str(&contents).context("Failed to parse signal lists JSON")?;

        Ok(Self::new(lists))
    }

    pub fn lists(&self) -> &SignalLists {
        &self.lists
    }

    /// Classify a message
    pub fn classify(&self, text: &str) -> RiskResult {
        let lowered = text.to_lowercase();

        let crisis = matching(&self.lists.crisis, &lowered);
        if !crisis.is_empty() {
            return RiskResult {
                tier: RiskTier::High,
                category: CRISIS_CATEGORY.to_string(),
                matched_signals: crisis,
            };
        }

        for category in &self.lists.categories {
            let matched = matching(&category.signals, &lowered);
            if !matched.is_empty() {
                return RiskResult {
                    tier: category.tier(),
                    category: category.name.clone(),
                    matched_signals: matched,
                };
            }
        }

        RiskResult {
            tier: RiskTier::None,
            category: GENERAL_CATEGORY.to_string(),
            matched_signals: Vec::new(),
        }
    }
}

fn matching(signals: &[String], lowered: &str) -> Vec<String> {
    signals
        .iter()
        .filter(|signal| lowered.contains(signal.as_str()))
        .cloned()
        .collect()
}
