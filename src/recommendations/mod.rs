// Recommendation lookup
//
// Maps a response category to a few catalog items. Read-only.

mod catalog;

pub use catalog::{default_catalog, default_responder, seed_catalog};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::store::{self, Collection, DocumentStore, Query, StoreError, Stored};

/// Closed set of content categories the generative service may return
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentCategory {
    Anxiety,
    Stress,
    Sleep,
    Academic,
    Social,
    Meditation,
    General,
}

impl ContentCategory {
    pub const ALL: [ContentCategory; 7] = [
        ContentCategory::Anxiety,
        ContentCategory::Stress,
        ContentCategory::Sleep,
        ContentCategory::Academic,
        ContentCategory::Social,
        ContentCategory::Meditation,
        ContentCategory::General,
    ];

    /// Calming subset used on the crisis path
    pub const CALMING: [ContentCategory; 3] = [
        ContentCategory::Anxiety,
        ContentCategory::Meditation,
        ContentCategory::Stress,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentCategory::Anxiety => "Anxiety",
            ContentCategory::Stress => "Stress",
            ContentCategory::Sleep => "Sleep",
            ContentCategory::Academic => "Academic",
            ContentCategory::Social => "Social",
            ContentCategory::Meditation => "Meditation",
            ContentCategory::General => "General",
        }
    }

    /// Case-insensitive parse; anything outside the set becomes `General`
    pub fn parse_lenient(raw: &str) -> Self {
        raw.parse().unwrap_or(ContentCategory::General)
    }
}

impl fmt::Display for ContentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        ContentCategory::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown content category: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Audio,
    Video,
    Article,
    Pdf,
}

/// Catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub title: String,
    pub category: ContentCategory,
    pub language: String,
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Capped catalog queries
#[derive(Clone)]
pub struct RecommendationLookup {
    store: Arc<dyn DocumentStore>,
    cap: usize,
}

impl RecommendationLookup {
    pub fn new(store: Arc<dyn DocumentStore>, cap: usize) -> Self {
        Self { store, cap }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Items for a category; `General` or no category means Meditation + General
    pub async fn suggest(
        &self,
        category: Option<ContentCategory>,
    ) -> Result<Vec<Stored<Resource>>, StoreError> {
        match category {
            Some(category) if category != ContentCategory::General => {
                self.find_in(&[category]).await
            }
            _ => {
                self.find_in(&[ContentCategory::Meditation, ContentCategory::General])
                    .await
            }
        }
    }

    /// Items from the calming subset, whatever the computed category
    pub async fn suggest_calming(&self) -> Result<Vec<Stored<Resource>>, StoreError> {
        self.find_in(&ContentCategory::CALMING).await
    }

    async fn find_in(
        &self,
        categories: &[ContentCategory],
    ) -> Result<Vec<Stored<Resource>>, StoreError> {
        let query = Query::new()
            .any_of("category", categories.iter().map(|c| c.as_str()))
            .limit(self.cap);
        store::find_as(self.store.as_ref(), Collection::Resources, &query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    async fn seeded(cap: usize) -> RecommendationLookup {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        seed_catalog(store.as_ref()).await.unwrap();
        RecommendationLookup::new(store, cap)
    }

    #[test]
    fn test_parse_lenient() {
        assert_eq!(ContentCategory::parse_lenient("anxiety"), ContentCategory::Anxiety);
        assert_eq!(ContentCategory::parse_lenient(" SLEEP "), ContentCategory::Sleep);
        assert_eq!(ContentCategory::parse_lenient("Hobbies"), ContentCategory::General);
    }

    #[tokio::test]
    async fn test_suggest_is_capped_and_on_category() {
        let lookup = seeded(2).await;
        let items = lookup.suggest(Some(ContentCategory::Anxiety)).await.unwrap();
        assert_eq!(items.len(), 2);
        assert!(items
            .iter()
            .all(|item| item.record.category == ContentCategory::Anxiety));
    }

    #[tokio::test]
    async fn test_general_falls_back_to_meditation_union() {
        let lookup = seeded(10).await;
        for category in [None, Some(ContentCategory::General)] {
            let items = lookup.suggest(category).await.unwrap();
            assert!(!items.is_empty());
            assert!(items.iter().all(|item| matches!(
                item.record.category,
                ContentCategory::Meditation | ContentCategory::General
            )));
        }
    }

    #[tokio::test]
    async fn test_calming_subset() {
        let lookup = seeded(10).await;
        let items = lookup.suggest_calming().await.unwrap();
        assert!(!items.is_empty());
        assert!(items
            .iter()
            .all(|item| ContentCategory::CALMING.contains(&item.record.category)));
    }

    #[tokio::test]
    async fn test_empty_catalog_yields_nothing() {
        let lookup = RecommendationLookup::new(Arc::new(MemoryStore::new()), 2);
        assert!(lookup
            .suggest(Some(ContentCategory::Sleep))
            .await
            .unwrap()
            .is_empty());
    }
}
