// Built-in starter catalog

use super::{ContentCategory, Resource, ResourceKind};
use crate::crisis::ResponderProfile;
use crate::store::{self, Collection, DocumentStore, Query, StoreError};

fn resource(
    title: &str,
    category: ContentCategory,
    kind: ResourceKind,
    url: &str,
    description: &str,
) -> Resource {
    Resource {
        title: title.to_string(),
        category,
        language: "English".to_string(),
        kind,
        url: url.to_string(),
        description: Some(description.to_string()),
    }
}

pub fn default_catalog() -> Vec<Resource> {
    use ContentCategory::*;
    use ResourceKind::*;

    vec![
        resource(
            "Understanding Anxiety: What Happens in Your Brain?",
            Anxiety,
            Video,
            "https://www.youtube.com/embed/FUZ5M5u_2m0",
            "A 5-minute guide to the neuroscience of anxiety and how to manage it.",
        ),
        resource(
            "How to Deal with Panic Attacks",
            Anxiety,
            Article,
            "https://www.mind.org.uk/information-support/types-of-mental-health-problems/anxiety-and-panic-attacks/panic-attacks/",
            "Practical steps to take when you feel a panic attack coming on.",
        ),
        resource(
            "10 Minute Mindfulness Meditation",
            Meditation,
            Video,
            "https://www.youtube.com/embed/ZToicYcHIOU",
            "A guided session to help you center your thoughts and reduce stress quickly.",
        ),
        resource(
            "Box Breathing for Calm",
            Meditation,
            Audio,
            "https://www.mindcare.local/audio/box-breathing.mp3",
            "Four counts in, hold, four counts out. A short grounding exercise.",
        ),
        resource(
            "Coping with Academic Pressure",
            Stress,
            Video,
            "https://www.youtube.com/embed/K8lg14Q14",
            "Expert tips on handling exam stress and maintaining work-life balance in college.",
        ),
        resource(
            "A Student's Guide to Better Sleep",
            Sleep,
            Article,
            "https://www.sleepfoundation.org/teens-and-sleep",
            "Why sleep matters for your grades and mental health, and how to get more of it.",
        ),
        resource(
            "Study Planning Without Burnout",
            Academic,
            Pdf,
            "https://www.mindcare.local/guides/study-planning.pdf",
            "A one-page planner for spreading revision across the week.",
        ),
        resource(
            "Making Friends at College",
            Social,
            Article,
            "https://www.mindcare.local/articles/making-friends",
            "Small steps for building connection when you feel on the outside.",
        ),
        resource(
            "Journaling for Mental Clarity",
            General,
            Article,
            "https://www.urmc.rochester.edu/encyclopedia/content.aspx?ContentID=4552&ContentTypeID=1",
            "How writing down your thoughts can track symptoms and improve your mood.",
        ),
    ]
}

/// Responder profile created by `mindcare seed`
pub fn default_responder() -> ResponderProfile {
    ResponderProfile {
        name: "Duty Counselor".to_string(),
        email: "counselor@mindcare.local".to_string(),
        available: true,
    }
}

/// Insert the starter catalog and a default responder
///
/// Collections that already hold data are left alone, so running the seed
/// twice does not duplicate anything. Returns the number of documents added.
pub async fn seed_catalog(store: &dyn DocumentStore) -> Result<usize, StoreError> {
    let mut added = 0;

    if store
        .find(Collection::Resources, &Query::new().limit(1))
        .await?
        .is_empty()
    {
        for item in default_catalog() {
            store::insert(store, Collection::Resources, &item).await?;
            added += 1;
        }
    }

    if store
        .find(Collection::Responders, &Query::new().limit(1))
        .await?
        .is_empty()
    {
        store::insert(store, Collection::Responders, &default_responder()).await?;
        added += 1;
    }

    tracing::info!(added, "Seeded catalog");
    Ok(added)
}
