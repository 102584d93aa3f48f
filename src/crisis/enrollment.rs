// Emergency auto-enrollment
//
// On crisis, book an immediate session with any available responder. The
// record links to the alert only loosely (student + time + notes).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{self, Collection, DocumentId, DocumentStore, Query, StoreError, Stored};

/// Marker stored on crisis-triggered bookings
pub const URGENT_MARKER: &str = "URGENT";

/// A human responder who can take emergency sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponderProfile {
    pub name: String,
    pub email: String,
    pub available: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyEnrollment {
    pub student_id: String,
    pub responder_id: String,
    pub scheduled_for: DateTime<Utc>,
    pub urgency_marker: String,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnrollmentOutcome {
    Booked {
        enrollment_id: DocumentId,
        responder_id: String,
    },
    NoResponderAvailable,
}

/// First available responder, if any
pub async fn find_available_responder(
    store: &dyn DocumentStore,
) -> Result<Option<Stored<ResponderProfile>>, StoreError> {
    let query = Query::new().eq("available", true).limit(1);
    Ok(store::find_as(store, Collection::Responders, &query)
        .await?
        .into_iter()
        .next())
}

/// Create an urgent session for `student_id` scheduled now
pub async fn auto_enroll(
    store: &dyn DocumentStore,
    student_id: &str,
    matched_signals: &[String],
) -> Result<EnrollmentOutcome, StoreError> {
    let Some(responder) = find_available_responder(store).await? else {
        return Ok(EnrollmentOutcome::NoResponderAvailable);
    };

    let now = Utc::now();
    let enrollment = EmergencyEnrollment {
        student_id: student_id.to_string(),
        responder_id: responder.id.clone(),
        scheduled_for: now,
        urgency_marker: URGENT_MARKER.to_string(),
        notes: format!(
            "Auto-booked after crisis alert. Signals: {}",
            matched_signals.join(", ")
        ),
        created_at: now,
    };

    let enrollment_id = store::insert(store, Collection::Enrollments, &enrollment).await?;
    tracing::info!(
        enrollment_id = %enrollment_id,
        responder_id = %responder.id,
        "Emergency session booked"
    );

    Ok(EnrollmentOutcome::Booked {
        enrollment_id,
        responder_id: responder.id,
    })
}
