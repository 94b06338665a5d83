//! # Event Model
//!
//! The single internal event record produced from any supported webhook
//! shape, and the closed set of event types users can subscribe to.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Closed registry of event types. Doubles as the vocabulary of a user's
/// subscription list.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "camelCase")]
pub enum EventType {
    IssueOpened,
    IssueClosed,
    IssueAssigned,
    IssueCommented,
    PrOpened,
    PrClosed,
    PrMerged,
    PrReviewRequested,
    PrReviewed,
    PrReviewCommented,
}

impl EventType {
    /// Return the wire representation for this type.
    pub const fn as_str(self) -> &'static str {
        match self {
            EventType::IssueOpened => "issueOpened",
            EventType::IssueClosed => "issueClosed",
            EventType::IssueAssigned => "issueAssigned",
            EventType::IssueCommented => "issueCommented",
            EventType::PrOpened => "prOpened",
            EventType::PrClosed => "prClosed",
            EventType::PrMerged => "prMerged",
            EventType::PrReviewRequested => "prReviewRequested",
            EventType::PrReviewed => "prReviewed",
            EventType::PrReviewCommented => "prReviewCommented",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Complete registry of event types.
pub const ALL_EVENT_TYPES: &[EventType] = &[
    EventType::IssueOpened,
    EventType::IssueClosed,
    EventType::IssueAssigned,
    EventType::IssueCommented,
    EventType::PrOpened,
    EventType::PrClosed,
    EventType::PrMerged,
    EventType::PrReviewRequested,
    EventType::PrReviewed,
    EventType::PrReviewCommented,
];

/// Return the event type for a wire string, if any.
pub fn parse_event_type(value: &str) -> Option<EventType> {
    ALL_EVENT_TYPES.iter().copied().find(|t| t.as_str() == value)
}

/// Normalized event, fully populated or not constructed at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Event {
    pub event_type: EventType,
    /// Repository in `owner/name` form
    #[schema(example = "Codertocat/Hello-World")]
    pub repo_name: String,
    pub repo_id: i64,
    /// Issue or pull request number
    pub number: i64,
    pub title: String,
    /// Pre-rendered, human-readable summary
    #[schema(example = "Merged #2 into main")]
    pub description: String,
    pub avatar_url: String,
    /// Last update time reported by GitHub
    pub timestamp: DateTime<Utc>,
    pub url: String,
    pub installation_id: i64,
}
