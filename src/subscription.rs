//! Subscription filtering against a user's allow-list of event types.

use std::collections::BTreeSet;

use crate::events::{Event, EventType};

/// True iff the event's type is in the allow-list. No wildcards.
pub fn matches(allowed: &BTreeSet<EventType>, event: &Event) -> bool {
    allowed.contains(&event.event_type)
}
