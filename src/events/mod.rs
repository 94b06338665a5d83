//! # Events
//!
//! Webhook payload decoding and normalization into the canonical [`Event`].

pub mod model;
pub mod normalize;
pub mod payload;

pub use model::{ALL_EVENT_TYPES, Event, EventType, parse_event_type};
pub use normalize::normalize;
pub use payload::{PayloadError, WebhookPayload};
