//! # Push Request Library
//!
//! Turns GitHub App webhook deliveries into background push notifications
//! for the iOS devices of subscribed users: webhook intake, event
//! normalization, subscription filtering, fan-out, and the user API.

pub mod auth;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod handlers;
pub mod models;
pub mod push;
pub mod repositories;
pub mod server;
pub mod subscription;
pub mod telemetry;
pub use migration;
