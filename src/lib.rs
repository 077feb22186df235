//! # AV Arena
//!
//! Tournament platform backend: listings, registration, player profiles,
//! an admin console and a live single-elimination bracket view.
//!
//! ## Architecture
//!
//! - **models**: Core records (tournaments, matches, profiles, roles)
//! - **bracket**: Round grouping, round labels and winner highlighting
//! - **backend**: Data backend trait with in-memory and PostgREST implementations
//! - **realtime**: Per-tournament change notifications
//! - **session**: Signed-in user and role flags
//! - **registration**, **profile**, **admin**, **contact**: User-facing operations
//! - **api**: REST API endpoints
//! - **config**: Configuration loading and validation

pub mod admin;
pub mod api;
pub mod backend;
pub mod bracket;
pub mod config;
pub mod contact;
pub mod models;
pub mod profile;
pub mod realtime;
pub mod registration;
pub mod session;
pub mod validation;

pub use models::*;

use std::time::Duration;

/// Parse a human-friendly duration string (e.g., "6h", "30m", "90s").
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let (num_str, multiplier) = if let Some(n) = s.strip_suffix('h') {
        (n, 3600)
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 60)
    } else if let Some(n) = s.strip_suffix('s') {
        (n, 1)
    } else {
        // Default to seconds
        (s, 1)
    };

    let num: u64 = num_str.parse().ok()?;
    Some(Duration::from_secs(num.checked_mul(multiplier)?))
}
