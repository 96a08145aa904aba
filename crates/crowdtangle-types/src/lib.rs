//! Shared record types for the CrowdTangle results pipeline.
//!
//! The upstream processing stage turns CrowdTangle API responses into the
//! records defined here; the database writer consumes them.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe wrappers for account, post, and dashboard ids
//! - [`structs`] -- Accounts, posts, statistics, links, media, and the
//!   [`EncapsulatedPost`] bundle

pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use ids::{AccountId, DashboardId, PostId};
pub use structs::{Account, EncapsulatedPost, ExpandedLink, Media, Post, PostStatistics};
