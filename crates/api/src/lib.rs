//! HTTP API layer for pulse.
//!
//! This crate exposes the discovery engine over JSON:
//!
//! - **Endpoints**: search, discovery feeds, interaction tracking,
//!   preferences, trending tags, metrics
//! - **Middleware**: shared [`AppState`](middleware::AppState) and request metrics
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod middleware;
pub mod response;

pub use endpoints::router;
pub use middleware::{AppState, app};
