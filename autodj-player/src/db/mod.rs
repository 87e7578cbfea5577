//! Database access layer
//!
//! Queries for the request queue, the fallback auto-playlist, the
//! recently-played history and settings.

pub mod fallback;
pub mod queue;
pub mod settings;
