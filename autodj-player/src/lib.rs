//! # AutoDJ Player Library (autodj-player)
//!
//! Automated playback for a request-driven DJ setup.
//!
//! **Purpose:** Pull pending song requests from the shared SQLite queue, make
//! each song's audio file available locally, play songs back-to-back with a
//! crossfade overlap, and provide an HTTP/SSE control interface.
//!
//! **Architecture:** One background task runs the queue coordinator, which
//! drives the crossfade engine one session at a time. Every audible stream is
//! an independent player process with its fades fixed at start.

pub mod api;
pub mod audio;
pub mod config;
pub mod db;
pub mod error;
pub mod library;
pub mod playback;
pub mod refill;
pub mod source;
pub mod state;

pub use error::{Error, Result};
pub use state::SharedState;
