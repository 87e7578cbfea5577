//! # AutoDJ Common Library
//!
//! Shared code for the AutoDJ workspace:
//! - Database schema bootstrap and row models
//! - Event types (`AutoDjEvent`) and playback state enums
//! - Configuration file discovery

pub mod config;
pub mod db;
pub mod error;
pub mod events;

pub use error::{Error, Result};
pub use events::{AutoDjEvent, EngineState, SessionOutcome, TrackInfo};
