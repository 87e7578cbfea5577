//! Playback: crossfade engine and queue coordinator

pub mod coordinator;
pub mod engine;
pub mod types;

pub use coordinator::{CoordinatorConfig, QueueCoordinator, Step};
pub use engine::{CrossfadeEngine, PauseExit};
pub use types::{PlayRequest, PlaybackOutcome, ResumePoint, TrackRef};
