//! Transport: per-stem playback engines and the group that drives them.

mod engine;
mod group;
mod state;

pub use engine::{EngineConfig, OutputTarget, PlaybackEngine, PositionProbe, RenderFlow};
pub use group::MixGroup;
pub use state::{format_time, PlaybackState, PositionReport};
