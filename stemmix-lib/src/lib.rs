//! # Stemmix Library
//!
//! Core playback for multi-stem songs: decoding stems into memory, running each
//! stem through its own pull-driven output stream with a fixed effect chain,
//! and coordinating the stems of one song as a group.

pub mod constants;
pub mod diagnostics;
pub mod dsp;
pub mod error;
pub mod mixdown;
pub mod playback;
pub mod track;

pub use dsp::{EffectParameters, EqUpdate};
pub use error::{DecodeError, DeviceError, LoadError, MixdownError};
pub use playback::{
    EngineConfig, MixGroup, OutputTarget, PlaybackEngine, PlaybackState, PositionProbe,
    PositionReport, RenderFlow,
};
pub use track::DecodedTrack;
