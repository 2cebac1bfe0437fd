//! Error types surfaced by the library.

use std::path::PathBuf;

use thiserror::Error;

/// A stem could not be decoded into memory.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported or unreadable format in {}: {reason}", path.display())]
    Probe { path: PathBuf, reason: String },

    #[error("no decodable audio track in {}", path.display())]
    NoTrack { path: PathBuf },

    #[error("decoder failure in {}: {reason}", path.display())]
    Codec { path: PathBuf, reason: String },

    #[error("no audio frames in {}", path.display())]
    Empty { path: PathBuf },
}

impl DecodeError {
    /// Path of the stem that failed to decode.
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::Open { path, .. }
            | Self::Probe { path, .. }
            | Self::NoTrack { path }
            | Self::Codec { path, .. }
            | Self::Empty { path } => path,
        }
    }
}

/// The output device failed for a single engine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeviceError {
    #[error("failed to open output stream: {0}")]
    Open(String),

    #[error("output callback faulted: {0}")]
    Faulted(String),
}

/// One or more stems of a group failed to load.
///
/// The group keeps every stem that did decode; `loaded` counts them.
#[derive(Debug, Error)]
#[error("{} stem(s) failed to load, {loaded} loaded", failures.len())]
pub struct LoadError {
    pub failures: Vec<DecodeError>,
    pub loaded: usize,
}

/// Offline rendering of a group failed.
#[derive(Debug, Error)]
pub enum MixdownError {
    #[error("no stems are loaded")]
    NothingLoaded,

    #[error("failed to write wav: {0}")]
    Wav(#[from] hound::Error),
}
