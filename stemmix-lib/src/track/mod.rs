//! Fully decoded, immutable stem audio.

mod decode;

use std::path::{Path, PathBuf};

use crate::error::DecodeError;

/// Interleaved samples for one stem plus the format needed to play them.
///
/// A track never changes after it is built, so the control thread and the
/// output callback can read it concurrently without coordination.
#[derive(Debug, Clone)]
pub struct DecodedTrack {
    path: PathBuf,
    samples: Vec<f32>,
    channels: usize,
    sample_rate: u32,
}

impl DecodedTrack {
    /// Decode an audio file fully into memory.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] naming `path` when the file cannot be opened,
    /// has no supported audio track, fails to decode, or holds no frames.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DecodeError> {
        decode::decode_file(path.as_ref())
    }

    /// Build a track from interleaved samples that are already in memory.
    ///
    /// # Panics
    ///
    /// Panics if `channels` or `sample_rate` is zero, or if the sample count
    /// is not a whole number of frames.
    pub fn from_samples<P: Into<PathBuf>>(
        path: P,
        samples: Vec<f32>,
        channels: usize,
        sample_rate: u32,
    ) -> Self {
        assert!(channels > 0, "channels must be greater than 0");
        assert!(sample_rate > 0, "sample_rate must be greater than 0");
        assert!(
            samples.len() % channels == 0,
            "samples.len() must be divisible by channels"
        );
        Self {
            path: path.into(),
            samples,
            channels,
            sample_rate,
        }
    }

    /// Source path, kept for provenance only.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of frames (one sample per channel) in the track.
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channels
    }

    pub fn duration_seconds(&self) -> f64 {
        self.frame_count() as f64 / self.sample_rate as f64
    }

    /// Number of frames spanned by `seconds` at this track's rate, truncated.
    pub fn frames_for_seconds(&self, seconds: f64) -> usize {
        (seconds * self.sample_rate as f64) as usize
    }

    /// Interleaved samples for the frame range `[start, end)`.
    ///
    /// The range is clamped to the track length.
    pub fn frames(&self, start: usize, end: usize) -> &[f32] {
        let total = self.frame_count();
        let end = end.min(total);
        let start = start.min(end);
        &self.samples[start * self.channels..end * self.channels]
    }
}
