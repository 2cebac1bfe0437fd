//! Shared constants for effect taps and playback defaults.

/// Look-back offset of the reverb tap, in seconds.
pub const REVERB_TAP_SECONDS: f64 = 0.1;

/// Look-back offset of the delay tap, in seconds.
pub const DELAY_TAP_SECONDS: f64 = 0.3;

/// Frames requested per callback when the engine drives its own buffers.
pub const DEFAULT_BLOCK_FRAMES: usize = 2048;

/// Attempts made to open the default output device before giving up.
pub const OUTPUT_STREAM_OPEN_RETRIES: usize = 20;
pub const OUTPUT_STREAM_OPEN_RETRY_MS: u64 = 100;

/// Sleep between liveness checks in the per-engine wait loop.
pub const WAIT_INTERVAL_MS: u64 = 20;

/// Default polling interval for position reporting.
pub const REPORT_INTERVAL_MS: u64 = 100;

/// Upper bound for every EQ band multiplier.
pub const EQ_MAX: f32 = 2.0;
