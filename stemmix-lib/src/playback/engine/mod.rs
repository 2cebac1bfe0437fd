//! Playback engine for a single stem.
//!
//! Split so the real-time pieces stay small:
//! - [`shared`] holds the atomics and the render callback.
//! - [`source`] adapts the callback to the device mixer.
//! - [`runtime`] owns the per-session output thread.

mod runtime;
mod shared;
mod source;

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use log::{debug, error, info};

use crate::constants::{
    DEFAULT_BLOCK_FRAMES, OUTPUT_STREAM_OPEN_RETRIES, OUTPUT_STREAM_OPEN_RETRY_MS,
    WAIT_INTERVAL_MS,
};
use crate::dsp::{EffectParameters, EqUpdate, SharedParams};
use crate::error::{DecodeError, DeviceError};
use crate::playback::state::{PlaybackState, PositionReport};
use crate::track::DecodedTrack;

use shared::EngineShared;
pub use shared::RenderFlow;

/// Where an engine's callback gets driven from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputTarget {
    /// Open the default output device and let it pull buffers.
    #[default]
    Device,
    /// Open nothing; the owner pulls buffers with [`PlaybackEngine::render`].
    Manual,
}

/// Construction-time settings for an engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub block_frames: usize,
    pub output: OutputTarget,
    pub open_retries: usize,
    pub open_retry_ms: u64,
    pub wait_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            block_frames: DEFAULT_BLOCK_FRAMES,
            output: OutputTarget::Device,
            open_retries: OUTPUT_STREAM_OPEN_RETRIES,
            open_retry_ms: OUTPUT_STREAM_OPEN_RETRY_MS,
            wait_interval_ms: WAIT_INTERVAL_MS,
        }
    }
}

impl EngineConfig {
    /// Config for engines that are pulled by hand (tests, offline rendering).
    pub fn manual() -> Self {
        Self {
            output: OutputTarget::Manual,
            ..Self::default()
        }
    }
}

/// Plays one decoded stem with its own effect parameters.
///
/// All methods take `&self`; the engine can be shared with UI code while its
/// output thread and the device callback run.
pub struct PlaybackEngine {
    shared: Arc<EngineShared>,
    config: EngineConfig,
    output_thread: Mutex<Option<JoinHandle<()>>>,
}

impl PlaybackEngine {
    /// Create a stopped engine over an already decoded track.
    pub fn new(track: Arc<DecodedTrack>, config: EngineConfig) -> Self {
        Self {
            shared: Arc::new(EngineShared::new(
                track,
                SharedParams::new(EffectParameters::default()),
            )),
            config,
            output_thread: Mutex::new(None),
        }
    }

    /// Decode `path` and create a stopped engine for it.
    pub fn load<P: AsRef<Path>>(path: P, config: EngineConfig) -> Result<Self, DecodeError> {
        let track = DecodedTrack::load(path)?;
        Ok(Self::new(Arc::new(track), config))
    }

    pub fn track(&self) -> &Arc<DecodedTrack> {
        &self.shared.track
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Start or resume playback.
    ///
    /// Resumes in place when paused, does nothing when already playing, and
    /// otherwise starts a new stream session from the current cursor.
    pub fn play(&self) {
        if self.shared.is_active() {
            if self.shared.is_paused() {
                debug!("{}: resume", self.name());
                self.shared.set_paused(false);
            }
            return;
        }

        self.join_output_thread();
        self.shared.clear_error();
        let generation = self.shared.begin_session();
        debug!("{}: play (session {})", self.name(), generation);

        if self.config.output == OutputTarget::Manual {
            return;
        }

        match runtime::spawn_output_thread(self.shared.clone(), self.config.clone(), generation) {
            Ok(handle) => {
                *self.lock_output_thread() = Some(handle);
            }
            Err(err) => {
                let err = DeviceError::Open(format!("failed to spawn output thread: {}", err));
                error!("{}: {}", self.name(), err);
                self.shared.record_error(err);
                self.shared.finish();
            }
        }
    }

    /// Emit silence without advancing. The cursor is untouched.
    pub fn pause(&self) {
        debug!("{}: pause", self.name());
        self.shared.set_paused(true);
    }

    pub fn unpause(&self) {
        debug!("{}: unpause", self.name());
        self.shared.set_paused(false);
    }

    /// Halt the stream, rewind to the start and return to `Stopped`.
    ///
    /// Safe to call while the device is inside the callback; the callback sees
    /// the new session state on its next invocation.
    pub fn stop(&self) {
        debug!("{}: stop", self.name());
        self.shared.end_session();
        self.join_output_thread();
    }

    /// Move the cursor to `fraction` of the track (clamped to `[0, 1]`).
    pub fn seek(&self, fraction: f64) {
        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        let frame = (fraction * self.shared.track.frame_count() as f64).round() as usize;
        self.shared.set_cursor(frame);
    }

    pub fn state(&self) -> PlaybackState {
        self.shared.state()
    }

    pub fn is_playing(&self) -> bool {
        self.state() == PlaybackState::Playing
    }

    /// Current cursor in frames.
    pub fn position_frames(&self) -> usize {
        self.shared.cursor()
    }

    pub fn get_position_seconds(&self) -> f64 {
        self.shared.cursor() as f64 / self.shared.track.sample_rate() as f64
    }

    pub fn get_duration_seconds(&self) -> f64 {
        self.shared.track.duration_seconds()
    }

    pub fn position_report(&self) -> PositionReport {
        self.probe().report()
    }

    /// Read-only handle onto this engine's transport, for polling threads.
    pub fn probe(&self) -> PositionProbe {
        PositionProbe {
            shared: self.shared.clone(),
        }
    }

    /// Set the linear output gain, clamped to `[0, 1]`.
    pub fn set_volume(&self, volume: f32) {
        self.shared.params.set_volume(volume);
    }

    pub fn get_volume(&self) -> f32 {
        self.shared.params.volume()
    }

    /// Set the reverb amount, clamped to `[0, 1]`.
    pub fn set_reverb(&self, amount: f32) {
        self.shared.params.set_reverb(amount);
    }

    /// Set the delay amount, clamped to `[0, 1]`.
    pub fn set_delay(&self, amount: f32) {
        self.shared.params.set_delay(amount);
    }

    /// Update any subset of the EQ bands, each clamped to `[0, 2]`.
    pub fn set_eq(&self, update: EqUpdate) {
        self.shared.params.set_eq(update);
    }

    pub fn set_effects_enabled(&self, enabled: bool) {
        self.shared.params.set_effects_enabled(enabled);
    }

    /// Flip reverb/delay processing and return the new flag.
    pub fn toggle_effects(&self) -> bool {
        self.shared.params.toggle_effects()
    }

    pub fn set_eq_enabled(&self, enabled: bool) {
        self.shared.params.set_eq_enabled(enabled);
    }

    /// Flip EQ processing and return the new flag.
    pub fn toggle_eq(&self) -> bool {
        self.shared.params.toggle_eq()
    }

    pub fn mute(&self) {
        self.shared.params.set_muted(true);
    }

    pub fn unmute(&self) {
        self.shared.params.set_muted(false);
    }

    /// Flip mute and return the new flag.
    pub fn toggle_mute(&self) -> bool {
        self.shared.params.toggle_mute()
    }

    pub fn is_muted(&self) -> bool {
        self.shared.params.muted()
    }

    /// Snapshot of the current effect parameters.
    pub fn params(&self) -> EffectParameters {
        self.shared.params.snapshot()
    }

    /// Replace every effect parameter at once, clamping as the setters do.
    pub fn apply_params(&self, params: EffectParameters) {
        self.shared.params.apply(params);
    }

    /// Most recent device failure for this engine, if any.
    pub fn last_error(&self) -> Option<DeviceError> {
        self.shared.last_error()
    }

    /// Run the callback once into `out` (interleaved, track channel count).
    ///
    /// Engines on [`OutputTarget::Device`] are pulled by the device; calling
    /// this on them competes with the device for the cursor.
    pub fn render(&self, out: &mut [f32]) -> RenderFlow {
        self.shared.render(self.shared.generation(), out)
    }

    fn name(&self) -> String {
        self.shared.track.path().display().to_string()
    }

    fn lock_output_thread(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.output_thread
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn join_output_thread(&self) {
        let handle = self.lock_output_thread().take();
        if let Some(handle) = handle {
            handle.thread().unpark();
            if handle.join().is_err() {
                log::warn!("{}: output thread panicked during join", self.name());
            }
        }
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        if self.shared.is_active() {
            info!("{}: released while playing", self.name());
        }
        self.stop();
    }
}

/// Cheap read-only view of an engine's transport.
#[derive(Clone)]
pub struct PositionProbe {
    shared: Arc<EngineShared>,
}

impl PositionProbe {
    pub fn state(&self) -> PlaybackState {
        self.shared.state()
    }

    pub fn position_seconds(&self) -> f64 {
        self.shared.cursor() as f64 / self.shared.track.sample_rate() as f64
    }

    pub fn duration_seconds(&self) -> f64 {
        self.shared.track.duration_seconds()
    }

    pub fn report(&self) -> PositionReport {
        PositionReport {
            position_seconds: self.position_seconds(),
            duration_seconds: self.duration_seconds(),
            state: self.state(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 1_000;

    fn engine(frames: usize, channels: usize) -> PlaybackEngine {
        let samples = vec![0.5; frames * channels];
        let track = DecodedTrack::from_samples("stem.wav", samples, channels, RATE);
        PlaybackEngine::new(Arc::new(track), EngineConfig::manual())
    }

    fn pull(engine: &PlaybackEngine, frames: usize) -> RenderFlow {
        let mut out = vec![0.0; frames * engine.track().channels()];
        engine.render(&mut out)
    }

    #[test]
    fn starts_stopped_at_zero() {
        let engine = engine(100, 2);
        assert_eq!(engine.state(), PlaybackState::Stopped);
        assert_eq!(engine.get_position_seconds(), 0.0);
        assert!((engine.get_duration_seconds() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn stopped_engine_renders_silence_and_finishes() {
        let engine = engine(100, 1);
        let mut out = vec![1.0; 10];
        assert_eq!(engine.render(&mut out), RenderFlow::Finished);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(engine.position_frames(), 0);
    }

    #[test]
    fn play_advances_cursor_per_buffer() {
        let engine = engine(100, 2);
        engine.play();
        assert_eq!(engine.state(), PlaybackState::Playing);
        assert_eq!(pull(&engine, 10), RenderFlow::Continue);
        assert_eq!(pull(&engine, 10), RenderFlow::Continue);
        assert_eq!(engine.position_frames(), 20);
    }

    #[test]
    fn play_is_idempotent_while_playing() {
        let engine = engine(100, 1);
        engine.play();
        pull(&engine, 10);
        engine.play();
        assert_eq!(engine.position_frames(), 10);
        assert_eq!(engine.state(), PlaybackState::Playing);
    }

    #[test]
    fn pause_then_unpause_resumes_at_same_cursor() {
        let engine = engine(100, 1);
        engine.play();
        pull(&engine, 30);
        engine.pause();
        assert_eq!(engine.state(), PlaybackState::Paused);

        let mut out = vec![1.0; 10];
        assert_eq!(engine.render(&mut out), RenderFlow::Continue);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(engine.position_frames(), 30);

        engine.unpause();
        pull(&engine, 10);
        assert_eq!(engine.position_frames(), 40);
    }

    #[test]
    fn play_while_paused_resumes_in_place() {
        let engine = engine(100, 1);
        engine.play();
        pull(&engine, 25);
        engine.pause();
        engine.play();
        assert_eq!(engine.state(), PlaybackState::Playing);
        assert_eq!(engine.position_frames(), 25);
    }

    #[test]
    fn stop_resets_from_every_state() {
        let engine = engine(100, 1);

        engine.play();
        pull(&engine, 40);
        engine.stop();
        assert_eq!(engine.state(), PlaybackState::Stopped);
        assert_eq!(engine.get_position_seconds(), 0.0);

        engine.play();
        pull(&engine, 40);
        engine.pause();
        engine.stop();
        assert_eq!(engine.state(), PlaybackState::Stopped);
        assert_eq!(engine.position_frames(), 0);

        engine.seek(0.5);
        engine.stop();
        assert_eq!(engine.state(), PlaybackState::Stopped);
        assert_eq!(engine.position_frames(), 0);
    }

    #[test]
    fn end_of_track_stops_and_rewinds() {
        let engine = engine(100, 2);
        engine.play();
        for _ in 0..3 {
            assert_eq!(pull(&engine, 25), RenderFlow::Continue);
        }
        assert_eq!(engine.state(), PlaybackState::Playing);
        assert_eq!(pull(&engine, 25), RenderFlow::Finished);
        assert_eq!(engine.state(), PlaybackState::Stopped);
        assert_eq!(engine.get_position_seconds(), 0.0);
    }

    #[test]
    fn tail_buffer_is_zero_padded() {
        let engine = engine(15, 1);
        engine.play();
        assert_eq!(pull(&engine, 10), RenderFlow::Continue);

        let mut out = vec![9.0; 10];
        assert_eq!(engine.render(&mut out), RenderFlow::Finished);
        assert!(out[..5].iter().all(|&s| s == 0.5));
        assert!(out[5..].iter().all(|&s| s == 0.0));
        assert_eq!(engine.state(), PlaybackState::Stopped);
    }

    #[test]
    fn seek_maps_fraction_to_frames() {
        let engine = engine(1_000, 1);
        for fraction in [0.0, 0.1, 0.25, 0.5, 0.999, 1.0] {
            engine.seek(fraction);
            let ratio = engine.get_position_seconds() / engine.get_duration_seconds();
            assert!((ratio - fraction).abs() <= 1.0 / 1_000.0);
        }
        engine.seek(-3.0);
        assert_eq!(engine.position_frames(), 0);
        engine.seek(7.0);
        assert_eq!(engine.position_frames(), 1_000);
    }

    #[test]
    fn seek_while_playing_is_picked_up_next_buffer() {
        let engine = engine(1_000, 1);
        engine.play();
        pull(&engine, 100);
        engine.seek(0.5);
        pull(&engine, 100);
        assert_eq!(engine.position_frames(), 600);
    }

    #[test]
    fn seek_to_end_then_render_finishes() {
        let engine = engine(100, 1);
        engine.play();
        engine.seek(1.0);
        assert_eq!(pull(&engine, 10), RenderFlow::Finished);
        assert_eq!(engine.state(), PlaybackState::Stopped);
        assert_eq!(engine.position_frames(), 0);
    }

    #[test]
    fn volume_setter_clamps_and_scales_output() {
        let engine = engine(100, 1);
        engine.set_volume(-5.0);
        assert_eq!(engine.get_volume(), 0.0);
        engine.play();
        let mut out = vec![1.0; 10];
        engine.render(&mut out);
        assert!(out.iter().all(|&s| s == 0.0));

        engine.set_volume(0.5);
        engine.render(&mut out);
        assert!(out.iter().all(|&s| s == 0.25));
    }

    #[test]
    fn eq_setter_clamps_each_band() {
        let engine = engine(10, 2);
        engine.set_eq(EqUpdate::default().low(10.0));
        let params = engine.params();
        assert_eq!(params.eq_low, 2.0);
        assert_eq!(params.eq_mid, 1.0);
        assert_eq!(params.eq_high, 1.0);
    }

    #[test]
    fn mute_silences_without_touching_volume() {
        let engine = engine(100, 1);
        engine.set_volume(0.8);
        engine.mute();
        engine.play();
        let mut out = vec![1.0; 10];
        engine.render(&mut out);
        assert!(out.iter().all(|&s| s == 0.0));
        assert!(engine.is_muted());
        assert!((engine.get_volume() - 0.8).abs() < 1e-6);

        engine.unmute();
        engine.render(&mut out);
        assert!(out.iter().all(|&s| (s - 0.4).abs() < 1e-6));
    }

    #[test]
    fn probe_tracks_engine() {
        let engine = engine(1_000, 1);
        let probe = engine.probe();
        engine.play();
        pull(&engine, 250);
        let report = probe.report();
        assert_eq!(report.state, PlaybackState::Playing);
        assert!((report.position_seconds - 0.25).abs() < 1e-9);
        assert!((report.duration_seconds - 1.0).abs() < 1e-9);
    }

    #[test]
    fn stop_while_callback_renders_leaves_cursor_at_zero() {
        use std::thread;
        use std::time::Duration;

        let engine = Arc::new(engine(8_000_000, 1));
        engine.play();
        let worker = {
            let engine = engine.clone();
            thread::spawn(move || {
                let mut out = vec![0.0; 4_000_000];
                engine.render(&mut out)
            })
        };
        thread::sleep(Duration::from_millis(2));
        engine.stop();
        worker.join().unwrap();

        assert_eq!(engine.state(), PlaybackState::Stopped);
        assert_eq!(engine.position_frames(), 0);
    }

    #[test]
    fn replay_after_end_starts_from_zero() {
        let engine = engine(20, 1);
        engine.play();
        assert_eq!(pull(&engine, 20), RenderFlow::Finished);
        engine.play();
        assert_eq!(engine.state(), PlaybackState::Playing);
        assert_eq!(engine.position_frames(), 0);
        assert_eq!(pull(&engine, 10), RenderFlow::Continue);
        assert_eq!(engine.position_frames(), 10);
    }
}
