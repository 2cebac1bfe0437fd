//! A set of stems played in unison.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use log::{info, warn};

use crate::diagnostics::{Report, Reporter};
use crate::dsp::{EffectParameters, EqUpdate};
use crate::error::LoadError;
use crate::playback::engine::{EngineConfig, PlaybackEngine};
use crate::playback::state::PositionReport;
use crate::track::DecodedTrack;

/// Fans transport and effect commands out to every loaded stem.
///
/// The first stem is the reference: position and duration are read from it.
/// Stems are assumed to be the same length; nothing reconciles drift between
/// them after a seek.
pub struct MixGroup {
    engines: Vec<PlaybackEngine>,
    is_paused: AtomicBool,
    config: EngineConfig,
}

impl Default for MixGroup {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl MixGroup {
    /// Create an empty group whose engines will be built with `config`.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            engines: Vec::new(),
            is_paused: AtomicBool::new(false),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Decode `paths` and replace the current stems with them.
    ///
    /// Stems that fail to decode are skipped. When any are skipped the
    /// returned [`LoadError`] lists them; the ones that decoded stay loaded.
    pub fn load<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<(), LoadError> {
        self.clear();

        let mut failures = Vec::new();
        for path in paths {
            match PlaybackEngine::load(path, self.config.clone()) {
                Ok(engine) => self.engines.push(engine),
                Err(err) => {
                    warn!("skipping stem: {}", err);
                    failures.push(err);
                }
            }
        }

        info!(
            "group loaded: {} stem(s), {} skipped",
            self.engines.len(),
            failures.len()
        );

        if failures.is_empty() {
            Ok(())
        } else {
            Err(LoadError {
                failures,
                loaded: self.engines.len(),
            })
        }
    }

    /// Replace the current stems with already decoded tracks.
    pub fn load_tracks(&mut self, tracks: Vec<Arc<DecodedTrack>>) {
        self.clear();
        self.engines = tracks
            .into_iter()
            .map(|track| PlaybackEngine::new(track, self.config.clone()))
            .collect();
    }

    /// Stop and drop every stem.
    pub fn clear(&mut self) {
        self.stop_all();
        self.engines.clear();
    }

    pub fn play_all(&self) {
        for engine in &self.engines {
            engine.play();
        }
        self.is_paused.store(false, Ordering::Release);
    }

    /// Toggle pause on every stem, driven by the group's own flag.
    ///
    /// Stems that already stopped on their own are still sent the command.
    pub fn pause_all(&self) {
        let was_paused = self.is_paused.load(Ordering::Acquire);
        for engine in &self.engines {
            if was_paused {
                engine.unpause();
            } else {
                engine.pause();
            }
        }
        self.is_paused.store(!was_paused, Ordering::Release);
    }

    pub fn stop_all(&self) {
        for engine in &self.engines {
            engine.stop();
        }
        self.is_paused.store(false, Ordering::Release);
    }

    /// Seek every stem to the same fraction of its own length.
    pub fn seek_all(&self, fraction: f64) {
        for engine in &self.engines {
            engine.seek(fraction);
        }
    }

    pub fn is_paused(&self) -> bool {
        self.is_paused.load(Ordering::Acquire)
    }

    /// Position of the reference stem, or `None` when nothing is loaded.
    pub fn poll_position(&self) -> Option<PositionReport> {
        self.engines.first().map(PlaybackEngine::position_report)
    }

    /// Start a [`Reporter`] on the reference stem.
    pub fn reporter(&self, callback: Arc<Mutex<dyn Fn(Report) + Send>>) -> Option<Reporter> {
        let engine = self.engines.first()?;
        let reporter = Reporter::new(engine.probe(), callback);
        reporter.start();
        Some(reporter)
    }

    pub fn stem(&self, index: usize) -> Option<&PlaybackEngine> {
        self.engines.get(index)
    }

    pub fn stems(&self) -> &[PlaybackEngine] {
        &self.engines
    }

    pub fn stem_count(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }

    pub fn stem_paths(&self) -> Vec<PathBuf> {
        self.engines
            .iter()
            .map(|engine| engine.track().path().to_path_buf())
            .collect()
    }

    pub fn set_reverb_all(&self, amount: f32) {
        for engine in &self.engines {
            engine.set_reverb(amount);
        }
    }

    pub fn set_delay_all(&self, amount: f32) {
        for engine in &self.engines {
            engine.set_delay(amount);
        }
    }

    pub fn set_eq_all(&self, update: EqUpdate) {
        for engine in &self.engines {
            engine.set_eq(update);
        }
    }

    pub fn set_effects_enabled_all(&self, enabled: bool) {
        for engine in &self.engines {
            engine.set_effects_enabled(enabled);
        }
    }

    pub fn set_eq_enabled_all(&self, enabled: bool) {
        for engine in &self.engines {
            engine.set_eq_enabled(enabled);
        }
    }

    /// Apply shared effect settings to every stem.
    ///
    /// Volume and mute stay per stem and are left untouched.
    pub fn apply_params_all(&self, params: &EffectParameters) {
        for engine in &self.engines {
            let current = engine.params();
            engine.apply_params(EffectParameters {
                volume: current.volume,
                muted: current.muted,
                ..*params
            });
        }
    }
}

impl Drop for MixGroup {
    fn drop(&mut self) {
        self.stop_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::{PlaybackState, RenderFlow};
    use std::path::PathBuf;
    use tempfile::TempDir;

    const RATE: u32 = 44_100;

    fn write_stem(dir: &TempDir, name: &str, seconds: f64, channels: u16) -> PathBuf {
        let path = dir.path().join(name);
        let spec = hound::WavSpec {
            channels,
            sample_rate: RATE,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        let frames = (seconds * RATE as f64) as usize;
        for frame in 0..frames {
            let value = ((frame % 100) as i16 - 50) * 100;
            for _ in 0..channels {
                writer.write_sample(value).unwrap();
            }
        }
        writer.finalize().unwrap();
        path
    }

    fn deliver(group: &MixGroup, frames: usize) {
        let block = 2_048;
        for engine in group.stems() {
            let channels = engine.track().channels();
            let mut remaining = frames;
            while remaining > 0 {
                let n = remaining.min(block);
                let mut out = vec![0.0; n * channels];
                if engine.render(&mut out) == RenderFlow::Finished {
                    break;
                }
                remaining -= n;
            }
        }
    }

    fn two_stem_group(dir: &TempDir) -> MixGroup {
        let drums = write_stem(dir, "drums.wav", 5.0, 2);
        let bass = write_stem(dir, "bass.wav", 5.0, 1);
        let mut group = MixGroup::new(EngineConfig::manual());
        group.load(&[drums, bass]).unwrap();
        group
    }

    #[test]
    fn empty_group_reports_nothing() {
        let group = MixGroup::new(EngineConfig::manual());
        assert!(group.poll_position().is_none());
        assert!(group.reporter(Arc::new(Mutex::new(|_: Report| {}))).is_none());
        group.play_all();
        group.pause_all();
        group.stop_all();
        assert_eq!(group.stem_count(), 0);
    }

    #[test]
    fn transport_scenario_over_two_stems() {
        let dir = TempDir::new().unwrap();
        let group = two_stem_group(&dir);
        assert_eq!(group.stem_count(), 2);

        group.play_all();
        deliver(&group, (2.5 * RATE as f64) as usize);

        let report = group.poll_position().unwrap();
        assert!((report.position_seconds - 2.5).abs() < 0.05);
        assert!((report.duration_seconds - 5.0).abs() < 1e-6);
        assert_eq!(report.state, PlaybackState::Playing);

        group.pause_all();
        assert!(group.is_paused());
        let report = group.poll_position().unwrap();
        assert!((report.position_seconds - 2.5).abs() < 0.05);
        assert_eq!(report.state, PlaybackState::Paused);

        group.seek_all(0.0);
        group.play_all();
        let report = group.poll_position().unwrap();
        assert_eq!(report.position_seconds, 0.0);
        assert_eq!(report.state, PlaybackState::Playing);
        assert!(!group.is_paused());
        for engine in group.stems() {
            assert_eq!(engine.position_frames(), 0);
        }
    }

    #[test]
    fn pause_all_toggles_on_group_flag() {
        let dir = TempDir::new().unwrap();
        let group = two_stem_group(&dir);
        group.play_all();

        // One stem stopping on its own must not confuse the toggle.
        group.stem(1).unwrap().stop();
        group.pause_all();
        assert!(group.is_paused());
        assert_eq!(group.stem(0).unwrap().state(), PlaybackState::Paused);

        group.pause_all();
        assert!(!group.is_paused());
        assert_eq!(group.stem(0).unwrap().state(), PlaybackState::Playing);
        assert_eq!(group.stem(1).unwrap().state(), PlaybackState::Stopped);
    }

    #[test]
    fn stop_all_rewinds_every_stem() {
        let dir = TempDir::new().unwrap();
        let group = two_stem_group(&dir);
        group.play_all();
        deliver(&group, 10_000);
        group.pause_all();
        group.stop_all();
        assert!(!group.is_paused());
        for engine in group.stems() {
            assert_eq!(engine.state(), PlaybackState::Stopped);
            assert_eq!(engine.position_frames(), 0);
        }
    }

    #[test]
    fn failed_stems_are_skipped_and_reported() {
        let dir = TempDir::new().unwrap();
        let good = write_stem(&dir, "vocals.wav", 0.5, 2);
        let bad = dir.path().join("broken.wav");
        std::fs::write(&bad, b"definitely not audio").unwrap();
        let missing = dir.path().join("missing.wav");

        let mut group = MixGroup::new(EngineConfig::manual());
        let err = group
            .load(&[bad.clone(), good.clone(), missing.clone()])
            .unwrap_err();

        assert_eq!(err.loaded, 1);
        assert_eq!(err.failures.len(), 2);
        assert_eq!(err.failures[0].path(), bad.as_path());
        assert_eq!(err.failures[1].path(), missing.as_path());
        assert_eq!(group.stem_paths(), vec![good]);
    }

    #[test]
    fn load_replaces_previous_stems() {
        let dir = TempDir::new().unwrap();
        let mut group = two_stem_group(&dir);
        group.play_all();

        let other = write_stem(&dir, "keys.wav", 0.5, 1);
        group.load(&[other.clone()]).unwrap();
        assert_eq!(group.stem_paths(), vec![other]);
        assert_eq!(group.stem(0).unwrap().state(), PlaybackState::Stopped);
        assert!(group.stem(1).is_none());
    }

    #[test]
    fn group_effects_keep_per_stem_volume() {
        let track = Arc::new(DecodedTrack::from_samples("a.wav", vec![0.0; 20], 2, RATE));
        let mut group = MixGroup::new(EngineConfig::manual());
        group.load_tracks(vec![track.clone(), track]);
        group.stem(0).unwrap().set_volume(0.3);
        group.stem(1).unwrap().mute();

        group.apply_params_all(&EffectParameters {
            reverb_amount: 0.4,
            volume: 1.0,
            ..EffectParameters::default()
        });
        group.set_delay_all(5.0);
        group.set_eq_all(EqUpdate::default().mid(0.5));
        group.set_eq_enabled_all(false);

        let first = group.stem(0).unwrap().params();
        assert!((first.volume - 0.3).abs() < 1e-6);
        assert_eq!(first.reverb_amount, 0.4);
        assert_eq!(first.delay_amount, 1.0);
        assert_eq!(first.eq_mid, 0.5);
        assert!(!first.eq_enabled);
        assert!(group.stem(1).unwrap().is_muted());
    }
}
