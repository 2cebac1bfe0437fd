//! Offline rendering of a whole group into one buffer.
//!
//! Every stem is pulled through the same callback the device uses, so the
//! result carries each stem's effects, volume and mute state.

use std::path::Path;
use std::sync::Arc;

use log::{info, warn};

use crate::error::MixdownError;
use crate::playback::{EngineConfig, MixGroup, PlaybackEngine, RenderFlow};

/// Interleaved mix of a group.
#[derive(Debug, Clone, PartialEq)]
pub struct MixdownBuffer {
    pub samples: Vec<f32>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl MixdownBuffer {
    pub fn frame_count(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }

    pub fn duration_seconds(&self) -> f64 {
        self.frame_count() as f64 / self.sample_rate as f64
    }

    /// Largest absolute sample value.
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |peak, s| peak.max(s.abs()))
    }
}

/// Render every stem of `group` from the start and sum them.
///
/// The output uses the first stem's sample rate and the widest stem's channel
/// count. Narrower stems wrap onto the output channels, so a mono stem lands
/// on every channel. Stems at a different sample rate are skipped.
pub fn render_group(group: &MixGroup) -> Result<MixdownBuffer, MixdownError> {
    let reference = group.stem(0).ok_or(MixdownError::NothingLoaded)?;
    let sample_rate = reference.track().sample_rate();

    let stems: Vec<&PlaybackEngine> = group
        .stems()
        .iter()
        .filter(|engine| {
            let rate = engine.track().sample_rate();
            if rate != sample_rate {
                warn!(
                    "mixdown: skipping {} ({} Hz, expected {} Hz)",
                    engine.track().path().display(),
                    rate,
                    sample_rate
                );
            }
            rate == sample_rate
        })
        .collect();

    let channels = stems
        .iter()
        .map(|engine| engine.track().channels())
        .max()
        .unwrap_or(1);
    let frames = stems
        .iter()
        .map(|engine| engine.track().frame_count())
        .max()
        .unwrap_or(0);

    let mut samples = vec![0.0f32; frames * channels];
    let block_frames = group.config().block_frames.max(1);

    for stem in stems {
        mix_stem(stem, &mut samples, channels, block_frames);
    }

    info!(
        "mixdown: {} stem(s), {} frames, {} ch @ {} Hz",
        group.stem_count(),
        frames,
        channels,
        sample_rate
    );

    Ok(MixdownBuffer {
        samples,
        channels: channels as u16,
        sample_rate,
    })
}

/// Pull `stem` through a private manual engine and add it into `mix`.
fn mix_stem(stem: &PlaybackEngine, mix: &mut [f32], out_channels: usize, block_frames: usize) {
    let track = Arc::clone(stem.track());
    let stem_channels = track.channels();
    let engine = PlaybackEngine::new(track, EngineConfig::manual());
    engine.apply_params(stem.params());
    engine.play();

    let mut block = vec![0.0f32; block_frames * stem_channels];
    let mut frame = 0usize;
    let total_frames = mix.len() / out_channels;

    loop {
        let flow = engine.render(&mut block);
        for source in block.chunks_exact(stem_channels) {
            if frame >= total_frames {
                break;
            }
            let dest = &mut mix[frame * out_channels..(frame + 1) * out_channels];
            for (ch, sample) in dest.iter_mut().enumerate() {
                *sample += source[ch % stem_channels];
            }
            frame += 1;
        }
        if flow == RenderFlow::Finished {
            break;
        }
    }
}

/// Write `buffer` as a 32-bit float WAV file.
pub fn write_wav<P: AsRef<Path>>(buffer: &MixdownBuffer, path: P) -> Result<(), MixdownError> {
    let spec = hound::WavSpec {
        channels: buffer.channels,
        sample_rate: buffer.sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };

    let mut writer = hound::WavWriter::create(path.as_ref(), spec)?;

    for &sample in &buffer.samples {
        writer.write_sample(sample)?;
    }

    writer.finalize()?;
    info!("mixdown written to {}", path.as_ref().display());
    Ok(())
}
