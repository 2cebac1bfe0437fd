//! Symphonia-backed decoding of a whole file into interleaved `f32`.

use std::fs::File;
use std::path::Path;

use log::{info, warn};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::DecodeError;

use super::DecodedTrack;

/// Decode every packet of the first audio track in `path`.
pub(super) fn decode_file(path: &Path) -> Result<DecodedTrack, DecodeError> {
    let file = File::open(path).map_err(|source| DecodeError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|err| DecodeError::Probe {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|track| track.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| DecodeError::NoTrack {
            path: path.to_path_buf(),
        })?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;
    let mut channels = track.codec_params.channels.map(|channels| channels.count());

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|err| DecodeError::Codec {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;

    let mut samples = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(Error::IoError(err)) if err.kind() == std::io::ErrorKind::UnexpectedEof => break,
            // Chained streams are not supported; keep what was decoded so far.
            Err(Error::ResetRequired) => break,
            Err(err) => {
                return Err(DecodeError::Codec {
                    path: path.to_path_buf(),
                    reason: err.to_string(),
                })
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(Error::DecodeError(err)) => {
                warn!("skipping corrupt packet in {}: {}", path.display(), err);
                continue;
            }
            Err(err) => {
                return Err(DecodeError::Codec {
                    path: path.to_path_buf(),
                    reason: err.to_string(),
                })
            }
        };

        let spec = *decoded.spec();
        sample_rate.get_or_insert(spec.rate);
        channels.get_or_insert(spec.channels.count());

        let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        samples.extend_from_slice(sample_buf.samples());
    }

    let channels = channels.unwrap_or(0);
    let sample_rate = sample_rate.unwrap_or(0);
    if channels > 0 {
        // A truncated final packet can leave a partial frame behind.
        samples.truncate(samples.len() - samples.len() % channels);
    }
    if samples.is_empty() || channels == 0 || sample_rate == 0 {
        return Err(DecodeError::Empty {
            path: path.to_path_buf(),
        });
    }

    let track = DecodedTrack::from_samples(path, samples, channels, sample_rate);
    info!(
        "decoded {}: {} frames, {} channel(s), {} Hz",
        path.display(),
        track.frame_count(),
        track.channels(),
        track.sample_rate()
    );
    Ok(track)
}
