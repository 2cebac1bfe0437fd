//! The fixed effect chain: reverb, delay, EQ, then gain.
//!
//! Everything here works in place on the chunk the callback is about to hand
//! to the device. No allocation, no locking, bounded arithmetic per sample.

use crate::constants::{DELAY_TAP_SECONDS, REVERB_TAP_SECONDS};
use crate::track::DecodedTrack;

use super::EffectParameters;

/// Run the effect chain over one chunk of interleaved samples.
///
/// `chunk` must hold the raw track frames starting at `cursor`. The reverb
/// and delay taps read earlier frames straight from `track`, so they always
/// mix in dry signal.
///
/// # Arguments
///
/// * `chunk` - Frames `[cursor, cursor + n)` of `track`, processed in place.
/// * `track` - Source track, used for look-back reads and its format.
/// * `cursor` - Frame index of the first frame in `chunk`.
/// * `requested_frames` - Frames the host asked for in this buffer.
/// * `params` - Parameter snapshot for this buffer.
pub fn process_chunk(
    chunk: &mut [f32],
    track: &DecodedTrack,
    cursor: usize,
    requested_frames: usize,
    params: &EffectParameters,
) {
    if params.effects_enabled {
        if params.reverb_amount > 0.0 {
            let tap = track.frames_for_seconds(REVERB_TAP_SECONDS);
            mix_tap(chunk, track, cursor, requested_frames, tap, params.reverb_amount);
        }
        if params.delay_amount > 0.0 {
            let tap = track.frames_for_seconds(DELAY_TAP_SECONDS);
            mix_tap(chunk, track, cursor, requested_frames, tap, params.delay_amount);
        }
    }

    if params.eq_active() {
        apply_eq(chunk, track.channels(), params);
    }

    let gain = params.output_gain();
    for sample in chunk.iter_mut() {
        *sample *= gain;
    }
}

/// Add `amount` times the frames `tap` frames earlier.
///
/// The tap is skipped until the cursor has moved `tap` frames into the track,
/// and whenever the look-back window would not match the chunk length (the
/// last, short chunk of a track). It is never partially applied.
fn mix_tap(
    chunk: &mut [f32],
    track: &DecodedTrack,
    cursor: usize,
    requested_frames: usize,
    tap: usize,
    amount: f32,
) {
    if cursor < tap {
        return;
    }

    let start = cursor - tap;
    let earlier = track.frames(start, start + requested_frames);
    if earlier.len() != chunk.len() {
        return;
    }

    for (sample, &past) in chunk.iter_mut().zip(earlier) {
        *sample += past * amount;
    }
}

/// Two-channel low/high approximation plus a mid gain on every channel.
///
/// Mono input only receives the mid gain.
fn apply_eq(chunk: &mut [f32], channels: usize, params: &EffectParameters) {
    if channels >= 2 {
        for frame in chunk.chunks_exact_mut(channels) {
            frame[0] *= params.eq_low;
            frame[1] *= params.eq_high;
        }
    }
    for sample in chunk.iter_mut() {
        *sample *= params.eq_mid;
    }
}
