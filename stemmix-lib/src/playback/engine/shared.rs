//! State shared between the control thread, the output thread and the
//! device callback, and the callback itself.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::dsp::{process_chunk, SharedParams};
use crate::error::DeviceError;
use crate::playback::state::PlaybackState;
use crate::track::DecodedTrack;

/// Outcome of one callback invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderFlow {
    /// More buffers will follow.
    Continue,
    /// The buffer just written is the last one; stop pulling.
    Finished,
}

/// Per-engine shared state.
///
/// Happens-before edges:
/// - `cursor`: written by the callback (advance) and by the control thread
///   (seek, stop). Advances use compare-exchange so a seek that lands while a
///   buffer is being rendered is never overwritten. After advancing, the
///   callback re-reads `generation` and undoes the advance if a stop landed.
/// - `active` / `paused`: release stores on the control side, acquire loads
///   in the callback. The callback observes them at the next buffer.
/// - `generation`: bumped by every play-from-stopped and every stop. A stream
///   session only renders while its generation is current.
/// - effect parameters: relaxed, see [`SharedParams`].
#[derive(Debug)]
pub(crate) struct EngineShared {
    pub(crate) track: Arc<DecodedTrack>,
    pub(crate) params: SharedParams,
    cursor: AtomicUsize,
    active: AtomicBool,
    paused: AtomicBool,
    generation: AtomicU64,
    faulted: AtomicBool,
    last_error: Mutex<Option<DeviceError>>,
}

impl EngineShared {
    pub(crate) fn new(track: Arc<DecodedTrack>, params: SharedParams) -> Self {
        Self {
            track,
            params,
            cursor: AtomicUsize::new(0),
            active: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            faulted: AtomicBool::new(false),
            last_error: Mutex::new(None),
        }
    }

    pub(crate) fn state(&self) -> PlaybackState {
        if !self.active.load(Ordering::Acquire) {
            PlaybackState::Stopped
        } else if self.paused.load(Ordering::Acquire) {
            PlaybackState::Paused
        } else {
            PlaybackState::Playing
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub(crate) fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub(crate) fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Release);
    }

    pub(crate) fn cursor(&self) -> usize {
        self.cursor.load(Ordering::Acquire)
    }

    pub(crate) fn set_cursor(&self, frame: usize) {
        self.cursor
            .store(frame.min(self.track.frame_count()), Ordering::Release);
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Begin a new stream session and return its generation.
    pub(crate) fn begin_session(&self) -> u64 {
        self.faulted.store(false, Ordering::Release);
        self.paused.store(false, Ordering::Release);
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.active.store(true, Ordering::Release);
        generation
    }

    /// Invalidate the current session and rewind.
    pub(crate) fn end_session(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.active.store(false, Ordering::Release);
        self.paused.store(false, Ordering::Release);
        self.cursor.store(0, Ordering::Release);
    }

    /// End-of-track or fault inside a session: stop and rewind, keeping the
    /// generation so the output thread can tell it apart from a user stop.
    pub(crate) fn finish(&self) {
        self.active.store(false, Ordering::Release);
        self.paused.store(false, Ordering::Release);
        self.cursor.store(0, Ordering::Release);
    }

    pub(crate) fn mark_faulted(&self) {
        self.faulted.store(true, Ordering::Release);
    }

    pub(crate) fn is_faulted(&self) -> bool {
        self.faulted.load(Ordering::Acquire)
    }

    pub(crate) fn record_error(&self, err: DeviceError) {
        let mut last_error = self
            .last_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *last_error = Some(err);
    }

    pub(crate) fn last_error(&self) -> Option<DeviceError> {
        self.last_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub(crate) fn clear_error(&self) {
        self.last_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
    }

    /// Produce one buffer of interleaved output for session `generation`.
    ///
    /// This runs on the device thread. It only performs atomic loads/stores
    /// and in-place arithmetic on `out`.
    pub(crate) fn render(&self, generation: u64, out: &mut [f32]) -> RenderFlow {
        if self.generation() != generation || !self.is_active() {
            out.fill(0.0);
            return RenderFlow::Finished;
        }

        if self.is_paused() {
            out.fill(0.0);
            return RenderFlow::Continue;
        }

        let track = &self.track;
        let total = track.frame_count();
        let requested = out.len() / track.channels();
        let cursor = self.cursor();

        if cursor >= total {
            out.fill(0.0);
            return self.end_of_track(generation, cursor);
        }

        let end = (cursor + requested).min(total);
        let source = track.frames(cursor, end);
        let (chunk, padding) = out.split_at_mut(source.len());
        chunk.copy_from_slice(source);
        padding.fill(0.0);

        let params = self.params.snapshot();
        process_chunk(chunk, track, cursor, requested, &params);

        if end >= total {
            return self.end_of_track(generation, cursor);
        }

        self.advance(generation, cursor, end)
    }

    /// Move the cursor from `from` to `to` for session `generation`.
    ///
    /// A seek that landed while the buffer was rendered wins. A stop that
    /// landed meanwhile also wins: the advance is rolled back to 0.
    fn advance(&self, generation: u64, from: usize, to: usize) -> RenderFlow {
        if self
            .cursor
            .compare_exchange(from, to, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return RenderFlow::Continue;
        }
        if self.generation() != generation {
            let _ = self
                .cursor
                .compare_exchange(to, 0, Ordering::AcqRel, Ordering::Acquire);
            return RenderFlow::Finished;
        }
        RenderFlow::Continue
    }

    /// The buffer that started at `from` reached the last frame.
    ///
    /// Rewinds and stops unless a seek moved the cursor meanwhile, in which
    /// case playback continues from the seek target.
    fn end_of_track(&self, generation: u64, from: usize) -> RenderFlow {
        if self
            .cursor
            .compare_exchange(from, 0, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return RenderFlow::Continue;
        }
        if self.generation() == generation {
            self.active.store(false, Ordering::Release);
            self.paused.store(false, Ordering::Release);
        }
        RenderFlow::Finished
    }
}
