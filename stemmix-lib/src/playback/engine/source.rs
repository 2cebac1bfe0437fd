//! `rodio::Source` adapter that pulls fixed-size buffers from an engine.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::Thread;
use std::time::Duration;

use rodio::source::SeekError;
use rodio::Source;

use super::shared::{EngineShared, RenderFlow};

/// Pull-driven source for one stream session.
///
/// The device mixer asks for samples one at a time; every `block` samples the
/// source invokes the engine callback to render the next buffer into storage
/// allocated once up front.
pub(super) struct StemSource {
    shared: Arc<EngineShared>,
    generation: u64,
    block: Vec<f32>,
    offset: usize,
    finished: bool,
    waiter: Thread,
    channels: u16,
    sample_rate: u32,
}

impl StemSource {
    pub(super) fn new(
        shared: Arc<EngineShared>,
        generation: u64,
        block_frames: usize,
        waiter: Thread,
    ) -> Self {
        let channels = shared.track.channels();
        let sample_rate = shared.track.sample_rate();
        let block = vec![0.0; block_frames.max(1) * channels];
        Self {
            offset: block.len(),
            shared,
            generation,
            block,
            finished: false,
            waiter,
            channels: channels as u16,
            sample_rate,
        }
    }

    /// Render the next buffer, converting a panic into an engine stop.
    fn refill(&mut self) {
        self.refill_with(EngineShared::render);
    }

    fn refill_with<F>(&mut self, render: F)
    where
        F: FnOnce(&EngineShared, u64, &mut [f32]) -> RenderFlow,
    {
        let shared: &EngineShared = &self.shared;
        let generation = self.generation;
        let block = &mut self.block;
        let flow = panic::catch_unwind(AssertUnwindSafe(|| render(shared, generation, block)));

        match flow {
            Ok(RenderFlow::Continue) => {}
            Ok(RenderFlow::Finished) => self.finished = true,
            Err(_) => {
                self.block.fill(0.0);
                self.shared.mark_faulted();
                self.shared.finish();
                self.finished = true;
                self.waiter.unpark();
            }
        }
        self.offset = 0;
    }
}

impl Iterator for StemSource {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.block.len() {
            if self.finished {
                self.waiter.unpark();
                return None;
            }
            self.refill();
        }

        let sample = self.block[self.offset];
        self.offset += 1;
        Some(sample)
    }
}

impl Source for StemSource {
    fn current_span_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }

    fn try_seek(&mut self, _pos: Duration) -> Result<(), SeekError> {
        Err(SeekError::NotSupported {
            underlying_source: "StemSource",
        })
    }
}
