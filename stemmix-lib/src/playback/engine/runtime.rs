//! Output thread for an engine running against the default device.
//!
//! One thread per stream session: it opens the device, attaches the
//! [`StemSource`], then parks until the session is superseded, the track
//! drains, the callback faults or the device reports an error.

use std::sync::Arc;
use std::thread::{self, JoinHandle, Thread};
use std::time::Duration;

use log::{error, info, warn};
use rodio::{OutputStream, OutputStreamBuilder, Sink, StreamError};

use crate::error::DeviceError;

use super::shared::EngineShared;
use super::source::StemSource;
use super::EngineConfig;

/// Demotes the engine to stopped if its session thread exits while the
/// session is still current (device failure, callback fault).
struct SessionGuard {
    shared: Arc<EngineShared>,
    generation: u64,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.shared.generation() == self.generation && self.shared.is_active() {
            self.shared.finish();
        }
    }
}

/// Spawn the output thread for session `generation`.
pub(super) fn spawn_output_thread(
    shared: Arc<EngineShared>,
    config: EngineConfig,
    generation: u64,
) -> std::io::Result<JoinHandle<()>> {
    let name = format!(
        "stemmix-out-{}",
        shared
            .track
            .path()
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("stem")
    );
    thread::Builder::new()
        .name(name)
        .spawn(move || run_output_thread(shared, config, generation))
}

fn run_output_thread(shared: Arc<EngineShared>, config: EngineConfig, generation: u64) {
    let _guard = SessionGuard {
        shared: shared.clone(),
        generation,
    };

    let stream = match open_output_stream_with_retry(&shared, &config, generation) {
        Ok(Some(stream)) => stream,
        Ok(None) => return,
        Err(err) => {
            error!("{}: {}", shared.track.path().display(), err);
            shared.record_error(err);
            return;
        }
    };

    let sink = Sink::connect_new(stream.mixer());
    sink.append(StemSource::new(
        shared.clone(),
        generation,
        config.block_frames,
        thread::current(),
    ));

    let interval = Duration::from_millis(config.wait_interval_ms.max(1));
    let exit = loop {
        if let Some(exit) = session_exit(&shared, generation, sink.empty()) {
            break exit;
        }
        thread::park_timeout(interval);
    };
    close_session(&shared, generation, exit);

    sink.stop();
}

/// Why a session's output thread stopped waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionExit {
    /// A stop or a newer play replaced this session.
    Superseded,
    /// The callback panicked or the device reported an error.
    Faulted,
    /// The track ended and the sink played out the last buffer.
    Drained,
}

fn session_exit(shared: &EngineShared, generation: u64, sink_empty: bool) -> Option<SessionExit> {
    if shared.generation() != generation {
        Some(SessionExit::Superseded)
    } else if shared.is_faulted() {
        Some(SessionExit::Faulted)
    } else if !shared.is_active() && sink_empty {
        Some(SessionExit::Drained)
    } else {
        None
    }
}

fn close_session(shared: &EngineShared, generation: u64, exit: SessionExit) {
    match exit {
        SessionExit::Superseded => {}
        SessionExit::Faulted => {
            if shared.last_error().is_none() {
                shared.record_error(DeviceError::Faulted(
                    "panic inside output callback".to_string(),
                ));
            }
            if let Some(err) = shared.last_error() {
                error!("{}: {}", shared.track.path().display(), err);
            }
            if shared.generation() == generation {
                shared.finish();
            }
        }
        SessionExit::Drained => {
            info!("{}: reached end of track", shared.track.path().display());
        }
    }
}

/// Device error callback body: record the failure and wake the session
/// thread so it can stop the engine.
fn report_device_error(shared: &EngineShared, generation: u64, message: String, waiter: &Thread) {
    if shared.generation() != generation {
        return;
    }
    shared.record_error(DeviceError::Faulted(message));
    shared.mark_faulted();
    waiter.unpark();
}

/// Open the default output stream with bounded retry behavior.
///
/// Returns `Ok(None)` when the session was stopped while retrying.
fn open_output_stream_with_retry(
    shared: &Arc<EngineShared>,
    config: &EngineConfig,
    generation: u64,
) -> Result<Option<OutputStream>, DeviceError> {
    let attempts = config.open_retries.max(1);
    for attempt in 1..=attempts {
        if shared.generation() != generation {
            return Ok(None);
        }
        match open_output_stream(shared, generation) {
            Ok(stream) => return Ok(Some(stream)),
            Err(err) => {
                if attempt == attempts {
                    return Err(DeviceError::Open(format!(
                        "{} after {} attempt(s)",
                        err, attempts
                    )));
                }
                warn!(
                    "open output stream attempt {}/{} failed: {}",
                    attempt, attempts, err
                );
                thread::park_timeout(Duration::from_millis(config.open_retry_ms));
            }
        }
    }
    Ok(None)
}

fn open_output_stream(
    shared: &Arc<EngineShared>,
    generation: u64,
) -> Result<OutputStream, StreamError> {
    let callback_shared = shared.clone();
    let waiter = thread::current();
    OutputStreamBuilder::from_default_device()?
        .with_error_callback(move |err| {
            report_device_error(&callback_shared, generation, err.to_string(), &waiter)
        })
        .open_stream()
}
