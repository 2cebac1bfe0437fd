//! Periodic playback state reporter for UI updates.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use crate::constants::REPORT_INTERVAL_MS;
use crate::playback::{PositionProbe, PositionReport};

/// Snapshot of transport state sent to UI consumers.
pub type Report = PositionReport;

type ReportCallback = Arc<Mutex<dyn Fn(Report) + Send>>;

/// Background reporter that polls a [`PositionProbe`] at fixed intervals and
/// invokes the callback whenever the snapshot changes.
#[derive(Clone)]
pub struct Reporter {
    probe: PositionProbe,
    report: ReportCallback,
    interval: Duration,
    finish: Arc<AtomicBool>,
    thread_handle: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Reporter {
    /// Create a reporter polling every [`REPORT_INTERVAL_MS`].
    pub fn new(probe: PositionProbe, report: ReportCallback) -> Self {
        Self::with_interval(probe, report, Duration::from_millis(REPORT_INTERVAL_MS))
    }

    pub fn with_interval(probe: PositionProbe, report: ReportCallback, interval: Duration) -> Self {
        Self {
            probe,
            report,
            interval,
            finish: Arc::new(AtomicBool::new(false)),
            thread_handle: Arc::new(Mutex::new(None)),
        }
    }

    fn run(&self) {
        let mut last_report: Option<Report> = None;

        loop {
            let report = self.probe.report();

            if last_report.as_ref() != Some(&report) {
                let callback = self
                    .report
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                (*callback)(report);
                last_report = Some(report);
            }

            if self.finish.load(Ordering::Acquire) {
                break;
            }

            thread::park_timeout(self.interval);
        }
    }

    /// Start the background reporting thread, replacing any running one.
    pub fn start(&self) {
        self.stop();
        self.finish.store(false, Ordering::Release);
        let this = self.clone();
        match thread::Builder::new()
            .name("stemmix-reporter".into())
            .spawn(move || this.run())
        {
            Ok(handle) => *self.handle() = Some(handle),
            Err(err) => log::error!("failed to spawn reporter thread: {}", err),
        }
    }

    /// Stop the background reporting thread and wait for it.
    pub fn stop(&self) {
        self.finish.store(true, Ordering::Release);
        let handle = self.handle().take();
        if let Some(handle) = handle {
            if handle.thread().id() == thread::current().id() {
                log::warn!("reporter stop called from reporter thread; skipping join");
                return;
            }
            handle.thread().unpark();
            if handle.join().is_err() {
                log::warn!("reporter thread panicked during join");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle().is_some()
    }

    fn handle(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.thread_handle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
