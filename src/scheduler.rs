use crate::engine::EngineInner;
use chrono::Local;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Periodic evaluation loop.
///
/// A single worker thread runs one pass immediately, then one per interval.
/// Passes execute inline on the worker, so they can never overlap; a pass
/// that outlasts the interval delays the next wait instead of queueing.
pub(crate) struct Scheduler {
    handle: Option<JoinHandle<()>>,
    stop_tx: Option<mpsc::Sender<()>>,
}

impl Scheduler {
    pub fn start(inner: Arc<EngineInner>, interval: Duration) -> Self {
        let (stop_tx, stop_rx) = mpsc::channel();

        let handle = thread::spawn(move || {
            log::debug!("scheduler thread started");
            // Startup pass so reminders due right now are not missed.
            inner.run_tick(Local::now().naive_local());

            loop {
                match stop_rx.recv_timeout(interval) {
                    Err(mpsc::RecvTimeoutError::Timeout) => {
                        inner.run_tick(Local::now().naive_local());
                    }
                    Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
                }
            }
            log::debug!("scheduler thread stopped");
        });

        Self {
            handle: Some(handle),
            stop_tx: Some(stop_tx),
        }
    }

    /// Signal the worker and wait for it to finish its current pass.
    pub fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
