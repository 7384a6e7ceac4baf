// SPDX-License-Identifier: GPL-3.0-only
//! Analysis frame loop
//!
//! Continuous scanning captures a frame, hands it to the detectors and waits
//! for the next tick. The loop runs on its own named thread so the caller can
//! keep polling for results or for Ctrl+C.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Returned by each loop iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    /// Run another iteration
    Continue,
    /// Leave the loop
    Stop,
}

/// Handle to a frame loop running on a separate thread
///
/// ```ignore
/// let mut analysis = CaptureLoopController::start("analysis", interval, move || {
///     match manager.take_picture() {
///         Ok(frame) => {
///             tx.send(frame).ok();
///             LoopAction::Continue
///         }
///         Err(_) => LoopAction::Stop,
///     }
/// });
///
/// analysis.stop();
/// ```
pub struct CaptureLoopController {
    thread_handle: Option<JoinHandle<()>>,
    stop_signal: Arc<AtomicBool>,
    name: String,
}

/// Sleep for the rest of `interval`, waking early when a stop is requested
fn pace(started: Instant, interval: Duration, stop_signal: &AtomicBool) {
    const SLICE: Duration = Duration::from_millis(10);

    while !stop_signal.load(Ordering::SeqCst) {
        let elapsed = started.elapsed();
        if elapsed >= interval {
            break;
        }
        thread::sleep((interval - elapsed).min(SLICE));
    }
}

impl CaptureLoopController {
    /// Run `loop_fn` repeatedly, at most once per `interval`
    ///
    /// A zero interval runs iterations back to back.
    pub fn start<F>(name: &str, interval: Duration, mut loop_fn: F) -> Self
    where
        F: FnMut() -> LoopAction + Send + 'static,
    {
        Self::start_with_init(name, interval, || Ok(()), move |_: &mut ()| loop_fn())
    }

    /// Run `init_fn` once on the loop thread, then `loop_fn` with its state
    ///
    /// When initialization fails the error is logged and the thread exits
    /// without running any iteration.
    pub fn start_with_init<S, I, F>(
        name: &str,
        interval: Duration,
        init_fn: I,
        mut loop_fn: F,
    ) -> Self
    where
        S: Send + 'static,
        I: FnOnce() -> Result<S, String> + Send + 'static,
        F: FnMut(&mut S) -> LoopAction + Send + 'static,
    {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop_signal);
        let thread_name = name.to_string();

        info!(name = %name, interval_ms = interval.as_millis() as u64, "Starting frame loop");

        let thread_handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let mut state = match init_fn() {
                    Ok(state) => state,
                    Err(e) => {
                        warn!(name = %thread_name, error = %e, "Frame loop initialization failed");
                        return;
                    }
                };

                let mut iterations: u64 = 0;
                while !thread_stop.load(Ordering::SeqCst) {
                    let started = Instant::now();
                    iterations += 1;

                    if loop_fn(&mut state) == LoopAction::Stop {
                        debug!(name = %thread_name, "Frame loop finished by callback");
                        break;
                    }
                    pace(started, interval, &thread_stop);
                }

                info!(name = %thread_name, iterations, "Frame loop exiting");
            });

        let thread_handle = match thread_handle {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(name = %name, error = %e, "Failed to spawn frame loop thread");
                None
            }
        };

        Self {
            thread_handle,
            stop_signal,
            name: name.to_string(),
        }
    }

    /// Check if the loop thread is still alive
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Shared flag that stops the loop when set
    pub fn stop_signal(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop_signal)
    }

    /// Ask the loop to stop without waiting
    pub fn request_stop(&self) {
        debug!(name = %self.name, "Frame loop stop requested");
        self.stop_signal.store(true, Ordering::SeqCst);
    }

    /// Stop the loop and wait for its thread
    pub fn stop(&mut self) {
        self.request_stop();
        self.join();
    }

    /// Wait for the loop to end on its own
    pub fn join(&mut self) {
        if let Some(handle) = self.thread_handle.take()
            && handle.join().is_err()
        {
            warn!(name = %self.name, "Frame loop thread panicked");
        }
    }
}

impl Drop for CaptureLoopController {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            self.stop();
        }
    }
}
