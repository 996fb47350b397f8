use crate::ui;
use colored::Colorize;
use std::io::Write;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const FRAMES: [&str; 12] = [
    "🕐", "🕑", "🕒", "🕓", "🕔", "🕕", "🕖", "🕗", "🕘", "🕙", "🕚", "🕛",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Spinner owns the status line.
    Waiting,
    /// The first line of the response is ready.
    Responded,
    /// The request failed before any output.
    Aborted,
    /// Spinner has cleared its line and stopped for good.
    Yielded,
}

/// One-shot hand-off of the terminal from the spinner to the response.
///
/// Shared by exactly one spinner thread and one renderer. The renderer calls
/// [`Handoff::begin_output`] before its first write and blocks on the condvar
/// until the spinner has erased its status line.
#[derive(Debug)]
pub struct Handoff {
    phase: Mutex<Phase>,
    changed: Condvar,
}

impl Handoff {
    pub fn new() -> Self {
        Self {
            phase: Mutex::new(Phase::Waiting),
            changed: Condvar::new(),
        }
    }

    /// A hand-off with no spinner behind it; output never waits.
    pub fn yielded() -> Self {
        Self {
            phase: Mutex::new(Phase::Yielded),
            changed: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Phase> {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Signals that the response has begun and waits until the spinner yields.
    /// Returns immediately once the hand-off has happened.
    pub fn begin_output(&self) {
        self.release(Phase::Responded);
    }

    /// Stops the spinner without the "answered" line.
    pub fn abort(&self) {
        self.release(Phase::Aborted);
    }

    fn release(&self, next: Phase) {
        let mut phase = self.lock();
        if *phase == Phase::Waiting {
            *phase = next;
            self.changed.notify_all();
        }
        while *phase != Phase::Yielded {
            phase = self
                .changed
                .wait(phase)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    pub fn has_yielded(&self) -> bool {
        *self.lock() == Phase::Yielded
    }

    /// Spinner side: sleep one tick unless released earlier.
    fn wait_tick(&self, interval: Duration) -> Phase {
        let guard = self.lock();
        let (guard, _) = self
            .changed
            .wait_timeout_while(guard, interval, |phase| *phase == Phase::Waiting)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }

    fn mark_yielded(&self) {
        let mut phase = self.lock();
        *phase = Phase::Yielded;
        self.changed.notify_all();
    }
}

impl Default for Handoff {
    fn default() -> Self {
        Self::new()
    }
}

/// Background status line shown while waiting for the first response line.
pub struct Spinner {
    handoff: Arc<Handoff>,
    handle: Option<JoinHandle<()>>,
}

impl Spinner {
    pub fn spawn(
        label: impl Into<String>,
        handoff: Arc<Handoff>,
        interval: Duration,
        out: Box<dyn Write + Send>,
    ) -> Self {
        let label = label.into();
        let worker = Arc::clone(&handoff);
        let handle = thread::spawn(move || run(&label, &worker, interval, out));

        Self {
            handoff,
            handle: Some(handle),
        }
    }

    /// Stops the spinner if it is still running and waits for its thread.
    pub fn finish(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.handoff.abort();
            if handle.join().is_err() {
                tracing::warn!("Spinner thread panicked");
            }
        }
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(label: &str, handoff: &Handoff, interval: Duration, mut out: Box<dyn Write + Send>) {
    let start = Instant::now();
    let mut frame = 0;
    let _ = ui::hide_cursor(&mut out);

    loop {
        let elapsed = start.elapsed().as_secs_f64();
        let _ = ui::erase_line(&mut out);
        let _ = write!(
            out,
            "{}",
            format!(
                "🤖[{}] thinking ... {} ({:.2}s)",
                label, FRAMES[frame], elapsed
            )
            .bright_black()
            .bold()
            .italic()
        );
        let _ = out.flush();
        frame = (frame + 1) % FRAMES.len();

        match handoff.wait_tick(interval) {
            Phase::Waiting => continue,
            Phase::Responded => {
                let elapsed = start.elapsed().as_secs_f64();
                let _ = ui::erase_line(&mut out);
                let _ = writeln!(
                    out,
                    "{}",
                    format!("🤖[{}] answered in {:.2}s ✅", label, elapsed)
                        .bright_black()
                        .bold()
                        .italic()
                );
                break;
            }
            Phase::Aborted | Phase::Yielded => {
                let _ = ui::erase_line(&mut out);
                break;
            }
        }
    }

    let _ = ui::show_cursor(&mut out);
    let _ = out.flush();
    tracing::debug!(elapsed_ms = start.elapsed().as_millis() as u64, "Spinner yielded");
    handoff.mark_yielded();
}
