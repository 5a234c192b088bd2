//! Terminal rendering of a run's event stream.

use crossbeam_channel::RecvTimeoutError;
use engine::{CopyOutcome, Progress, RunEvent, RunHandle};
use log::{debug, info, warn};
use std::io::Write;
use std::time::{Duration, Instant};

const REDRAW_INTERVAL: Duration = Duration::from_millis(200);
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Draws a progress bar on stderr and prints the final summary.
pub struct CliProgress {
    start_time: Instant,
    last_draw: Option<Instant>,
    bar_visible: bool,
}

impl CliProgress {
    pub fn new() -> Self {
        CliProgress {
            start_time: Instant::now(),
            last_draw: None,
            bar_visible: false,
        }
    }

    pub fn format_bytes(bytes: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = bytes as f64;
        let mut unit_idx = 0;

        while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
            size /= 1024.0;
            unit_idx += 1;
        }

        format!("{:.2} {}", size, UNITS[unit_idx])
    }

    pub fn format_duration(elapsed: Duration) -> String {
        let secs = elapsed.as_secs();
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        let secs = secs % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, mins, secs)
        } else if mins > 0 {
            format!("{}m {}s", mins, secs)
        } else {
            format!("{}s", secs)
        }
    }

    fn progress_bar(percent: u8) -> String {
        let filled = usize::from(percent.min(100) / 5);
        let empty = 20 - filled;
        format!("[{}{}] {}%", "=".repeat(filled), " ".repeat(empty), percent)
    }

    pub fn handle(&mut self, event: &RunEvent) {
        match event {
            RunEvent::Progress(progress) => self.draw(progress),
            RunEvent::Status(line) => {
                // The engine logs these itself
                self.end_bar_line();
                debug!("{}", line);
            }
            RunEvent::Finished(outcome) => {
                self.end_bar_line();
                self.summary(outcome);
            }
        }
    }

    fn draw(&mut self, progress: &Progress) {
        // Throttle redraws, but always show completion
        let due = self
            .last_draw
            .map_or(true, |last| last.elapsed() >= REDRAW_INTERVAL);
        if !due && progress.percent < 100 {
            return;
        }
        self.last_draw = Some(Instant::now());
        self.bar_visible = true;

        eprint!(
            "\rProgress: {} | {}/{} | Files: {}",
            Self::progress_bar(progress.percent),
            Self::format_bytes(progress.copied_bytes),
            Self::format_bytes(progress.total_bytes),
            progress.copied_count
        );
        let _ = std::io::stderr().flush();
    }

    fn end_bar_line(&mut self) {
        if self.bar_visible {
            eprintln!();
            self.bar_visible = false;
        }
    }

    fn summary(&self, outcome: &CopyOutcome) {
        let elapsed = Self::format_duration(self.start_time.elapsed());
        match outcome {
            CopyOutcome::Success { .. } => info!("{} in {}", outcome, elapsed),
            CopyOutcome::Cancelled => warn!("{} after {}", outcome, elapsed),
            CopyOutcome::Failure { .. } => {}
        }
    }
}

/// Render a run until it finishes, cancelling it once `time_limit` passes.
pub fn follow_run(handle: RunHandle, time_limit: Option<Duration>) -> CopyOutcome {
    let mut display = CliProgress::new();
    let deadline = time_limit.map(|limit| Instant::now() + limit);
    let mut cancel_sent = false;

    loop {
        match handle.events().recv_timeout(POLL_INTERVAL) {
            Ok(event) => {
                display.handle(&event);
                if let RunEvent::Finished(_) = event {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if let Some(deadline) = deadline {
            if !cancel_sent && Instant::now() >= deadline {
                warn!("Time limit reached, cancelling backup {}", handle.id());
                handle.cancel();
                cancel_sent = true;
            }
        }
    }

    handle.wait()
}
