use std::cell::Cell;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

const BAR_UNITS: u64 = 1000;

/// Observes pipeline progress. Implementations must return promptly.
pub trait ProgressObserver {
    fn report(&self, fraction: f64, label: &str);
}

impl<F: Fn(f64, &str)> ProgressObserver for F {
    fn report(&self, fraction: f64, label: &str) {
        self(fraction, label)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressObserver for NoopProgress {
    fn report(&self, _fraction: f64, _label: &str) {}
}

/// Clamps reports to `[0, 1]` and never lets the reported fraction move backwards.
pub struct ProgressTracker<'a> {
    observer: &'a dyn ProgressObserver,
    last: Cell<f64>,
}

impl<'a> ProgressTracker<'a> {
    pub fn new(observer: &'a dyn ProgressObserver) -> Self {
        Self {
            observer,
            last: Cell::new(0.0),
        }
    }

    pub fn report(&self, fraction: f64, label: &str) {
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            self.last.get()
        };
        let fraction = fraction.max(self.last.get());
        self.last.set(fraction);
        self.observer.report(fraction, label);
    }

    /// Report `done / total` of the span between `from` and `to`.
    pub fn report_span(&self, from: f64, to: f64, done: u64, total: u64, label: &str) {
        let ratio = if total == 0 {
            1.0
        } else {
            done as f64 / total as f64
        };
        self.report(from + (to - from) * ratio, label);
    }
}

/// Draws pipeline progress as a terminal bar.
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new(BAR_UNITS);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent:>3}% {msg}")
        {
            bar.set_style(style.progress_chars("█▉▊▋▌▍▎▏ "));
        }
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for BarProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for BarProgress {
    fn report(&self, fraction: f64, label: &str) {
        self.bar.set_position((fraction * BAR_UNITS as f64).round() as u64);
        self.bar.set_message(label.to_string());
    }
}

impl Drop for BarProgress {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.abandon();
        }
    }
}
