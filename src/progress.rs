//! Progress reporting for fetch passes
//!
//! The fetcher only calls into a [`ProgressReporter`]; whether anything reaches
//! the console is the caller's decision.

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::{Interval, Symbol};

/// Callbacks fired by a fetch pass. All methods default to no-ops.
pub trait ProgressReporter: Send + Sync {
    /// A pass over `total` symbols is starting
    fn on_start(&self, _interval: Interval, _total: usize) {}

    /// One request finished, successfully or not
    fn on_complete(&self, _symbol: &Symbol, _ok: bool) {}

    /// The pass is over (also called when a fail-fast pass aborts)
    fn on_finish(&self) {}
}

/// Reports nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {}

/// tqdm-style console bar, one per pass
///
/// Only passes whose interval is in `intervals` get a bar; the others stay silent.
pub struct ConsoleProgress {
    intervals: Vec<Interval>,
    bar: Mutex<Option<ProgressBar>>,
    failed: AtomicUsize,
}

impl ConsoleProgress {
    pub fn new(intervals: Vec<Interval>) -> Self {
        ConsoleProgress {
            intervals,
            bar: Mutex::new(None),
            failed: AtomicUsize::new(0),
        }
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(pb) = guard.as_ref() {
                f(pb);
            }
        }
    }
}

impl ProgressReporter for ConsoleProgress {
    fn on_start(&self, interval: Interval, total: usize) {
        if !self.intervals.contains(&interval) {
            return;
        }

        let pb = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{prefix} {percent:>3}%|{bar:40}| {pos}/{len} [{elapsed}<{eta}, {per_sec:.2}] {msg}")
        {
            pb.set_style(style.progress_chars("█░ "));
        }
        pb.set_prefix(interval.to_string());

        self.failed.store(0, Ordering::Relaxed);
        if let Ok(mut guard) = self.bar.lock() {
            *guard = Some(pb);
        }
    }

    fn on_complete(&self, _symbol: &Symbol, ok: bool) {
        let failed = if ok {
            self.failed.load(Ordering::Relaxed)
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed) + 1
        };

        self.with_bar(|pb| {
            pb.inc(1);
            if failed > 0 {
                pb.set_message(format!("✗ {} failed", failed));
            }
        });
    }

    fn on_finish(&self) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(pb) = guard.take() {
                pb.finish();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_progress_ignores_unlisted_interval() {
        let progress = ConsoleProgress::new(vec![Interval::Hour1]);

        progress.on_start(Interval::Day1, 3);
        assert!(progress.bar.lock().unwrap().is_none());

        progress.on_start(Interval::Hour1, 3);
        progress.on_complete(&Symbol::new("BTCUSDT"), true);
        progress.on_complete(&Symbol::new("ETHUSDT"), false);
        {
            let guard = progress.bar.lock().unwrap();
            let pb = guard.as_ref().unwrap();
            assert_eq!(pb.position(), 2);
            assert_eq!(pb.length(), Some(3));
        }
        assert_eq!(progress.failed.load(Ordering::Relaxed), 1);

        progress.on_finish();
        assert!(progress.bar.lock().unwrap().is_none());
    }
}
