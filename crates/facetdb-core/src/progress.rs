//! Coalesced indexing progress.

use tracing::info;

use crate::traits::ProgressSink;

/// One progress step within one partition. `partition` stays the same for
/// every step of a pass; `label()` is the human-readable line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressUpdate<'a> {
    pub partition: &'a str,
    pub done: usize,
    pub total: usize,
    pub percent: u8,
}

impl ProgressUpdate<'_> {
    pub fn label(&self) -> String {
        format!("Indexing {}: {} / {}", self.partition, self.done, self.total)
    }
}

/// Logs each progress step through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn report(&self, update: &ProgressUpdate<'_>) {
        info!(partition = update.partition, percent = update.percent, "{}", update.label());
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn report(&self, _update: &ProgressUpdate<'_>) {}
}

/// Tracks documents processed within one partition and reports the integer
/// percentage only when it changes. Percentages never decrease.
pub struct ProgressTracker<'a> {
    sink: &'a dyn ProgressSink,
    name: String,
    total: usize,
    done: usize,
    last: Option<u8>,
}

impl<'a> ProgressTracker<'a> {
    /// Starts tracking and reports 0%.
    pub fn start(sink: &'a dyn ProgressSink, name: impl Into<String>, total: usize) -> Self {
        let mut tracker = Self { sink, name: name.into(), total, done: 0, last: None };
        tracker.emit(0);
        tracker
    }

    pub fn done(&self) -> usize {
        self.done
    }

    pub fn advance(&mut self, n: usize) {
        self.done = (self.done + n).min(self.total);
        let pct = percent(self.done, self.total);
        self.emit(pct);
    }

    /// Reports 100% unless it already has.
    pub fn finish(mut self) {
        self.done = self.total;
        self.emit(100);
    }

    fn emit(&mut self, pct: u8) {
        if self.last.is_some_and(|last| pct <= last) {
            return;
        }
        self.last = Some(pct);
        self.sink.report(&ProgressUpdate { partition: &self.name, done: self.done, total: self.total, percent: pct });
    }
}

#[allow(clippy::cast_possible_truncation)]
fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    (done.saturating_mul(100) / total).min(100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<u8>>);

    impl ProgressSink for Recorder {
        fn report(&self, update: &ProgressUpdate<'_>) {
            self.0.lock().unwrap().push(update.percent);
        }
    }

    #[test]
    fn emits_only_on_change() {
        let rec = Recorder::default();
        let mut t = ProgressTracker::start(&rec, "pack", 300);
        for _ in 0..300 {
            t.advance(1);
        }
        t.finish();
        let seen = rec.0.lock().unwrap().clone();
        assert_eq!(seen.first(), Some(&0));
        assert_eq!(seen.last(), Some(&100));
        assert_eq!(seen.len(), 101);
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn empty_partition_jumps_to_done() {
        let rec = Recorder::default();
        let t = ProgressTracker::start(&rec, "empty", 0);
        t.finish();
        assert_eq!(*rec.0.lock().unwrap(), vec![0, 100]);
    }

    #[test]
    fn updates_keep_the_partition_and_render_counts() {
        #[derive(Default)]
        struct Labels(Mutex<Vec<(String, String)>>);
        impl ProgressSink for Labels {
            fn report(&self, update: &ProgressUpdate<'_>) {
                self.0.lock().unwrap().push((update.partition.to_string(), update.label()));
            }
        }

        let rec = Labels::default();
        let mut t = ProgressTracker::start(&rec, "SRD Spells", 10);
        t.advance(5);
        t.finish();
        let seen = rec.0.lock().unwrap().clone();
        assert!(seen.iter().all(|(partition, _)| partition == "SRD Spells"));
        let labels: Vec<&str> = seen.iter().map(|(_, label)| label.as_str()).collect();
        assert_eq!(
            labels,
            ["Indexing SRD Spells: 0 / 10", "Indexing SRD Spells: 5 / 10", "Indexing SRD Spells: 10 / 10"]
        );
    }
}
