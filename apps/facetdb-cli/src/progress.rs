use indicatif::{ProgressBar, ProgressStyle};
use std::sync::{Mutex, PoisonError};

use facetdb_core::progress::ProgressUpdate;
use facetdb_core::traits::ProgressSink;

/// Terminal progress: one bar per partition, driven by the percentages the
/// builder reports. A bar finishes at 100% and the next partition starts a
/// new one.
#[derive(Default)]
pub struct BarProgress {
    current: Mutex<Option<(String, ProgressBar)>>,
}

impl BarProgress {
    pub fn new() -> Self {
        Self::default()
    }

    fn bar() -> ProgressBar {
        let pb = ProgressBar::new(100);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")
            .map(|s| s.progress_chars("#>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        pb
    }
}

impl ProgressSink for BarProgress {
    fn report(&self, update: &ProgressUpdate<'_>) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if current.as_ref().map_or(true, |(partition, _)| partition != update.partition) {
            if let Some((_, old)) = current.take() {
                old.finish_and_clear();
            }
            *current = Some((update.partition.to_string(), Self::bar()));
        }
        if let Some((_, pb)) = current.as_ref() {
            pb.set_position(u64::from(update.percent));
            if update.percent >= 100 {
                pb.finish_with_message(update.label());
            } else {
                pb.set_message(update.label());
            }
        }
        if update.percent >= 100 {
            *current = None;
        }
    }
}
