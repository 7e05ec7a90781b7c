use crate::models::{DownloadProgress, DownloadReport};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc::UnboundedSender;

/// Receives progress updates from download tasks.
///
/// Called from many tasks at once; updates for a single file arrive in order.
pub trait ProgressSink: Send + Sync {
    fn report(&self, update: DownloadProgress);
}

pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _update: DownloadProgress) {}
}

impl ProgressSink for UnboundedSender<DownloadProgress> {
    fn report(&self, update: DownloadProgress) {
        // A closed receiver only means nobody is watching anymore.
        let _ = self.send(update);
    }
}

/// Latest progress per file id, plus a count of files that reached a terminal state.
pub struct ProgressTracker {
    entries: Mutex<HashMap<String, DownloadProgress>>,
    finished: AtomicUsize,
    expected: usize,
}

impl ProgressTracker {
    pub fn new(expected: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            finished: AtomicUsize::new(0),
            expected,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, DownloadProgress>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Overwrites the entry for `update.file_id`. Updates after a terminal one are ignored.
    pub fn update(&self, update: DownloadProgress) {
        let mut entries = self.lock();
        if entries.get(&update.file_id).is_some_and(|p| p.is_terminal()) {
            return;
        }
        if update.is_terminal() {
            self.finished.fetch_add(1, Ordering::SeqCst);
        }
        entries.insert(update.file_id.clone(), update);
    }

    pub fn get(&self, file_id: &str) -> Option<DownloadProgress> {
        self.lock().get(file_id).cloned()
    }

    /// Copies the whole map out so callers can render without holding the lock.
    pub fn snapshot(&self) -> HashMap<String, DownloadProgress> {
        self.lock().clone()
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    pub fn is_complete(&self) -> bool {
        self.finished() >= self.expected
    }

    /// Bytes transferred and expected across every tracked file.
    pub fn totals(&self) -> (u64, u64) {
        self.lock().values().fold((0, 0), |(done, total), p| {
            (done + p.bytes_transferred, total + p.total_bytes)
        })
    }

    /// Tallies terminal entries, failures sorted by name.
    pub fn summary(&self) -> DownloadReport {
        let mut report = DownloadReport::default();
        for progress in self.lock().values().filter(|p| p.is_terminal()) {
            match &progress.error {
                Some(err) => report
                    .failed
                    .push((progress.display_name.clone(), err.clone())),
                None if progress.skipped => report.skipped += 1,
                None => report.succeeded += 1,
            }
        }
        report.failed.sort();
        report
    }
}

impl ProgressSink for ProgressTracker {
    fn report(&self, update: DownloadProgress) {
        self.update(update);
    }
}
