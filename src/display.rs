use gdrive_dl::{DownloadProgress, DownloadReport, FileRecord, ProgressSink, ProgressTracker, format_size};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

fn file_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{msg:40} {bar:40} {bytes}/{total_bytes} ({bytes_per_sec})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-")
}

fn overall_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{msg} {bar:40} {pos}/{len}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-")
}

/// Terminal progress bars fed by download updates, backed by the shared tracker.
///
/// A file gets a bar only while it is transferring, so large selections never
/// draw more bars than there are running downloads.
pub struct ProgressBars {
    tracker: Arc<ProgressTracker>,
    mp: MultiProgress,
    overall: ProgressBar,
    active: Mutex<HashMap<String, ProgressBar>>,
}

impl ProgressBars {
    pub fn new(expected: usize, tracker: Arc<ProgressTracker>) -> Self {
        Self::with_target(expected, tracker, ProgressDrawTarget::stderr())
    }

    fn with_target(expected: usize, tracker: Arc<ProgressTracker>, target: ProgressDrawTarget) -> Self {
        let mp = MultiProgress::with_draw_target(target);

        let overall = mp.add(ProgressBar::new(expected as u64));
        overall.set_style(overall_style());
        overall.set_message("Overall");

        Self {
            tracker,
            mp,
            overall,
            active: Mutex::new(HashMap::new()),
        }
    }

    pub fn finish(&self) {
        for (_, pb) in self.active().drain() {
            pb.finish_and_clear();
        }
        self.overall.finish_with_message("Complete");
        self.mp.clear().ok();
    }

    fn active(&self) -> MutexGuard<'_, HashMap<String, ProgressBar>> {
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ProgressSink for ProgressBars {
    fn report(&self, update: DownloadProgress) {
        if self
            .tracker
            .get(&update.file_id)
            .is_some_and(|p| p.is_terminal())
        {
            return;
        }

        if update.is_terminal() {
            if let Some(pb) = self.active().remove(&update.file_id) {
                pb.finish_and_clear();
                self.mp.remove(&pb);
            }
            if let Some(err) = &update.error {
                self.mp
                    .println(format!("{} [failed] {}", truncate(&update.display_name, 40), err))
                    .ok();
            }
        } else {
            let mut active = self.active();
            let pb = active.entry(update.file_id.clone()).or_insert_with(|| {
                let pb = self.mp.add(ProgressBar::new(update.total_bytes));
                pb.set_style(file_style());
                pb.set_message(truncate(&update.display_name, 40));
                pb
            });
            pb.set_position(update.bytes_transferred);
        }

        self.tracker.update(update);
        self.overall.set_position(self.tracker.finished() as u64);
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let tail: String = s.chars().rev().take(max.saturating_sub(3)).collect();
    format!("...{}", tail.chars().rev().collect::<String>())
}

pub async fn print_file_list(files: &[FileRecord], output_dir: &Path) {
    let total: u64 = files.iter().map(|f| f.size).sum();
    for file in files {
        let marker = if gdrive_dl::exists_locally(file, output_dir).await {
            "*"
        } else {
            " "
        };
        let modified = file
            .modified_time
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{} {:>10}  {}  {}",
            marker,
            format_size(file.size),
            modified,
            file.display_name()
        );
    }
    println!(
        "\n{} files, {} total (* = already in {})",
        files.len(),
        format_size(total),
        output_dir.display()
    );
}

pub fn print_summary(report: &DownloadReport, output_dir: &Path) {
    if !report.failed.is_empty() {
        println!("\nFailed downloads:");
        for (name, err) in &report.failed {
            println!("  {}: {}", name, err);
        }
    }

    println!("\nSuccessfully downloaded: {} files", report.succeeded);
    if report.skipped > 0 {
        println!("Skipped (already exist): {} files", report.skipped);
    }
    if !report.failed.is_empty() {
        println!("Failed: {} files", report.failed.len());
    }
    println!("Files saved to: {}", output_dir.display());
}
