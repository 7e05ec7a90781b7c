use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// A downloadable file discovered while walking a remote folder tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: String,
    pub name: String,
    /// Folder names from the walk root down to this file's parent.
    pub path: Vec<String>,
    pub size: u64,
    pub folder_id: String,
    pub mime_type: String,
    pub created_time: Option<DateTime<Utc>>,
    pub modified_time: Option<DateTime<Utc>>,
}

impl FileRecord {
    pub fn path_string(&self) -> String {
        self.path.join("/")
    }

    pub fn display_name(&self) -> String {
        if self.path.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.path_string(), self.name)
        }
    }

    /// Where this file lands under `dest_dir`, mirroring the remote folder structure.
    ///
    /// Remote names are arbitrary strings, so every segment is reduced to a
    /// single plain file name and the result never leaves `dest_dir`.
    pub fn destination(&self, dest_dir: &Path) -> PathBuf {
        let mut target = dest_dir.to_path_buf();
        for segment in &self.path {
            target.push(local_name(segment));
        }
        target.push(local_name(&self.name));
        target
    }
}

fn is_separator(c: char) -> bool {
    c == '/' || c == '\\' || (cfg!(windows) && c == ':')
}

/// Turns a remote name into one path component: no separators, no `.`/`..`.
fn local_name(name: &str) -> String {
    let cleaned: String = name
        .trim_start_matches(is_separator)
        .chars()
        .map(|c| if is_separator(c) || c == '\0' { '_' } else { c })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}

/// Drops repeated file ids, keeping the first record seen for each.
pub fn dedup_files(files: Vec<FileRecord>) -> Vec<FileRecord> {
    let mut seen = HashSet::with_capacity(files.len());
    files
        .into_iter()
        .filter(|f| seen.insert(f.id.clone()))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadProgress {
    pub file_id: String,
    pub display_name: String,
    pub bytes_transferred: u64,
    pub total_bytes: u64,
    pub done: bool,
    pub skipped: bool,
    pub error: Option<String>,
}

impl DownloadProgress {
    pub fn started(file: &FileRecord) -> Self {
        Self::transferring(file, 0)
    }

    pub fn transferring(file: &FileRecord, bytes_transferred: u64) -> Self {
        Self {
            file_id: file.id.clone(),
            display_name: file.display_name(),
            bytes_transferred: bytes_transferred.min(file.size),
            total_bytes: file.size,
            done: false,
            skipped: false,
            error: None,
        }
    }

    pub fn completed(file: &FileRecord) -> Self {
        Self {
            bytes_transferred: file.size,
            done: true,
            ..Self::transferring(file, 0)
        }
    }

    pub fn skipped(file: &FileRecord) -> Self {
        Self {
            skipped: true,
            ..Self::completed(file)
        }
    }

    pub fn failed(file: &FileRecord, bytes_transferred: u64, error: String) -> Self {
        Self {
            done: true,
            error: Some(error),
            ..Self::transferring(file, bytes_transferred)
        }
    }

    /// No further updates follow a terminal one for the same file.
    pub fn is_terminal(&self) -> bool {
        self.done || self.error.is_some()
    }
}

/// Outcome of a download batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadReport {
    pub succeeded: usize,
    pub skipped: usize,
    /// `(display name, error message)` for every failed file.
    pub failed: Vec<(String, String)>,
}

impl DownloadReport {
    pub fn total(&self) -> usize {
        self.succeeded + self.skipped + self.failed.len()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn errors(&self) -> Vec<String> {
        self.failed
            .iter()
            .map(|(name, err)| format!("{}: {}", name, err))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    Name,
    Size,
    Date,
}

pub fn sort_files(files: &mut [FileRecord], field: SortField, ascending: bool) {
    files.sort_by(|a, b| {
        let ord = match field {
            SortField::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            SortField::Size => a.size.cmp(&b.size),
            SortField::Date => a.modified_time.cmp(&b.modified_time),
        };
        if ascending { ord } else { ord.reverse() }
    });
}

pub fn format_size(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    if bytes < UNIT {
        return format!("{} B", bytes);
    }
    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    let suffix = ['K', 'M', 'G', 'T', 'P', 'E'][exp];
    format!("{:.1} {}B", bytes as f64 / div as f64, suffix)
}
