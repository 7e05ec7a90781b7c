//! Browse, filter and download files nested in Google Drive folders.
//!
//! [`aggregate`] walks one or more folder links concurrently, [`filter_files`]
//! narrows the flat result by name, and [`Downloader`] fetches a selection with
//! bounded concurrency while streaming [`DownloadProgress`] updates.

pub mod aggregate;
pub mod downloader;
pub mod error;
pub mod filter;
pub mod models;
pub mod remote;
pub mod state;
pub mod walker;

#[cfg(test)]
pub(crate) mod testing;

pub use aggregate::{Aggregated, aggregate, extract_folder_id, parse_links};
pub use downloader::{DEFAULT_CONCURRENCY, Downloader, Outcome, exists_locally};
pub use error::{Error, Result};
pub use filter::{filter_files, parse_terms};
pub use models::{
    DownloadProgress, DownloadReport, FileRecord, SortField, dedup_files, format_size, sort_files,
};
pub use remote::{DriveClient, DriveConfig, ListPage, RemoteEntry, RemoteStore};
pub use state::{NoProgress, ProgressSink, ProgressTracker};
pub use walker::{DEFAULT_MAX_DEPTH, WalkOutcome, walk};
