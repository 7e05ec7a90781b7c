use crate::error::{Error, Result};
use crate::models::{DownloadProgress, DownloadReport, FileRecord, dedup_files};
use crate::remote::RemoteStore;
use crate::state::ProgressSink;
use futures::StreamExt;
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DEFAULT_CONCURRENCY: usize = 4;

/// True when the destination already holds a file of exactly the listed size.
pub async fn exists_locally(file: &FileRecord, output_dir: &Path) -> bool {
    match fs::metadata(file.destination(output_dir)).await {
        Ok(meta) => meta.is_file() && meta.len() == file.size,
        Err(_) => false,
    }
}

#[derive(Clone)]
pub struct Downloader {
    store: Arc<dyn RemoteStore>,
    output_dir: PathBuf,
    max_concurrency: usize,
}

impl Downloader {
    pub fn new(store: Arc<dyn RemoteStore>, output_dir: impl Into<PathBuf>, max_concurrency: usize) -> Self {
        Self {
            store,
            output_dir: output_dir.into(),
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Downloads `files` with at most `max_concurrency` transfers running at once.
    ///
    /// Every file gets exactly one terminal update on `progress`. A failing file
    /// never stops the others; failures are collected into the report. Records
    /// sharing an id are downloaded once.
    pub async fn download_all(
        &self,
        files: Vec<FileRecord>,
        progress: Arc<dyn ProgressSink>,
        cancel: CancellationToken,
    ) -> DownloadReport {
        let requested = files.len();
        let files = dedup_files(files);
        if files.len() < requested {
            warn!(duplicates = requested - files.len(), "ignoring repeated file ids");
        }

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));

        let mut handles = Vec::with_capacity(files.len());

        for file in files {
            let downloader = self.clone();
            let semaphore = Arc::clone(&semaphore);
            let progress = Arc::clone(&progress);
            let cancel = cancel.clone();

            let handle = task::spawn(async move {
                let result = downloader
                    .download_gated(&file, &semaphore, progress.as_ref(), &cancel)
                    .await;

                match &result {
                    Ok(outcome) => debug!(file = %file.display_name(), ?outcome, "finished"),
                    Err(e) if e.is_cancelled() => debug!(file = %file.display_name(), "cancelled"),
                    Err(e) => warn!(file = %file.display_name(), error = %e, "download failed"),
                }

                (file.display_name(), result)
            });

            handles.push(handle);
        }

        let mut report = DownloadReport::default();
        for joined in join_all(handles).await {
            match joined {
                Ok((_, Ok(Outcome::Downloaded))) => report.succeeded += 1,
                Ok((_, Ok(Outcome::Skipped))) => report.skipped += 1,
                Ok((name, Err(e))) => report.failed.push((name, e.to_string())),
                Err(e) => report
                    .failed
                    .push(("<task>".to_string(), format!("task error: {}", e))),
            }
        }

        info!(
            succeeded = report.succeeded,
            skipped = report.skipped,
            failed = report.failed.len(),
            "download batch finished"
        );
        report
    }

    async fn download_gated(
        &self,
        file: &FileRecord,
        semaphore: &Semaphore,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<Outcome> {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            permit = semaphore.acquire() => permit.ok(),
        };
        // Held until this function returns, on every path.
        let Some(_permit) = permit else {
            progress.report(DownloadProgress::failed(file, 0, Error::Cancelled.to_string()));
            return Err(Error::Cancelled);
        };

        self.download_file(file, progress, cancel).await
    }

    /// Downloads one file, skipping it when a same-sized copy is already on disk.
    ///
    /// Always ends with a terminal update; a failure reports the bytes written
    /// before it happened.
    pub async fn download_file(
        &self,
        file: &FileRecord,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<Outcome> {
        let mut downloaded = 0u64;
        let result = self.transfer(file, progress, cancel, &mut downloaded).await;
        if let Err(e) = &result {
            progress.report(DownloadProgress::failed(file, downloaded, e.to_string()));
        }
        result
    }

    async fn transfer(
        &self,
        file: &FileRecord,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
        downloaded: &mut u64,
    ) -> Result<Outcome> {
        if exists_locally(file, &self.output_dir).await {
            debug!(file = %file.display_name(), "already present, skipping");
            progress.report(DownloadProgress::skipped(file));
            return Ok(Outcome::Skipped);
        }

        let output_path = file.destination(&self.output_dir);

        let mut body = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            body = self.store.fetch_file(&file.id) => body?,
        };

        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut out = File::create(&output_path).await?;

        progress.report(DownloadProgress::started(file));

        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                chunk = body.next() => chunk,
            };
            let Some(chunk) = chunk else { break };
            let chunk = chunk?;
            if chunk.is_empty() {
                continue;
            }
            out.write_all(&chunk).await?;
            *downloaded += chunk.len() as u64;

            progress.report(DownloadProgress::transferring(file, *downloaded));
        }

        out.flush().await?;

        if file.size > 0 && *downloaded != file.size {
            return Err(Error::SizeMismatch {
                expected: file.size,
                actual: *downloaded,
            });
        }

        progress.report(DownloadProgress::completed(file));
        Ok(Outcome::Downloaded)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Downloaded,
    Skipped,
}
