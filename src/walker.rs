//! Recursive folder traversal.
//!
//! A walk pages through one folder's children, then descends into the
//! subfolders it found, one at a time, until `max_depth` is reached. Files
//! come back flat, each tagged with the folder names leading to it.

use crate::error::{Error, Result};
use crate::models::FileRecord;
use crate::remote::{RemoteEntry, RemoteStore};
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub const DEFAULT_MAX_DEPTH: usize = 10;

#[derive(Debug, Default)]
pub struct WalkOutcome {
    pub files: Vec<FileRecord>,
    /// One message per subfolder whose listing failed.
    pub warnings: Vec<String>,
}

/// Lists every file at or below `folder_id`, descending at most `max_depth` levels.
///
/// Only a failure listing `folder_id` itself is returned as an error; failures
/// further down become warnings and the remaining subfolders are still walked.
pub async fn walk(
    store: &dyn RemoteStore,
    folder_id: &str,
    max_depth: usize,
    cancel: &CancellationToken,
) -> Result<WalkOutcome> {
    walk_folder(store, folder_id, Vec::new(), 0, max_depth, cancel).await
}

fn walk_folder<'a>(
    store: &'a dyn RemoteStore,
    folder_id: &'a str,
    path: Vec<String>,
    depth: usize,
    max_depth: usize,
    cancel: &'a CancellationToken,
) -> BoxFuture<'a, Result<WalkOutcome>> {
    Box::pin(async move {
        let mut outcome = WalkOutcome::default();
        let mut subfolders: Vec<RemoteEntry> = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                page = store.list_children(folder_id, page_token.as_deref()) => page?,
            };

            for entry in page.entries {
                if entry.is_folder() {
                    if depth < max_depth {
                        subfolders.push(entry);
                    }
                    continue;
                }
                outcome.files.push(FileRecord {
                    id: entry.id,
                    name: entry.name,
                    path: path.clone(),
                    size: entry.size,
                    folder_id: folder_id.to_string(),
                    mime_type: entry.mime_type,
                    created_time: entry.created_time,
                    modified_time: entry.modified_time,
                });
            }

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(
            folder_id,
            files = outcome.files.len(),
            subfolders = subfolders.len(),
            depth,
            "listed folder"
        );

        for subfolder in subfolders {
            let mut sub_path = path.clone();
            sub_path.push(subfolder.name);
            let shown = sub_path.join("/");

            match walk_folder(store, &subfolder.id, sub_path, depth + 1, max_depth, cancel).await {
                Ok(sub) => {
                    outcome.files.extend(sub.files);
                    outcome.warnings.extend(sub.warnings);
                }
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    warn!(subfolder = %shown, error = %e, "skipping subfolder");
                    outcome.warnings.push(format!("subfolder '{}': {}", shown, e));
                }
            }
        }

        Ok(outcome)
    })
}
