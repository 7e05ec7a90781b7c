use crate::error::{Error, Result};
use crate::models::{FileRecord, dedup_files};
use crate::remote::RemoteStore;
use crate::walker::walk;
use futures::future::join_all;
use regex::Regex;
use std::sync::{Arc, LazyLock, Mutex};
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

static FOLDER_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/folders/([a-zA-Z0-9_-]+)").expect("folder id pattern is valid")
});

/// Pulls the folder id out of a Drive URL such as
/// `https://drive.google.com/drive/folders/<id>?usp=sharing`.
pub fn extract_folder_id(url: &str) -> Result<String> {
    FOLDER_ID_RE
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| Error::InvalidFolderUrl(url.to_string()))
}

/// Reads folder links out of free text, one per line.
pub fn parse_links(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && line.contains("drive.google.com"))
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Default)]
pub struct Aggregated {
    pub files: Vec<FileRecord>,
    /// Set when at least one root failed or came back incomplete.
    pub error: Option<Error>,
}

/// Walks every root concurrently and merges what they found.
///
/// A failing root never hides the files of the others; its message is folded
/// into `error` instead. A file reachable from several roots appears once.
pub async fn aggregate(
    store: Arc<dyn RemoteStore>,
    urls: &[String],
    max_depth: usize,
    cancel: &CancellationToken,
) -> Aggregated {
    let files: Arc<Mutex<Vec<FileRecord>>> = Arc::new(Mutex::new(Vec::new()));
    let errors: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

    let mut handles = Vec::new();

    for url in urls.iter().map(|u| u.trim()).filter(|u| !u.is_empty()) {
        let url = url.to_string();
        let store = Arc::clone(&store);
        let files = Arc::clone(&files);
        let errors = Arc::clone(&errors);
        let cancel = cancel.clone();

        let handle = task::spawn(async move {
            let folder_id = match extract_folder_id(&url) {
                Ok(id) => id,
                Err(e) => {
                    warn!(%url, "not a folder link");
                    lock(&errors).push(e.to_string());
                    return;
                }
            };

            match walk(store.as_ref(), &folder_id, max_depth, &cancel).await {
                Ok(outcome) => {
                    info!(
                        folder_id = %folder_id,
                        files = outcome.files.len(),
                        warnings = outcome.warnings.len(),
                        "walked root"
                    );
                    if !outcome.warnings.is_empty() {
                        lock(&errors).push(format!(
                            "folder {}: completed with warnings: {}",
                            folder_id,
                            outcome.warnings.join("; ")
                        ));
                    }
                    lock(&files).extend(outcome.files);
                }
                Err(e) => {
                    warn!(folder_id = %folder_id, error = %e, "root listing failed");
                    lock(&errors).push(format!("folder {}: {}", folder_id, e));
                }
            }
        });

        handles.push(handle);
    }

    for result in join_all(handles).await {
        if let Err(e) = result {
            lock(&errors).push(format!("task error: {}", e));
        }
    }

    // Overlapping roots list the same file more than once.
    let collected = std::mem::take(&mut *lock(&files));
    let total = collected.len();
    let files = dedup_files(collected);
    if files.len() < total {
        info!(duplicates = total - files.len(), "dropped files listed under more than one root");
    }
    let messages = std::mem::take(&mut *lock(&errors));
    let error = if cancel.is_cancelled() {
        Some(Error::Cancelled)
    } else if messages.is_empty() {
        None
    } else {
        Some(Error::Partial {
            what: "folders",
            messages,
        })
    };

    Aggregated { files, error }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
