//! In-memory remote store and progress recorder for unit tests.

use crate::error::{Error, Result};
use crate::models::DownloadProgress;
use crate::remote::{ByteStream, FOLDER_MIME_TYPE, ListPage, RemoteEntry, RemoteStore};
use crate::state::ProgressSink;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub(crate) struct MemoryStore {
    page_size: usize,
    chunk_size: usize,
    chunk_delay: Option<Duration>,
    list_delay: Option<Duration>,
    folders: HashMap<String, Vec<RemoteEntry>>,
    contents: HashMap<String, Vec<u8>>,
    failing_listings: HashSet<String>,
    failing_downloads: HashSet<String>,
    failing_midway: HashSet<String>,
    list_calls: Mutex<HashMap<String, usize>>,
    fetch_calls: AtomicUsize,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            page_size: 1000,
            chunk_size: 16,
            chunk_delay: None,
            list_delay: None,
            folders: HashMap::new(),
            contents: HashMap::new(),
            failing_listings: HashSet::new(),
            failing_downloads: HashSet::new(),
            failing_midway: HashSet::new(),
            list_calls: Mutex::new(HashMap::new()),
            fetch_calls: AtomicUsize::new(0),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    /// Every listing call sleeps this long before answering.
    pub fn with_list_delay(mut self, delay: Duration) -> Self {
        self.list_delay = Some(delay);
        self
    }

    /// Adds a file of `size` bytes under `folder` and returns its id.
    pub fn add_file(&mut self, folder: &str, name: &str, size: u64) -> String {
        let id = format!("{}/{}", folder, name);
        self.folders.entry(folder.to_string()).or_default().push(RemoteEntry {
            id: id.clone(),
            name: name.to_string(),
            size,
            mime_type: "application/octet-stream".to_string(),
            created_time: None,
            modified_time: None,
        });
        self.contents.insert(id.clone(), vec![b'x'; size as usize]);
        id
    }

    pub fn add_folder(&mut self, parent: &str, name: &str, id: &str) {
        self.folders.entry(parent.to_string()).or_default().push(RemoteEntry {
            id: id.to_string(),
            name: name.to_string(),
            size: 0,
            mime_type: FOLDER_MIME_TYPE.to_string(),
            created_time: None,
            modified_time: None,
        });
        self.folders.entry(id.to_string()).or_default();
    }

    pub fn fail_listing(&mut self, folder_id: &str) {
        self.failing_listings.insert(folder_id.to_string());
    }

    pub fn fail_download(&mut self, file_id: &str) {
        self.failing_downloads.insert(file_id.to_string());
    }

    /// The body stream yields one chunk, then errors.
    pub fn fail_download_midway(&mut self, file_id: &str) {
        self.failing_midway.insert(file_id.to_string());
    }

    pub fn list_calls(&self, folder_id: &str) -> usize {
        self.list_calls
            .lock()
            .unwrap()
            .get(folder_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn list_children(&self, folder_id: &str, page_token: Option<&str>) -> Result<ListPage> {
        *self
            .list_calls
            .lock()
            .unwrap()
            .entry(folder_id.to_string())
            .or_default() += 1;

        if let Some(delay) = self.list_delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_listings.contains(folder_id) {
            return Err(Error::Api {
                status: 500,
                message: format!("listing {} failed", folder_id),
            });
        }
        let entries = self.folders.get(folder_id).ok_or_else(|| Error::Api {
            status: 404,
            message: format!("File not found: {}", folder_id),
        })?;

        let offset: usize = page_token.and_then(|t| t.parse().ok()).unwrap_or(0);
        let end = (offset + self.page_size).min(entries.len());
        Ok(ListPage {
            entries: entries[offset..end].to_vec(),
            next_page_token: (end < entries.len()).then(|| end.to_string()),
        })
    }

    async fn fetch_file(&self, file_id: &str) -> Result<ByteStream> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);

        if self.failing_downloads.contains(file_id) {
            return Err(Error::Api {
                status: 500,
                message: format!("download {} failed", file_id),
            });
        }
        let body = self.contents.get(file_id).ok_or_else(|| Error::Api {
            status: 404,
            message: format!("File not found: {}", file_id),
        })?;

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let guard = InFlightGuard(Arc::clone(&self.in_flight));

        let mut chunks: Vec<Result<Bytes>> = body
            .chunks(self.chunk_size)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        if self.failing_midway.contains(file_id) {
            chunks.truncate(1);
            chunks.push(Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset",
            ))));
        }

        let delay = self.chunk_delay;
        let stream = stream::unfold(
            (chunks.into_iter(), guard),
            move |(mut chunks, guard)| async move {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                chunks.next().map(|chunk| (chunk, (chunks, guard)))
            },
        );
        Ok(stream.boxed())
    }
}

#[derive(Default)]
pub(crate) struct RecordingSink {
    updates: Mutex<Vec<DownloadProgress>>,
}

impl RecordingSink {
    pub fn updates(&self) -> Vec<DownloadProgress> {
        self.updates.lock().unwrap().clone()
    }

    pub fn updates_for(&self, file_id: &str) -> Vec<DownloadProgress> {
        self.updates()
            .into_iter()
            .filter(|p| p.file_id == file_id)
            .collect()
    }

    pub fn terminal(&self) -> Vec<DownloadProgress> {
        self.updates().into_iter().filter(|p| p.is_terminal()).collect()
    }
}

impl ProgressSink for RecordingSink {
    fn report(&self, update: DownloadProgress) {
        self.updates.lock().unwrap().push(update);
    }
}
