use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_PAGE_SIZE: u32 = 1000;
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com";

const LIST_FIELDS: &str = "nextPageToken, files(id, name, size, mimeType, createdTime, modifiedTime)";

pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// One child of a remote folder, file or folder alike.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    pub created_time: Option<DateTime<Utc>>,
    pub modified_time: Option<DateTime<Utc>>,
}

impl RemoteEntry {
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub entries: Vec<RemoteEntry>,
    pub next_page_token: Option<String>,
}

/// Listing and transfer calls the walker and orchestrator depend on.
///
/// Every call is a single attempt; nothing here retries.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn list_children(&self, folder_id: &str, page_token: Option<&str>) -> Result<ListPage>;

    async fn fetch_file(&self, file_id: &str) -> Result<ByteStream>;
}

#[derive(Debug, Clone)]
pub struct DriveConfig {
    pub api_key: Option<String>,
    pub access_token: Option<String>,
    pub base_url: String,
    pub proxy: Option<String>,
    pub page_size: u32,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            access_token: None,
            base_url: DEFAULT_API_BASE.to_string(),
            proxy: None,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Google Drive v3 over plain REST.
#[derive(Clone)]
pub struct DriveClient {
    client: Client,
    config: DriveConfig,
}

impl DriveClient {
    pub fn new(config: DriveConfig) -> Result<Self> {
        if config.api_key.is_none() && config.access_token.is_none() {
            return Err(Error::Credentials(
                "set an API key (GOOGLE_API_KEY) or an access token (GOOGLE_ACCESS_TOKEN)".into(),
            ));
        }

        let mut client_builder = Client::builder().connect_timeout(Duration::from_secs(30));

        if let Some(proxy_url) = &config.proxy {
            client_builder = client_builder.proxy(reqwest::Proxy::all(proxy_url)?);
        }

        let client = client_builder.build()?;

        Ok(Self { client, config })
    }

    fn authorize(&self, mut request: RequestBuilder) -> RequestBuilder {
        if let Some(key) = &self.config.api_key {
            request = request.query(&[("key", key)]);
        }
        if let Some(token) = &self.config.access_token {
            request = request.bearer_auth(token);
        }
        request
    }

    fn files_url(&self) -> String {
        format!("{}/drive/v3/files", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl RemoteStore for DriveClient {
    async fn list_children(&self, folder_id: &str, page_token: Option<&str>) -> Result<ListPage> {
        let query = format!("'{}' in parents and trashed = false", folder_id);
        let page_size = self.config.page_size.to_string();

        let mut request = self.client.get(self.files_url()).query(&[
            ("q", query.as_str()),
            ("fields", LIST_FIELDS),
            ("pageSize", page_size.as_str()),
        ]);
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }

        debug!(folder_id, page_token, "listing folder page");
        let response = check_status(self.authorize(request).send().await?).await?;
        let body = response.bytes().await?;
        let page: FileListResponse = serde_json::from_slice(&body)?;

        Ok(page.into())
    }

    async fn fetch_file(&self, file_id: &str) -> Result<ByteStream> {
        let url = format!("{}/{}", self.files_url(), file_id);
        let request = self.client.get(url).query(&[("alt", "media")]);

        let response = check_status(self.authorize(request).send().await?).await?;

        Ok(response.bytes_stream().map_err(Error::from).boxed())
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    Err(Error::Api {
        status: status.as_u16(),
        message: api_error_message(&text),
    })
}

fn api_error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct Envelope {
        error: ErrorBody,
    }
    #[derive(Deserialize)]
    struct ErrorBody {
        message: String,
    }

    match serde_json::from_str::<Envelope>(body) {
        Ok(envelope) => envelope.error.message,
        Err(_) => body.trim().to_string(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileListResponse {
    next_page_token: Option<String>,
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    name: String,
    /// int64 values arrive as JSON strings.
    size: Option<String>,
    #[serde(default)]
    mime_type: String,
    created_time: Option<String>,
    modified_time: Option<String>,
}

fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
}

impl From<DriveFile> for RemoteEntry {
    fn from(f: DriveFile) -> Self {
        Self {
            size: f.size.as_deref().and_then(|s| s.parse().ok()).unwrap_or(0),
            created_time: parse_timestamp(f.created_time.as_deref()),
            modified_time: parse_timestamp(f.modified_time.as_deref()),
            id: f.id,
            name: f.name,
            mime_type: f.mime_type,
        }
    }
}

impl From<FileListResponse> for ListPage {
    fn from(r: FileListResponse) -> Self {
        Self {
            entries: r.files.into_iter().map(RemoteEntry::from).collect(),
            next_page_token: r.next_page_token.filter(|t| !t.is_empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_requires_credentials() {
        let err = DriveClient::new(DriveConfig::default()).err().unwrap();
        assert!(matches!(err, Error::Credentials(_)));
    }

    #[test]
    fn decodes_listing_page() {
        let body = r#"{
            "nextPageToken": "tok-2",
            "files": [
                {"id": "f1", "name": "report.pdf", "size": "100", "mimeType": "application/pdf",
                 "createdTime": "2024-01-02T03:04:05.000Z", "modifiedTime": "not a date"},
                {"id": "d1", "name": "B", "mimeType": "application/vnd.google-apps.folder"}
            ]
        }"#;
        let page: ListPage = serde_json::from_str::<FileListResponse>(body).unwrap().into();

        assert_eq!(page.next_page_token.as_deref(), Some("tok-2"));
        assert_eq!(page.entries.len(), 2);
        let file = &page.entries[0];
        assert_eq!(file.size, 100);
        assert!(!file.is_folder());
        assert!(file.created_time.is_some());
        assert!(file.modified_time.is_none());
        assert!(page.entries[1].is_folder());
        assert_eq!(page.entries[1].size, 0);
    }

    #[test]
    fn empty_page_token_ends_listing() {
        let page: ListPage = serde_json::from_str::<FileListResponse>(r#"{"nextPageToken": ""}"#)
            .unwrap()
            .into();
        assert!(page.next_page_token.is_none());
        assert!(page.entries.is_empty());
    }

    #[test]
    fn api_error_message_prefers_envelope() {
        let body = r#"{"error": {"code": 404, "message": "File not found: x."}}"#;
        assert_eq!(api_error_message(body), "File not found: x.");
        assert_eq!(api_error_message(" plain "), "plain");
    }
}
