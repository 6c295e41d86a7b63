//! File-hosting integration contract
//!
//! Sheet-music documents live on an external file host. The engine only
//! searches and downloads; results may lag behind very recent writes.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HostingError {
    #[error("file not found: {0}")]
    NotFound(String),

    #[error("invalid page token: {0}")]
    InvalidPageToken(String),

    #[error("file hosting unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A document on the file host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_link: Option<String>,
}

impl FileRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            modified_at: None,
            web_link: None,
        }
    }
}

/// One page of search results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPage {
    pub files: Vec<FileRef>,
    /// Token for the following page, `None` on the last page.
    pub next_page_token: Option<String>,
}

#[async_trait]
pub trait FileHosting: Send + Sync {
    /// Full-text search. `page_token` continues a previous search.
    async fn search(&self, text: &str, page_token: Option<&str>) -> Result<SearchPage, HostingError>;

    async fn download(&self, file: &FileRef) -> Result<Bytes, HostingError>;
}
