//! File hosting backed by a local directory tree

use async_trait::async_trait;
use band_core::{FileHosting, FileRef, HostingError, SearchPage};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

const DEFAULT_PAGE_SIZE: usize = 50;

/// Serves the files under `root`. File ids are paths relative to the root,
/// with `/` separators; page tokens are result offsets.
#[derive(Debug, Clone)]
pub struct LocalFileHosting {
    root: PathBuf,
    page_size: usize,
}

impl LocalFileHosting {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every file whose name contains `text`, sorted by name then id.
    fn scan(root: &Path, text: &str) -> Vec<FileRef> {
        let needle = text.trim().to_lowercase();
        let mut found: Vec<FileRef> = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(error) => {
                    tracing::warn!(%error, "skipping unreadable library entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                if name.starts_with('.') || !name.to_lowercase().contains(&needle) {
                    return None;
                }
                let relative = entry.path().strip_prefix(root).ok()?;
                let id = relative
                    .components()
                    .map(|part| part.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                let mut file = FileRef::new(id, name);
                file.modified_at = entry
                    .metadata()
                    .ok()
                    .and_then(|meta| meta.modified().ok())
                    .map(DateTime::<Utc>::from);
                Some(file)
            })
            .collect();
        found.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.id.cmp(&b.id))
        });
        found
    }

    /// Resolve a file id to a path inside the root.
    fn resolve(&self, id: &str) -> Result<PathBuf, HostingError> {
        let relative = Path::new(id);
        let inside = relative
            .components()
            .all(|part| matches!(part, Component::Normal(_)));
        if id.is_empty() || !inside {
            return Err(HostingError::NotFound(id.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl FileHosting for LocalFileHosting {
    async fn search(&self, text: &str, page_token: Option<&str>) -> Result<SearchPage, HostingError> {
        let offset = match page_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| HostingError::InvalidPageToken(token.to_string()))?,
            None => 0,
        };

        let root = self.root.clone();
        let text = text.to_string();
        let files = tokio::task::spawn_blocking(move || Self::scan(&root, &text))
            .await
            .map_err(|e| HostingError::Unavailable(e.to_string()))?;

        let end = offset.saturating_add(self.page_size).min(files.len());
        let page = files.get(offset..end).map(<[FileRef]>::to_vec).unwrap_or_default();
        tracing::debug!(offset, found = files.len(), "library search");
        Ok(SearchPage {
            files: page,
            next_page_token: (end < files.len()).then(|| end.to_string()),
        })
    }

    async fn download(&self, file: &FileRef) -> Result<Bytes, HostingError> {
        let path = self.resolve(&file.id)?;
        match tokio::fs::read(&path).await {
            Ok(content) => Ok(Bytes::from(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(HostingError::NotFound(file.id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
