//! File browsing, download and upload

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::multipart::MultipartError;
use axum::extract::Multipart;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use dashmap::DashMap;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::time::Instant;
use tokio_util::io::ReaderStream;

use super::ResponseBody;

/// Progress entries untouched for this long are forgotten
pub const UPLOAD_PROGRESS_TTL: Duration = Duration::from_secs(10 * 60);

/// File transfer errors, reported to the browser as `msg`
#[derive(Error, Debug)]
pub enum FileError {
    #[error("Missing form field: {0}")]
    MissingField(&'static str),

    #[error("Invalid file name")]
    InvalidFileName,

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Upload failed: {0}")]
    Multipart(#[from] MultipartError),

    #[error("{0}")]
    Io(#[from] io::Error),
}

/// Filesystem operations behind the `/file` routes
#[async_trait]
pub trait FileTransfer: Send + Sync {
    /// Directory listing; an empty path lists the home directory
    async fn list(&self, path: &str) -> ResponseBody;

    /// Streamed file body
    async fn download(&self, path: &str) -> Response;

    /// Store the multipart `file` field in the `path` directory
    async fn upload(&self, multipart: Multipart) -> ResponseBody;

    /// Progress of the upload registered under `id`
    fn progress(&self, id: &str) -> ResponseBody;
}

/// One entry of a directory listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub name: String,
    pub size: u64,
    pub is_dir: bool,
    /// Seconds since the Unix epoch
    pub mod_time: u64,
}

/// Snapshot of an upload in flight
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadProgress {
    pub id: String,
    pub received: u64,
    /// Declared size, when the browser sent one
    pub total: Option<u64>,
    pub done: bool,
    pub error: Option<String>,
}

impl UploadProgress {
    fn new(id: &str, total: Option<u64>) -> Self {
        Self {
            id: id.to_string(),
            received: 0,
            total,
            done: false,
            error: None,
        }
    }
}

#[derive(Debug)]
struct Tracked {
    progress: UploadProgress,
    touched: Instant,
}

/// The local filesystem
#[derive(Debug)]
pub struct LocalFiles {
    uploads: DashMap<String, Tracked>,
    ttl: Duration,
}

impl Default for LocalFiles {
    fn default() -> Self {
        Self {
            uploads: DashMap::new(),
            ttl: UPLOAD_PROGRESS_TTL,
        }
    }
}

impl LocalFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_progress_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    fn track(&self, id: &str, progress: UploadProgress) {
        self.sweep();
        self.uploads.insert(
            id.to_string(),
            Tracked {
                progress,
                touched: Instant::now(),
            },
        );
    }

    fn update(&self, id: &str, f: impl FnOnce(&mut UploadProgress)) {
        if let Some(mut tracked) = self.uploads.get_mut(id) {
            f(&mut tracked.progress);
            tracked.touched = Instant::now();
        }
    }

    /// Drop entries nobody polled or updated within the TTL
    fn sweep(&self) {
        let ttl = self.ttl;
        self.uploads.retain(|id, tracked| {
            let fresh = tracked.touched.elapsed() < ttl;
            if !fresh {
                tracing::debug!("Forgetting stale upload progress {}", id);
            }
            fresh
        });
    }

    async fn read_dir(&self, dir: &Path) -> Result<Vec<FileEntry>, FileError> {
        let mut entries = Vec::new();
        let mut reader = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = reader.next_entry().await? {
            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                Err(e) => {
                    tracing::debug!("Skipping {:?}: {}", entry.path(), e);
                    continue;
                }
            };
            entries.push(FileEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                size: metadata.len(),
                is_dir: metadata.is_dir(),
                mod_time: metadata
                    .modified()
                    .ok()
                    .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                    .map(|d| d.as_secs())
                    .unwrap_or_default(),
            });
        }

        entries.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then_with(|| a.name.cmp(&b.name)));
        Ok(entries)
    }

    async fn receive(&self, mut multipart: Multipart) -> Result<PathBuf, FileError> {
        let mut id = None;
        let mut dir = None;
        let mut total = None;

        while let Some(mut field) = multipart.next_field().await? {
            let field_name = field.name().map(str::to_string);
            match field_name.as_deref() {
                Some("id") => id = Some(field.text().await?),
                Some("path") => dir = Some(field.text().await?),
                Some("size") => total = field.text().await?.trim().parse().ok(),
                Some("file") => {
                    let dir = dir.clone().ok_or(FileError::MissingField("path"))?;
                    let id = id.clone().unwrap_or_default();
                    let name = field
                        .file_name()
                        .and_then(|n| Path::new(n).file_name())
                        .map(|n| n.to_os_string())
                        .ok_or(FileError::InvalidFileName)?;

                    let dir = PathBuf::from(dir);
                    if !dir.is_dir() {
                        return Err(FileError::NotADirectory(dir.display().to_string()));
                    }
                    let target = dir.join(name);

                    if !id.is_empty() {
                        self.track(&id, UploadProgress::new(&id, total));
                    }
                    let written = self.write_field(&mut field, &target, &id).await;
                    self.update(&id, |progress| {
                        progress.done = true;
                        progress.error = written.as_ref().err().map(|e| e.to_string());
                    });
                    written?;
                    return Ok(target);
                }
                _ => {}
            }
        }

        Err(FileError::MissingField("file"))
    }

    async fn write_field(
        &self,
        field: &mut axum::extract::multipart::Field<'_>,
        target: &Path,
        id: &str,
    ) -> Result<(), FileError> {
        let mut out = tokio::fs::File::create(target).await?;
        while let Some(chunk) = field.chunk().await? {
            out.write_all(&chunk).await?;
            self.update(id, |progress| progress.received += chunk.len() as u64);
        }
        out.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl FileTransfer for LocalFiles {
    async fn list(&self, path: &str) -> ResponseBody {
        let dir = if path.is_empty() {
            match dirs::home_dir() {
                Some(home) => home,
                None => return ResponseBody::failure("Cannot determine home directory"),
            }
        } else {
            PathBuf::from(path)
        };

        match self.read_dir(&dir).await {
            Ok(files) => ResponseBody::success(json!({
                "path": dir.display().to_string(),
                "files": files,
            })),
            Err(e) => {
                tracing::debug!("Listing {:?} failed: {}", dir, e);
                ResponseBody::failure(e.to_string())
            }
        }
    }

    async fn download(&self, path: &str) -> Response {
        let path = PathBuf::from(path);
        let file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) => return (StatusCode::NOT_FOUND, e.to_string()).into_response(),
        };
        let metadata = match file.metadata().await {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => return (StatusCode::BAD_REQUEST, "Not a file").into_response(),
            Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
        };

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().replace('"', ""))
            .unwrap_or_else(|| "download".to_string());
        tracing::info!("Sending {:?} ({} bytes)", path, metadata.len());

        (
            [
                (header::CONTENT_TYPE, "application/octet-stream".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", name),
                ),
                (header::CONTENT_LENGTH, metadata.len().to_string()),
            ],
            Body::from_stream(ReaderStream::new(file)),
        )
            .into_response()
    }

    async fn upload(&self, multipart: Multipart) -> ResponseBody {
        match self.receive(multipart).await {
            Ok(target) => {
                tracing::info!("Uploaded {:?}", target);
                ResponseBody::success(json!({ "path": target.display().to_string() }))
            }
            Err(e) => {
                tracing::warn!("Upload failed: {}", e);
                ResponseBody::failure(e.to_string())
            }
        }
    }

    fn progress(&self, id: &str) -> ResponseBody {
        self.sweep();
        let Some(snapshot) = self.uploads.get(id).map(|t| t.progress.clone()) else {
            return ResponseBody::failure(format!("Unknown upload id: {}", id));
        };
        if snapshot.done {
            self.uploads.remove(id);
        }
        ResponseBody::success(json!(snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_sorts_directories_first() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "bb").unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        std::fs::create_dir(dir.path().join("z-dir")).unwrap();

        let body = LocalFiles::new()
            .list(dir.path().to_str().unwrap())
            .await;

        assert_eq!(body.code, 0);
        let names: Vec<&str> = body.data["files"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, ["z-dir", "a.txt", "b.txt"]);
        assert_eq!(body.data["files"][2]["size"], 2);
        assert_eq!(body.data["files"][0]["isDir"], true);
    }

    #[tokio::test]
    async fn test_list_missing_directory_fails() {
        let body = LocalFiles::new().list("/definitely/not/here").await;
        assert_eq!(body.code, 1);
    }

    #[test]
    fn test_progress_forgets_finished_uploads() {
        let files = LocalFiles::new();
        files.track(
            "u1",
            UploadProgress {
                done: true,
                received: 10,
                ..UploadProgress::new("u1", Some(10))
            },
        );

        let first = files.progress("u1");
        assert_eq!(first.code, 0);
        assert_eq!(first.data["received"], 10);
        assert_eq!(first.data["done"], true);

        assert_eq!(files.progress("u1").code, 1);
    }

    #[test]
    fn test_progress_keeps_running_uploads() {
        let files = LocalFiles::new();
        files.track("u2", UploadProgress::new("u2", None));

        assert_eq!(files.progress("u2").code, 0);
        assert_eq!(files.progress("u2").code, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unpolled_progress_expires() {
        let files = LocalFiles::new().with_progress_ttl(Duration::from_secs(60));
        files.track(
            "abandoned",
            UploadProgress {
                done: true,
                ..UploadProgress::new("abandoned", None)
            },
        );
        files.track("stalled", UploadProgress::new("stalled", None));

        tokio::time::advance(Duration::from_secs(30)).await;
        files.track("fresh", UploadProgress::new("fresh", None));
        tokio::time::advance(Duration::from_secs(31)).await;

        assert_eq!(files.progress("abandoned").code, 1);
        assert_eq!(files.progress("stalled").code, 1);
        assert_eq!(files.progress("fresh").code, 0);
        assert_eq!(files.uploads.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_updates_keep_progress_alive() {
        let files = LocalFiles::new().with_progress_ttl(Duration::from_secs(60));
        files.track("busy", UploadProgress::new("busy", Some(100)));

        for _ in 0..3 {
            tokio::time::advance(Duration::from_secs(40)).await;
            files.update("busy", |p| p.received += 10);
        }

        let body = files.progress("busy");
        assert_eq!(body.code, 0);
        assert_eq!(body.data["received"], 30);
    }
}
