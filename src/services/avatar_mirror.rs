// src/services/avatar_mirror.rs
//! Copies remote avatar images into the local static directory
//!
//! Mirroring is best-effort: callers log the error and keep the remote URL.

use bytes::BytesMut;
use reqwest::{Client, StatusCode, Url};
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs as tokio_fs;
use tracing::{debug, info, warn};

use crate::common::generate_file_suffix;

/// Avatars larger than this are not mirrored
pub const MAX_AVATAR_BYTES: usize = 5 * 1024 * 1024;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_BASE_NAME_LEN: usize = 40;
const URL_IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    #[error("Invalid avatar URL: {0}")]
    InvalidUrl(String),

    #[error("Download failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Avatar host responded with status {0}")]
    Status(StatusCode),

    #[error("Avatar exceeds {} bytes", MAX_AVATAR_BYTES)]
    TooLarge,

    #[error("Downloaded file is not an image")]
    NotAnImage,

    #[error("Failed to write avatar: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct AvatarMirror {
    http: Client,
    dir: PathBuf,
    url_prefix: String,
}

impl AvatarMirror {
    /// `dir` is where files land on disk, `url_prefix` is the public path
    /// segment they are served under (e.g. `user_images`)
    pub fn new(http: Client, dir: PathBuf, url_prefix: &str) -> Self {
        Self {
            http,
            dir,
            url_prefix: url_prefix.trim_matches('/').to_string(),
        }
    }

    /// Download `remote_url` and return the local public URL of the copy
    pub async fn mirror(&self, remote_url: &str) -> Result<String, MirrorError> {
        let url = Url::parse(remote_url).map_err(|e| MirrorError::InvalidUrl(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(MirrorError::InvalidUrl(format!(
                "unsupported scheme '{}'",
                url.scheme()
            )));
        }

        let mut response = self
            .http
            .get(url.clone())
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MirrorError::Status(status));
        }

        if response
            .content_length()
            .map_or(false, |len| len > MAX_AVATAR_BYTES as u64)
        {
            return Err(MirrorError::TooLarge);
        }

        let mut body = BytesMut::new();
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > MAX_AVATAR_BYTES {
                return Err(MirrorError::TooLarge);
            }
            body.extend_from_slice(&chunk);
        }

        if body.is_empty() {
            return Err(MirrorError::NotAnImage);
        }

        let extension = detect_extension(&body, &url).ok_or(MirrorError::NotAnImage)?;
        let filename = local_file_name(&url, &extension, &generate_file_suffix());

        tokio_fs::create_dir_all(&self.dir).await?;
        let file_path = self.dir.join(&filename);
        tokio_fs::write(&file_path, &body).await?;

        info!(
            file_path = %file_path.display(),
            bytes = body.len(),
            "Mirrored avatar"
        );

        Ok(format!("/{}/{}", self.url_prefix, filename))
    }

    /// Remove a copy previously returned by `mirror`
    ///
    /// URLs outside the mirror's prefix are ignored. Returns whether a file was removed.
    pub async fn discard(&self, local_url: &str) -> bool {
        let Some(filename) = self.file_name_of(local_url) else {
            return false;
        };

        let file_path = self.dir.join(filename);
        match tokio_fs::remove_file(&file_path).await {
            Ok(()) => {
                debug!(file_path = %file_path.display(), "Discarded mirrored avatar");
                true
            }
            Err(e) => {
                warn!(file_path = %file_path.display(), error = %e, "Failed to discard mirrored avatar");
                false
            }
        }
    }

    fn file_name_of<'a>(&self, local_url: &'a str) -> Option<&'a str> {
        let filename = local_url
            .strip_prefix('/')?
            .strip_prefix(self.url_prefix.as_str())?
            .strip_prefix('/')?;

        let plain = !filename.is_empty()
            && filename
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !filename.starts_with('.');
        plain.then_some(filename)
    }
}

/// Sniffed image extension, else the URL's own image extension
fn detect_extension(body: &[u8], url: &Url) -> Option<String> {
    match infer::get(body) {
        Some(kind) if kind.matcher_type() == infer::MatcherType::Image => {
            Some(kind.extension().to_string())
        }
        Some(kind) => {
            debug!(mime = %kind.mime_type(), "Avatar sniffed as non-image");
            None
        }
        None => url_extension(url).filter(|ext| URL_IMAGE_EXTENSIONS.contains(&ext.as_str())),
    }
}

fn last_segment(url: &Url) -> &str {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or("")
}

fn url_extension(url: &Url) -> Option<String> {
    let segment = last_segment(url);
    let (_, ext) = segment.rsplit_once('.')?;
    Some(ext.to_ascii_lowercase())
}

/// `{base}_{suffix}.{ext}`, where base is the URL file name stripped of
/// its extension and of anything outside `[A-Za-z0-9_-]`
fn local_file_name(url: &Url, extension: &str, suffix: &str) -> String {
    let segment = last_segment(url);
    let stem = match segment.rsplit_once('.') {
        Some((stem, _)) => stem,
        None => segment,
    };

    let mut base: String = stem
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .take(MAX_BASE_NAME_LEN)
        .collect();
    if base.is_empty() {
        base = "avatar".to_string();
    }

    format!("{}_{}.{}", base, suffix, extension)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PNG_BYTES: [u8; 16] = [
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52,
    ];

    fn mirror_into(dir: &TempDir) -> AvatarMirror {
        AvatarMirror::new(Client::new(), dir.path().join("user_images"), "/user_images/")
    }

    #[test]
    fn test_local_file_name() {
        let url = Url::parse("https://avatars.githubusercontent.com/u/42?v=4").unwrap();
        assert_eq!(local_file_name(&url, "png", "abcd1234"), "42_abcd1234.png");

        let url = Url::parse("https://lh3.test/a/photo.final.JPG").unwrap();
        assert_eq!(local_file_name(&url, "jpg", "s"), "photofinal_s.jpg");

        let url = Url::parse("https://host.test/").unwrap();
        assert_eq!(local_file_name(&url, "gif", "s"), "avatar_s.gif");

        let url = Url::parse("https://host.test/%2E%2E%2Fetc.png").unwrap();
        assert_eq!(local_file_name(&url, "png", "s"), "2E2E2Fetc_s.png");
    }

    #[test]
    fn test_detect_extension() {
        let url = Url::parse("https://host.test/avatar").unwrap();
        assert_eq!(detect_extension(&PNG_BYTES, &url), Some("png".to_string()));

        let jpeg = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
        assert_eq!(detect_extension(&jpeg, &url), Some("jpg".to_string()));

        let url = Url::parse("https://host.test/face.WEBP").unwrap();
        assert_eq!(detect_extension(b"????", &url), Some("webp".to_string()));

        let url = Url::parse("https://host.test/readme.txt").unwrap();
        assert_eq!(detect_extension(b"plain text", &url), None);
    }

    #[tokio::test]
    async fn test_mirror_writes_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/u/42"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(PNG_BYTES.to_vec()))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let mirror = mirror_into(&dir);

        let local = mirror
            .mirror(&format!("{}/u/42", server.uri()))
            .await
            .unwrap();

        assert!(local.starts_with("/user_images/42_"));
        assert!(local.ends_with(".png"));

        let filename = local.trim_start_matches("/user_images/");
        let written = std::fs::read(dir.path().join("user_images").join(filename)).unwrap();
        assert_eq!(written, PNG_BYTES.to_vec());
    }

    #[tokio::test]
    async fn test_discard_removes_only_mirrored_files() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(PNG_BYTES.to_vec()))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let mirror = mirror_into(&dir);
        let local = mirror
            .mirror(&format!("{}/u/42", server.uri()))
            .await
            .unwrap();
        let on_disk = dir
            .path()
            .join("user_images")
            .join(local.trim_start_matches("/user_images/"));
        assert!(on_disk.exists());

        assert!(!mirror.discard("https://avatars.test/u/42").await);
        assert!(!mirror.discard("/user_images/../secret.png").await);
        assert!(!mirror.discard("/other/42_x.png").await);
        assert!(on_disk.exists());

        assert!(mirror.discard(&local).await);
        assert!(!on_disk.exists());
        assert!(!mirror.discard(&local).await);
    }

    #[tokio::test]
    async fn test_mirror_rejects_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let result = mirror_into(&dir)
            .mirror(&format!("{}/missing.png", server.uri()))
            .await;

        assert!(matches!(result, Err(MirrorError::Status(StatusCode::NOT_FOUND))));
    }

    #[tokio::test]
    async fn test_mirror_rejects_non_image() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>nope</html>"))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let result = mirror_into(&dir)
            .mirror(&format!("{}/page.html", server.uri()))
            .await;

        assert!(matches!(result, Err(MirrorError::NotAnImage)));
        assert!(!dir.path().join("user_images").exists());
    }

    #[tokio::test]
    async fn test_mirror_rejects_oversized_body() {
        let server = MockServer::start().await;
        let mut body = PNG_BYTES.to_vec();
        body.resize(MAX_AVATAR_BYTES + 1, 0);
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let result = mirror_into(&dir)
            .mirror(&format!("{}/huge.png", server.uri()))
            .await;

        assert!(matches!(result, Err(MirrorError::TooLarge)));
    }

    #[tokio::test]
    async fn test_mirror_rejects_unreachable_and_invalid_urls() {
        let dir = TempDir::new().unwrap();
        let mirror = mirror_into(&dir);

        assert!(matches!(
            mirror.mirror("http://127.0.0.1:9/a.png").await,
            Err(MirrorError::Request(_))
        ));
        assert!(matches!(
            mirror.mirror("not a url").await,
            Err(MirrorError::InvalidUrl(_))
        ));
        assert!(matches!(
            mirror.mirror("file:///etc/passwd").await,
            Err(MirrorError::InvalidUrl(_))
        ));
    }
}
