//! UI shell and static asset sources

use std::io;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;

const EMBEDDED_INDEX: &str = include_str!("../../assets/index.html");
const EMBEDDED_APP_JS: &str = include_str!("../../assets/static/app.js");
const EMBEDDED_STYLE: &str = include_str!("../../assets/static/style.css");

/// Where the UI shell and its static files come from
#[async_trait]
pub trait AssetSource: Send + Sync {
    /// Raw `index.html`, before the sub-path script is injected
    async fn index(&self) -> io::Result<String>;

    /// File under `static/`, or `None` if there is no such asset
    async fn get(&self, path: &str) -> io::Result<Option<Bytes>>;
}

/// Built-in minimal terminal page
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedAssets;

#[async_trait]
impl AssetSource for EmbeddedAssets {
    async fn index(&self) -> io::Result<String> {
        Ok(EMBEDDED_INDEX.to_string())
    }

    async fn get(&self, path: &str) -> io::Result<Option<Bytes>> {
        let body = match path {
            "app.js" => EMBEDDED_APP_JS,
            "style.css" => EMBEDDED_STYLE,
            _ => return Ok(None),
        };
        Ok(Some(Bytes::from_static(body.as_bytes())))
    }
}

/// A built web UI on disk: `index.html` plus a `static/` directory
#[derive(Debug, Clone)]
pub struct DirAssets {
    root: PathBuf,
}

impl DirAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl AssetSource for DirAssets {
    async fn index(&self) -> io::Result<String> {
        tokio::fs::read_to_string(self.root.join("index.html")).await
    }

    async fn get(&self, path: &str) -> io::Result<Option<Bytes>> {
        let Some(file) = confined_join(&self.root.join("static"), path) else {
            tracing::debug!("Rejected asset path {:?}", path);
            return Ok(None);
        };

        match tokio::fs::read(&file).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(_) if file.is_dir() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Join `relative` onto `root`, refusing anything that could leave `root`.
fn confined_join(root: &Path, relative: &str) -> Option<PathBuf> {
    let mut joined = root.to_path_buf();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => joined.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(joined)
}

/// Insert `<script>window.SUB_PATH = '{name}';</script>` right after the
/// first `<head>`. Pages without a `<head>` tag are returned unchanged.
pub fn inject_sub_path(html: &str, name: &str) -> String {
    html.replacen(
        "<head>",
        &format!(
            "<head><script>window.SUB_PATH = '{}';</script>",
            escape_js_string(name)
        ),
        1,
    )
}

/// Escape for a single-quoted JS string inside an inline `<script>`
fn escape_js_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' | '\'' | '"' | '<' | '>' | '&' | '`' => {
                out.push_str(&format!("\\u{:04x}", c as u32))
            }
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

/// Content type for a static asset, by extension
pub fn content_type(path: &str) -> &'static str {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("js") | Some("mjs") => "application/javascript",
        Some("css") => "text/css",
        Some("json") | Some("map") => "application/json",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("ico") => "image/x-icon",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inject_only_first_head() {
        let html = "<html><head></head><body><head></head></body></html>";
        let out = inject_sub_path(html, "box");
        assert_eq!(
            out,
            "<html><head><script>window.SUB_PATH = 'box';</script></head><body><head></head></body></html>"
        );
    }

    #[test]
    fn test_inject_escapes_name() {
        let out = inject_sub_path("<head>", "x';alert(1);'</script>");
        assert_eq!(
            out,
            "<head><script>window.SUB_PATH = 'x\\u0027;alert(1);\\u0027\\u003c/script\\u003e';</script>"
        );
        assert_eq!(out.matches("</script>").count(), 1);
    }

    #[test]
    fn test_inject_without_head_is_noop() {
        assert_eq!(inject_sub_path("<p>hi</p>", "box"), "<p>hi</p>");
    }

    #[test]
    fn test_embedded_index_has_head() {
        assert!(EMBEDDED_INDEX.contains("<head>"));
    }

    #[test]
    fn test_content_types() {
        assert_eq!(content_type("js/app.JS"), "application/javascript");
        assert_eq!(content_type("style.css"), "text/css");
        assert_eq!(content_type("blob"), "application/octet-stream");
    }

    #[test]
    fn test_confined_join_rejects_escape() {
        let root = Path::new("/srv/ui/static");
        assert_eq!(
            confined_join(root, "css/site.css"),
            Some(PathBuf::from("/srv/ui/static/css/site.css"))
        );
        assert_eq!(confined_join(root, "../index.html"), None);
        assert_eq!(confined_join(root, "/etc/passwd"), None);
    }

    #[tokio::test]
    async fn test_dir_assets() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<head></head>").unwrap();
        std::fs::create_dir(dir.path().join("static")).unwrap();
        std::fs::write(dir.path().join("static/app.js"), "console.log(1)").unwrap();

        let assets = DirAssets::new(dir.path());
        assert_eq!(assets.index().await.unwrap(), "<head></head>");
        assert_eq!(
            assets.get("app.js").await.unwrap(),
            Some(Bytes::from_static(b"console.log(1)"))
        );
        assert_eq!(assets.get("missing.js").await.unwrap(), None);
        assert_eq!(assets.get("../index.html").await.unwrap(), None);
    }
}
