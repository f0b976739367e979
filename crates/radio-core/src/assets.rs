//! Static files for the configuration page.
//!
//! Only a handful of web extensions are ever served.  Extension-less files
//! are refused so the data files (`stations`, `status`, `wifisetup`) cannot
//! be fetched even when they share a directory with the page.

use std::path::{Component, Path, PathBuf};

use tracing::debug;

pub fn mime_for(path: &str) -> Option<&'static str> {
    let ext = Path::new(path).extension()?.to_str()?;
    match ext {
        "html" => Some("text/html"),
        "css" => Some("text/css"),
        "js" => Some("text/javascript"),
        "ttf" => Some("font/ttf"),
        _ => None,
    }
}

/// Map a request path onto a servable file under `web_root`.
/// `/` is served as `index.html`.
pub fn resolve(web_root: &Path, request_path: &str) -> Option<(PathBuf, &'static str)> {
    let relative = request_path.trim_start_matches('/');
    let relative = if relative.is_empty() {
        "index.html"
    } else {
        relative
    };

    let mime = mime_for(relative)?;

    let rel_path = Path::new(relative);
    if !rel_path
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
    {
        debug!("refusing asset path {:?}", request_path);
        return None;
    }

    let full = web_root.join(rel_path);
    full.is_file().then_some((full, mime))
}

pub fn not_found_message(request_path: &str) -> String {
    format!("Error: {} not found", request_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_for() {
        assert_eq!(mime_for("/index.html"), Some("text/html"));
        assert_eq!(mime_for("style.css"), Some("text/css"));
        assert_eq!(mime_for("app.js"), Some("text/javascript"));
        assert_eq!(mime_for("font.ttf"), Some("font/ttf"));
        assert_eq!(mime_for("stations"), None);
        assert_eq!(mime_for("image.png"), None);
    }

    #[test]
    fn test_resolve() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<html></html>").unwrap();
        std::fs::write(dir.path().join("stations"), "A\thttp://a\n").unwrap();
        std::fs::create_dir(dir.path().join("css")).unwrap();
        std::fs::write(dir.path().join("css/site.css"), "body{}").unwrap();

        let (path, mime) = resolve(dir.path(), "/").unwrap();
        assert_eq!(path, dir.path().join("index.html"));
        assert_eq!(mime, "text/html");

        assert_eq!(resolve(dir.path(), "/css/site.css").unwrap().1, "text/css");
        assert!(resolve(dir.path(), "/stations").is_none());
        assert!(resolve(dir.path(), "/missing.html").is_none());
        assert!(resolve(dir.path(), "/../index.html").is_none());
        assert!(resolve(dir.path(), "/css/../index.html").is_none());
    }

    #[test]
    fn test_not_found_message() {
        assert_eq!(not_found_message("/x.html"), "Error: /x.html not found");
    }
}
