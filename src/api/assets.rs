//! Embedded static assets
//!
//! The page is compiled into the binary. In development, files under `ui/`
//! on disk are served when the embedded copy is missing.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::{IntoResponse, Response},
};
use rust_embed::Embed;
use std::path::PathBuf;

#[derive(Embed)]
#[folder = "ui"]
struct Assets;

/// Serve embedded static files, with filesystem fallback for development
pub async fn serve_static(req: Request<Body>) -> Response {
    let path = req.uri().path().trim_start_matches('/');

    match load(path) {
        Some(content) => with_mime(path, content),
        None => (StatusCode::NOT_FOUND, "Not found").into_response(),
    }
}

/// Get the index.html content (embedded or from filesystem)
pub fn get_index_html() -> Option<String> {
    load("index.html").and_then(|bytes| String::from_utf8(bytes).ok())
}

fn load(path: &str) -> Option<Vec<u8>> {
    // Path traversal never reaches the filesystem fallback.
    if path.split('/').any(|part| part == "..") {
        return None;
    }

    if let Some(content) = Assets::get(path) {
        return Some(content.data.into_owned());
    }

    std::fs::read(PathBuf::from("ui").join(path)).ok()
}

fn with_mime(path: &str, content: Vec<u8>) -> Response {
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    (
        [(header::CONTENT_TYPE, mime.as_ref().to_string())],
        content,
    )
        .into_response()
}
