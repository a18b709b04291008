//! Embedded front-end assets: the upload form and its stylesheet.

use axum::{
    body::Body,
    http::{HeaderValue, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use include_dir::{Dir, include_dir};
use mime_guess::Mime;

use crate::application::error::ErrorReport;

static STATIC_PUBLIC_ASSETS: Dir<'_> = include_dir!("$OUT_DIR/static_public");

const INDEX_FILE: &str = "index.html";

/// `GET /`: the upload form.
pub async fn serve_index() -> Response {
    match resolve_asset(INDEX_FILE) {
        Some(asset) => asset.into_response(),
        None => not_found_response("infra::assets::serve_index"),
    }
}

/// Fallback for any other path: a bundled file or 404.
pub async fn serve_public(uri: Uri) -> Response {
    match resolve_asset(uri.path()) {
        Some(asset) => asset.into_response(),
        None => not_found_response("infra::assets::serve_public"),
    }
}

fn not_found_response(source: &'static str) -> Response {
    let mut response = StatusCode::NOT_FOUND.into_response();
    ErrorReport::from_message(source, StatusCode::NOT_FOUND, "Static asset not found")
        .attach(&mut response);
    response
}

struct Asset {
    name: &'static str,
    contents: &'static [u8],
}

fn resolve_asset(path: &str) -> Option<Asset> {
    let candidate = path.trim_start_matches('/');
    if candidate.is_empty() || candidate.ends_with('/') || candidate.contains("..") {
        // No directory listings, no traversal.
        return None;
    }

    let file = STATIC_PUBLIC_ASSETS.get_file(candidate)?;
    let name = file.path().to_str()?;
    Some(Asset {
        name,
        contents: file.contents(),
    })
}

impl IntoResponse for Asset {
    fn into_response(self) -> Response {
        let mime = mime_guess::from_path(self.name).first_or_octet_stream();
        let cache_control = if self.name == INDEX_FILE {
            "no-cache"
        } else {
            "public, max-age=3600"
        };
        build_response(Bytes::from_static(self.contents), mime, cache_control)
    }
}

fn build_response(bytes: Bytes, mime: Mime, cache_control: &'static str) -> Response {
    let len = bytes.len();
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(cache_control),
    );

    response
}
