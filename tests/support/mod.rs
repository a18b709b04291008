//! Shared fixtures for router-level tests.
#![allow(dead_code)]

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use axum::{Router, body::Body, http::Response};
use htmlprint::{
    application::{
        convert::ConversionService,
        renderer::{DocumentRenderer, RenderError, RenderedPdf},
        sanitize::PatternSanitizer,
    },
    domain::document::{ContentHeight, PdfBytes, SanitizedHtml},
    infra::http::{HttpState, build_router},
};
use http_body_util::BodyExt;

pub const TEST_UPLOAD_LIMIT: usize = 5 * 1024 * 1024;

/// Renderer that "prints" the sanitized HTML it received behind a PDF header.
#[derive(Default)]
pub struct RecordingRenderer {
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl RecordingRenderer {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_html(&self) -> Option<String> {
        self.seen.lock().expect("seen lock").last().cloned()
    }
}

#[async_trait]
impl DocumentRenderer for RecordingRenderer {
    async fn render(&self, html: &SanitizedHtml) -> Result<RenderedPdf, RenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .expect("seen lock")
            .push(html.as_str().to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let mut pdf = b"%PDF-1.4\n".to_vec();
        pdf.extend_from_slice(html.as_str().as_bytes());
        Ok(RenderedPdf {
            pdf: PdfBytes::new(pdf),
            content_height: ContentHeight::from_px(html.len() as u32),
        })
    }
}

/// Renderer that always fails with the given error.
pub struct FailingRenderer(pub RenderError);

#[async_trait]
impl DocumentRenderer for FailingRenderer {
    async fn render(&self, _html: &SanitizedHtml) -> Result<RenderedPdf, RenderError> {
        Err(self.0.clone())
    }
}

pub fn router_with(renderer: Arc<dyn DocumentRenderer>, production: bool) -> Router {
    let conversions = ConversionService::new(Arc::new(PatternSanitizer), renderer);
    build_router(HttpState {
        conversions,
        upload_limit_bytes: TEST_UPLOAD_LIMIT,
        production,
    })
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .expect("collect body")
        .to_bytes()
        .to_vec()
}

pub async fn body_text(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).expect("utf8 body")
}

pub struct Part<'a> {
    pub name: &'a str,
    pub file_name: Option<&'a str>,
    pub contents: &'a [u8],
}

pub const BOUNDARY: &str = "htmlprint-test-boundary";

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        let disposition = match part.file_name {
            Some(file_name) => format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{file_name}\"\r\n\
                 Content-Type: text/html\r\n\r\n",
                part.name
            ),
            None => format!(
                "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                part.name
            ),
        };
        body.extend_from_slice(disposition.as_bytes());
        body.extend_from_slice(part.contents);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={BOUNDARY}")
}
