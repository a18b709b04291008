//! Seam between the conversion pipeline and the browser engine.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::document::{ContentHeight, PdfBytes, SanitizedHtml};

/// Output of one render session: the PDF plus the height it was sized to.
#[derive(Debug, Clone)]
pub struct RenderedPdf {
    pub pdf: PdfBytes,
    pub content_height: ContentHeight,
}

/// Failures surfaced by a render session. None of these are retried.
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error("browser executable unavailable: {message}")]
    BrowserUnavailable { message: String },
    #[error("browser launch failed: {message}")]
    Launch { message: String },
    #[error("page did not reach network idle within {timeout:?}")]
    PageLoadTimeout { timeout: Duration },
    #[error("page load failed: {message}")]
    PageLoad { message: String },
    #[error("script evaluation failed: {message}")]
    Script { message: String },
    #[error("pdf generation failed: {message}")]
    Pdf { message: String },
}

impl RenderError {
    pub fn browser_unavailable(message: impl Into<String>) -> Self {
        Self::BrowserUnavailable {
            message: message.into(),
        }
    }

    pub fn launch(message: impl Into<String>) -> Self {
        Self::Launch {
            message: message.into(),
        }
    }

    pub fn page_load(message: impl Into<String>) -> Self {
        Self::PageLoad {
            message: message.into(),
        }
    }

    pub fn script(message: impl Into<String>) -> Self {
        Self::Script {
            message: message.into(),
        }
    }

    pub fn pdf(message: impl Into<String>) -> Self {
        Self::Pdf {
            message: message.into(),
        }
    }

    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            RenderError::BrowserUnavailable { .. } => "browser_unavailable",
            RenderError::Launch { .. } => "launch",
            RenderError::PageLoadTimeout { .. } => "page_load_timeout",
            RenderError::PageLoad { .. } => "page_load",
            RenderError::Script { .. } => "script",
            RenderError::Pdf { .. } => "pdf",
        }
    }
}

/// Renders sanitized HTML into a single-page PDF.
///
/// Implementations own every resource they acquire for the call and must
/// release it before returning, on success and on error alike.
#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    async fn render(&self, html: &SanitizedHtml) -> Result<RenderedPdf, RenderError>;
}
