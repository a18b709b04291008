//! Conversion pipeline: sanitize, render, emit.

use std::{num::NonZeroU32, sync::Arc, time::Instant};

use metrics::{counter, gauge, histogram};
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::{
    application::{
        renderer::{DocumentRenderer, RenderError, RenderedPdf},
        sanitize::{HtmlSanitizer, SanitizeError},
    },
    domain::{
        document::{RawInput, SanitizedHtml},
        types::ConversionStage,
    },
};

pub const METRIC_CONVERSIONS_TOTAL: &str = "htmlprint_conversions_total";
pub const METRIC_RENDER_MS: &str = "htmlprint_render_ms";
pub const METRIC_SESSIONS_ACTIVE: &str = "htmlprint_render_sessions_active";

const LOG_TARGET: &str = "htmlprint::convert";

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error(transparent)]
    Sanitize(#[from] SanitizeError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

impl ConvertError {
    pub fn kind(&self) -> &'static str {
        match self {
            ConvertError::Sanitize(err) => err.kind(),
            ConvertError::Render(err) => err.kind(),
        }
    }
}

/// Runs one request through `Accepted → Sanitized → Rendered → Emitted → Closed`.
///
/// Without a session limit every call renders immediately; with one, calls
/// beyond the limit wait for a permit before the browser is launched.
#[derive(Clone)]
pub struct ConversionService {
    sanitizer: Arc<dyn HtmlSanitizer>,
    renderer: Arc<dyn DocumentRenderer>,
    admission: Option<Arc<Semaphore>>,
}

impl ConversionService {
    pub fn new(sanitizer: Arc<dyn HtmlSanitizer>, renderer: Arc<dyn DocumentRenderer>) -> Self {
        Self {
            sanitizer,
            renderer,
            admission: None,
        }
    }

    pub fn with_session_limit(mut self, limit: Option<NonZeroU32>) -> Self {
        self.admission = limit.map(|limit| Arc::new(Semaphore::new(limit.get() as usize)));
        self
    }

    pub async fn convert(
        &self,
        request_id: &str,
        input: RawInput,
    ) -> Result<RenderedPdf, ConvertError> {
        let started_at = Instant::now();
        debug!(
            target = LOG_TARGET,
            request_id,
            stage = ConversionStage::Accepted.as_str(),
            input_kind = input.kind(),
            input_bytes = input.len(),
            "conversion accepted"
        );

        match self.run(request_id, input).await {
            Ok(rendered) => {
                counter!(METRIC_CONVERSIONS_TOTAL, "outcome" => "success").increment(1);
                info!(
                    target = LOG_TARGET,
                    request_id,
                    stage = ConversionStage::Emitted.as_str(),
                    content_height_px = rendered.content_height.px(),
                    pdf_bytes = rendered.pdf.len(),
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    "pdf emitted"
                );
                debug!(
                    target = LOG_TARGET,
                    request_id,
                    stage = ConversionStage::Closed.as_str(),
                    "conversion closed"
                );
                Ok(rendered)
            }
            Err(err) => {
                counter!(METRIC_CONVERSIONS_TOTAL, "outcome" => err.kind()).increment(1);
                warn!(
                    target = LOG_TARGET,
                    request_id,
                    stage = ConversionStage::Failed.as_str(),
                    error_kind = err.kind(),
                    error = %err,
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    "conversion failed"
                );
                Err(err)
            }
        }
    }

    async fn run(&self, request_id: &str, input: RawInput) -> Result<RenderedPdf, ConvertError> {
        let input_bytes = input.len();
        let html = self.sanitize(input.into_html()).await?;
        debug!(
            target = LOG_TARGET,
            request_id,
            stage = ConversionStage::Sanitized.as_str(),
            removed_bytes = input_bytes.saturating_sub(html.len()),
            "input sanitized"
        );

        // The semaphore is never closed, so acquisition only fails if that changes.
        let _permit = match &self.admission {
            Some(semaphore) => Some(
                semaphore
                    .clone()
                    .acquire_owned()
                    .await
                    .map_err(|err| RenderError::launch(format!("admission closed: {err}")))?,
            ),
            None => None,
        };

        let _session = ActiveSession::begin();
        let rendered = self.renderer.render(&html).await?;
        Ok(rendered)
    }

    async fn sanitize(&self, html: String) -> Result<SanitizedHtml, SanitizeError> {
        let sanitizer = Arc::clone(&self.sanitizer);
        tokio::task::spawn_blocking(move || sanitizer.sanitize(&html))
            .await
            .map_err(|err| SanitizeError::Worker {
                message: err.to_string(),
            })?
    }
}

/// Counts an admitted render in the session gauge until dropped.
///
/// Dropping also records the render time, so a request abandoned mid-render
/// still settles both metrics.
struct ActiveSession {
    started_at: Instant,
}

impl ActiveSession {
    fn begin() -> Self {
        gauge!(METRIC_SESSIONS_ACTIVE).increment(1.0);
        Self {
            started_at: Instant::now(),
        }
    }
}

impl Drop for ActiveSession {
    fn drop(&mut self) {
        gauge!(METRIC_SESSIONS_ACTIVE).decrement(1.0);
        histogram!(METRIC_RENDER_MS).record(self.started_at.elapsed().as_secs_f64() * 1000.0);
    }
}
