//! One headless Chromium process, used for exactly one document.

use std::{path::Path, time::Duration};

use chromiumoxide::{
    Browser, BrowserConfig, Page,
    cdp::browser_protocol::page::{EventLifecycleEvent, SetLifecycleEventsEnabledParams},
};
use futures::{StreamExt, future};
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::{
    application::renderer::{RenderError, RenderedPdf},
    config::{BrowserSettings, RenderSettings},
    domain::{
        document::{ContentHeight, PdfBytes, SanitizedHtml},
        types::ConversionStage,
    },
};

use super::{idle::wait_for_lifecycle, pdf::PdfLayout};

const LOG_TARGET: &str = "htmlprint::browser::session";

/// Flags every session runs with, ahead of configured extras.
const BASE_ARGS: [&str; 3] = [
    "--disable-setuid-sandbox",
    "--disable-dev-shm-usage",
    "--disable-gpu",
];

const CLOSE_GRACE: Duration = Duration::from_secs(5);

const MEASURE_SCRIPT: &str = "(() => { \
    if (document.body) { document.body.style.margin = '0'; } \
    return document.documentElement.scrollHeight; \
})()";

/// A launched browser with its private profile directory.
///
/// Call [`RenderSession::close`] when done. Dropping the session without
/// closing still kills the process, but skips the graceful shutdown.
pub struct RenderSession {
    browser: Browser,
    handler: JoinHandle<()>,
    _profile: TempDir,
}

impl RenderSession {
    pub async fn launch(executable: &Path, settings: &BrowserSettings) -> Result<Self, RenderError> {
        let profile = tempfile::Builder::new()
            .prefix("htmlprint-profile-")
            .tempdir()
            .map_err(|err| RenderError::launch(format!("failed to create profile dir: {err}")))?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(executable)
            .user_data_dir(profile.path())
            .no_sandbox()
            .launch_timeout(settings.launch_timeout)
            .request_timeout(settings.page_load_timeout);
        for arg in BASE_ARGS
            .iter()
            .copied()
            .chain(settings.extra_args.iter().map(String::as_str))
        {
            builder = builder.arg(arg);
        }
        let config = builder.build().map_err(RenderError::launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|err| RenderError::launch(err.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(target = LOG_TARGET, error = %err, "browser handler error");
                }
            }
        });

        debug!(
            target = LOG_TARGET,
            executable = %executable.display(),
            profile = %profile.path().display(),
            "browser launched"
        );

        Ok(Self {
            browser,
            handler,
            _profile: profile,
        })
    }

    /// Load `html`, strip the wrapper element, measure and print.
    pub async fn render(
        &self,
        html: &SanitizedHtml,
        browser: &BrowserSettings,
        render: &RenderSettings,
    ) -> Result<RenderedPdf, RenderError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|err| RenderError::launch(format!("failed to open page: {err}")))?;

        let timeout = browser.page_load_timeout;
        tokio::time::timeout(timeout, load_content(&page, html, browser))
            .await
            .map_err(|_| RenderError::PageLoadTimeout { timeout })??;

        let wrapper_removed = remove_wrapper(&page, &render.wrapper_id).await?;
        let height = measure_height(&page).await?;
        debug!(
            target = LOG_TARGET,
            stage = ConversionStage::Rendered.as_str(),
            wrapper_removed,
            content_height_px = height.px(),
            "page rendered"
        );

        let layout = PdfLayout::for_content(render.page_width_mm, height);
        let pdf = page
            .pdf(layout.print_params())
            .await
            .map_err(|err| RenderError::pdf(err.to_string()))?;
        debug!(target = LOG_TARGET, pdf_bytes = pdf.len(), "pdf printed");

        Ok(RenderedPdf {
            pdf: PdfBytes::new(pdf),
            content_height: height,
        })
    }

    /// Shut the browser down and reap the process.
    pub async fn close(mut self) {
        if let Err(err) = self.browser.close().await {
            warn!(target = LOG_TARGET, error = %err, "graceful browser close failed");
        }

        match tokio::time::timeout(CLOSE_GRACE, self.browser.wait()).await {
            Ok(Ok(_)) => {}
            Ok(Err(err)) => {
                warn!(target = LOG_TARGET, error = %err, "waiting for browser exit failed");
            }
            Err(_) => {
                warn!(target = LOG_TARGET, "browser did not exit in time; killing");
                if let Some(Err(err)) = self.browser.kill().await {
                    warn!(target = LOG_TARGET, error = %err, "failed to kill browser");
                }
            }
        }
        debug!(target = LOG_TARGET, "browser closed");
    }
}

impl Drop for RenderSession {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

// The listener is registered after enabling so that events replayed for the
// blank page are never observed; `wait_for_lifecycle` skips any stragglers.
async fn load_content(
    page: &Page,
    html: &SanitizedHtml,
    settings: &BrowserSettings,
) -> Result<(), RenderError> {
    page.execute(SetLifecycleEventsEnabledParams::new(true))
        .await
        .map_err(|err| RenderError::page_load(err.to_string()))?;
    let main_frame = page
        .mainframe()
        .await
        .map_err(|err| RenderError::page_load(err.to_string()))?;
    let listener = page
        .event_listener::<EventLifecycleEvent>()
        .await
        .map_err(|err| RenderError::page_load(err.to_string()))?;
    let mut lifecycle = Box::pin(listener.filter_map(move |event| {
        let in_main_frame = main_frame
            .as_ref()
            .is_none_or(|frame| *frame == event.frame_id);
        future::ready(in_main_frame.then(|| event.name.clone()))
    }));

    page.set_content(html.as_str())
        .await
        .map_err(|err| RenderError::page_load(err.to_string()))?;

    wait_for_lifecycle(&mut lifecycle, settings.idle_event.lifecycle_name()).await
}

async fn remove_wrapper(page: &Page, wrapper_id: &str) -> Result<bool, RenderError> {
    let id_literal =
        serde_json::to_string(wrapper_id).map_err(|err| RenderError::script(err.to_string()))?;
    let script = format!(
        "(() => {{ const el = document.getElementById({id_literal}); \
         if (el) {{ el.remove(); }} return el !== null; }})()"
    );
    page.evaluate(script)
        .await
        .map_err(|err| RenderError::script(err.to_string()))?
        .into_value::<bool>()
        .map_err(|err| RenderError::script(err.to_string()))
}

async fn measure_height(page: &Page) -> Result<ContentHeight, RenderError> {
    let reported = page
        .evaluate(MEASURE_SCRIPT)
        .await
        .map_err(|err| RenderError::script(err.to_string()))?
        .into_value::<f64>()
        .map_err(|err| RenderError::script(format!("unexpected height value: {err}")))?;
    Ok(ContentHeight::from_reported(reported))
}
