//! Chromium-backed [`DocumentRenderer`].
//!
//! Every render launches its own headless browser with a throwaway profile
//! and closes it before returning, whether the render succeeded or not.

mod executable;
mod idle;
mod pdf;
mod session;

use async_trait::async_trait;

pub use executable::{EXECUTABLE_CANDIDATES, resolve_executable};
pub use pdf::PdfLayout;
pub use session::RenderSession;

use crate::{
    application::renderer::{DocumentRenderer, RenderError, RenderedPdf},
    config::{BrowserSettings, RenderSettings},
    domain::document::SanitizedHtml,
};

#[derive(Debug, Clone)]
pub struct ChromiumRenderer {
    browser: BrowserSettings,
    render: RenderSettings,
}

impl ChromiumRenderer {
    pub fn new(browser: BrowserSettings, render: RenderSettings) -> Self {
        Self { browser, render }
    }
}

#[async_trait]
impl DocumentRenderer for ChromiumRenderer {
    async fn render(&self, html: &SanitizedHtml) -> Result<RenderedPdf, RenderError> {
        let executable = resolve_executable(self.browser.executable.as_deref())?;
        let session = RenderSession::launch(&executable, &self.browser).await?;
        let result = session.render(html, &self.browser, &self.render).await;
        session.close().await;
        result
    }
}
