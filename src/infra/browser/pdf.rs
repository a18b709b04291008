//! Page geometry for the emitted PDF.

use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;

use crate::domain::document::ContentHeight;

const CSS_PX_PER_INCH: f64 = 96.0;
const MM_PER_INCH: f64 = 25.4;

/// Single-page layout: fixed width, height equal to the measured content.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdfLayout {
    pub width_in: f64,
    pub height_in: f64,
}

impl PdfLayout {
    /// An empty document still gets a one pixel tall page.
    pub fn for_content(width_mm: f64, height: ContentHeight) -> Self {
        let height_px = height.px().max(1);
        Self {
            width_in: width_mm / MM_PER_INCH,
            height_in: f64::from(height_px) / CSS_PX_PER_INCH,
        }
    }

    /// Print parameters: explicit size over `@page` rules, backgrounds on,
    /// no margins, first page only.
    pub fn print_params(&self) -> PrintToPdfParams {
        PrintToPdfParams::builder()
            .paper_width(self.width_in)
            .paper_height(self.height_in)
            .print_background(true)
            .prefer_css_page_size(false)
            .page_ranges("1")
            .margin_top(0.0)
            .margin_bottom(0.0)
            .margin_left(0.0)
            .margin_right(0.0)
            .build()
    }
}
