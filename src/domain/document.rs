//! Transient values that live for exactly one conversion request.

use std::fmt;

use bytes::Bytes;

/// HTML as submitted by the caller, before sanitization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawInput {
    /// Contents of the `htmlFile` multipart field.
    Upload {
        file_name: Option<String>,
        bytes: Bytes,
    },
    /// Contents of the `htmlInput` text field.
    Text(String),
}

impl RawInput {
    pub fn len(&self) -> usize {
        match self {
            RawInput::Upload { bytes, .. } => bytes.len(),
            RawInput::Text(text) => text.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RawInput::Upload { .. } => "upload",
            RawInput::Text(_) => "text",
        }
    }

    /// Decode the input as UTF-8, replacing invalid sequences.
    pub fn into_html(self) -> String {
        match self {
            RawInput::Upload { bytes, .. } => String::from_utf8_lossy(&bytes).into_owned(),
            RawInput::Text(text) => text,
        }
    }
}

/// HTML that has passed through a sanitizer and may be handed to the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedHtml(String);

impl SanitizedHtml {
    pub(crate) fn new(html: String) -> Self {
        Self(html)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for SanitizedHtml {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Scroll height of the rendered root element in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ContentHeight(u32);

impl ContentHeight {
    pub fn from_px(px: u32) -> Self {
        Self(px)
    }

    /// Convert a height reported by the page. Negative or non-finite values
    /// collapse to zero; fractional pixels round up so no content is clipped.
    pub fn from_reported(px: f64) -> Self {
        if !px.is_finite() || px <= 0.0 {
            return Self(0);
        }
        Self(px.ceil().min(f64::from(u32::MAX)) as u32)
    }

    pub fn px(self) -> u32 {
        self.0
    }
}

/// Rendered PDF document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfBytes(Bytes);

impl PdfBytes {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}
