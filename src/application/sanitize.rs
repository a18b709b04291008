//! HTML sanitization applied before any markup reaches the browser.
//!
//! The default [`PatternSanitizer`] is lexical: it strips `<script>` and
//! `<iframe>` spans and quoted `on*=` attributes with case-insensitive regular
//! expressions, leaving everything else byte-for-byte intact. It does not
//! parse HTML and will not catch obfuscated markup such as unclosed tags or
//! attribute names split by entities. [`AllowlistSanitizer`] is the opt-in
//! parse-and-allowlist alternative.
//!
//! Sanitizing is CPU-bound; async callers run it on the blocking pool.

use std::{collections::HashSet, sync::Arc};

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::{config::SanitizerMode, domain::document::SanitizedHtml};

/// Removal passes allowed before the pattern sanitizer gives up on an input.
pub const MAX_REMOVAL_PASSES: usize = 16;

#[derive(Debug, Clone, Error)]
pub enum SanitizeError {
    #[error("markup still changed after {passes} removal passes")]
    Unstable { passes: usize },
    #[error("sanitizer task failed: {message}")]
    Worker { message: String },
}

impl SanitizeError {
    pub fn kind(&self) -> &'static str {
        match self {
            SanitizeError::Unstable { .. } => "unstable_markup",
            SanitizeError::Worker { .. } => "sanitizer_worker",
        }
    }
}

/// Strategy for turning untrusted HTML into markup safe to render.
pub trait HtmlSanitizer: Send + Sync {
    fn sanitize(&self, html: &str) -> Result<SanitizedHtml, SanitizeError>;
}

/// Build the sanitizer selected by configuration.
pub fn sanitizer_for(mode: SanitizerMode) -> Arc<dyn HtmlSanitizer> {
    match mode {
        SanitizerMode::Pattern => Arc::new(PatternSanitizer),
        SanitizerMode::Allowlist => Arc::new(AllowlistSanitizer::new()),
    }
}

// Applied in order on every pass.
static REMOVAL_RULES: Lazy<[Regex; 4]> = Lazy::new(|| {
    [
        Regex::new(r"(?i)<script[\s\S]*?>[\s\S]*?</script>").expect("script pattern must compile"),
        Regex::new(r"(?i)<iframe[\s\S]*?>[\s\S]*?</iframe>").expect("iframe pattern must compile"),
        Regex::new(r#"(?i)on\w+="[^"]*""#).expect("double-quoted handler pattern must compile"),
        Regex::new(r"(?i)on\w+='[^']*'").expect("single-quoted handler pattern must compile"),
    ]
});

/// Regex-based removal of scripts, iframes and inline event handlers.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternSanitizer;

impl PatternSanitizer {
    /// Run the removal rules until the text stops changing.
    ///
    /// A single pass can splice a new match together from the text around a
    /// removed span (`<scr<script></script>ipt>`), so the rules repeat. Each
    /// nesting level costs a full pass, so input that is still changing after
    /// [`MAX_REMOVAL_PASSES`] is rejected instead of cleaned.
    pub fn clean(html: &str) -> Result<String, SanitizeError> {
        let mut current = html.to_string();
        for _ in 0..MAX_REMOVAL_PASSES {
            let next = apply_rules(&current);
            // Rules only ever delete, so equal length means nothing matched.
            if next.len() == current.len() {
                return Ok(current);
            }
            current = next;
        }
        Err(SanitizeError::Unstable {
            passes: MAX_REMOVAL_PASSES,
        })
    }
}

fn apply_rules(html: &str) -> String {
    REMOVAL_RULES.iter().fold(html.to_string(), |text, rule| {
        rule.replace_all(&text, "").into_owned()
    })
}

impl HtmlSanitizer for PatternSanitizer {
    fn sanitize(&self, html: &str) -> Result<SanitizedHtml, SanitizeError> {
        Self::clean(html).map(SanitizedHtml::new)
    }
}

/// Parse-and-allowlist sanitizer backed by `ammonia`.
///
/// Keeps `id`, `class` and `style` attributes and `<style>` elements so that
/// layout survives and the wrapper element can still be found by id.
pub struct AllowlistSanitizer {
    builder: ammonia::Builder<'static>,
}

impl AllowlistSanitizer {
    pub fn new() -> Self {
        let mut builder = ammonia::Builder::default();
        builder.add_tags(&["style", "section", "article", "header", "footer", "main", "nav"]);
        builder.rm_clean_content_tags(&["style"]);
        builder.add_generic_attributes(&["id", "class", "style"]);
        builder.add_generic_attribute_prefixes(&["data-"]);
        builder.clean_content_tags(HashSet::from(["script", "iframe"]));
        Self { builder }
    }
}

impl Default for AllowlistSanitizer {
    fn default() -> Self {
        Self::new()
    }
}

impl HtmlSanitizer for AllowlistSanitizer {
    fn sanitize(&self, html: &str) -> Result<SanitizedHtml, SanitizeError> {
        Ok(SanitizedHtml::new(self.builder.clean(html).to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;

    fn clean(html: &str) -> String {
        PatternSanitizer
            .sanitize(html)
            .expect("markup stabilises")
            .into_string()
    }

    /// `levels` script tags spliced into each other; each pass peels one.
    fn nested_scripts(levels: usize) -> String {
        format!(
            "{}<script></script>{}<p>ok</p>",
            "<scr".repeat(levels),
            "ipt></script>".repeat(levels)
        )
    }

    #[test]
    fn strips_script_spans_across_lines_and_casing() {
        let html = "<p>a</p><SCRIPT type=\"text/javascript\">\nalert(1);\n</ScRiPt><p>b</p>";
        assert_eq!(clean(html), "<p>a</p><p>b</p>");
    }

    #[test]
    fn strips_iframe_spans() {
        let html = "<div><IFRAME src=\"https://example.com\">\nfallback\n</iframe></div>";
        assert_eq!(clean(html), "<div></div>");
    }

    #[test]
    fn strips_event_handlers_in_both_quote_styles() {
        let html = r#"<img src="a.png" onerror="steal()"><a href="/" OnClick='go()'>x</a>"#;
        assert_eq!(clean(html), r#"<img src="a.png" ><a href="/" >x</a>"#);
    }

    #[test]
    fn removal_is_lazy_between_spans() {
        let html = "<script>a</script><p>keep</p><script>b</script>";
        assert_eq!(clean(html), "<p>keep</p>");
    }

    #[test]
    fn spliced_spans_are_removed_on_later_passes() {
        let html = "<scr<script></script>ipt>alert(1)</script><p>ok</p>";
        let out = clean(html);
        assert_eq!(out, "<p>ok</p>");
    }

    #[test]
    fn shallow_nesting_is_still_cleaned() {
        assert_eq!(clean(&nested_scripts(8)), "<p>ok</p>");
    }

    #[test]
    fn deep_nesting_is_rejected_quickly() {
        let html = nested_scripts(4000);
        let started_at = Instant::now();
        let result = PatternSanitizer.sanitize(&html);
        let elapsed = started_at.elapsed();

        assert!(
            matches!(result, Err(SanitizeError::Unstable { passes: MAX_REMOVAL_PASSES })),
            "{result:?}"
        );
        assert!(elapsed < Duration::from_secs(2), "took {elapsed:?}");
    }

    #[test]
    fn sanitizing_twice_changes_nothing() {
        let samples = [
            "<scr<script>x</script>ipt>y</script>",
            "<div o<script></script>nclick=\"x\">z</div>",
            "<iframe><script>a</script></iframe>tail",
            "<p onmouseover='a' onload=\"b\">text</p>",
            "plain text with no markup",
        ];
        for sample in samples {
            let once = clean(sample);
            assert_eq!(clean(&once), once, "not idempotent for {sample:?}");
        }
    }

    #[test]
    fn malformed_markup_passes_through() {
        let html = "<div><p>unclosed <b>bold<script>";
        assert_eq!(clean(html), html);
    }

    #[test]
    fn wrapper_and_styles_are_untouched() {
        let html = "<style>body{color:red}</style><div id=\"awesomewrap\">x</div>";
        assert_eq!(clean(html), html);
    }

    #[test]
    fn allowlist_drops_scripts_and_keeps_ids() {
        let sanitizer = AllowlistSanitizer::new();
        let out = sanitizer
            .sanitize("<div id=\"awesomewrap\" onclick=\"x()\">a<script>b</script></div>")
            .expect("allowlist never rejects")
            .into_string();
        assert!(out.contains("id=\"awesomewrap\""), "{out}");
        assert!(!out.contains("onclick"), "{out}");
        assert!(!out.contains("<script"), "{out}");
    }

    #[test]
    fn mode_selects_implementation() {
        let pattern = sanitizer_for(SanitizerMode::Pattern);
        let out = pattern.sanitize("<b onclick='x'>b</b>").expect("clean");
        assert_eq!(out.as_str(), "<b >b</b>");

        let allowlist = sanitizer_for(SanitizerMode::Allowlist);
        let out = allowlist.sanitize("<b onclick='x'>b</b>").expect("clean");
        assert_eq!(out.as_str(), "<b>b</b>");
    }
}
