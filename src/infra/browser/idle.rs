//! Page-load settling based on Chromium lifecycle events.

use futures::{Stream, StreamExt};

use crate::application::renderer::RenderError;

/// Lifecycle event Chromium emits when a document is (re)opened.
const DOCUMENT_RESET_EVENT: &str = "init";

/// Wait until `target` is observed after the document reset.
///
/// Writing new content with `document.open()` restarts the frame lifecycle
/// with `init`; events seen before that belong to the previous document and
/// are ignored.
pub async fn wait_for_lifecycle<S>(events: &mut S, target: &str) -> Result<(), RenderError>
where
    S: Stream<Item = String> + Unpin,
{
    let mut reset_seen = false;
    while let Some(name) = events.next().await {
        if name == DOCUMENT_RESET_EVENT {
            reset_seen = true;
        } else if reset_seen && name == target {
            return Ok(());
        }
    }

    Err(RenderError::page_load(
        "lifecycle event stream ended before the page settled",
    ))
}
