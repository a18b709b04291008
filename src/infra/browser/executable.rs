//! Chromium executable discovery.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::application::renderer::RenderError;

/// Executable names looked up on `PATH`, in order, when no path is configured.
pub const EXECUTABLE_CANDIDATES: [&str; 6] = [
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
    "chrome",
    "headless_shell",
];

/// Resolve the browser executable for one render session.
///
/// A configured value wins: an existing file is used as-is and a bare name is
/// looked up on `PATH`. Without one, the well-known names are tried in order.
pub fn resolve_executable(configured: Option<&Path>) -> Result<PathBuf, RenderError> {
    match configured {
        Some(path) => resolve_configured(path),
        None => EXECUTABLE_CANDIDATES
            .iter()
            .find_map(|name| which::which(name).ok())
            .inspect(|path| {
                debug!(
                    target = "htmlprint::browser::executable",
                    path = %path.display(),
                    "discovered browser executable on PATH"
                );
            })
            .ok_or_else(|| {
                RenderError::browser_unavailable(format!(
                    "none of {} found on PATH",
                    EXECUTABLE_CANDIDATES.join(", ")
                ))
            }),
    }
}

fn resolve_configured(path: &Path) -> Result<PathBuf, RenderError> {
    if path.is_file() {
        return Ok(path.to_path_buf());
    }

    let is_bare_name = path.components().count() == 1 && path.parent() == Some(Path::new(""));
    if is_bare_name {
        if let Ok(found) = which::which(path) {
            return Ok(found);
        }
    }

    Err(RenderError::browser_unavailable(format!(
        "configured browser executable `{}` does not exist",
        path.display()
    )))
}
