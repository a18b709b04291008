mod middleware;
mod upload;

pub use middleware::{HttpsRedirect, RequestContext};
pub use upload::{
    HtmlSubmission, MALFORMED_MESSAGE, METRIC_UPLOAD_REJECTED_TOTAL, NO_CONTENT_MESSAGE,
    TOO_LARGE_MESSAGE, UploadError,
};

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
};

use crate::{application::convert::ConversionService, config::Settings, infra::assets};

use middleware::{https_redirect, log_responses, set_request_context};

#[derive(Clone)]
pub struct HttpState {
    pub conversions: ConversionService,
    pub upload_limit_bytes: usize,
    pub production: bool,
}

impl HttpState {
    pub fn new(settings: &Settings, conversions: ConversionService) -> Self {
        Self {
            conversions,
            upload_limit_bytes: settings.uploads.limit_bytes(),
            production: settings.server.production,
        }
    }
}

/// Assemble the public router.
///
/// Hosting runtimes that own the listener (production mode) mount the
/// returned router themselves.
pub fn build_router(state: HttpState) -> Router {
    let redirect = HttpsRedirect {
        enabled: state.production,
    };
    // The HTML itself is checked against the limit while reading; the body
    // limit only has to leave room for the multipart envelope around it.
    let upload_limit = DefaultBodyLimit::max(
        state
            .upload_limit_bytes
            .saturating_add(upload::ENVELOPE_HEADROOM_BYTES),
    );

    Router::new()
        .route("/", get(assets::serve_index))
        .route("/upload", post(upload::upload).layer(upload_limit))
        .fallback(assets::serve_public)
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
        .layer(axum_middleware::from_fn_with_state(redirect, https_redirect))
}
