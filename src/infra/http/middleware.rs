use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;

const FORWARDED_PROTO_HEADER: &str = "x-forwarded-proto";

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let ctx = RequestContext {
        request_id: request_id.clone(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(ctx);
    response
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status();

    if status.is_client_error() || status.is_server_error() {
        let elapsed_ms = start.elapsed().as_millis();
        let report = response.extensions_mut().remove::<ErrorReport>();
        let (source, messages) = match report {
            Some(report) => (report.source, report.messages),
            None => ("unknown", Vec::new()),
        };
        let detail = messages
            .first()
            .cloned()
            .unwrap_or_else(|| "no diagnostic available".to_string());

        if status.is_server_error() {
            error!(
                target = "htmlprint::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                "request failed",
            );
        } else {
            warn!(
                target = "htmlprint::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                request_id = request_id,
                "client request error",
            );
        }
    }

    response
}

/// Whether plain-HTTP requests seen through a proxy get bounced to HTTPS.
#[derive(Debug, Clone, Copy)]
pub struct HttpsRedirect {
    pub enabled: bool,
}

pub async fn https_redirect(
    State(policy): State<HttpsRedirect>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if policy.enabled {
        if let Some(location) = https_location(&request) {
            debug!(
                target = "htmlprint::http::redirect",
                location = ?location,
                "redirecting forwarded plain-http request"
            );
            return (StatusCode::FOUND, [(header::LOCATION, location)]).into_response();
        }
    }

    next.run(request).await
}

/// `None` when the request is already HTTPS, was not forwarded, or has no
/// usable `Host`.
fn https_location(request: &Request<Body>) -> Option<HeaderValue> {
    let proto = request.headers().get(FORWARDED_PROTO_HEADER)?.to_str().ok()?;
    // Proxy chains append; the first entry is the client-facing scheme.
    let client_proto = proto.split(',').next().unwrap_or_default().trim();
    if client_proto.eq_ignore_ascii_case("https") {
        return None;
    }

    let host = request.headers().get(header::HOST)?.to_str().ok()?;
    if host.is_empty() {
        return None;
    }
    let path = request
        .uri()
        .path_and_query()
        .map(|value| value.as_str())
        .unwrap_or("/");

    HeaderValue::from_str(&format!("https://{host}{path}")).ok()
}
