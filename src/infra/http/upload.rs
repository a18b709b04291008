//! `POST /upload`: accept HTML, hand it to the conversion service, stream the PDF back.

use axum::{
    Extension, Form, Json,
    extract::{FromRequest, Request, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use axum_extra::extract::{Multipart, multipart::MultipartError};
use bytes::BytesMut;
use metrics::counter;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::{
    application::error::HttpError,
    domain::document::{PdfBytes, RawInput},
};

use super::{HttpState, middleware::RequestContext};

pub const METRIC_UPLOAD_REJECTED_TOTAL: &str = "htmlprint_upload_rejected_total";

pub const NO_CONTENT_MESSAGE: &str = "No HTML content provided.";
pub const TOO_LARGE_MESSAGE: &str = "HTML input exceeds the upload size limit.";
pub const MALFORMED_MESSAGE: &str = "Malformed request body.";

/// Allowance on top of the upload limit for boundaries and part headers.
pub(super) const ENVELOPE_HEADROOM_BYTES: usize = 64 * 1024;

const FILE_FIELD: &str = "htmlFile";
const TEXT_FIELD: &str = "htmlInput";
const PDF_DISPOSITION: &str = "attachment; filename=\"generated.pdf\"";
const SOURCE: &str = "infra::http::upload";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("request carried neither an html file nor html text")]
    Missing,
    #[error("request body exceeds {limit_bytes} bytes")]
    TooLarge { limit_bytes: usize },
    #[error("malformed request body: {detail}")]
    Malformed { detail: String },
}

impl UploadError {
    pub fn reason(&self) -> &'static str {
        match self {
            UploadError::Missing => "missing",
            UploadError::TooLarge { .. } => "too_large",
            UploadError::Malformed { .. } => "malformed",
        }
    }

    fn status_and_message(&self) -> (StatusCode, &'static str) {
        match self {
            UploadError::Missing => (StatusCode::BAD_REQUEST, NO_CONTENT_MESSAGE),
            UploadError::TooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, TOO_LARGE_MESSAGE),
            UploadError::Malformed { .. } => (StatusCode::BAD_REQUEST, MALFORMED_MESSAGE),
        }
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        counter!(METRIC_UPLOAD_REJECTED_TOTAL, "reason" => self.reason()).increment(1);
        let (status, message) = self.status_and_message();
        HttpError::from_error(SOURCE, status, message, &self).into_response()
    }
}

/// The HTML a client submitted, from whichever body encoding it used.
#[derive(Debug)]
pub struct HtmlSubmission(pub RawInput);

#[derive(Debug, Default, Deserialize)]
struct SubmissionBody {
    #[serde(rename = "htmlInput", default)]
    html_input: Option<String>,
}

impl SubmissionBody {
    fn into_input(self) -> Option<RawInput> {
        self.html_input
            .filter(|text| !text.is_empty())
            .map(RawInput::Text)
    }
}

enum BodyKind {
    Multipart,
    UrlEncoded,
    Json,
    Other,
}

fn body_kind(request: &Request) -> BodyKind {
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_ascii_lowercase())
        .unwrap_or_default();

    if content_type.starts_with("multipart/form-data") {
        BodyKind::Multipart
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        BodyKind::UrlEncoded
    } else if content_type.starts_with("application/json") {
        BodyKind::Json
    } else {
        BodyKind::Other
    }
}

fn rejection(status: StatusCode, detail: String, limit_bytes: usize) -> UploadError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        UploadError::TooLarge { limit_bytes }
    } else {
        UploadError::Malformed { detail }
    }
}

impl FromRequest<HttpState> for HtmlSubmission {
    type Rejection = UploadError;

    async fn from_request(request: Request, state: &HttpState) -> Result<Self, Self::Rejection> {
        let limit_bytes = state.upload_limit_bytes;

        let input = match body_kind(&request) {
            BodyKind::Multipart => {
                let mut multipart = Multipart::from_request(request, state)
                    .await
                    .map_err(|err| rejection(err.status(), err.body_text(), limit_bytes))?;
                read_multipart(&mut multipart, limit_bytes).await?
            }
            BodyKind::UrlEncoded => {
                let Form(body) = Form::<SubmissionBody>::from_request(request, state)
                    .await
                    .map_err(|err| rejection(err.status(), err.body_text(), limit_bytes))?;
                body.into_input()
            }
            BodyKind::Json => {
                let Json(body) = Json::<SubmissionBody>::from_request(request, state)
                    .await
                    .map_err(|err| rejection(err.status(), err.body_text(), limit_bytes))?;
                body.into_input()
            }
            BodyKind::Other => None,
        };

        match input {
            Some(input) if input.len() > limit_bytes => Err(UploadError::TooLarge { limit_bytes }),
            Some(input) => Ok(HtmlSubmission(input)),
            None => Err(UploadError::Missing),
        }
    }
}

/// Collect both fields; a chosen file wins over pasted text.
///
/// Browsers submit an empty, unnamed file part when nothing was chosen, which
/// counts as no file. File bytes are counted as they arrive and reading stops
/// once they pass `limit_bytes`.
async fn read_multipart(
    multipart: &mut Multipart,
    limit_bytes: usize,
) -> Result<Option<RawInput>, UploadError> {
    let malformed = |err: MultipartError| {
        rejection(err.status(), err.to_string(), limit_bytes)
    };
    let mut upload = None;
    let mut text = None;

    while let Some(mut field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some(FILE_FIELD) => {
                let file_name = field
                    .file_name()
                    .map(str::to_owned)
                    .filter(|value| !value.trim().is_empty());
                let mut bytes = BytesMut::new();
                while let Some(chunk) = field.chunk().await.map_err(malformed)? {
                    if bytes.len() + chunk.len() > limit_bytes {
                        return Err(UploadError::TooLarge { limit_bytes });
                    }
                    bytes.extend_from_slice(&chunk);
                }
                if file_name.is_some() || !bytes.is_empty() {
                    upload = Some(RawInput::Upload {
                        file_name,
                        bytes: bytes.freeze(),
                    });
                }
            }
            Some(TEXT_FIELD) => {
                let value = field.text().await.map_err(malformed)?;
                if !value.is_empty() {
                    text = Some(RawInput::Text(value));
                }
            }
            _ => {}
        }
    }

    Ok(upload.or(text))
}

pub(super) async fn upload(
    State(state): State<HttpState>,
    Extension(ctx): Extension<RequestContext>,
    HtmlSubmission(input): HtmlSubmission,
) -> Response {
    debug!(
        target = "htmlprint::http::upload",
        request_id = %ctx.request_id,
        input_kind = input.kind(),
        input_bytes = input.len(),
        "html submission received"
    );

    match state.conversions.convert(&ctx.request_id, input).await {
        Ok(rendered) => pdf_response(rendered.pdf),
        Err(err) => HttpError::from(err).into_response(),
    }
}

fn pdf_response(pdf: PdfBytes) -> Response {
    let len = pdf.len();
    let mut response = pdf.into_bytes().into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/pdf"),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_static(PDF_DISPOSITION),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_counts_as_absent() {
        let body = SubmissionBody {
            html_input: Some(String::new()),
        };
        assert!(body.into_input().is_none());
        assert!(SubmissionBody::default().into_input().is_none());
    }

    #[test]
    fn extractor_rejections_map_by_status() {
        assert!(matches!(
            rejection(StatusCode::PAYLOAD_TOO_LARGE, "length limit".to_string(), 8),
            UploadError::TooLarge { limit_bytes: 8 }
        ));
        assert!(matches!(
            rejection(StatusCode::UNPROCESSABLE_ENTITY, "bad json".to_string(), 8),
            UploadError::Malformed { .. }
        ));
    }

    #[test]
    fn rejection_statuses() {
        let cases = [
            (UploadError::Missing, StatusCode::BAD_REQUEST, NO_CONTENT_MESSAGE),
            (
                UploadError::TooLarge { limit_bytes: 10 },
                StatusCode::PAYLOAD_TOO_LARGE,
                TOO_LARGE_MESSAGE,
            ),
            (
                UploadError::Malformed {
                    detail: "bad boundary".to_string(),
                },
                StatusCode::BAD_REQUEST,
                MALFORMED_MESSAGE,
            ),
        ];
        for (error, status, message) in cases {
            assert_eq!(error.status_and_message(), (status, message));
        }
    }
}
