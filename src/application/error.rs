use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    application::{convert::ConvertError, renderer::RenderError, sanitize::SanitizeError},
    infra::error::InfraError,
};

pub const BROWSER_UNAVAILABLE_MESSAGE: &str = "Chromium executable not found.";
pub const RENDER_FAILED_MESSAGE: &str = "Error processing HTML to PDF.";
pub const UNSAFE_MARKUP_MESSAGE: &str = "HTML input could not be sanitized.";

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// Error response with a fixed public message and a private diagnostic report.
#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: &'static str,
    report: ErrorReport,
}

impl HttpError {
    pub fn new(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        let report = ErrorReport::from_message(source, status, detail);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        error: &dyn StdError,
    ) -> Self {
        let report = ErrorReport::from_error(source, status, error);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn public_message(&self) -> &'static str {
        self.public_message
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.public_message).into_response();
        self.report.attach(&mut response);
        response
    }
}

impl From<RenderError> for HttpError {
    fn from(error: RenderError) -> Self {
        let public_message = match error {
            RenderError::BrowserUnavailable { .. } => BROWSER_UNAVAILABLE_MESSAGE,
            _ => RENDER_FAILED_MESSAGE,
        };
        HttpError::from_error(
            "application::error::render_error_to_http_error",
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

impl From<ConvertError> for HttpError {
    fn from(error: ConvertError) -> Self {
        match error {
            ConvertError::Render(error) => HttpError::from(error),
            ConvertError::Sanitize(error @ SanitizeError::Unstable { .. }) => HttpError::from_error(
                "application::error::convert_error_to_http_error",
                StatusCode::BAD_REQUEST,
                UNSAFE_MARKUP_MESSAGE,
                &error,
            ),
            ConvertError::Sanitize(error @ SanitizeError::Worker { .. }) => HttpError::from_error(
                "application::error::convert_error_to_http_error",
                StatusCode::INTERNAL_SERVER_ERROR,
                RENDER_FAILED_MESSAGE,
                &error,
            ),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Convert(#[from] ConvertError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}
