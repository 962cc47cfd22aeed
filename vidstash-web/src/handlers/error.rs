//! Mapping of core failures onto HTTP responses

use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use vidstash_core::ingest::IngestError;
use vidstash_core::storage::StorageError;
use vidstash_core::streaming::StreamingError;
use vidstash_core::transcode::TranscodeError;
use vidstash_core::{ErrorCode, VidstashError};

/// Response header carrying the machine-readable failure class.
pub const ERROR_CODE_HEADER: &str = "x-vidstash-error";

/// A failed request: status, stable code and a plain text reason.
#[derive(Debug)]
pub struct ApiError {
    code: ErrorCode,
    message: String,
    content_range: Option<String>,
}

impl ApiError {
    /// Creates an error of class `code` with a textual reason.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            content_range: None,
        }
    }

    /// Failure class of this error.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        status_for(self.code)
    }
}

/// HTTP status used for each failure class.
pub fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::InvalidRequest | ErrorCode::InvalidRange => StatusCode::BAD_REQUEST,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::RangeNotSatisfiable => StatusCode::RANGE_NOT_SATISFIABLE,
        ErrorCode::IoFailure | ErrorCode::UpstreamFailure => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorCode::Timeout => StatusCode::GATEWAY_TIMEOUT,
    }
}

impl From<VidstashError> for ApiError {
    fn from(error: VidstashError) -> Self {
        Self::new(error.code(), error.user_message())
    }
}

impl From<StorageError> for ApiError {
    fn from(error: StorageError) -> Self {
        VidstashError::from(error).into()
    }
}

impl From<StreamingError> for ApiError {
    fn from(error: StreamingError) -> Self {
        match error {
            StreamingError::Storage(e) => e.into(),
            StreamingError::Range { total_size, source } => {
                let mut api_error = Self::new(source.code(), source.to_string());
                if api_error.code == ErrorCode::RangeNotSatisfiable {
                    api_error.content_range = Some(format!("bytes */{total_size}"));
                }
                api_error
            }
        }
    }
}

impl From<IngestError> for ApiError {
    fn from(error: IngestError) -> Self {
        match error {
            IngestError::Storage(e) => e.into(),
            other => Self::new(other.code(), other.to_string()),
        }
    }
}

impl From<TranscodeError> for ApiError {
    fn from(error: TranscodeError) -> Self {
        match error {
            TranscodeError::Storage(e) => e.into(),
            other => Self::new(other.code(), other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(
            ErrorCode::InvalidRequest,
            format!("Invalid JSON body: {}", rejection.body_text()),
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!("Request failed with {} ({}): {}", status, self.code, self.message);
        } else {
            tracing::debug!("Request rejected with {} ({}): {}", status, self.code, self.message);
        }

        let mut response = (status, self.message).into_response();
        let headers = response.headers_mut();
        headers.insert(ERROR_CODE_HEADER, HeaderValue::from_static(self.code.as_str()));
        if let Some(value) = self
            .content_range
            .and_then(|range| HeaderValue::from_str(&range).ok())
        {
            headers.insert(header::CONTENT_RANGE, value);
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use vidstash_core::streaming::RangeError;

    use super::*;

    #[test]
    fn test_not_found_uses_plain_message() {
        let error = ApiError::from(StorageError::NotFound {
            filename: "gone.mp4".to_string(),
        });
        assert_eq!(error.status(), StatusCode::NOT_FOUND);

        let response = error.into_response();
        assert_eq!(response.headers()[ERROR_CODE_HEADER], "not_found");
    }

    #[test]
    fn test_unsatisfiable_range_reports_total() {
        let error = ApiError::from(StreamingError::Range {
            total_size: 1000,
            source: RangeError::NotSatisfiable {
                start: 1000,
                total_size: 1000,
            },
        });

        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes */1000");
        assert_eq!(
            response.headers()[ERROR_CODE_HEADER],
            "range_not_satisfiable"
        );
    }

    #[test]
    fn test_status_per_code() {
        assert_eq!(status_for(ErrorCode::InvalidRange), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorCode::UpstreamFailure), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(status_for(ErrorCode::Timeout), StatusCode::GATEWAY_TIMEOUT);
    }
}
