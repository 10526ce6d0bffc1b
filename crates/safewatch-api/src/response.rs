//! Response envelope and error mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use safewatch_common::types::Pagination;
use safewatch_common::Error;
use safewatch_core::AlertError;
use serde::Serialize;
use tracing::{error, warn};

/// Result type returned by every resource operation
pub type ApiResult = Result<Response, ApiError>;

/// Success envelope: `{"success": true, "data"?, "message"?, "pagination"?}`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
    #[serde(skip)]
    status: StatusCode,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            pagination: None,
            status: StatusCode::OK,
        }
    }

    /// `201 Created` with the new record
    pub fn created(data: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            ..Self::ok(data)
        }
    }

    pub fn paginated(data: T, pagination: Pagination) -> Self {
        Self {
            pagination: Some(pagination),
            ..Self::ok(data)
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl ApiResponse<()> {
    /// Envelope carrying only a message
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            message: Some(message.into()),
            pagination: None,
            status: StatusCode::OK,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// Error body: `{"error": message, "code": CODE}`
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
}

/// Error returned from handlers; the status follows the error kind
#[derive(Debug)]
pub struct ApiError(pub Error);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl From<AlertError> for ApiError {
    fn from(err: AlertError) -> Self {
        ApiError(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(code = self.0.code(), "Request failed: {}", self.0);
        } else {
            warn!(code = self.0.code(), status = status.as_u16(), "Request rejected: {}", self.0);
        }

        let body = ErrorBody {
            error: self.0.to_string(),
            code: self.0.code().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use safewatch_common::types::PageParams;

    #[test]
    fn test_envelope_skips_empty_fields() {
        let json = serde_json::to_value(ApiResponse::ok(vec![1, 2])).unwrap();
        assert_eq!(json, serde_json::json!({"success": true, "data": [1, 2]}));

        let json = serde_json::to_value(ApiResponse::message("SMS alert deleted")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"success": true, "message": "SMS alert deleted"})
        );
    }

    #[test]
    fn test_paginated_envelope() {
        let pagination = Pagination::new(PageParams::new(Some(1), Some(2)), 3);
        let json = serde_json::to_value(ApiResponse::paginated(vec!["a", "b"], pagination)).unwrap();
        assert_eq!(json["pagination"]["total_pages"], 2);
        assert_eq!(json["pagination"]["total_records"], 3);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiResponse::created(1).into_response().status(), StatusCode::CREATED);
        assert_eq!(
            ApiError(Error::validation("bad")).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(AlertError::NotDeletable).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(ApiError::from(AlertError::NotFound).status(), StatusCode::NOT_FOUND);
    }
}
