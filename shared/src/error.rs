use lambda_http::{http::StatusCode, Body, Error, Response};
use thiserror::Error;

use crate::password::PasswordError;
use crate::response;
use crate::store::StoreError;
use crate::token::TokenError;

/// Every failure a handler can surface. Converted to a JSON envelope at the
/// request boundary by [`ApiError::into_response`].
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Method {method} Not Allowed")]
    MethodNotAllowed {
        method: String,
        allow: &'static [&'static str],
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    #[error("Password error: {0}")]
    Password(#[from] PasswordError),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Response error: {0}")]
    Http(#[from] lambda_http::http::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::Storage(_)
            | Self::Token(_)
            | Self::Password(_)
            | Self::Json(_)
            | Self::Http(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message sent to the client. Server-side failures are reduced to a
    /// generic message; the detail only goes to the log.
    pub fn public_message(&self) -> String {
        match self.status() {
            StatusCode::INTERNAL_SERVER_ERROR => "Server error".to_string(),
            _ => self.to_string(),
        }
    }

    pub fn into_response(self, origin: &str) -> Result<Response<Body>, Error> {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::info!("Request rejected ({}): {}", status.as_u16(), self);
        }

        let mut builder = response::builder(status, origin);
        if let Self::MethodNotAllowed { allow, .. } = &self {
            builder = builder.header("Allow", allow.join(", "));
        }

        let body = serde_json::json!({
            "success": false,
            "message": self.public_message(),
        });
        Ok(builder.body(body.to_string().into())?)
    }
}
