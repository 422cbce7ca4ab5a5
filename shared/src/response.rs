use lambda_http::{
    http::{header::HeaderValue, response::Builder, StatusCode},
    Body, Response,
};
use serde::Serialize;

use crate::error::ApiResult;

/// Response builder with the JSON content type and CORS headers every
/// endpoint carries.
pub fn builder(status: StatusCode, origin: &str) -> Builder {
    let builder = Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", origin);

    if origin == "*" {
        builder
    } else {
        builder
            .header("Access-Control-Allow-Credentials", "true")
            .header("Vary", "Origin")
    }
}

/// `{ "success": true, "data": ... }`
pub fn data<T: Serialize>(status: StatusCode, origin: &str, data: &T) -> ApiResult<Response<Body>> {
    let body = serde_json::json!({
        "success": true,
        "data": data,
    });
    Ok(builder(status, origin).body(body.to_string().into())?)
}

/// `{ "success": true, "message": ... }`
pub fn message(status: StatusCode, origin: &str, message: &str) -> ApiResult<Response<Body>> {
    let body = serde_json::json!({
        "success": true,
        "message": message,
    });
    Ok(builder(status, origin).body(body.to_string().into())?)
}

/// CORS preflight
pub fn preflight(origin: &str) -> ApiResult<Response<Body>> {
    Ok(builder(StatusCode::OK, origin)
        .header(
            "Access-Control-Allow-Methods",
            "GET,POST,PUT,PATCH,DELETE,OPTIONS",
        )
        .header("Access-Control-Allow-Headers", "Content-Type,Authorization")
        .body(Body::Empty)?)
}

/// Attach a `Set-Cookie` header to an already built response.
pub fn with_cookie(mut response: Response<Body>, cookie: &str) -> ApiResult<Response<Body>> {
    let value: HeaderValue = cookie
        .parse()
        .map_err(lambda_http::http::Error::from)?;
    response.headers_mut().append("Set-Cookie", value);
    Ok(response)
}

/// Parse a JSON request body. Empty bodies parse as `{}` so handlers report
/// missing fields rather than a syntax error.
pub fn parse_body<T: serde::de::DeserializeOwned>(body: &[u8]) -> ApiResult<T> {
    let raw = if body.iter().all(|b| b.is_ascii_whitespace()) {
        &b"{}"[..]
    } else {
        body
    };
    serde_json::from_slice(raw).map_err(|e| {
        tracing::warn!("Failed to parse request body: {}", e);
        crate::error::ApiError::validation(format!("Invalid request body: {}", e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Probe {
        title: Option<String>,
    }

    #[test]
    fn test_empty_body_parses_as_object() {
        let probe: Probe = parse_body(b"").unwrap();
        assert!(probe.title.is_none());
    }

    #[test]
    fn test_malformed_body_is_validation_error() {
        let err = parse_body::<Probe>(b"{not json").err().unwrap();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_explicit_origin_allows_credentials() {
        let resp = message(StatusCode::OK, "https://app.example.org", "ok").unwrap();
        assert_eq!(
            resp.headers().get("Access-Control-Allow-Credentials").unwrap(),
            "true"
        );
    }
}
