use axum::body::Body;
use http::{header, HeaderValue, Response, StatusCode};
use tower_governor::GovernorError;

/// Error handler for the per-IP API limiter. Uses the same JSON shape as
/// `AppError` so clients only have one error format to handle.
pub fn rejection_response(error: GovernorError) -> Response<Body> {
    let (status, code, message, retry_after, extra_headers) = match error {
        GovernorError::TooManyRequests { wait_time, headers } => (
            StatusCode::TOO_MANY_REQUESTS,
            "RATE_LIMITED",
            "Rate limit exceeded".to_string(),
            Some(wait_time),
            headers,
        ),
        GovernorError::UnableToExtractKey => (
            StatusCode::BAD_REQUEST,
            "BAD_REQUEST",
            "Unable to determine client IP for rate limiting".to_string(),
            None,
            None,
        ),
        GovernorError::Other { code, msg, headers } => (
            StatusCode::from_u16(code.as_u16()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            "RATE_LIMIT_ERROR",
            msg.unwrap_or_else(|| "Rate limiting error".to_string()),
            None,
            headers,
        ),
    };

    let body = serde_json::json!({
        "error": { "code": code, "message": message }
    })
    .to_string();

    let mut resp = Response::new(Body::from(body));
    *resp.status_mut() = status;
    resp.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );

    if let Some(hmap) = extra_headers {
        for (name, value) in hmap.iter() {
            resp.headers_mut().append(name.clone(), value.clone());
        }
    }

    if let Some(seconds) = retry_after {
        resp.headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(seconds));
    }

    resp
}
