//! Security headers for HTTP responses

use warp::http::{header, HeaderValue};
use warp::reply::Response;

/// Strict Content Security Policy for API endpoints
const STRICT_CSP: &str = "default-src 'none'; frame-ancestors 'none';";

const PERMISSIONS_POLICY: &str = "geolocation=(), microphone=(), camera=(), payment=(), usb=()";

/// Add API security headers to a response. Responses carry tokens and
/// private gallery data, so nothing may be cached.
pub fn add_api_security_headers(mut response: Response) -> Response {
    let headers = response.headers_mut();

    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(header::REFERRER_POLICY, HeaderValue::from_static("no-referrer"));
    headers.insert(header::CONTENT_SECURITY_POLICY, HeaderValue::from_static(STRICT_CSP));
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    headers.insert("permissions-policy", HeaderValue::from_static(PERMISSIONS_POLICY));

    // Remove server information disclosure
    headers.remove(header::SERVER);

    response
}
