//! CORS headers and bodyless responses.

use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::Response;

/// Methods advertised to browsers.
const ALLOWED_METHODS: &str = "GET, POST, PUT, HEAD, OPTIONS";

/// Mirrors the request's origin and requested headers onto `response`.
///
/// Nothing is added when the request has no `origin`.
pub(crate) fn apply(request: &HeaderMap, response: &mut Response) {
    let Some(origin) = request.get(header::ORIGIN) else {
        return;
    };

    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    if let Some(requested) = request.get(header::ACCESS_CONTROL_REQUEST_HEADERS) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, requested.clone());
    }
}

/// An empty response with an explicit zero `Content-Length` and CORS headers.
pub(crate) fn empty(status: StatusCode, request: &HeaderMap) -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_LENGTH, HeaderValue::from_static("0"));
    apply(request, &mut response);
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_origin_no_cors_headers() {
        let response = empty(StatusCode::OK, &HeaderMap::new());
        assert!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .is_none()
        );
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "0");
    }

    #[test]
    fn origin_and_requested_headers_are_mirrored() {
        let mut request = HeaderMap::new();
        request.insert(header::ORIGIN, HeaderValue::from_static("http://localhost"));
        request.insert(
            header::ACCESS_CONTROL_REQUEST_HEADERS,
            HeaderValue::from_static("authorization, content-type"),
        );

        let response = empty(StatusCode::NO_CONTENT, &request);
        let headers = response.headers();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://localhost"
        );
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_METHODS],
            "GET, POST, PUT, HEAD, OPTIONS"
        );
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_HEADERS],
            "authorization, content-type"
        );
    }

    #[test]
    fn allow_headers_omitted_when_not_requested() {
        let mut request = HeaderMap::new();
        request.insert(header::ORIGIN, HeaderValue::from_static("capacitor://app"));
        let response = empty(StatusCode::OK, &request);
        assert!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_HEADERS)
                .is_none()
        );
    }
}
