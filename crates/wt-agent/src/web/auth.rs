//! HTTP basic auth for the UI shell

use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Realm announced in the basic auth challenge
pub const AUTH_REALM: &str = "Authorization Required";

/// Whether `headers` carry basic credentials equal to `username`/`password`.
pub fn basic_auth_matches(headers: &HeaderMap, username: &str, password: &str) -> bool {
    let Some(value) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    else {
        return false;
    };

    let Some(encoded) = value
        .strip_prefix("Basic ")
        .or_else(|| value.strip_prefix("basic "))
    else {
        return false;
    };

    let Ok(decoded) = STANDARD.decode(encoded.trim()) else {
        return false;
    };
    let Ok(decoded) = String::from_utf8(decoded) else {
        return false;
    };

    match decoded.split_once(':') {
        Some((user, pass)) => user == username && pass == password,
        None => false,
    }
}

/// 401 response asking the browser for credentials
pub(crate) fn challenge() -> Response {
    let mut response = StatusCode::UNAUTHORIZED.into_response();
    if let Ok(value) = HeaderValue::from_str(&format!("Basic realm=\"{}\"", AUTH_REALM)) {
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with(user: &str, pass: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let token = STANDARD.encode(format!("{}:{}", user, pass));
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Basic {}", token)).unwrap(),
        );
        headers
    }

    #[test]
    fn test_matching_credentials() {
        assert!(basic_auth_matches(&headers_with("admin", "s3:cret"), "admin", "s3:cret"));
    }

    #[test]
    fn test_wrong_credentials() {
        assert!(!basic_auth_matches(&headers_with("admin", "nope"), "admin", "secret"));
        assert!(!basic_auth_matches(&headers_with("root", "secret"), "admin", "secret"));
        assert!(!basic_auth_matches(&HeaderMap::new(), "admin", "secret"));
    }

    #[test]
    fn test_malformed_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic !!!"));
        assert!(!basic_auth_matches(&headers, "admin", "secret"));
    }

    #[test]
    fn test_challenge_has_realm() {
        let response = challenge();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers()[header::WWW_AUTHENTICATE],
            "Basic realm=\"Authorization Required\""
        );
    }
}
