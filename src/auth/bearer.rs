//! Bearer credential parsing.

use axum::http::{HeaderMap, header};

/// Raw value of the `Authorization` header, if present and valid ASCII.
pub fn authorization_header(headers: &HeaderMap) -> Option<&str> {
    headers.get(header::AUTHORIZATION)?.to_str().ok()
}

/// Extract the token from an `Authorization: Bearer <token>` value.
///
/// Returns `None` for another scheme or an empty token.
pub fn parse_bearer(value: &str) -> Option<&str> {
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() || token.contains(char::is_whitespace) {
        return None;
    }
    Some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_header_simple() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer abc.def.ghi"),
        );

        let value = authorization_header(&headers);
        assert_eq!(value.and_then(parse_bearer), Some("abc.def.ghi"));
    }

    #[test]
    fn test_header_no_header() {
        let headers = HeaderMap::new();
        assert_eq!(authorization_header(&headers), None);
    }

    #[test]
    fn test_other_scheme_rejected() {
        assert_eq!(parse_bearer("Basic dXNlcjpwYXNz"), None);
        assert_eq!(parse_bearer("bearer abc"), None);
        assert_eq!(parse_bearer("abc"), None);
    }

    #[test]
    fn test_empty_or_split_token_rejected() {
        assert_eq!(parse_bearer("Bearer "), None);
        assert_eq!(parse_bearer("Bearer    "), None);
        assert_eq!(parse_bearer("Bearer abc def"), None);
    }

    #[test]
    fn test_surrounding_spaces_trimmed() {
        assert_eq!(parse_bearer("Bearer  abc  "), Some("abc"));
    }
}
