//! The `jwt` session cookie.
//!
//! HTTP-only, `SameSite=Strict`, scoped to `/`, valid for one week.
//! `Secure` is added when the gateway is configured for HTTPS.

use axum::http::HeaderMap;
use axum::http::header::COOKIE;

pub const SESSION_COOKIE: &str = "jwt";

/// One week, in seconds.
pub const SESSION_MAX_AGE_SECS: u64 = 60 * 60 * 24 * 7;

/// `Set-Cookie` value that stores `token`.
pub fn session_cookie(token: &str, secure: bool) -> String {
    build(token, SESSION_MAX_AGE_SECS, secure)
}

/// `Set-Cookie` value that removes the session cookie.
pub fn expired_cookie(secure: bool) -> String {
    build("", 0, secure)
}

fn build(value: &str, max_age: u64, secure: bool) -> String {
    let mut cookie =
        format!("{SESSION_COOKIE}={value}; HttpOnly; SameSite=Strict; Path=/; Max-Age={max_age}");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// The session token from the request's `Cookie` headers, if present and
/// non-empty.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(cookies: &[&str]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for cookie in cookies {
            map.append(COOKIE, HeaderValue::from_str(cookie).unwrap());
        }
        map
    }

    #[test]
    fn test_session_cookie_attributes() {
        assert_eq!(
            session_cookie("abc.def", false),
            "jwt=abc.def; HttpOnly; SameSite=Strict; Path=/; Max-Age=604800"
        );
        assert!(session_cookie("abc", true).ends_with("; Secure"));
    }

    #[test]
    fn test_expired_cookie_clears_value() {
        assert_eq!(
            expired_cookie(false),
            "jwt=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0"
        );
    }

    #[test]
    fn test_token_found_among_other_cookies() {
        let map = headers(&["theme=dark; jwt=tok-1; lang=en"]);
        assert_eq!(session_token(&map).as_deref(), Some("tok-1"));
    }

    #[test]
    fn test_token_in_second_cookie_header() {
        let map = headers(&["theme=dark", "jwt=tok-2"]);
        assert_eq!(session_token(&map).as_deref(), Some("tok-2"));
    }

    #[test]
    fn test_missing_or_empty_token() {
        assert!(session_token(&HeaderMap::new()).is_none());
        assert!(session_token(&headers(&["jwt="])).is_none());
        assert!(session_token(&headers(&["notjwt=x"])).is_none());
    }
}
