//! Session guard: the role gate run synchronously before every protected
//! operation. Extracts the token cookie, verifies it, and requires an exact
//! role match — roles are flat, so ADMIN does not pass MANAGER-only gates or
//! vice versa.

use axum::http::HeaderMap;

use super::token::{Claims, TokenService};
use crate::error::{AppError, AppResult};
use crate::store::Role;

/// Exact cookie name carrying the session token.
pub const AUTH_COOKIE: &str = "auth-token";

/// Pull a named cookie value out of the request headers.
pub fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie = headers.get("cookie").or_else(|| headers.get("Cookie"))?;
    let s = cookie.to_str().ok()?;
    for part in s.split(';') {
        let p = part.trim();
        if let Some(eq) = p.find('=') {
            let (k, v) = p.split_at(eq);
            if k == name {
                return Some(v[1..].to_string());
            }
        }
    }
    None
}

/// Gate a request on a required role. Returns the verified claims so the
/// caller can act on the requester's identity (e.g. self-delete prevention).
pub fn authorize(headers: &HeaderMap, required: Role, tokens: &TokenService) -> AppResult<Claims> {
    let Some(token) = parse_cookie(headers, AUTH_COOKIE) else {
        return Err(AppError::auth("no_token", "No token provided"));
    };
    let Some(claims) = tokens.verify(&token) else {
        return Err(AppError::auth("invalid_token", "Invalid token"));
    };
    if claims.role != required {
        return Err(AppError::forbidden(
            "insufficient_role",
            format!("{} access required", required.as_str()),
        ));
    }
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn parse_cookie_finds_value_among_many() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "cookie",
            HeaderValue::from_static("theme=dark; auth-token=abc.def.ghi; lang=en"),
        );
        assert_eq!(parse_cookie(&headers, AUTH_COOKIE).as_deref(), Some("abc.def.ghi"));
        assert_eq!(parse_cookie(&headers, "lang").as_deref(), Some("en"));
        assert_eq!(parse_cookie(&headers, "missing"), None);
    }

    #[test]
    fn missing_cookie_header_yields_none() {
        let headers = HeaderMap::new();
        assert_eq!(parse_cookie(&headers, AUTH_COOKIE), None);
    }
}
