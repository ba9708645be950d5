//! Session cookies: `token` (access) and `refreshToken` (refresh).

use actix_web::cookie::{time::Duration, Cookie, SameSite};
use actix_web::HttpResponseBuilder;

use crate::config::AuthConfig;
use crate::services::auth_service::SessionTokens;

pub const ACCESS_COOKIE: &str = "token";
pub const REFRESH_COOKIE: &str = "refreshToken";

fn session_cookie(name: &'static str, value: String, max_age_secs: i64, secure: bool) -> Cookie<'static> {
    Cookie::build(name, value)
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .path("/")
        .max_age(Duration::seconds(max_age_secs))
        .finish()
}

pub fn access_cookie(token: String, config: &AuthConfig) -> Cookie<'static> {
    session_cookie(ACCESS_COOKIE, token, config.access_ttl_secs, config.secure_cookies)
}

pub fn refresh_cookie(token: String, config: &AuthConfig) -> Cookie<'static> {
    session_cookie(REFRESH_COOKIE, token, config.refresh_ttl_secs, config.secure_cookies)
}

/// Cookie instructing the client to drop `name`.
pub fn removal_cookie(name: &'static str, config: &AuthConfig) -> Cookie<'static> {
    let mut cookie = session_cookie(name, String::new(), 0, config.secure_cookies);
    cookie.make_removal();
    cookie
}

/// Attach both session cookies to a response.
pub fn set_session(builder: &mut HttpResponseBuilder, tokens: SessionTokens, config: &AuthConfig) {
    builder
        .cookie(access_cookie(tokens.access, config))
        .cookie(refresh_cookie(tokens.refresh, config));
}

pub fn clear_session(builder: &mut HttpResponseBuilder, config: &AuthConfig) {
    builder
        .cookie(removal_cookie(ACCESS_COOKIE, config))
        .cookie(removal_cookie(REFRESH_COOKIE, config));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(secure: bool) -> AuthConfig {
        let mut config = AuthConfig::new("a".repeat(32), "r".repeat(32));
        config.secure_cookies = secure;
        config
    }

    #[test]
    fn test_access_cookie_flags() {
        let cookie = access_cookie("abc".to_string(), &config(false));
        assert_eq!(cookie.name(), "token");
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        assert_eq!(cookie.secure(), Some(false));
        assert_eq!(cookie.max_age(), Some(Duration::days(7)));
    }

    #[test]
    fn test_refresh_cookie_is_secure_in_production() {
        let cookie = refresh_cookie("xyz".to_string(), &config(true));
        assert_eq!(cookie.name(), "refreshToken");
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.max_age(), Some(Duration::days(30)));
    }

    #[test]
    fn test_removal_cookie_expires_immediately() {
        let cookie = removal_cookie(ACCESS_COOKIE, &config(false));
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(Duration::ZERO));
    }
}
