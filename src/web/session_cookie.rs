//! The cookie that ties a browser to its server-side session.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::auth::models::SessionId;

pub const SESSION_COOKIE: &str = "dryer_session";

/// The browser's session id. A missing or malformed cookie means none.
pub fn session_id(jar: &CookieJar) -> Option<SessionId> {
    jar.get(SESSION_COOKIE)?.value().parse().ok()
}

pub fn issue(jar: CookieJar, sid: SessionId) -> CookieJar {
    jar.add(
        Cookie::build((SESSION_COOKIE, sid.to_string()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax),
    )
}

pub fn clear(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
}
