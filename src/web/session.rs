//! Viewer identity and browser-persisted preferences.
//!
//! The platform owns sessions; this module only carries the platform's
//! access token in an HttpOnly cookie and resolves it back to a user on
//! each request. The theme preference and the cached avatar URL live in
//! two fixed cookie keys.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::HeaderMap, request::Parts, StatusCode},
    response::{IntoResponse, Redirect, Response},
};

use super::AppState;
use crate::platform::auth::AuthUser;

/// Platform access token.
pub const SESSION_COOKIE: &str = "session";
/// Theme preference, one of `light` / `dark` / `system`.
pub const THEME_COOKIE: &str = "korekushon.theme";
/// Cached avatar URL so the nav can render it without a profile read.
pub const AVATAR_COOKIE: &str = "korekushon.avatarUrl";

/// Pull one cookie value out of the Cookie header.
#[must_use]
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookies = headers.get("cookie")?.to_str().ok()?;
    cookies.split(';').find_map(|cookie| {
        let cookie = cookie.trim();
        cookie
            .strip_prefix(name)
            .and_then(|rest| rest.strip_prefix('='))
            .map(str::to_string)
    })
}

// ========== Theme ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

impl Theme {
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "light" => Self::Light,
            "dark" => Self::Dark,
            _ => Self::System,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
            Self::System => "system",
        }
    }
}

/// The viewer's saved theme preference; `System` when the cookie is absent.
#[derive(Debug, Clone, Copy)]
pub struct ThemePref(pub Theme);

#[async_trait]
impl<S> FromRequestParts<S> for ThemePref
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let theme = cookie_value(&parts.headers, THEME_COOKIE)
            .map(|v| Theme::parse(&v))
            .unwrap_or_default();
        Ok(Self(theme))
    }
}

// ========== Viewer ==========

/// A signed-in visitor: the platform's user plus what the UI needs to know
/// about them.
#[derive(Debug, Clone)]
pub struct Viewer {
    pub user: AuthUser,
    pub access_token: String,
    pub is_admin: bool,
    pub avatar_url: Option<String>,
}

impl Viewer {
    #[must_use]
    pub fn display_name(&self) -> String {
        self.user.display_name()
    }
}

/// Current viewer (if any). Use when authentication is optional.
#[derive(Debug, Clone)]
pub struct MaybeViewer(pub Option<Viewer>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeViewer
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);

        let Some(token) = cookie_value(&parts.headers, SESSION_COOKIE) else {
            return Ok(Self(None));
        };

        // An expired or revoked token is an anonymous visitor, not an error.
        let user = match state.store.platform().get_user(&token).await {
            Ok(Some(user)) => user,
            Ok(None) => return Ok(Self(None)),
            Err(e) => {
                tracing::error!("Failed to resolve session user: {e}");
                return Ok(Self(None));
            }
        };

        let is_admin = user
            .email
            .as_deref()
            .is_some_and(|email| state.config.is_admin_email(email));
        let avatar_url = cookie_value(&parts.headers, AVATAR_COOKIE)
            .map(|v| urlencoding::decode(&v).map_or_else(|_| v.clone(), |d| d.into_owned()))
            .or_else(|| user.avatar_url().map(str::to_string));

        Ok(Self(Some(Viewer {
            user,
            access_token: token,
            is_admin,
            avatar_url,
        })))
    }
}

/// Current viewer (required). Redirects anonymous visitors to the login page.
#[derive(Debug, Clone)]
pub struct RequireViewer(pub Viewer);

#[async_trait]
impl<S> FromRequestParts<S> for RequireViewer
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let MaybeViewer(viewer) = MaybeViewer::from_request_parts(parts, state).await?;
        match viewer {
            Some(viewer) => Ok(Self(viewer)),
            None => Err(Redirect::to("/login").into_response()),
        }
    }
}

/// Require the configured admin. Returns 403 for everyone else.
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub Viewer);

#[async_trait]
impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let RequireViewer(viewer) = RequireViewer::from_request_parts(parts, state).await?;
        if !viewer.is_admin {
            return Err((StatusCode::FORBIDDEN, "管理者のみの操作です").into_response());
        }
        Ok(Self(viewer))
    }
}

// ========== Set-Cookie builders ==========

#[must_use]
pub fn session_cookie(access_token: &str, max_age_secs: i64) -> String {
    format!(
        "{SESSION_COOKIE}={access_token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}"
    )
}

#[must_use]
pub fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

#[must_use]
pub fn theme_cookie(theme: Theme) -> String {
    format!(
        "{THEME_COOKIE}={}; Path=/; SameSite=Lax; Max-Age=31536000",
        theme.as_str()
    )
}

#[must_use]
pub fn avatar_cookie(url: &str) -> String {
    format!(
        "{AVATAR_COOKIE}={}; Path=/; SameSite=Lax; Max-Age=31536000",
        urlencoding::encode(url)
    )
}

#[must_use]
pub fn clear_avatar_cookie() -> String {
    format!("{AVATAR_COOKIE}=; Path=/; SameSite=Lax; Max-Age=0")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with_cookie(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("cookie", HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_cookie_value_finds_named_cookie() {
        let headers = headers_with_cookie("a=1; session=tok-123; korekushon.theme=dark");
        assert_eq!(
            cookie_value(&headers, SESSION_COOKIE),
            Some("tok-123".to_string())
        );
        assert_eq!(
            cookie_value(&headers, THEME_COOKIE),
            Some("dark".to_string())
        );
        assert_eq!(cookie_value(&headers, AVATAR_COOKIE), None);
    }

    #[test]
    fn test_cookie_value_requires_exact_name() {
        // "session" must not match "xsession"
        let headers = headers_with_cookie("xsession=nope");
        assert_eq!(cookie_value(&headers, SESSION_COOKIE), None);
    }

    #[test]
    fn test_theme_parse_defaults_to_system() {
        assert_eq!(Theme::parse("light"), Theme::Light);
        assert_eq!(Theme::parse("DARK"), Theme::Dark);
        assert_eq!(Theme::parse("anything"), Theme::System);
    }

    #[test]
    fn test_avatar_cookie_round_trips_url() {
        let url = "https://example.supabase.co/storage/v1/object/public/avatars/u/1.png";
        let cookie = avatar_cookie(url);
        let value = cookie
            .strip_prefix("korekushon.avatarUrl=")
            .unwrap()
            .split(';')
            .next()
            .unwrap();
        assert_eq!(urlencoding::decode(value).unwrap(), url);
    }
}
