//! Auth operations against the platform's identity service.
//!
//! Sign-up, password sign-in, sign-out, recovery email and user updates are
//! all platform concerns; this module only shapes the requests and parses
//! the session/user payloads that come back.

use serde::Deserialize;
use serde_json::json;

use super::{check, PlatformClient, PlatformError};

/// A signed-in session as issued by the platform.
#[derive(Debug, Clone, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    pub user: AuthUser,
}

/// The platform's view of a user account.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

impl AuthUser {
    /// The username stored in the account metadata at sign-up, if any.
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.user_metadata.get("username").and_then(|v| v.as_str())
    }

    #[must_use]
    pub fn avatar_url(&self) -> Option<&str> {
        self.user_metadata.get("avatar_url").and_then(|v| v.as_str())
    }

    /// Display name: metadata username, else the local part of the email.
    #[must_use]
    pub fn display_name(&self) -> String {
        if let Some(username) = self.username() {
            return username.to_string();
        }
        self.email
            .as_deref()
            .and_then(|e| e.split('@').next())
            .unwrap_or("用户")
            .to_string()
    }
}

impl PlatformClient {
    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.base_url)
    }

    /// Register a new account; the username is kept in account metadata.
    /// The platform sends its own verification email.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        username: &str,
    ) -> Result<(), PlatformError> {
        let body = json!({
            "email": email,
            "password": password,
            "data": { "username": username },
        });
        let response = self
            .authed(self.http.post(self.auth_url("signup")).json(&body))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    /// Exchange email + password for a session.
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, PlatformError> {
        let body = json!({ "email": email, "password": password });
        let response = self
            .authed(
                self.http
                    .post(self.auth_url("token"))
                    .query(&[("grant_type", "password")])
                    .json(&body),
            )
            .send()
            .await?;
        let response = check(response).await?;
        Ok(response.json().await?)
    }

    /// Revoke the session behind `access_token`.
    pub async fn sign_out(&self, access_token: &str) -> Result<(), PlatformError> {
        let response = self
            .as_user(access_token)
            .authed(self.http.post(self.auth_url("logout")))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    /// Ask the platform to email a password-recovery link that returns to
    /// `redirect_to`.
    pub async fn send_recovery_email(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), PlatformError> {
        let body = json!({ "email": email });
        let response = self
            .authed(
                self.http
                    .post(self.auth_url("recover"))
                    .query(&[("redirect_to", redirect_to)])
                    .json(&body),
            )
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    /// Resolve the user behind an access token, `None` when the token is
    /// no longer valid.
    pub async fn get_user(&self, access_token: &str) -> Result<Option<AuthUser>, PlatformError> {
        let response = self
            .as_user(access_token)
            .authed(self.http.get(self.auth_url("user")))
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::UNAUTHORIZED
            || response.status() == reqwest::StatusCode::FORBIDDEN
        {
            return Ok(None);
        }
        let response = check(response).await?;
        Ok(Some(response.json().await?))
    }

    /// Change the signed-in user's password.
    pub async fn update_password(
        &self,
        access_token: &str,
        new_password: &str,
    ) -> Result<(), PlatformError> {
        self.update_user(access_token, &json!({ "password": new_password }))
            .await
    }

    /// Change the signed-in user's email. The platform sends a confirmation
    /// email before the change takes effect.
    pub async fn update_email(
        &self,
        access_token: &str,
        new_email: &str,
    ) -> Result<(), PlatformError> {
        self.update_user(access_token, &json!({ "email": new_email }))
            .await
    }

    /// Merge `metadata` into the signed-in user's account metadata.
    pub async fn update_metadata(
        &self,
        access_token: &str,
        metadata: &serde_json::Value,
    ) -> Result<(), PlatformError> {
        self.update_user(access_token, &json!({ "data": metadata }))
            .await
    }

    async fn update_user(
        &self,
        access_token: &str,
        body: &serde_json::Value,
    ) -> Result<(), PlatformError> {
        let response = self
            .as_user(access_token)
            .authed(self.http.put(self.auth_url("user")).json(body))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}
