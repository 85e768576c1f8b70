//! Identity provider client
//!
//! Talks to a GoTrue-compatible `/auth/v1` REST API with the project's
//! public anon key.

use std::time::Duration;

use chrono::Utc;
use log::{debug, info};
use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use serde_json::json;

use super::session::{ProviderUser, Session, TokenResponse};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("identity provider unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{0}")]
    Rejected(String),

    #[error("unexpected identity provider response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("not signed in")]
    NoSession,

    #[error("session store: {0}")]
    Store(#[from] std::io::Error),
}

/// Outcome of a sign-up: providers that require email confirmation return
/// no session until the address is verified.
#[derive(Debug)]
pub enum SignUpOutcome {
    SignedIn(Session),
    ConfirmationSent,
}

pub trait IdentityProvider {
    fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AuthError>;

    fn sign_up(&self, email: &str, password: &str, username: &str)
    -> Result<SignUpOutcome, AuthError>;

    fn sign_out(&self, session: &Session) -> Result<(), AuthError>;

    fn request_password_reset(&self, email: &str) -> Result<(), AuthError>;

    fn refresh(&self, session: &Session) -> Result<Session, AuthError>;

    /// URL to open in a browser to start an OAuth sign-in.
    fn oauth_authorize_url(&self, provider: &str) -> String;

    /// Finish an OAuth sign-in from the URL the browser was redirected to.
    fn complete_oauth(&self, redirect_url: &str) -> Result<Session, AuthError>;
}

#[derive(Debug, Clone)]
pub struct GoTrueProvider {
    http: Client,
    base_url: String,
    anon_key: String,
}

impl GoTrueProvider {
    pub fn new(base_url: &str, anon_key: &str, timeout: Duration) -> Result<Self, AuthError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.base_url)
    }

    fn post(&self, path: &str, body: serde_json::Value) -> Result<Response, AuthError> {
        debug!("POST {}", self.url(path));
        let response = self
            .http
            .post(self.url(path))
            .header("apikey", &self.anon_key)
            .json(&body)
            .send()?;
        check(response)
    }

    fn token(&self, grant_type: &str, body: serde_json::Value) -> Result<Session, AuthError> {
        let response = self.post(&format!("token?grant_type={grant_type}"), body)?;
        let token: TokenResponse = serde_json::from_str(&response.text()?)?;
        Ok(token.into_session(Utc::now()))
    }
}

fn check(response: Response) -> Result<Response, AuthError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().unwrap_or_default();
    Err(AuthError::Rejected(provider_message(&body).unwrap_or_else(
        || format!("identity provider returned HTTP {status}"),
    )))
}

/// Token fields carried in the fragment of an OAuth redirect.
fn redirect_params(redirect_url: &str) -> Vec<(&str, &str)> {
    let fragment = redirect_url
        .split_once('#')
        .map(|(_, fragment)| fragment)
        .unwrap_or_default();
    fragment
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .collect()
}

/// Providers disagree on where the human-readable message lives.
fn provider_message(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        error_description: Option<String>,
        msg: Option<String>,
        message: Option<String>,
        error: Option<String>,
    }

    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    parsed
        .error_description
        .or(parsed.msg)
        .or(parsed.message)
        .or(parsed.error)
}

impl IdentityProvider for GoTrueProvider {
    fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let session = self.token("password", json!({ "email": email, "password": password }))?;
        info!("Signed in as {}", session.user.display_name());
        Ok(session)
    }

    fn sign_up(
        &self,
        email: &str,
        password: &str,
        username: &str,
    ) -> Result<SignUpOutcome, AuthError> {
        let response = self.post(
            "signup",
            json!({
                "email": email,
                "password": password,
                "data": { "username": username, "role": "user" },
            }),
        )?;
        let body = response.text()?;
        // With email confirmation enabled only the user object comes back.
        match serde_json::from_str::<TokenResponse>(&body) {
            Ok(token) => Ok(SignUpOutcome::SignedIn(token.into_session(Utc::now()))),
            Err(_) => Ok(SignUpOutcome::ConfirmationSent),
        }
    }

    fn sign_out(&self, session: &Session) -> Result<(), AuthError> {
        let response = self
            .http
            .post(self.url("logout"))
            .header("apikey", &self.anon_key)
            .bearer_auth(&session.access_token)
            .send()?;
        check(response)?;
        Ok(())
    }

    fn request_password_reset(&self, email: &str) -> Result<(), AuthError> {
        self.post("recover", json!({ "email": email }))?;
        Ok(())
    }

    fn refresh(&self, session: &Session) -> Result<Session, AuthError> {
        let refresh_token = session.refresh_token.as_deref().ok_or(AuthError::NoSession)?;
        self.token("refresh_token", json!({ "refresh_token": refresh_token }))
    }

    fn oauth_authorize_url(&self, provider: &str) -> String {
        format!("{}?provider={provider}", self.url("authorize"))
    }

    fn complete_oauth(&self, redirect_url: &str) -> Result<Session, AuthError> {
        let params = redirect_params(redirect_url);
        let param = |name: &str| {
            params
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.to_string())
        };
        if let Some(description) = param("error_description") {
            return Err(AuthError::Rejected(description.replace('+', " ")));
        }
        let access_token = param("access_token").ok_or_else(|| {
            AuthError::Rejected("redirect URL carries no access token".to_string())
        })?;

        let response = self
            .http
            .get(self.url("user"))
            .header("apikey", &self.anon_key)
            .bearer_auth(&access_token)
            .send()?;
        let user: ProviderUser = serde_json::from_str(&check(response)?.text()?)?;

        let token = TokenResponse {
            access_token,
            refresh_token: param("refresh_token"),
            expires_at: param("expires_at").and_then(|v| v.parse().ok()),
            expires_in: param("expires_in").and_then(|v| v.parse().ok()),
            user,
        };
        let session = token.into_session(Utc::now());
        info!("Signed in as {} via OAuth", session.user.display_name());
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_message_prefers_description() {
        assert_eq!(
            provider_message(r#"{"error": "invalid_grant", "error_description": "Invalid login credentials"}"#),
            Some("Invalid login credentials".to_string())
        );
        assert_eq!(
            provider_message(r#"{"msg": "User already registered"}"#),
            Some("User already registered".to_string())
        );
        assert_eq!(provider_message("not json"), None);
    }

    #[test]
    fn oauth_url_names_provider() {
        let provider =
            GoTrueProvider::new("https://auth.example.com/", "anon", Duration::from_secs(5)).unwrap();
        assert_eq!(
            provider.oauth_authorize_url("google"),
            "https://auth.example.com/auth/v1/authorize?provider=google"
        );
    }

    #[test]
    fn redirect_fragment_is_split() {
        let params = redirect_params(
            "http://localhost:5173/#access_token=abc.def&expires_in=3600&refresh_token=r1&token_type=bearer",
        );
        assert_eq!(params[0], ("access_token", "abc.def"));
        assert_eq!(params[2], ("refresh_token", "r1"));
        assert!(redirect_params("http://localhost:5173/?code=1").is_empty());
    }

    #[test]
    fn redirect_error_is_reported_without_request() {
        let provider =
            GoTrueProvider::new("http://127.0.0.1:9", "anon", Duration::from_secs(1)).unwrap();
        let err = provider
            .complete_oauth("http://localhost/#error=access_denied&error_description=User+denied")
            .unwrap_err();
        assert_eq!(err.to_string(), "User denied");
    }

    #[test]
    fn refresh_without_token_needs_sign_in() {
        let provider =
            GoTrueProvider::new("http://127.0.0.1:9", "anon", Duration::from_secs(1)).unwrap();
        let session = crate::test_utils::test_helpers::test_session(crate::auth::Role::Reader);
        let session = Session {
            refresh_token: None,
            ..session
        };
        assert!(matches!(provider.refresh(&session), Err(AuthError::NoSession)));
    }
}
