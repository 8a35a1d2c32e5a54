//! Engine credentials: a cached bearer token with single-flight refresh.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::AuthError;

/// How long a signed-in token is trusted before it is refreshed.
pub const TOKEN_VALIDITY: Duration = Duration::from_secs(23 * 60 * 60);

/// Something that can mint a fresh token.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn sign_in(&self) -> Result<String, AuthError>;
}

// ---------------------------------------------------------------------------
// Password sign-in
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct SignInRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// The only accepted sign-in response shape.
#[derive(Deserialize)]
struct SignInResponse {
    token: String,
}

/// `POST /api/v1/authentication/sign-in` with email and password.
#[derive(Debug, Clone)]
pub struct PasswordSignIn {
    http: reqwest::Client,
    base_url: String,
    email: String,
    password: String,
}

impl PasswordSignIn {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        PasswordSignIn {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            email: email.into(),
            password: password.into(),
        }
    }
}

#[async_trait]
impl TokenSource for PasswordSignIn {
    async fn sign_in(&self) -> Result<String, AuthError> {
        if self.email.is_empty() || self.password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        let response = self
            .http
            .post(format!("{}/api/v1/authentication/sign-in", self.base_url))
            .json(&SignInRequest {
                email: &self.email,
                password: &self.password,
            })
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(AuthError::SignIn {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: SignInResponse =
            serde_json::from_str(&body).map_err(|e| AuthError::MalformedResponse(e.to_string()))?;
        if parsed.token.is_empty() {
            return Err(AuthError::MalformedResponse("token is empty".into()));
        }
        Ok(parsed.token)
    }
}

// ---------------------------------------------------------------------------
// Token cache
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct TokenState {
    cached: Option<CachedToken>,
    /// Outcome of the most recent sign-in if it failed.
    last_error: Option<AuthError>,
}

/// Process-wide token cache. Concurrent callers that find the token missing
/// or expired wait on the same sign-in instead of each starting their own,
/// and share its outcome whether it succeeds or fails.
pub struct AuthTokenProvider {
    source: Arc<dyn TokenSource>,
    validity: Duration,
    state: Mutex<TokenState>,
    /// Completed sign-in attempts. A caller that sees this move while it
    /// waited for the lock reuses that attempt's result.
    attempts: AtomicU64,
}

impl std::fmt::Debug for AuthTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthTokenProvider")
            .field("validity", &self.validity)
            .finish_non_exhaustive()
    }
}

impl AuthTokenProvider {
    pub fn new(source: Arc<dyn TokenSource>) -> Self {
        Self::with_validity(source, TOKEN_VALIDITY)
    }

    pub fn with_validity(source: Arc<dyn TokenSource>, validity: Duration) -> Self {
        AuthTokenProvider {
            source,
            validity,
            state: Mutex::new(TokenState::default()),
            attempts: AtomicU64::new(0),
        }
    }

    pub async fn get_token(&self) -> Result<String, AuthError> {
        let seen = self.attempts.load(Ordering::Acquire);
        // Held across the sign-in await: later callers block here and then
        // find what the first caller stored.
        let mut state = self.state.lock().await;

        if let Some(entry) = state.cached.as_ref()
            && Instant::now() < entry.expires_at
        {
            return Ok(entry.token.clone());
        }

        if self.attempts.load(Ordering::Acquire) != seen
            && let Some(err) = state.last_error.as_ref()
        {
            debug!(error = %err, "reusing failed sign-in from concurrent caller");
            return Err(err.clone());
        }

        debug!("signing in to engine");
        let result = self.source.sign_in().await;
        match &result {
            Ok(token) => {
                info!(valid_for_secs = self.validity.as_secs(), "engine token refreshed");
                state.cached = Some(CachedToken {
                    token: token.clone(),
                    expires_at: Instant::now() + self.validity,
                });
                state.last_error = None;
            }
            Err(err) => {
                warn!(error = %err, "engine sign-in failed");
                state.cached = None;
                state.last_error = Some(err.clone());
            }
        }
        self.attempts.fetch_add(1, Ordering::Release);
        result
    }

    /// Forget the cached token, e.g. after the engine rejected it.
    pub async fn clear_token(&self) {
        let mut state = self.state.lock().await;
        state.cached = None;
        state.last_error = None;
    }
}
