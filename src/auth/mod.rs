pub mod models;

use std::{collections::HashMap, future::Future, sync::Arc};

use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::{config::Config, session::AuthProvider};

use self::models::{
    Admin, AuthEvent, AuthEventKind, ErrorBody, PasswordGrant, RefreshGrant, Session, SessionId,
    SignUpData, SignUpOutcome, SignUpRequest, SignUpResponse, TokenResponse,
};

/// Refresh the access token this many seconds before it expires.
const REFRESH_MARGIN_SECS: i64 = 60;

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The provider answered with a non-success status.
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },

    #[error("auth provider request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected auth provider response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Client for the hosted auth provider's REST API (`{SUPABASE_URL}/auth/v1`).
///
/// Keeps one provider session per browser, keyed by [`SessionId`], and
/// publishes every change on a broadcast channel. Cheap to clone; clones
/// share the sessions.
#[derive(Debug, Clone)]
pub struct SupabaseAuth {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    http: Client,
    base_url: String,
    api_key: String,
    sessions: Mutex<HashMap<SessionId, Session>>,
    events: broadcast::Sender<AuthEvent>,
}

impl SupabaseAuth {
    pub fn new(project_url: &str, api_key: &str) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                http: Client::new(),
                base_url: format!("{}/auth/v1", project_url.trim_end_matches('/')),
                api_key: api_key.to_owned(),
                sessions: Mutex::new(HashMap::new()),
                events,
            }),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.supabase_url, &config.supabase_anon_key)
    }

    /// Exchange email and password for a session stored under `sid`.
    pub async fn sign_in(&self, sid: SessionId, email: &str, password: &str) -> Result<Admin, AuthError> {
        info!(email = %email, "Signing in");
        let token: TokenResponse = self
            .post("/token?grant_type=password", &PasswordGrant { email, password })
            .await?;

        let session = token.into_session(Utc::now().timestamp());
        let admin = Admin::from(&session.user);
        self.store(sid, session, AuthEventKind::SignedIn).await;
        Ok(admin)
    }

    /// Create an account. The display name is stored in the user metadata.
    /// When the provider signs the new account in right away, the session is
    /// stored under `sid`.
    pub async fn sign_up(
        &self,
        sid: SessionId,
        email: &str,
        password: &str,
        full_name: Option<&str>,
    ) -> Result<SignUpOutcome, AuthError> {
        info!(email = %email, "Signing up");
        let body = SignUpRequest {
            email,
            password,
            data: SignUpData { full_name },
        };
        let response: SignUpResponse = self.post("/signup", &body).await?;

        match response {
            SignUpResponse::Session(token) => {
                let session = token.into_session(Utc::now().timestamp());
                let admin = Admin::from(&session.user);
                self.store(sid, session, AuthEventKind::SignedIn).await;
                Ok(SignUpOutcome::SignedIn(admin))
            }
            SignUpResponse::User(user) => {
                info!(email = %email, "Sign-up awaits email confirmation");
                Ok(SignUpOutcome::ConfirmationRequired(Admin::from(&user)))
            }
        }
    }

    /// Drop `sid`'s session, then revoke it at the provider. Other sessions
    /// of the same user stay valid (`scope=local`).
    ///
    /// The local session is gone even when the provider call fails.
    pub async fn sign_out(&self, sid: SessionId) -> Result<(), AuthError> {
        let previous = self.inner.sessions.lock().await.remove(&sid);
        let Some(session) = previous else {
            debug!("Sign-out requested without an active session");
            return Ok(());
        };
        self.publish(sid, AuthEventKind::SignedOut, None);

        info!(email = ?session.user.email, "Signing out");
        let response = self
            .inner
            .http
            .post(self.url("/logout?scope=local"))
            .header("apikey", &self.inner.api_key)
            .bearer_auth(&session.access_token)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let bytes = response.bytes().await?;
            return Err(rejected(status, &bytes));
        }
        Ok(())
    }

    /// `sid`'s session, refreshed first when it is about to expire.
    ///
    /// A failed refresh ends the session and publishes a sign-out.
    pub async fn session(&self, sid: SessionId) -> Result<Option<Session>, AuthError> {
        let now = Utc::now().timestamp();
        let (refresh_token, email) = {
            let sessions = self.inner.sessions.lock().await;
            match sessions.get(&sid) {
                None => return Ok(None),
                Some(cached) if cached.expires_at > now + REFRESH_MARGIN_SECS => {
                    return Ok(Some(cached.clone()));
                }
                Some(cached) => (cached.refresh_token.clone(), cached.user.email.clone()),
            }
        };

        info!(email = ?email, "Refreshing auth session");
        let refreshed: Result<TokenResponse, AuthError> = self
            .post(
                "/token?grant_type=refresh_token",
                &RefreshGrant {
                    refresh_token: &refresh_token,
                },
            )
            .await;

        let mut sessions = self.inner.sessions.lock().await;
        // A concurrent request may have refreshed or ended the session while
        // the lock was released.
        match sessions.get(&sid) {
            None => return Ok(None),
            Some(current) if current.refresh_token != refresh_token => {
                return Ok(Some(current.clone()));
            }
            Some(_) => {}
        }

        match refreshed {
            Ok(token) => {
                let session = token.into_session(now);
                sessions.insert(sid, session.clone());
                self.publish(sid, AuthEventKind::TokenRefreshed, Some(session.clone()));
                Ok(Some(session))
            }
            Err(e) => {
                warn!(error = %e, "Session refresh failed; signing out locally");
                sessions.remove(&sid);
                self.publish(sid, AuthEventKind::SignedOut, None);
                Err(e)
            }
        }
    }

    /// Every stored session, as of now.
    pub async fn sessions(&self) -> Vec<(SessionId, Session)> {
        let sessions = self.inner.sessions.lock().await;
        sessions
            .iter()
            .map(|(sid, session)| (*sid, session.clone()))
            .collect()
    }

    /// Subscribe to session changes. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.inner.events.subscribe()
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn url(&self, path_and_query: &str) -> String {
        format!("{}{}", self.inner.base_url, path_and_query)
    }

    async fn post<B, T>(&self, path_and_query: &str, body: &B) -> Result<T, AuthError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path_and_query);
        debug!(url = %url, "Auth provider request");

        let response = self
            .inner
            .http
            .post(&url)
            .header("apikey", &self.inner.api_key)
            .bearer_auth(&self.inner.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;
        if !status.is_success() {
            return Err(rejected(status, &bytes));
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn store(&self, sid: SessionId, session: Session, kind: AuthEventKind) {
        let mut sessions = self.inner.sessions.lock().await;
        sessions.insert(sid, session.clone());
        self.publish(sid, kind, Some(session));
    }

    fn publish(&self, sid: SessionId, kind: AuthEventKind, session: Option<Session>) {
        // An error only means nobody is subscribed right now.
        let _ = self.inner.events.send(AuthEvent { sid, kind, session });
    }
}

#[cfg(test)]
impl SupabaseAuth {
    /// Store `session` under `sid` as if it had just been signed in.
    pub(crate) async fn adopt(&self, sid: SessionId, session: Session) {
        self.store(sid, session, AuthEventKind::SignedIn).await;
    }
}

impl AuthProvider for SupabaseAuth {
    fn sessions(&self) -> impl Future<Output = Vec<(SessionId, Session)>> + Send {
        SupabaseAuth::sessions(self)
    }

    fn current_session(
        &self,
        sid: SessionId,
    ) -> impl Future<Output = Result<Option<Session>, AuthError>> + Send {
        self.session(sid)
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        SupabaseAuth::subscribe(self)
    }
}

fn rejected(status: StatusCode, body: &[u8]) -> AuthError {
    let message = serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(ErrorBody::into_message)
        .unwrap_or_else(|| format!("auth provider returned {status}"));
    AuthError::Rejected { status, message }
}
