use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Identifies one browser's sign-in. Issued in a cookie at sign-in and used
/// as the key of the server-side session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

// ---------------------------------------------------------------------------
// User & session
//
// The auth provider (Supabase GoTrue) returns the same user object from the
// password grant, the refresh grant and the sign-up endpoint:
//
//   { "id": "…uuid…", "email": "ops@example.com",
//     "user_metadata": { "full_name": "Jane Operator" }, … }
//
// Only the fields the dashboard needs are modelled; the rest are ignored.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserMetadata {
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix timestamp (seconds) when `access_token` expires.
    pub expires_at: i64,
    pub user: User,
}

/// The signed-in operator as seen by the dashboard, derived directly from
/// the provider's user object.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Admin {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
}

impl Admin {
    /// Full name when known, email otherwise.
    pub fn display_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or(&self.email)
    }
}

impl From<&User> for Admin {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone().unwrap_or_default(),
            full_name: user
                .user_metadata
                .full_name
                .clone()
                .filter(|name| !name.trim().is_empty()),
        }
    }
}

// ---------------------------------------------------------------------------
// Token: POST /token?grant_type=password | refresh_token
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct PasswordGrant<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub struct RefreshGrant<'a> {
    pub refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Validity period in seconds.
    pub expires_in: i64,
    /// Absolute expiry; not sent by older provider versions.
    pub expires_at: Option<i64>,
    pub user: User,
}

impl TokenResponse {
    pub fn into_session(self, now: i64) -> Session {
        Session {
            expires_at: self.expires_at.unwrap_or(now + self.expires_in),
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            user: self.user,
        }
    }
}

// ---------------------------------------------------------------------------
// Sign-up: POST /signup
//
// With email confirmation disabled the provider answers with a full token
// response; with confirmation enabled it answers with the bare user object.
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct SignUpRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub data: SignUpData<'a>,
}

#[derive(Debug, Serialize)]
pub struct SignUpData<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SignUpResponse {
    // Must come first: a token response also contains a `user` object.
    Session(TokenResponse),
    User(User),
}

/// Result of a successful sign-up.
#[derive(Debug, Clone, PartialEq)]
pub enum SignUpOutcome {
    SignedIn(Admin),
    /// The account exists but the provider wants the email confirmed first.
    ConfirmationRequired(Admin),
}

impl SignUpOutcome {
    pub fn admin(&self) -> &Admin {
        match self {
            SignUpOutcome::SignedIn(admin) | SignUpOutcome::ConfirmationRequired(admin) => admin,
        }
    }
}

// ---------------------------------------------------------------------------
// Error body
//
// Depending on the endpoint and provider version, errors look like either
//   { "error": "invalid_grant", "error_description": "Invalid login credentials" }
// or
//   { "code": 400, "error_code": "invalid_credentials", "msg": "Invalid login credentials" }
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    pub msg: Option<String>,
    pub message: Option<String>,
    pub error_description: Option<String>,
    pub error: Option<String>,
}

impl ErrorBody {
    pub fn into_message(self) -> Option<String> {
        self.msg
            .or(self.message)
            .or(self.error_description)
            .or(self.error)
    }
}

// ---------------------------------------------------------------------------
// Auth events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEventKind {
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

/// Published on every session change. `session` is `None` after sign-out.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthEvent {
    pub sid: SessionId,
    pub kind: AuthEventKind,
    pub session: Option<Session>,
}
