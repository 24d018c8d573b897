use std::{collections::HashMap, future::Future};

use serde::Serialize;
use tokio::{
    sync::{broadcast, broadcast::error::RecvError, watch},
    task::JoinHandle,
};
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::auth::{
    models::{Admin, AuthEvent, Session, SessionId},
    AuthError,
};

/// The parts of the auth provider the session gate depends on.
pub trait AuthProvider: Clone + Send + Sync + 'static {
    /// Every session the provider holds right now.
    fn sessions(&self) -> impl Future<Output = Vec<(SessionId, Session)>> + Send;

    /// `sid`'s session, refreshed or ended by the provider as needed.
    fn current_session(
        &self,
        sid: SessionId,
    ) -> impl Future<Output = Result<Option<Session>, AuthError>> + Send;

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}

/// One browser's view of the gate: who is signed in there, and whether the
/// initial session lookup is still running.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct GateState {
    pub admin: Option<Admin>,
    pub loading: bool,
}

/// What the route guard should do with a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Access {
    Loading,
    Denied,
    Granted(Admin),
}

impl From<&GateState> for Access {
    fn from(state: &GateState) -> Self {
        match (&state.admin, state.loading) {
            (_, true) => Access::Loading,
            (None, false) => Access::Denied,
            (Some(admin), false) => Access::Granted(admin.clone()),
        }
    }
}

/// Signed-in admins by browser session.
#[derive(Debug, Clone)]
struct Roster {
    loading: bool,
    admins: HashMap<SessionId, Admin>,
}

impl Roster {
    fn loading() -> Self {
        Self {
            loading: true,
            admins: HashMap::new(),
        }
    }

    fn settled(admins: HashMap<SessionId, Admin>) -> Self {
        Self {
            loading: false,
            admins,
        }
    }

    fn view(&self, sid: Option<SessionId>) -> GateState {
        GateState {
            admin: sid.and_then(|sid| self.admins.get(&sid).cloned()),
            loading: self.loading,
        }
    }
}

/// Application-lifetime view of who is signed in, per browser session.
///
/// Created by [`SessionGate::start`]; clones observe the same roster.
#[derive(Debug, Clone)]
pub struct SessionGate {
    roster: watch::Receiver<Roster>,
}

/// Owns the task that keeps a [`SessionGate`] in sync with the provider.
#[derive(Debug)]
pub struct GateHandle {
    gate: SessionGate,
    task: JoinHandle<()>,
}

impl SessionGate {
    /// Subscribe to `provider`'s auth events, then look up the sessions it
    /// already holds in the background. Until that lookup finishes the gate
    /// reports `loading`.
    pub fn start<P: AuthProvider>(provider: P) -> GateHandle {
        let (tx, rx) = watch::channel(Roster::loading());
        // Subscribe before the lookup so no change in between is missed.
        let events = provider.subscribe();
        let task = tokio::spawn(track(provider, events, tx));

        GateHandle {
            gate: SessionGate { roster: rx },
            task,
        }
    }

    /// The gate as seen by the browser holding `sid`.
    pub fn state(&self, sid: Option<SessionId>) -> GateState {
        self.roster.borrow().view(sid)
    }

    /// Access for `sid` from the roster alone, without asking the provider.
    pub fn access(&self, sid: Option<SessionId>) -> Access {
        Access::from(&self.state(sid))
    }

    /// Access for `sid`, confirmed with the provider when the roster grants
    /// it. The provider refreshes a session that is about to expire and ends
    /// one it can no longer refresh; provider errors deny access.
    pub async fn resolve<P: AuthProvider>(&self, provider: &P, sid: Option<SessionId>) -> Access {
        let sid = match (self.access(sid), sid) {
            (Access::Granted(_), Some(sid)) => sid,
            (access, _) => return access,
        };

        match provider.current_session(sid).await {
            Ok(Some(session)) => Access::Granted(Admin::from(&session.user)),
            Ok(None) => Access::Denied,
            Err(e) => {
                warn!(error = %e, "Failed to retrieve auth session; treating as signed out");
                Access::Denied
            }
        }
    }

    /// Wait until `predicate` holds for `sid` and return that state. Returns
    /// the last known state if the gate has been shut down.
    pub async fn wait_for(
        &self,
        sid: SessionId,
        mut predicate: impl FnMut(&GateState) -> bool,
    ) -> GateState {
        let mut rx = self.roster.clone();
        if let Ok(roster) = rx.wait_for(|r| predicate(&r.view(Some(sid)))).await {
            return roster.view(Some(sid));
        }
        self.state(Some(sid))
    }

    /// Wait for the initial session lookup to finish.
    pub async fn settled(&self) {
        let mut rx = self.roster.clone();
        let _ = rx.wait_for(|r| !r.loading).await;
    }
}

#[cfg(test)]
impl SessionGate {
    /// A gate whose initial lookup never finishes.
    pub(crate) fn stuck_loading() -> Self {
        let (_tx, rx) = watch::channel(Roster::loading());
        Self { roster: rx }
    }
}

impl GateHandle {
    pub fn gate(&self) -> SessionGate {
        self.gate.clone()
    }

    /// Stop following the provider. The gate keeps its last roster.
    pub fn shutdown(self) {
        self.task.abort();
        let signed_in = self.gate.roster.borrow().admins.len();
        info!(signed_in, "Session gate stopped");
    }
}

async fn track<P: AuthProvider>(
    provider: P,
    mut events: broadcast::Receiver<AuthEvent>,
    tx: watch::Sender<Roster>,
) {
    let admins = lookup(&provider).await;
    info!(signed_in = admins.len(), "Initial sessions resolved");
    tx.send_replace(Roster::settled(admins));

    loop {
        match events.recv().await {
            Ok(event) => {
                info!(
                    event = ?event.kind,
                    signed_in = event.session.is_some(),
                    "Auth state changed"
                );
                tx.send_modify(|roster| match &event.session {
                    Some(session) => {
                        roster.admins.insert(event.sid, Admin::from(&session.user));
                    }
                    None => {
                        roster.admins.remove(&event.sid);
                    }
                });
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Missed auth events; re-reading sessions");
                tx.send_replace(Roster::settled(lookup(&provider).await));
            }
            Err(RecvError::Closed) => {
                info!("Auth event stream closed");
                break;
            }
        }
    }
}

async fn lookup<P: AuthProvider>(provider: &P) -> HashMap<SessionId, Admin> {
    provider
        .sessions()
        .await
        .iter()
        .map(|(sid, session)| (*sid, Admin::from(&session.user)))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, Mutex},
        time::Duration,
    };

    use reqwest::StatusCode;
    use tokio::time::timeout;
    use uuid::Uuid;

    use super::*;
    use crate::auth::models::{AuthEventKind, User, UserMetadata};

    #[derive(Clone)]
    struct FakeProvider {
        sessions: Arc<Mutex<HashMap<SessionId, Session>>>,
        fail: bool,
        events: broadcast::Sender<AuthEvent>,
    }

    impl FakeProvider {
        fn new(initial: impl IntoIterator<Item = (SessionId, Session)>) -> Self {
            let (events, _) = broadcast::channel(8);
            Self {
                sessions: Arc::new(Mutex::new(initial.into_iter().collect())),
                fail: false,
                events,
            }
        }

        fn failing(initial: impl IntoIterator<Item = (SessionId, Session)>) -> Self {
            Self {
                fail: true,
                ..Self::new(initial)
            }
        }

        fn publish(&self, sid: SessionId, kind: AuthEventKind, session: Option<Session>) {
            self.events.send(AuthEvent { sid, kind, session }).unwrap();
        }
    }

    impl AuthProvider for FakeProvider {
        fn sessions(&self) -> impl Future<Output = Vec<(SessionId, Session)>> + Send {
            let sessions: Vec<_> = self
                .sessions
                .lock()
                .unwrap()
                .iter()
                .map(|(sid, s)| (*sid, s.clone()))
                .collect();
            async move { sessions }
        }

        fn current_session(
            &self,
            sid: SessionId,
        ) -> impl Future<Output = Result<Option<Session>, AuthError>> + Send {
            let result = if self.fail {
                Err(AuthError::Rejected {
                    status: StatusCode::SERVICE_UNAVAILABLE,
                    message: "provider down".into(),
                })
            } else {
                Ok(self.sessions.lock().unwrap().get(&sid).cloned())
            };
            async move { result }
        }

        fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
            self.events.subscribe()
        }
    }

    fn session(email: &str) -> Session {
        Session {
            access_token: "access".into(),
            refresh_token: "refresh".into(),
            expires_at: i64::MAX,
            user: User {
                id: Uuid::new_v4(),
                email: Some(email.into()),
                user_metadata: UserMetadata::default(),
            },
        }
    }

    async fn settled(gate: &SessionGate) {
        timeout(Duration::from_secs(2), gate.settled())
            .await
            .expect("gate did not settle");
    }

    #[test]
    fn loading_state_maps_to_loading_access() {
        let loading = GateState {
            admin: None,
            loading: true,
        };
        assert_eq!(Access::from(&loading), Access::Loading);
        assert_eq!(
            Access::from(&GateState {
                admin: None,
                loading: false
            }),
            Access::Denied
        );
    }

    #[tokio::test]
    async fn existing_session_grants_access_to_its_browser_only() {
        let sid = SessionId::new();
        let handle = SessionGate::start(FakeProvider::new([(sid, session("ops@example.com"))]));
        let gate = handle.gate();
        settled(&gate).await;

        assert_eq!(gate.state(Some(sid)).admin.unwrap().email, "ops@example.com");
        assert!(matches!(gate.access(Some(sid)), Access::Granted(_)));
        assert_eq!(gate.access(Some(SessionId::new())), Access::Denied);
        assert_eq!(gate.access(None), Access::Denied);
        handle.shutdown();
    }

    #[tokio::test]
    async fn unsettled_gate_reports_loading() {
        let gate = SessionGate::stuck_loading();
        assert_eq!(gate.access(Some(SessionId::new())), Access::Loading);
        assert!(gate.state(None).loading);
    }

    #[tokio::test]
    async fn resolve_denies_when_provider_fails() {
        let sid = SessionId::new();
        let provider = FakeProvider::failing([(sid, session("ops@example.com"))]);
        let handle = SessionGate::start(provider.clone());
        let gate = handle.gate();
        settled(&gate).await;

        assert!(matches!(gate.access(Some(sid)), Access::Granted(_)));
        assert_eq!(gate.resolve(&provider, Some(sid)).await, Access::Denied);
    }

    #[tokio::test]
    async fn resolve_denies_session_the_provider_has_dropped() {
        let sid = SessionId::new();
        let provider = FakeProvider::new([(sid, session("ops@example.com"))]);
        let handle = SessionGate::start(provider.clone());
        let gate = handle.gate();
        settled(&gate).await;

        match gate.resolve(&provider, Some(sid)).await {
            Access::Granted(admin) => assert_eq!(admin.email, "ops@example.com"),
            other => panic!("expected access, got {other:?}"),
        }

        provider.sessions.lock().unwrap().clear();
        assert_eq!(gate.resolve(&provider, Some(sid)).await, Access::Denied);
    }

    #[tokio::test]
    async fn auth_events_update_only_their_session() {
        let provider = FakeProvider::new([]);
        let handle = SessionGate::start(provider.clone());
        let gate = handle.gate();
        settled(&gate).await;

        let (ops, other) = (SessionId::new(), SessionId::new());
        provider.publish(ops, AuthEventKind::SignedIn, Some(session("ops@example.com")));
        let state = timeout(Duration::from_secs(2), gate.wait_for(ops, |s| s.admin.is_some()))
            .await
            .unwrap();
        assert_eq!(state.admin.unwrap().email, "ops@example.com");
        assert_eq!(gate.access(Some(other)), Access::Denied);

        provider.publish(ops, AuthEventKind::SignedOut, None);
        timeout(Duration::from_secs(2), gate.wait_for(ops, |s| s.admin.is_none()))
            .await
            .unwrap();
        assert_eq!(gate.access(Some(ops)), Access::Denied);
    }

    #[tokio::test]
    async fn shutdown_keeps_last_state() {
        let sid = SessionId::new();
        let handle = SessionGate::start(FakeProvider::new([(sid, session("ops@example.com"))]));
        let gate = handle.gate();
        settled(&gate).await;
        handle.shutdown();
        assert!(matches!(gate.access(Some(sid)), Access::Granted(_)));
    }
}
