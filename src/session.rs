use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;
use uuid::Uuid;

use crate::models::Role;

/// Session
///
/// One live login: the account it belongs to, the role resolved at login time,
/// and the idle deadline. Token and role live in a single record so neither can
/// ever be observed without the other: a token that does not resolve here is
/// simply "no session", regardless of what cookies a client presents.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: Uuid,
    pub role: Role,
    /// The moment this session expires if no further activity arrives.
    /// Replacing this value is the re-arm; there is never more than one
    /// pending countdown per session.
    deadline: Instant,
}

/// SessionStore
///
/// In-memory registry of opaque session tokens with a sliding idle timeout.
///
/// Lifecycle per session:
/// - `issue` arms the first countdown (login).
/// - `resolve` is the activity signal: every authenticated request that passes
///   the route gate or the API auth extractor re-arms the countdown by
///   replacing the deadline. Cancellation of the previous countdown is
///   synchronous, being the same store write.
/// - A session whose deadline has passed is removed on the next `resolve`
///   (lazy) or by the background sweeper (eager), whichever comes first.
///   Removal happens exactly once per idle episode; afterwards the token is
///   indistinguishable from one that never existed.
/// - `revoke` disarms immediately (logout).
///
/// Expiry here is a best-effort local invalidation: it clears the portal's own
/// session state and forces a fresh login. It is not retried and does not
/// attempt any follow-up beyond removal.
pub struct SessionStore {
    idle_timeout: Duration,
    sessions: Mutex<HashMap<String, Session>>,
}

/// SessionState
///
/// The shared handle injected into the route gate middleware and the auth
/// extractor via the application state.
pub type SessionState = Arc<SessionStore>;

/// Generate a cryptographically random 32-byte hex session token.
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

impl SessionStore {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            idle_timeout,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Session>> {
        // Poisoning only occurs if a holder panicked; the map itself is always
        // consistent, so recovering the guard is safe.
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// issue
    ///
    /// Creates a session for a freshly authenticated account and arms its idle
    /// countdown. Returns the opaque token handed to the client (cookie value
    /// and `Authorization: Token <raw>` credential).
    pub fn issue(&self, user_id: Uuid, role: Role) -> String {
        let token = generate_token();
        let session = Session {
            user_id,
            role,
            deadline: Instant::now() + self.idle_timeout,
        };
        self.lock().insert(token.clone(), session);
        token
    }

    /// resolve
    ///
    /// Validates a token and, when live, re-arms its idle countdown. This is the
    /// qualifying-activity hook: any request that reaches it counts as user
    /// activity. An expired session is removed here and reported as absent, so
    /// callers treat stale and unknown tokens identically.
    pub fn resolve(&self, token: &str) -> Option<(Uuid, Role)> {
        let now = Instant::now();
        let mut sessions = self.lock();
        match sessions.get_mut(token) {
            Some(session) if session.deadline > now => {
                session.deadline = now + self.idle_timeout;
                Some((session.user_id, session.role))
            }
            Some(_) => {
                // Deadline passed with no activity in between: the idle episode
                // ends the session, exactly once.
                sessions.remove(token);
                tracing::info!("session expired after idle timeout");
                None
            }
            None => None,
        }
    }

    /// revoke
    ///
    /// Removes a session immediately (logout). Returns whether a live session
    /// was actually removed.
    pub fn revoke(&self, token: &str) -> bool {
        self.lock().remove(token).is_some()
    }

    /// sweep
    ///
    /// Eagerly removes every session whose idle deadline has passed and returns
    /// how many were dropped. Called on a fixed tick by the background sweeper;
    /// safe to call at any time.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut sessions = self.lock();
        let before = sessions.len();
        sessions.retain(|_, session| session.deadline > now);
        before - sessions.len()
    }

    /// Number of currently live sessions (expired-but-unswept entries included).
    pub fn active_count(&self) -> usize {
        self.lock().len()
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }
}

/// spawn_sweeper
///
/// Starts the background task that periodically evicts idle sessions, keeping
/// the store from accumulating entries for clients that simply went away.
/// The task runs for the lifetime of the process.
pub fn spawn_sweeper(store: SessionState, period: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // The first tick completes immediately; skip it so a sweep never races
        // the sessions issued during startup.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let expired = store.sweep();
            if expired > 0 {
                tracing::info!(expired, "evicted idle sessions");
            }
        }
    })
}
