use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;

use crate::{AppState, models::Role, session::SessionStore};

// --- Gate Surface ---

/// Cookie carrying the opaque session token, readable by this gate and by
/// client scripts.
pub const TOKEN_COOKIE: &str = "token";
/// Cookie mirroring the role label for client-side rendering. The gate never
/// trusts it; the authoritative role comes from the session record.
pub const ROLE_COOKIE: &str = "role";

/// The login page. Unauthenticated access to protected areas lands here.
pub const LOGIN_PATH: &str = "/auth/login";
/// Admin-only page prefix.
pub const ADMIN_PREFIX: &str = "/admin";
/// Resident-only page prefix.
pub const USER_PREFIX: &str = "/user";

/// SessionSnapshot
///
/// The gate's entire view of the requester, built once per request from the
/// token cookie resolved against the SessionStore. A closed two-state shape:
/// either there is a live session with a definite role, or there is nothing.
/// A token without a resolvable session (stale, garbled, expired) is
/// indistinguishable from no token at all, so a half-present session can never
/// reach the rules below.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSnapshot {
    Anonymous,
    Authenticated { role: Role },
}

/// GateDecision
///
/// The navigation outcome for one request. Every path terminates in one of
/// these; nothing in the gate is fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Pass the request through unmodified.
    Allow,
    /// Send the browser elsewhere (307, method-preserving).
    Redirect(&'static str),
    /// Serve the not-found page *without* redirecting, so the address bar keeps
    /// the attempted path and the existence of the admin area is not revealed.
    NotFoundRewrite,
}

/// route_decision
///
/// The request-time access rule set for portal pages. Pure function of the
/// path and the session snapshot: no I/O, no suspension, identical inputs
/// always yield the identical decision.
///
/// Rule order matters: the unauthenticated check runs first so that a missing
/// session always means "go log in", never a confusing 404 from the role rules
/// further down.
pub fn route_decision(path: &str, session: SessionSnapshot) -> GateDecision {
    // 1. No session and the path is a protected area: redirect to login.
    //    Absolute; takes precedence over every role rule.
    if session == SessionSnapshot::Anonymous
        && (path.starts_with(ADMIN_PREFIX) || path.starts_with(USER_PREFIX))
    {
        return GateDecision::Redirect(LOGIN_PATH);
    }

    if let SessionSnapshot::Authenticated { role } = session {
        // 2. Already logged in on the login page: the form is redundant, go to
        //    the role's home page instead.
        if path.starts_with(LOGIN_PATH) {
            return GateDecision::Redirect(role.home_path());
        }

        // 3. Residents are barred from the admin area. Rewrite to not-found
        //    rather than redirecting, masking the route's existence.
        if path.starts_with(ADMIN_PREFIX) && role == Role::Warga {
            return GateDecision::NotFoundRewrite;
        }

        // 4. Staff accounts have no business in the resident area; send them
        //    to the admin dashboard.
        if path.starts_with(USER_PREFIX) && role != Role::Warga {
            return GateDecision::Redirect(Role::Admin.home_path());
        }
    }

    // 5. Everything else passes through untouched.
    GateDecision::Allow
}

/// snapshot_from_cookies
///
/// Builds the gate's session view for one request. Resolving the token also
/// re-arms the session's idle countdown: a page navigation is qualifying
/// activity.
pub fn snapshot_from_cookies(jar: &CookieJar, sessions: &SessionStore) -> SessionSnapshot {
    match jar.get(TOKEN_COOKIE).and_then(|c| sessions.resolve(c.value())) {
        Some((_, role)) => SessionSnapshot::Authenticated { role },
        None => SessionSnapshot::Anonymous,
    }
}

/// route_gate
///
/// Middleware wrapping the browser-facing page routes (and only those; the
/// /api surface answers 401/403 instead of redirecting). Evaluates
/// `route_decision` and maps the outcome onto the HTTP response.
pub async fn route_gate(
    State(state): State<AppState>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Response {
    let snapshot = snapshot_from_cookies(&jar, &state.sessions);

    match route_decision(request.uri().path(), snapshot) {
        GateDecision::Allow => next.run(request).await,
        GateDecision::Redirect(target) => Redirect::temporary(target).into_response(),
        GateDecision::NotFoundRewrite => {
            (StatusCode::NOT_FOUND, "404 page not found").into_response()
        }
    }
}
