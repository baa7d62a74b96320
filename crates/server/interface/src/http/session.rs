//! Cookie sessions: opaque tokens in an HttpOnly cookie, session state kept
//! server-side so logout and deactivation take effect immediately.

use campo_server_domain::auth::SessionUser;
use dashmap::DashMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "campo_session";
pub const SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone)]
struct Session {
    user: SessionUser,
    expires_at: Instant,
}

/// In-process session table. Sessions die with the server, which matches
/// the 24h cookie lifetime of the dashboard deployment.
#[derive(Debug)]
pub struct SessionStore {
    sessions: DashMap<String, Session>,
    ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_ttl(SESSION_TTL)
    }
}

impl SessionStore {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
        }
    }

    /// Mints a session token for a logged-in user.
    pub fn create(&self, user: SessionUser) -> String {
        let token = Uuid::new_v4().to_string();
        self.sessions.insert(
            token.clone(),
            Session {
                user,
                expires_at: Instant::now() + self.ttl,
            },
        );
        token
    }

    /// Resolves a token; expired sessions are dropped on access.
    pub fn get(&self, token: &str) -> Option<SessionUser> {
        let expired = match self.sessions.get(token) {
            Some(session) if session.expires_at > Instant::now() => {
                return Some(session.user.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            self.sessions.remove(token);
        }
        None
    }

    pub fn remove(&self, token: &str) {
        self.sessions.remove(token);
    }
}

/// `Set-Cookie` value for a fresh session.
pub fn session_cookie(token: &str) -> String {
    format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_TTL.as_secs()
    )
}

/// `Set-Cookie` value that clears the session cookie on logout.
pub fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// Pulls the session token out of a `Cookie` request header.
pub fn token_from_cookie_header(header: &str) -> Option<String> {
    header.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then(|| value.to_string())
    })
}
