//! Session context shared by the REST client and the console

use std::sync::Arc;

use ms_rest_api_contract::User;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Authentication state of the console
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Anonymous,
    Authenticated {
        token: String,
        user: Option<User>,
    },
    /// The server rejected the token; the user has to log in again
    Expired,
}

impl SessionState {
    pub fn token(&self) -> Option<&str> {
        match self {
            SessionState::Authenticated { token, .. } => Some(token),
            _ => None,
        }
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            SessionState::Authenticated { user, .. } => user.as_ref(),
            _ => None,
        }
    }
}

/// Cloneable handle on the current session.
///
/// Every clone observes the same state; observers get change notifications
/// through [`SessionContext::subscribe`].
#[derive(Debug, Clone)]
pub struct SessionContext {
    state: Arc<watch::Sender<SessionState>>,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionContext {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionState::Anonymous);
        Self { state: Arc::new(tx) }
    }

    /// A session that starts out authenticated with a known token
    pub fn with_token(token: impl Into<String>) -> Self {
        let session = Self::new();
        session.login(token);
        session
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn token(&self) -> Option<String> {
        self.state.borrow().token().map(str::to_string)
    }

    pub fn user(&self) -> Option<User> {
        self.state.borrow().user().cloned()
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(*self.state.borrow(), SessionState::Authenticated { .. })
    }

    pub fn is_admin(&self) -> bool {
        self.state.borrow().user().is_some_and(User::is_admin)
    }

    pub fn login(&self, token: impl Into<String>) {
        debug!("session authenticated");
        self.state.send_replace(SessionState::Authenticated {
            token: token.into(),
            user: None,
        });
    }

    /// Attach the profile of the logged-in user; ignored unless authenticated
    pub fn set_user(&self, user: User) {
        self.state.send_if_modified(|state| match state {
            SessionState::Authenticated { user: slot, .. } => {
                *slot = Some(user);
                true
            }
            _ => false,
        });
    }

    pub fn logout(&self) {
        debug!("session logged out");
        self.state.send_replace(SessionState::Anonymous);
    }

    /// Mark the session expired. Returns whether an authenticated session
    /// was actually torn down.
    pub fn expire(&self) -> bool {
        let expired = self.state.send_if_modified(|state| match state {
            SessionState::Authenticated { .. } => {
                *state = SessionState::Expired;
                true
            }
            _ => false,
        });
        if expired {
            warn!("session expired");
        }
        expired
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin() -> User {
        User {
            id: 1,
            email: "ada@example.com".into(),
            name: Some("Ada".into()),
            role: Some("admin".into()),
            is_active: Some(true),
        }
    }

    #[test]
    fn test_login_then_user() {
        let session = SessionContext::new();
        assert!(!session.is_authenticated());

        session.set_user(admin());
        assert_eq!(session.user(), None);

        session.login("t0k");
        session.set_user(admin());
        assert_eq!(session.token().as_deref(), Some("t0k"));
        assert!(session.is_admin());
    }

    #[test]
    fn test_expire_only_tears_down_authenticated_sessions() {
        let session = SessionContext::new();
        assert!(!session.expire());
        assert_eq!(session.state(), SessionState::Anonymous);

        session.login("t0k");
        assert!(session.expire());
        assert_eq!(session.state(), SessionState::Expired);
        assert!(!session.expire());
        assert_eq!(session.token(), None);
    }

    #[test]
    fn test_clones_share_state() {
        let session = SessionContext::with_token("abc");
        let other = session.clone();
        other.logout();
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn test_subscribers_see_expiry() {
        let session = SessionContext::with_token("abc");
        let mut rx = session.subscribe();

        session.expire();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), SessionState::Expired);
    }
}
