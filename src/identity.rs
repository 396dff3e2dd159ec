//! Signed-in user as seen by the chat session.
//!
//! The identity provider owns sign-in and token refresh. The session only
//! observes its current value through a `watch` channel: `None` means signed
//! out, and a changed `access_token` means the connection must be rebuilt.

use tokio::sync::watch;

#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub access_token: String,
}

impl Identity {
    #[must_use]
    pub fn new(user_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), access_token: access_token.into() }
    }
}

// Tokens never reach logs.
impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("user_id", &self.user_id)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Whether `token` can travel as `Authorization: Bearer <token>`. Only
/// visible ASCII is allowed; whitespace or control characters usually mean a
/// mangled copy-paste.
#[must_use]
pub fn is_valid_token(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_graphic())
}

/// Channel pair for publishing identity changes to a session driver.
#[must_use]
pub fn identity_channel(initial: Option<Identity>) -> (watch::Sender<Option<Identity>>, watch::Receiver<Option<Identity>>) {
    watch::channel(initial)
}
