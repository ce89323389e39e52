//! Session manager — lazily authenticated, time-limited control-plane access.
//!
//! The bearer token is cached inside the manager instance (never in a
//! process-wide global) and checked for expiry on every access. Concurrent
//! callers racing past expiry may each re-authenticate; the last writer
//! wins and every token handed out stays valid for its own lifetime.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error};

use ecomode_client::{AuthToken, ControlPlane};

use crate::error::{ScaleError, ScaleResult};
use crate::logging::EVENT_SESSION;

/// How long a freshly exchanged token is trusted.
pub const SESSION_TTL: Duration = Duration::from_secs(60 * 60);

/// An authenticated handle on the control plane.
#[derive(Debug, Clone)]
pub struct Session {
    token: Arc<AuthToken>,
    expires_at: Instant,
}

impl Session {
    pub fn token(&self) -> &AuthToken {
        &self.token
    }

    fn is_expired(&self, now: Instant) -> bool {
        now > self.expires_at
    }
}

/// Owns the cached session and refreshes it when absent or expired.
pub struct SessionManager {
    client: Arc<dyn ControlPlane>,
    credential: String,
    api_url: String,
    ttl: Duration,
    cached: RwLock<Option<Session>>,
}

impl SessionManager {
    pub fn new(
        client: Arc<dyn ControlPlane>,
        credential: impl Into<String>,
        api_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            credential: credential.into(),
            api_url: api_url.into(),
            ttl: SESSION_TTL,
            cached: RwLock::new(None),
        }
    }

    /// Override the session lifetime.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Return the cached session, authenticating first if there is none
    /// or it has expired. Authentication failures are not retried here.
    pub async fn get_session(&self) -> ScaleResult<Session> {
        if let Some(session) = self.current() {
            return Ok(session);
        }

        let token = self
            .client
            .authenticate(&self.credential, &self.api_url)
            .await
            .map_err(|e| {
                error!(event = EVENT_SESSION, error = %e, "control-plane authentication failed");
                ScaleError::Session(e)
            })?;

        let session = Session {
            token: Arc::new(token),
            expires_at: Instant::now() + self.ttl,
        };
        debug!(event = EVENT_SESSION, api_url = %self.api_url, "control-plane session opened");

        let mut cached = self
            .cached
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *cached = Some(session.clone());
        Ok(session)
    }

    /// The cached session if it is still valid.
    fn current(&self) -> Option<Session> {
        let cached = self
            .cached
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        cached
            .as_ref()
            .filter(|s| !s.is_expired(Instant::now()))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecomode_client::testing::FakeControlPlane;

    fn manager(fake: &Arc<FakeControlPlane>) -> SessionManager {
        SessionManager::new(fake.clone(), "scalingo-token", "https://api.example")
    }

    #[tokio::test(start_paused = true)]
    async fn first_use_authenticates() {
        let fake = Arc::new(FakeControlPlane::new());
        let sessions = manager(&fake);

        let session = sessions.get_session().await.unwrap();
        assert_eq!(fake.auth_calls(), 1);
        assert_eq!(session.token().bearer, "token-1");
        assert_eq!(session.token().api_url, "https://api.example");
    }

    #[tokio::test(start_paused = true)]
    async fn session_is_reused_before_expiry() {
        let fake = Arc::new(FakeControlPlane::new());
        let sessions = manager(&fake);

        sessions.get_session().await.unwrap();
        tokio::time::advance(Duration::from_secs(59 * 60)).await;
        let session = sessions.get_session().await.unwrap();

        assert_eq!(fake.auth_calls(), 1);
        assert_eq!(session.token().bearer, "token-1");
    }

    #[tokio::test(start_paused = true)]
    async fn session_is_renewed_after_expiry() {
        let fake = Arc::new(FakeControlPlane::new());
        let sessions = manager(&fake);

        sessions.get_session().await.unwrap();
        tokio::time::advance(SESSION_TTL + Duration::from_secs(1)).await;
        let session = sessions.get_session().await.unwrap();

        assert_eq!(fake.auth_calls(), 2);
        assert_eq!(session.token().bearer, "token-2");
    }

    #[tokio::test(start_paused = true)]
    async fn session_exactly_at_expiry_is_still_valid() {
        let fake = Arc::new(FakeControlPlane::new());
        let sessions = manager(&fake).with_ttl(Duration::from_secs(10));

        sessions.get_session().await.unwrap();
        tokio::time::advance(Duration::from_secs(10)).await;
        sessions.get_session().await.unwrap();

        assert_eq!(fake.auth_calls(), 1);
    }

    #[tokio::test]
    async fn authentication_failure_propagates_and_is_retried_next_call() {
        let fake = Arc::new(FakeControlPlane::new().failing_auth("invalid token"));
        let sessions = manager(&fake);

        assert!(matches!(
            sessions.get_session().await,
            Err(ScaleError::Session(_))
        ));
        assert!(sessions.get_session().await.is_err());
        assert_eq!(fake.auth_calls(), 2);
    }
}
