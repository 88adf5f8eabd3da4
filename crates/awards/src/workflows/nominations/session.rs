//! Session expiry notification.
//!
//! Components that react to a session ending receive an [`AuthEventSink`]
//! when they are built instead of reaching for a global logout handler.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::domain::{Role, UserId};

/// Events emitted when a session ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuthEvent {
    SessionExpired { user_id: UserId },
    LoggedOut { user_id: UserId },
}

/// Receiver for [`AuthEvent`]s.
pub trait AuthEventSink: Send + Sync {
    fn emit(&self, event: AuthEvent);
}

/// Decoded token claims relevant to the session lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: UserId,
    pub role: String,
    /// Expiry as seconds since the Unix epoch.
    pub exp: i64,
}

impl SessionClaims {
    /// Role claim, if it names a known role.
    pub fn role(&self) -> Option<Role> {
        Role::parse(&self.role)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.exp, 0).single()
    }

    /// Claims with an unrepresentable expiry are treated as expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().map(|expiry| now >= expiry).unwrap_or(true)
    }
}

/// Tracks one session and notifies its sink exactly once when it ends.
pub struct SessionMonitor<S> {
    claims: SessionClaims,
    sink: Arc<S>,
    ended: AtomicBool,
}

impl<S> SessionMonitor<S>
where
    S: AuthEventSink,
{
    pub fn new(claims: SessionClaims, sink: Arc<S>) -> Self {
        Self {
            claims,
            sink,
            ended: AtomicBool::new(false),
        }
    }

    pub fn claims(&self) -> &SessionClaims {
        &self.claims
    }

    pub fn is_active(&self) -> bool {
        !self.ended.load(Ordering::Acquire)
    }

    /// Poll the expiry; returns `true` while the session is still usable.
    pub fn check(&self, now: DateTime<Utc>) -> bool {
        if !self.is_active() {
            return false;
        }
        if !self.claims.is_expired_at(now) {
            return true;
        }
        if self.end() {
            info!(user = %self.claims.sub.0, "session expired");
            self.sink.emit(AuthEvent::SessionExpired {
                user_id: self.claims.sub.clone(),
            });
        }
        false
    }

    /// End the session explicitly.
    pub fn logout(&self) {
        if self.end() {
            self.sink.emit(AuthEvent::LoggedOut {
                user_id: self.claims.sub.clone(),
            });
        }
    }

    fn end(&self) -> bool {
        self.ended
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
