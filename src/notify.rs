//! Toast notifications.
//!
//! Every notification carries its own deadline. The UI loop calls
//! [`Notifications::prune`] once per tick; an entry dismissed by hand is simply
//! gone by then, so its deadline has nothing left to act on.

use std::time::{Duration, Instant};

pub const DEFAULT_TTL: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Success,
    Error,
    Warning,
    Info,
}

impl Severity {
    #[must_use]
    pub const fn alert_class(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "danger",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }

    #[must_use]
    pub const fn glyph(self) -> &'static str {
        match self {
            Self::Success => "✔",
            Self::Error => "✖",
            Self::Warning => "▲",
            Self::Info => "●",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub id: u64,
    pub message: String,
    pub severity: Severity,
    pub created_at: Instant,
    pub ttl: Duration,
}

impl Notification {
    #[must_use]
    pub fn expires_at(&self) -> Instant {
        self.created_at + self.ttl
    }

    #[must_use]
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at()
    }
}

#[derive(Debug, Default)]
pub struct Notifications {
    next_id: u64,
    active: Vec<Notification>,
}

impl Notifications {
    pub fn notify(&mut self, message: impl Into<String>, severity: Severity) -> u64 {
        self.notify_for(message, severity, DEFAULT_TTL)
    }

    pub fn notify_for(
        &mut self,
        message: impl Into<String>,
        severity: Severity,
        ttl: Duration,
    ) -> u64 {
        self.notify_at(message, severity, ttl, Instant::now())
    }

    pub fn notify_at(
        &mut self,
        message: impl Into<String>,
        severity: Severity,
        ttl: Duration,
        now: Instant,
    ) -> u64 {
        self.next_id += 1;
        let notification = Notification {
            id: self.next_id,
            message: message.into(),
            severity,
            created_at: now,
            ttl,
        };
        tracing::debug!(
            id = notification.id,
            class = severity.alert_class(),
            message = %notification.message,
            "notification shown"
        );
        self.active.push(notification);
        self.next_id
    }

    /// Returns `false` when the notification already expired or was dismissed.
    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.active.len();
        self.active.retain(|notification| notification.id != id);
        self.active.len() != before
    }

    pub fn dismiss_latest(&mut self) -> bool {
        self.active
            .last()
            .map(|notification| notification.id)
            .is_some_and(|id| self.dismiss(id))
    }

    /// Drops every expired notification and returns how many were removed.
    pub fn prune(&mut self, now: Instant) -> usize {
        let before = self.active.len();
        self.active.retain(|notification| !notification.is_expired(now));
        before - self.active.len()
    }

    #[must_use]
    pub fn active(&self) -> &[Notification] {
        &self.active
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    #[must_use]
    pub fn next_expiry(&self) -> Option<Instant> {
        self.active.iter().map(Notification::expires_at).min()
    }
}
