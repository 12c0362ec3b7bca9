//! Pending e-mail code verification
//!
//! Lives only between the login that raised the challenge and the
//! verification call; it is never persisted.

use chrono::{DateTime, Duration, Utc};
use otherlink_core::{TwoFactorChallenge, UserSummary};

pub const DEFAULT_EXPIRES_IN_SECS: u64 = 600;

#[derive(Debug, Clone, PartialEq)]
pub struct TwoFactorSession {
    session_id: String,
    user: Option<UserSummary>,
    deadline: DateTime<Utc>,
}

fn deadline_after(now: DateTime<Utc>, expires_in: u64) -> DateTime<Utc> {
    i64::try_from(expires_in)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

impl TwoFactorSession {
    pub fn new(challenge: TwoFactorChallenge) -> Self {
        Self::starting_at(challenge, Utc::now())
    }

    pub fn starting_at(challenge: TwoFactorChallenge, now: DateTime<Utc>) -> Self {
        Self {
            deadline: deadline_after(now, challenge.expires_in),
            session_id: challenge.session_id,
            user: challenge.user,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn user(&self) -> Option<&UserSummary> {
        self.user.as_ref()
    }

    pub fn deadline(&self) -> DateTime<Utc> {
        self.deadline
    }

    /// Restart the countdown after a resend
    pub fn restart(&mut self, expires_in: u64) {
        self.restart_at(expires_in, Utc::now());
    }

    pub fn restart_at(&mut self, expires_in: u64, now: DateTime<Utc>) {
        self.deadline = deadline_after(now, expires_in);
    }

    pub fn remaining_at(&self, now: DateTime<Utc>) -> std::time::Duration {
        (self.deadline - now).to_std().unwrap_or_default()
    }

    pub fn remaining(&self) -> std::time::Duration {
        self.remaining_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.deadline
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// `m:ss` countdown text
pub fn format_countdown(remaining: std::time::Duration) -> String {
    let secs = remaining.as_secs();
    format!("{}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn challenge(expires_in: u64) -> TwoFactorChallenge {
        TwoFactorChallenge {
            session_id: "2fa-1".into(),
            expires_in,
            user: None,
        }
    }

    #[test]
    fn test_deadline_and_expiry() {
        let start = Utc::now();
        let session = TwoFactorSession::starting_at(challenge(300), start);

        assert_eq!(session.session_id(), "2fa-1");
        assert!(!session.is_expired_at(start + Duration::seconds(299)));
        assert!(session.is_expired_at(start + Duration::seconds(300)));
        assert_eq!(
            session.remaining_at(start + Duration::seconds(100)),
            std::time::Duration::from_secs(200)
        );
        assert_eq!(
            session.remaining_at(start + Duration::seconds(400)),
            std::time::Duration::ZERO
        );
    }

    #[test]
    fn test_restart_extends_deadline() {
        let start = Utc::now();
        let mut session = TwoFactorSession::starting_at(challenge(10), start);
        let later = start + Duration::seconds(20);
        assert!(session.is_expired_at(later));

        session.restart_at(DEFAULT_EXPIRES_IN_SECS, later);
        assert!(!session.is_expired_at(later + Duration::seconds(599)));
    }

    #[test]
    fn test_format_countdown() {
        assert_eq!(format_countdown(std::time::Duration::from_secs(600)), "10:00");
        assert_eq!(format_countdown(std::time::Duration::from_secs(65)), "1:05");
        assert_eq!(format_countdown(std::time::Duration::ZERO), "0:00");
    }
}
