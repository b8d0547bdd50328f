//! Injected collaborators of the member repository
//!
//! Time, ID generation and credential checking sit behind traits so tests can
//! pin them down.

use crate::auth::password::PasswordError;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Produces the random token behind each member ID
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Simple-format (unhyphenated) UUID v4 tokens
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn generate(&self) -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }
}

/// Deterministic `1`, `2`, `3`... tokens
#[derive(Debug, Default)]
pub struct SequentialIdGenerator {
    next: AtomicU64,
}

impl IdGenerator for SequentialIdGenerator {
    fn generate(&self) -> String {
        (self.next.fetch_add(1, Ordering::Relaxed) + 1).to_string()
    }
}

/// Checks a raw credential against a stored hash
///
/// `Ok(false)` is a wrong credential; `Err` means the hash could not be
/// checked at all.
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, credential: &str, hash: &str) -> Result<bool, PasswordError>;

    /// Hash checked when the username is unknown, so a miss costs the same
    /// as a wrong credential
    fn decoy_hash(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_fixed_clock() {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();
        let clock = FixedClock::new(start);
        assert_eq!(clock.now(), start);

        clock.advance(Duration::minutes(5));
        assert_eq!(clock.now(), start + Duration::minutes(5));

        clock.set(start);
        assert_eq!(clock.now(), start);
    }

    #[test]
    fn test_uuid_tokens_are_simple_and_unique() {
        let ids = UuidIdGenerator;
        let first = ids.generate();
        assert_eq!(first.len(), 32);
        assert!(!first.contains('-'));
        assert_ne!(first, ids.generate());
    }

    #[test]
    fn test_sequential_tokens() {
        let ids = SequentialIdGenerator::default();
        assert_eq!(ids.generate(), "1");
        assert_eq!(ids.generate(), "2");
    }
}
