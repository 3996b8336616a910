use std::fmt::{Debug, Formatter};
use std::sync::{Mutex, MutexGuard, PoisonError};

use time::OffsetDateTime;

/// Bearer token together with the instant it stops being served from cache.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
    expires_at: OffsetDateTime,
}

impl Credential {
    pub fn new(token: impl Into<String>, expires_at: OffsetDateTime) -> Self {
        Self {
            token: token.into(),
            expires_at,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub const fn expires_at(&self) -> OffsetDateTime {
        self.expires_at
    }

    pub fn is_valid_at(&self, now: OffsetDateTime) -> bool {
        !self.token.is_empty() && now < self.expires_at
    }
}

impl Debug for Credential {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Holds at most one credential. The lock is only ever held for a read or a write.
#[derive(Debug, Default)]
pub struct CredentialCache {
    slot: Mutex<Option<Credential>>,
}

impl CredentialCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached credential when present and not yet expired.
    pub fn get(&self) -> Option<Credential> {
        self.get_at(OffsetDateTime::now_utc())
    }

    pub fn get_at(&self, now: OffsetDateTime) -> Option<Credential> {
        self.slot()
            .as_ref()
            .filter(|credential| credential.is_valid_at(now))
            .cloned()
    }

    pub fn set(&self, credential: Credential) {
        *self.slot() = Some(credential);
    }

    pub fn invalidate(&self) {
        *self.slot() = None;
    }

    /// Clears the slot only while it still holds `token`. Returns whether it did.
    pub fn invalidate_if(&self, token: &str) -> bool {
        let mut slot = self.slot();
        if slot.as_ref().is_some_and(|credential| credential.token == token) {
            *slot = None;
            true
        } else {
            false
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<Credential>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use time::Duration;

    use super::*;

    #[test]
    fn empty_cache_returns_none() {
        let cache = CredentialCache::new();
        assert!(cache.get().is_none());
    }

    #[test]
    fn unexpired_credential_is_served() {
        let cache = CredentialCache::new();
        let now = OffsetDateTime::now_utc();
        cache.set(Credential::new("abc", now + Duration::minutes(55)));

        let credential = cache.get_at(now).expect("credential should be cached");
        assert_eq!(credential.token(), "abc");
    }

    #[test]
    fn expired_credential_is_not_served() {
        let cache = CredentialCache::new();
        let now = OffsetDateTime::now_utc();
        cache.set(Credential::new("abc", now - Duration::seconds(1)));

        assert!(cache.get_at(now).is_none());
    }

    #[test]
    fn credential_expiring_exactly_now_is_not_served() {
        let cache = CredentialCache::new();
        let now = OffsetDateTime::now_utc();
        cache.set(Credential::new("abc", now));

        assert!(cache.get_at(now).is_none());
    }

    #[test]
    fn invalidate_clears_the_slot() {
        let cache = CredentialCache::new();
        cache.set(Credential::new("abc", OffsetDateTime::now_utc() + Duration::minutes(5)));
        cache.invalidate();

        assert!(cache.get().is_none());
    }

    #[test]
    fn stale_token_does_not_clear_a_newer_credential() {
        let cache = CredentialCache::new();
        cache.set(Credential::new("newer", OffsetDateTime::now_utc() + Duration::minutes(5)));

        assert!(!cache.invalidate_if("older"));
        assert_eq!(cache.get().expect("still cached").token(), "newer");

        assert!(cache.invalidate_if("newer"));
        assert!(cache.get().is_none());
    }

    #[test]
    fn debug_does_not_leak_token() {
        let credential = Credential::new("super-secret", OffsetDateTime::now_utc());
        assert!(!format!("{credential:?}").contains("super-secret"));
    }
}
