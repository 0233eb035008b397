//! Session token storage bound to a coarse device fingerprint.
//!
//! The fingerprint is a heuristic, not a security boundary: every input is observable
//! and forgeable by a script running in the same client. A mismatch only signals that
//! the environment changed (new browser, copied storage) and triggers a purge so the
//! user logs in again. Do not treat it as proof of token theft.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::storage::KeyValueStorage;

pub const TOKEN_KEY: &str = "gardengate.session";
pub const MAX_TOKEN_AGE_HOURS: i64 = 24;

/// Client-observed device characteristics that feed the fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceTraits {
    pub user_agent: String,
    pub locale: String,
    pub screen_width: u32,
    pub screen_height: u32,
    pub timezone: String,
    /// Data URL or hash of a fixed canvas render.
    pub canvas: String,
}

impl DeviceTraits {
    /// Hex SHA-256 over the joined traits, truncated to 32 characters.
    pub fn fingerprint(&self) -> String {
        let screen = format!("{}x{}", self.screen_width, self.screen_height);
        let mut hasher = Sha256::new();
        for part in [
            self.user_agent.as_str(),
            self.locale.as_str(),
            screen.as_str(),
            self.timezone.as_str(),
            self.canvas.as_str(),
        ] {
            hasher.update(part.as_bytes());
            hasher.update(b"|");
        }
        let mut digest = hex::encode(hasher.finalize());
        digest.truncate(32);
        digest
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredToken {
    token: String,
    fingerprint: String,
    stored_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgeReason {
    FingerprintMismatch,
    Expired,
    Corrupt,
}

impl PurgeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurgeReason::FingerprintMismatch => "fingerprint_mismatch",
            PurgeReason::Expired => "expired",
            PurgeReason::Corrupt => "corrupt",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenLookup {
    Valid(String),
    Missing,
    Purged(PurgeReason),
}

pub struct SecureTokenStorage<S> {
    storage: S,
    max_age: Duration,
}

impl<S: KeyValueStorage> SecureTokenStorage<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            max_age: Duration::hours(MAX_TOKEN_AGE_HOURS),
        }
    }

    pub fn store(&mut self, token: &str, device: &DeviceTraits, now: DateTime<Utc>) {
        let record = StoredToken {
            token: token.to_string(),
            fingerprint: device.fingerprint(),
            stored_at: now,
        };
        match serde_json::to_string(&record) {
            Ok(encoded) => self.storage.set(TOKEN_KEY, encoded),
            Err(e) => log::warn!("could not encode session token record: {}", e),
        }
    }

    /// Returns the token when the fingerprint matches and the record is younger than
    /// 24 hours; otherwise removes it and reports why.
    pub fn retrieve(&mut self, device: &DeviceTraits, now: DateTime<Utc>) -> TokenLookup {
        let Some(raw) = self.storage.get(TOKEN_KEY) else {
            return TokenLookup::Missing;
        };

        let verdict = match serde_json::from_str::<StoredToken>(&raw) {
            Err(_) => Err(PurgeReason::Corrupt),
            Ok(record) if record.fingerprint != device.fingerprint() => {
                Err(PurgeReason::FingerprintMismatch)
            }
            Ok(record) if now - record.stored_at > self.max_age => Err(PurgeReason::Expired),
            Ok(record) => Ok(record.token),
        };

        match verdict {
            Ok(token) => TokenLookup::Valid(token),
            Err(reason) => {
                self.clear();
                TokenLookup::Purged(reason)
            }
        }
    }

    pub fn clear(&mut self) {
        self.storage.remove(TOKEN_KEY);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::storage::MemoryStorage;

    fn laptop() -> DeviceTraits {
        DeviceTraits {
            user_agent: "Mozilla/5.0 (X11; Linux x86_64)".into(),
            locale: "pt-PT".into(),
            screen_width: 1920,
            screen_height: 1080,
            timezone: "Europe/Lisbon".into(),
            canvas: "data:image/png;base64,AAAA".into(),
        }
    }

    #[test]
    fn test_fingerprint_is_stable_and_sensitive() {
        let a = laptop();
        assert_eq!(a.fingerprint(), laptop().fingerprint());
        assert_eq!(a.fingerprint().len(), 32);

        let mut b = laptop();
        b.screen_width = 1280;
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_store_and_retrieve() {
        let mut storage = SecureTokenStorage::new(MemoryStorage::new());
        let now = Utc::now();
        storage.store("jwt-token", &laptop(), now);

        assert_eq!(
            storage.retrieve(&laptop(), now + Duration::hours(23)),
            TokenLookup::Valid("jwt-token".into())
        );
    }

    #[test]
    fn test_fingerprint_mismatch_purges() {
        let mut storage = SecureTokenStorage::new(MemoryStorage::new());
        let now = Utc::now();
        storage.store("jwt-token", &laptop(), now);

        let mut other = laptop();
        other.timezone = "America/New_York".into();
        assert_eq!(
            storage.retrieve(&other, now),
            TokenLookup::Purged(PurgeReason::FingerprintMismatch)
        );
        assert_eq!(storage.retrieve(&laptop(), now), TokenLookup::Missing);
    }

    #[test]
    fn test_old_token_purges() {
        let mut storage = SecureTokenStorage::new(MemoryStorage::new());
        let now = Utc::now();
        storage.store("jwt-token", &laptop(), now);

        assert_eq!(
            storage.retrieve(&laptop(), now + Duration::hours(25)),
            TokenLookup::Purged(PurgeReason::Expired)
        );
        assert_eq!(storage.retrieve(&laptop(), now), TokenLookup::Missing);
    }

    #[test]
    fn test_corrupt_record_purges() {
        let mut raw = MemoryStorage::new();
        raw.set(TOKEN_KEY, "{not json".into());
        let mut storage = SecureTokenStorage::new(raw);

        assert_eq!(
            storage.retrieve(&laptop(), Utc::now()),
            TokenLookup::Purged(PurgeReason::Corrupt)
        );
    }
}
