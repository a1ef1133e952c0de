//! Signed, timestamped session tokens.
//!
//! Token format: `{user_id}.{issued_unix_secs}.{hex(HMAC-SHA256(key, "{user_id}.{issued_unix_secs}"))}`.
//!
//! Tokens carry no server-side state. A token is accepted while its
//! signature verifies and it is no older than the configured max age.

use std::time::Duration;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

use tagcard_core::UserId;

type HmacSha256 = Hmac<Sha256>;

/// The signing key could not be used.
#[derive(Debug, thiserror::Error)]
#[error("invalid session signing key: {0}")]
pub struct SessionKeyError(String);

/// Issues and validates session tokens.
#[derive(Clone)]
pub struct SessionSigner {
    mac: HmacSha256,
}

impl std::fmt::Debug for SessionSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSigner").finish_non_exhaustive()
    }
}

impl SessionSigner {
    /// Build a signer from the configured secret key.
    ///
    /// # Errors
    ///
    /// Returns `SessionKeyError` if the key is rejected by the MAC.
    pub fn new(secret: &SecretString) -> Result<Self, SessionKeyError> {
        let mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes())
            .map_err(|e| SessionKeyError(e.to_string()))?;
        Ok(Self { mac })
    }

    /// Issue a token for `user_id`, stamped with `now`.
    #[must_use]
    pub fn issue(&self, user_id: UserId, now: DateTime<Utc>) -> String {
        let payload = format!("{}.{}", user_id, now.timestamp());
        let signature = hex::encode(self.sign(&payload));
        format!("{payload}.{signature}")
    }

    /// Return the user id carried by `token` if it is authentic and fresh.
    ///
    /// Malformed, forged, future-dated and expired tokens all yield `None`.
    #[must_use]
    pub fn validate(&self, token: &str, max_age: Duration, now: DateTime<Utc>) -> Option<UserId> {
        let (payload, signature) = token.rsplit_once('.')?;
        let (user_part, issued_part) = payload.split_once('.')?;

        let signature = hex::decode(signature).ok()?;
        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature).ok()?;

        let user_id = user_part.parse::<i64>().ok()?;
        let issued = issued_part.parse::<i64>().ok()?;
        let age = now.timestamp().checked_sub(issued)?;
        let max_age = i64::try_from(max_age.as_secs()).unwrap_or(i64::MAX);
        if age < 0 || age > max_age {
            return None;
        }

        Some(UserId::new(user_id))
    }

    fn sign(&self, payload: &str) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    const WEEK: Duration = Duration::from_secs(7 * 24 * 60 * 60);

    fn signer(key: &str) -> SessionSigner {
        SessionSigner::new(&SecretString::from(key)).unwrap()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_issue_then_validate() {
        let s = signer("k1-aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6");
        let token = s.issue(UserId::new(42), at(1_700_000_000));
        assert!(token.starts_with("42.1700000000."));
        assert_eq!(
            s.validate(&token, WEEK, at(1_700_000_060)),
            Some(UserId::new(42))
        );
    }

    #[test]
    fn test_expired_token_is_anonymous() {
        let s = signer("k1-aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6");
        let token = s.issue(UserId::new(1), at(1_700_000_000));
        let later = at(1_700_000_000 + 7 * 24 * 60 * 60 + 1);
        assert_eq!(s.validate(&token, WEEK, later), None);
    }

    #[test]
    fn test_future_token_is_anonymous() {
        let s = signer("k1-aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6");
        let token = s.issue(UserId::new(1), at(1_700_000_100));
        assert_eq!(s.validate(&token, WEEK, at(1_700_000_000)), None);
    }

    #[test]
    fn test_tampered_token_is_anonymous() {
        let s = signer("k1-aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6");
        let token = s.issue(UserId::new(1), at(1_700_000_000));
        let forged = token.replacen("1.", "2.", 1);
        assert_eq!(s.validate(&forged, WEEK, at(1_700_000_001)), None);

        let other = signer("k2-Zq8#Lm4!Vt6@Rw1$Ny3%Hb5^Jd7&Kf9");
        assert_eq!(other.validate(&token, WEEK, at(1_700_000_001)), None);
    }

    #[test]
    fn test_malformed_tokens_are_anonymous() {
        let s = signer("k1-aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6");
        for token in ["", "garbage", "1.2", "1.2.zz", "a.b.c.d", "..."] {
            assert_eq!(s.validate(token, WEEK, at(0)), None, "{token:?}");
        }
    }
}
