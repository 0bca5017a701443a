use chrono::{DateTime, Duration, Utc};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

/// Bytes of entropy in an API token (rendered as 48 hex characters).
pub const TOKEN_BYTES: usize = 24;

pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn expiry_from(now: DateTime<Utc>, ttl_days: i64) -> DateTime<Utc> {
    now + Duration::days(ttl_days)
}

/// Cheap shape check before a bearer value is looked up in the database.
pub fn looks_like_token(candidate: &str) -> bool {
    candidate.len() == TOKEN_BYTES * 2 && candidate.chars().all(|c| c.is_ascii_hexdigit())
}

/// Short digest for log lines; raw tokens are bearer secrets.
pub fn fingerprint(secret: &str) -> String {
    let digest = Sha256::digest(secret.as_bytes());
    hex::encode(&digest[..6])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn tokens_are_hex_and_unique() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 48);
        assert!(looks_like_token(&a));
        assert_ne!(a, b);
    }

    #[test]
    fn rejects_malformed_tokens() {
        assert!(!looks_like_token("short"));
        assert!(!looks_like_token(&"z".repeat(48)));
    }

    #[test]
    fn fingerprints_do_not_leak_the_token() {
        let token = generate_token();
        let print = fingerprint(&token);
        assert_eq!(print.len(), 12);
        assert!(!token.contains(&print));
        assert_eq!(print, fingerprint(&token));
    }

    #[test]
    fn expiry_is_one_year_out() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(
            expiry_from(now, 365),
            Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap()
        );
    }
}
