//! HMAC-signed, time-limited URLs for proxied storage access.

use std::sync::Arc;
use std::time::Duration;

use hmac::{Hmac, Mac};
use percent_encoding::percent_decode_str;
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use mediahub_core::types::StorageId;

type HmacSha256 = Hmac<Sha256>;

type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

/// Signature parameters as they arrive on a request query string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SignedQuery {
    /// Expiry as a unix timestamp.
    pub expires: Option<String>,
    /// Lowercase hex HMAC.
    pub signature: Option<String>,
    /// Storage the signature is bound to.
    pub storage: Option<String>,
}

/// Components of a signed URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUrlParts {
    /// URL without the signature parameters.
    pub path: String,
    /// Expiry as a unix timestamp.
    pub expires: i64,
    /// Hex signature.
    pub signature: String,
    /// Storage the signature is bound to.
    pub storage_id: Option<StorageId>,
}

/// Generates and verifies signed URLs with a process-wide secret.
#[derive(Clone)]
pub struct SignedUrlService {
    secret: Vec<u8>,
    clock: Clock,
}

impl std::fmt::Debug for SignedUrlService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedUrlService").finish_non_exhaustive()
    }
}

impl SignedUrlService {
    /// Create a service signing with `secret`.
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            clock: Arc::new(|| chrono::Utc::now().timestamp()),
        }
    }

    /// Replace the clock (unix seconds).
    pub fn with_clock(mut self, clock: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Current unix time according to the service clock.
    pub fn now(&self) -> i64 {
        (self.clock)()
    }

    /// Hex HMAC-SHA256 over the canonical string of the parameters.
    pub fn sign(&self, path: &str, expires: i64, storage_id: Option<StorageId>) -> String {
        let canonical = canonical_string(path, expires, storage_id);
        // HMAC accepts keys of any length, so this never fails.
        let mut mac = match HmacSha256::new_from_slice(&self.secret) {
            Ok(mac) => mac,
            Err(_) => return String::new(),
        };
        mac.update(canonical.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Signature query string (`expires=..&signature=..[&storage=..]`) for `path`.
    pub fn signature_query(
        &self,
        path: &str,
        expires_in: Duration,
        storage_id: Option<StorageId>,
    ) -> String {
        let expires = self.now().saturating_add(duration_secs(expires_in));
        let signature = self.sign(path, expires, storage_id);
        match storage_id {
            Some(id) => format!("expires={expires}&signature={signature}&storage={id}"),
            None => format!("expires={expires}&signature={signature}"),
        }
    }

    /// `path` with signature parameters appended.
    pub fn generate_signed_url(
        &self,
        path: &str,
        expires_in: Duration,
        storage_id: Option<StorageId>,
    ) -> String {
        let separator = if path.contains('?') { '&' } else { '?' };
        format!(
            "{path}{separator}{}",
            self.signature_query(path, expires_in, storage_id)
        )
    }

    /// Verify a signature. Expired links always fail.
    pub fn verify_signed_url(
        &self,
        path: &str,
        expires: i64,
        signature: &str,
        storage_id: Option<StorageId>,
    ) -> bool {
        if self.is_expired(expires) {
            return false;
        }
        let expected = self.sign(path, expires, storage_id);
        expected.as_bytes().ct_eq(signature.as_bytes()).into()
    }

    /// Verify signature parameters taken from a request query.
    pub fn verify_query(&self, path: &str, query: &SignedQuery) -> bool {
        let Some(expires) = query.expires.as_deref().and_then(|v| v.trim().parse().ok()) else {
            return false;
        };
        let Some(signature) = query.signature.as_deref().filter(|s| !s.is_empty()) else {
            return false;
        };
        let storage_id = match query.storage.as_deref() {
            Some(raw) => match raw.trim().parse::<StorageId>() {
                Ok(id) => Some(id),
                Err(_) => return false,
            },
            None => None,
        };
        self.verify_signed_url(path, expires, signature, storage_id)
    }

    /// Split a signed URL back into its parts. `None` when a parameter is missing.
    pub fn parse_signed_url(&self, url: &str) -> Option<SignedUrlParts> {
        let (base, query) = url.split_once('?')?;
        let mut expires = None;
        let mut signature = None;
        let mut storage_id = None;
        let mut rest = Vec::new();

        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let decoded = percent_decode_str(value).decode_utf8_lossy();
            match key {
                "expires" => expires = decoded.parse::<i64>().ok(),
                "signature" => signature = Some(decoded.into_owned()),
                "storage" => storage_id = Some(decoded.parse::<StorageId>().ok()?),
                _ => rest.push(pair),
            }
        }

        let path = if rest.is_empty() {
            base.to_string()
        } else {
            format!("{base}?{}", rest.join("&"))
        };

        Some(SignedUrlParts {
            path,
            expires: expires?,
            signature: signature?,
            storage_id,
        })
    }

    /// Whether `expires` is in the past.
    pub fn is_expired(&self, expires: i64) -> bool {
        self.now() > expires
    }

    /// Seconds left before `expires`, never negative.
    pub fn remaining_seconds(&self, expires: i64) -> i64 {
        expires.saturating_sub(self.now()).max(0)
    }
}

/// `<path length>:<path>:<expires>[:<storage>]`.
///
/// The length prefix keeps paths containing `:` from colliding with the
/// trailing fields.
fn canonical_string(path: &str, expires: i64, storage_id: Option<StorageId>) -> String {
    match storage_id {
        Some(id) => format!("{}:{path}:{expires}:{id}", path.len()),
        None => format!("{}:{path}:{expires}", path.len()),
    }
}

fn duration_secs(duration: Duration) -> i64 {
    i64::try_from(duration.as_secs()).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn service() -> SignedUrlService {
        SignedUrlService::new("test-secret").with_clock(|| NOW)
    }

    #[test]
    fn test_generated_url_verifies() {
        let svc = service();
        let url = svc.generate_signed_url("videos/1/a.mp4", Duration::from_secs(3600), Some(StorageId::new(4)));
        let parts = svc.parse_signed_url(&url).unwrap();
        assert_eq!(parts.path, "videos/1/a.mp4");
        assert_eq!(parts.expires, NOW + 3600);
        assert_eq!(parts.storage_id, Some(StorageId::new(4)));
        assert_eq!(parts.signature.len(), 64);
        assert!(svc.verify_signed_url(&parts.path, parts.expires, &parts.signature, parts.storage_id));
    }

    #[test]
    fn test_tampering_fails_verification() {
        let svc = service();
        let expires = NOW + 60;
        let sig = svc.sign("a.mp4", expires, Some(StorageId::new(1)));
        assert!(!svc.verify_signed_url("b.mp4", expires, &sig, Some(StorageId::new(1))));
        assert!(!svc.verify_signed_url("a.mp4", expires + 1, &sig, Some(StorageId::new(1))));
        assert!(!svc.verify_signed_url("a.mp4", expires, &sig, Some(StorageId::new(2))));
        assert!(!svc.verify_signed_url("a.mp4", expires, &sig, None));
        assert!(!svc.verify_signed_url("a.mp4", expires, &sig.to_uppercase(), Some(StorageId::new(1))));
        assert!(!svc.verify_signed_url("a.mp4", expires, &sig[1..], Some(StorageId::new(1))));
        assert!(!svc.verify_signed_url("a.mp4", expires, &format!("{sig}0"), Some(StorageId::new(1))));
    }

    #[test]
    fn test_any_case_change_in_signature_fails() {
        let svc = service();
        let expires = NOW + 60;
        let sig = svc.sign("/v.mp4", expires, None);
        let letter = sig.find(|c: char| c.is_ascii_alphabetic()).unwrap();
        let mut flipped = sig.clone();
        flipped[letter..=letter].make_ascii_uppercase();
        assert_ne!(flipped, sig);
        assert!(!svc.verify_signed_url("/v.mp4", expires, &flipped, None));
        assert!(svc.verify_signed_url("/v.mp4", expires, &sig, None));
    }

    #[test]
    fn test_different_paths_never_share_a_signature() {
        let svc = service();
        let expires = NOW + 60;
        assert_ne!(svc.sign("videos/1/a.mp4", expires, None), svc.sign("videos/1/b.mp4", expires, None));
        assert_ne!(
            svc.sign("videos/1/a.mp4", expires, Some(StorageId::new(2))),
            svc.sign("videos/1/b.mp4", expires, Some(StorageId::new(2)))
        );
    }

    #[test]
    fn test_colon_in_path_cannot_shift_fields() {
        let svc = service();
        let expires = NOW + 60;
        let storage = NOW + 120;
        let bound = svc.sign("x", expires, Some(StorageId::new(storage)));
        let shifted_path = format!("x:{expires}");
        assert_ne!(bound, svc.sign(&shifted_path, storage, None));
        assert!(!svc.verify_signed_url(&shifted_path, storage, &bound, None));
        assert_eq!(canonical_string("a:b", 7, Some(StorageId::new(1))), "3:a:b:7:1");
    }

    #[test]
    fn test_different_secret_fails() {
        let expires = NOW + 60;
        let sig = SignedUrlService::new("other").with_clock(|| NOW).sign("a", expires, None);
        assert!(!service().verify_signed_url("a", expires, &sig, None));
    }

    #[test]
    fn test_expiry_boundary() {
        let svc = service();
        let at_now = svc.sign("a", NOW, None);
        assert!(svc.verify_signed_url("a", NOW, &at_now, None));
        let past = svc.sign("a", NOW - 1, None);
        assert!(!svc.verify_signed_url("a", NOW - 1, &past, None));
        assert!(svc.is_expired(NOW - 1));
        assert_eq!(svc.remaining_seconds(NOW + 90), 90);
        assert_eq!(svc.remaining_seconds(NOW - 90), 0);
    }

    #[test]
    fn test_existing_query_uses_ampersand() {
        let url = service().generate_signed_url("/download?id=5", Duration::from_secs(10), None);
        assert!(url.starts_with("/download?id=5&expires="));
        assert!(!url.contains("storage="));
    }

    #[test]
    fn test_verify_query_rejects_missing_or_garbled_params() {
        let svc = service();
        let expires = NOW + 60;
        let signature = svc.sign("a", expires, Some(StorageId::new(3)));
        let good = SignedQuery {
            expires: Some(expires.to_string()),
            signature: Some(signature.clone()),
            storage: Some("3".to_string()),
        };
        assert!(svc.verify_query("a", &good));
        assert!(!svc.verify_query("a", &SignedQuery { expires: None, ..good.clone() }));
        assert!(!svc.verify_query("a", &SignedQuery { expires: Some("soon".into()), ..good.clone() }));
        assert!(!svc.verify_query("a", &SignedQuery { storage: Some("x".into()), ..good.clone() }));
        assert!(!svc.verify_query("a", &SignedQuery { signature: None, ..good }));
    }

    #[test]
    fn test_parse_requires_signature_params() {
        assert!(service().parse_signed_url("/a.mp4").is_none());
        assert!(service().parse_signed_url("/a.mp4?expires=5").is_none());
    }
}
