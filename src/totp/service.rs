use anyhow::{Result, anyhow};
use std::time::{SystemTime, UNIX_EPOCH};
use totp_rs::{Algorithm, Secret, TOTP};

const TOTP_DIGITS: usize = 6;
const TOTP_STEP_SECONDS: u64 = 30;
// One step of tolerated clock drift on either side of the current step.
const TOTP_SKEW_STEPS: u8 = 1;

/// Stateless TOTP engine: secret generation, provisioning data for
/// authenticator apps, and drift-tolerant code verification.
#[derive(Clone, Debug)]
pub struct TotpEngine {
    issuer: String,
}

impl TotpEngine {
    #[must_use]
    pub fn new(issuer: String) -> Self {
        Self { issuer }
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Generate a fresh random secret, base32-encoded (160 bits of entropy).
    #[must_use]
    pub fn generate_secret() -> String {
        Secret::generate_secret().to_encoded().to_string()
    }

    /// otpauth:// URI for QR-code enrollment, labeled with the account email.
    ///
    /// # Errors
    /// Returns an error if the secret is not valid base32.
    pub fn provisioning_uri(&self, secret_base32: &str, account: &str) -> Result<String> {
        Ok(self.totp(secret_base32, account)?.get_url())
    }

    /// QR code for the provisioning URI as a `data:image/png;base64,...` URL.
    ///
    /// # Errors
    /// Returns an error if the secret is invalid or QR rendering fails.
    pub fn qr_code_data_url(&self, secret_base32: &str, account: &str) -> Result<String> {
        let qr = self
            .totp(secret_base32, account)?
            .get_qr_base64()
            .map_err(|e| anyhow!("QR gen error: {e}"))?;
        Ok(format!("data:image/png;base64,{qr}"))
    }

    /// Verify a submitted code against the current time, tolerating one step
    /// of clock drift in either direction.
    ///
    /// # Errors
    /// Returns an error if the secret is not valid base32.
    pub fn verify(&self, secret_base32: &str, code: &str) -> Result<bool> {
        self.verify_at(secret_base32, code, unix_now())
    }

    /// Verify against an explicit unix timestamp. Codes two or more steps
    /// away from `time` are rejected.
    ///
    /// # Errors
    /// Returns an error if the secret is not valid base32.
    pub fn verify_at(&self, secret_base32: &str, code: &str, time: u64) -> Result<bool> {
        Ok(self.totp(secret_base32, "account")?.check(code, time))
    }

    /// Generate the code for an explicit unix timestamp. Test helper for
    /// exercising the drift window.
    ///
    /// # Errors
    /// Returns an error if the secret is not valid base32.
    pub fn generate_at(&self, secret_base32: &str, time: u64) -> Result<String> {
        Ok(self.totp(secret_base32, "account")?.generate(time))
    }

    fn totp(&self, secret_base32: &str, account: &str) -> Result<TOTP> {
        let secret_bytes = Secret::Encoded(secret_base32.to_string())
            .to_bytes()
            .map_err(|e| anyhow!("Invalid TOTP secret: {e}"))?;
        TOTP::new(
            Algorithm::SHA1,
            TOTP_DIGITS,
            TOTP_SKEW_STEPS,
            TOTP_STEP_SECONDS,
            secret_bytes,
            Some(self.issuer.clone()),
            account.to_string(),
        )
        .map_err(|e| anyhow!("TOTP init error: {e}"))
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::TotpEngine;

    fn engine() -> TotpEngine {
        TotpEngine::new("Folio Test".to_string())
    }

    #[test]
    fn generated_secrets_are_unique_base32() {
        let first = TotpEngine::generate_secret();
        let second = TotpEngine::generate_secret();
        assert_ne!(first, second);
        // 160 bits -> 32 base32 characters.
        assert_eq!(first.len(), 32);
    }

    #[test]
    fn provisioning_uri_carries_issuer_and_account() {
        let engine = engine();
        let secret = TotpEngine::generate_secret();
        let uri = engine.provisioning_uri(&secret, "a@x.com").unwrap();
        assert!(uri.starts_with("otpauth://totp/"));

        let parsed = url::Url::parse(&uri).unwrap();
        assert_eq!(parsed.scheme(), "otpauth");
        let issuer = parsed
            .query_pairs()
            .find(|(key, _)| key == "issuer")
            .map(|(_, value)| value.into_owned());
        assert_eq!(issuer.as_deref(), Some("Folio Test"));
        assert!(parsed.path().contains("a%40x.com"));
    }

    #[test]
    fn qr_code_is_png_data_url() {
        use base64::{Engine, engine::general_purpose::STANDARD};

        let engine = engine();
        let secret = TotpEngine::generate_secret();
        let qr = engine.qr_code_data_url(&secret, "a@x.com").unwrap();
        let payload = qr.strip_prefix("data:image/png;base64,").unwrap();

        // PNG magic bytes survive the base64 round trip.
        let decoded = STANDARD.decode(payload).unwrap();
        assert_eq!(&decoded[..4], b"\x89PNG");
    }

    #[test]
    fn verify_accepts_current_step() {
        let engine = engine();
        let secret = TotpEngine::generate_secret();
        let now = 1_700_000_000;
        let code = engine.generate_at(&secret, now).unwrap();
        assert!(engine.verify_at(&secret, &code, now).unwrap());
    }

    #[test]
    fn verify_accepts_one_step_of_drift() {
        let engine = engine();
        let secret = TotpEngine::generate_secret();
        let now = 1_700_000_000;
        let code = engine.generate_at(&secret, now).unwrap();
        assert!(engine.verify_at(&secret, &code, now - 30).unwrap());
        assert!(engine.verify_at(&secret, &code, now + 30).unwrap());
    }

    #[test]
    fn verify_rejects_two_steps_of_drift() {
        let engine = engine();
        let secret = TotpEngine::generate_secret();
        // Mid-step so +-60s always lands two steps away.
        let now = 1_700_000_015;
        let code = engine.generate_at(&secret, now).unwrap();
        assert!(!engine.verify_at(&secret, &code, now - 90).unwrap());
        assert!(!engine.verify_at(&secret, &code, now + 90).unwrap());
    }

    #[test]
    fn verify_rejects_garbage_codes() {
        let engine = engine();
        let secret = TotpEngine::generate_secret();
        assert!(!engine.verify_at(&secret, "000000", 1_700_000_000).unwrap()
            || !engine.verify_at(&secret, "999999", 1_700_000_000).unwrap());
        assert!(engine.verify_at("not base32!", "123456", 0).is_err());
    }
}
