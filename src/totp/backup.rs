//! Single-use backup codes for MFA recovery.
//!
//! Codes are generated in grouped `XXXX-XXXX-XXXX` form over an alphabet with
//! no ambiguous characters. Only SHA-256 digests are stored; the raw codes are
//! shown to the user once at setup time. Consumption removes the digest from
//! the stored set so each code works exactly once.

use anyhow::{Context, Result, anyhow};
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

const BACKUP_CODE_COUNT: usize = 10;
const BACKUP_CODE_LEN: usize = 12;
const BACKUP_CODE_GROUP_SIZE: usize = 4;
const BACKUP_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// A freshly generated backup-code batch (plaintext + digests).
#[derive(Debug)]
pub struct BackupCodeBatch {
    pub codes: Vec<String>,
    pub code_hashes: Vec<String>,
}

impl BackupCodeBatch {
    /// Generate a new batch of [`BACKUP_CODE_COUNT`] unique codes.
    ///
    /// # Errors
    /// Returns an error if code formatting fails.
    pub fn generate() -> Result<Self> {
        let mut rng = OsRng;
        Self::generate_with_rng(&mut rng)
    }

    fn generate_with_rng<R: RngCore + ?Sized>(rng: &mut R) -> Result<Self> {
        let mut seen = HashSet::with_capacity(BACKUP_CODE_COUNT);
        let mut codes = Vec::with_capacity(BACKUP_CODE_COUNT);
        let mut code_hashes = Vec::with_capacity(BACKUP_CODE_COUNT);
        while codes.len() < BACKUP_CODE_COUNT {
            let code = generate_code(rng)?;
            // Collisions get a fresh draw; every code in a batch is distinct.
            if !seen.insert(code.clone()) {
                continue;
            }
            code_hashes.push(hash_backup_code(&code)?);
            codes.push(code);
        }
        Ok(Self { codes, code_hashes })
    }
}

/// Normalize a submitted backup code: strip separators, uppercase, and check
/// length and alphabet.
///
/// # Errors
/// Returns an error when the input cannot be a backup code.
pub fn normalize_backup_code(input: &str) -> Result<String> {
    let normalized: String = input
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|ch| ch.to_ascii_uppercase())
        .collect();

    if normalized.len() != BACKUP_CODE_LEN {
        return Err(anyhow!("invalid backup code length"));
    }

    if !normalized
        .as_bytes()
        .iter()
        .all(|ch| BACKUP_CODE_ALPHABET.contains(ch))
    {
        return Err(anyhow!("invalid backup code characters"));
    }

    Ok(normalized)
}

/// SHA-256 digest of a normalized backup code, hex-encoded. This is the value
/// stored in the user's backup-code set.
///
/// # Errors
/// Returns an error when the input is not a well-formed backup code.
pub fn hash_backup_code(code: &str) -> Result<String> {
    let normalized = normalize_backup_code(code)?;
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Format a normalized code for display (`XXXX-XXXX-XXXX`).
fn format_backup_code(normalized: &str) -> Result<String> {
    if normalized.len() != BACKUP_CODE_LEN {
        return Err(anyhow!("invalid backup code length"));
    }
    let mut out = String::with_capacity(BACKUP_CODE_LEN + 2);
    for (idx, chunk) in normalized
        .as_bytes()
        .chunks(BACKUP_CODE_GROUP_SIZE)
        .enumerate()
    {
        if idx > 0 {
            out.push('-');
        }
        out.push_str(std::str::from_utf8(chunk).context("invalid backup code chunk")?);
    }
    Ok(out)
}

fn generate_code<R: RngCore + ?Sized>(rng: &mut R) -> Result<String> {
    let mut raw = [0u8; BACKUP_CODE_LEN];
    rng.fill_bytes(&mut raw);
    let mut normalized = String::with_capacity(BACKUP_CODE_LEN);
    for byte in raw {
        let idx = usize::from(byte) % BACKUP_CODE_ALPHABET.len();
        if let Some(&char_byte) = BACKUP_CODE_ALPHABET.get(idx) {
            normalized.push(char_byte as char);
        }
    }
    format_backup_code(&normalized)
}
