//! PBKDF2-SHA256 password hashing.
//!
//! Hashes are stored as `pbkdf2:sha256:<iterations>$<salt>$<hash>` with salt and
//! hash in unpadded URL-safe base64, so the cost can be raised without touching
//! existing rows.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::StockError;

pub const DEFAULT_ITERATIONS: u32 = 600_000;
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;
const METHOD: &str = "pbkdf2:sha256";

/// Hash `password` with a fresh random salt. Pass [`DEFAULT_ITERATIONS`] outside tests.
pub fn hash_password(password: &str, iterations: u32) -> Result<String, StockError> {
    let mut salt = [0u8; SALT_LEN];
    getrandom::getrandom(&mut salt)
        .map_err(|e| StockError::Io(std::io::Error::other(e.to_string())))?;

    let mut hash = [0u8; HASH_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, iterations, &mut hash);

    Ok(format!(
        "{METHOD}:{iterations}${}${}",
        URL_SAFE_NO_PAD.encode(salt),
        URL_SAFE_NO_PAD.encode(hash)
    ))
}

struct EncodedHash {
    iterations: u32,
    salt: Vec<u8>,
    hash: Vec<u8>,
}

fn parse(encoded: &str) -> Result<EncodedHash, StockError> {
    let mut parts = encoded.split('$');
    let (Some(head), Some(salt), Some(hash), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(StockError::PasswordHash);
    };

    let iterations = head
        .strip_prefix(METHOD)
        .and_then(|rest| rest.strip_prefix(':'))
        .and_then(|n| n.parse::<u32>().ok())
        .filter(|n| *n > 0)
        .ok_or(StockError::PasswordHash)?;

    Ok(EncodedHash {
        iterations,
        salt: URL_SAFE_NO_PAD
            .decode(salt)
            .map_err(|_| StockError::PasswordHash)?,
        hash: URL_SAFE_NO_PAD
            .decode(hash)
            .map_err(|_| StockError::PasswordHash)?,
    })
}

/// Verify `password` against an encoded hash. Malformed encodings never verify.
pub fn verify_password(password: &str, encoded: &str) -> bool {
    let Ok(stored) = parse(encoded) else {
        return false;
    };
    if stored.hash.is_empty() {
        return false;
    }

    let mut computed = vec![0u8; stored.hash.len()];
    pbkdf2_hmac::<Sha256>(
        password.as_bytes(),
        &stored.salt,
        stored.iterations,
        &mut computed,
    );
    bool::from(computed.ct_eq(&stored.hash))
}
