//! Cryptographically secure random token generation.

use rand::rngs::OsRng;
use rand::RngCore;

use crate::errors::{Error, Result};

/// Alphabet for opaque token identifiers.
const TOKEN_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Length of the random `jti` correlating a JWT to its stored row, and of
/// verification codes and password-reset tokens.
pub const TOKEN_RANDOM_ID_LENGTH: usize = 32;

/// Generate a random alphanumeric string of the given length from the OS
/// entropy source.
///
/// Rejection sampling keeps the distribution uniform over the 62-character
/// alphabet. If the entropy source is unavailable this fails with a crypto
/// error; there is deliberately no fallback to a weaker source.
pub fn random_token(length: usize) -> Result<String> {
    // 248 is the largest multiple of 62 that fits in a byte; bytes at or
    // above it would bias the low end of the alphabet and are rejected.
    const REJECTION_BOUND: u8 = 248;

    let mut out = String::with_capacity(length);
    let mut buf = [0u8; 64];
    while out.len() < length {
        OsRng
            .try_fill_bytes(&mut buf)
            .map_err(|err| Error::crypto(format!("Entropy source unavailable: {}", err)))?;
        for &byte in buf.iter() {
            if out.len() == length {
                break;
            }
            if byte < REJECTION_BOUND {
                out.push(TOKEN_ALPHABET[(byte % 62) as usize] as char);
            }
        }
    }
    Ok(out)
}
