//! Random identifiers for node keys and query names.
//!
//! Tokens are drawn from the operating system CSPRNG and mapped onto a
//! 62-symbol alphanumeric alphabet. Bytes at or above 248 (the largest
//! multiple of 62 that fits in a byte) are discarded so every symbol is
//! equally likely.

use thiserror::Error;

/// Length of node keys and query names.
pub const TOKEN_LEN: usize = 32;

const ALPHABET: &[u8; 62] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Largest byte value (exclusive) that maps uniformly onto the alphabet.
const REJECT_AT: u8 = 248;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("OS random source unavailable: {0}")]
    Entropy(String),
}

/// Generate a `len`-symbol alphanumeric token from the OS CSPRNG.
pub fn random_token(len: usize) -> Result<String, TokenError> {
    let mut out = String::with_capacity(len);
    let mut buf = [0u8; 64];
    while out.len() < len {
        getrandom::getrandom(&mut buf).map_err(|e| TokenError::Entropy(e.to_string()))?;
        for &b in buf.iter().filter(|&&b| b < REJECT_AT) {
            out.push(ALPHABET[(b % 62) as usize] as char);
            if out.len() == len {
                break;
            }
        }
    }
    Ok(out)
}
