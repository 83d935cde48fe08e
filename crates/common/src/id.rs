//! CSPRNG-backed identifier generation.
//!
//! Session and connection identifiers are short base62 strings rather
//! than UUIDs so they stay readable in URLs and logs. Generation uses
//! the system CSPRNG; identifiers carry 72 bits of entropy at the
//! default length, which is enough that collisions are handled as
//! storage-level uniqueness violations rather than prevented here.

use ring::rand::{SecureRandom, SystemRandom};
use thiserror::Error;

/// Base62 alphabet for identifier generation.
const BASE62_CHARS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Length of generated identifiers.
pub const ID_LENGTH: usize = 12;

/// Number of random bytes backing one identifier (72 bits entropy).
const ID_RANDOM_BYTES: usize = 9;

/// Identifier generation error.
#[derive(Debug, Error)]
pub enum IdError {
    /// The system CSPRNG failed to produce random bytes.
    #[error("RNG failure")]
    Rng,

    /// Internal encoding failure.
    #[error("identifier encoding failed")]
    Encoding,
}

/// Generate a random base62 identifier of [`ID_LENGTH`] characters.
///
/// Always returns exactly `ID_LENGTH` characters, left-padded with '0'
/// if the random value produces fewer digits.
pub fn generate_id() -> Result<String, IdError> {
    let rng = SystemRandom::new();
    let mut bytes = [0u8; ID_RANDOM_BYTES];
    rng.fill(&mut bytes).map_err(|_| IdError::Rng)?;

    // Convert bytes to a big integer (u128 can hold 9 bytes = 72 bits)
    let mut value: u128 = 0;
    for &b in &bytes {
        value = (value << 8) | u128::from(b);
    }

    // Encode as base62, extracting digits from least-significant end
    let mut id = Vec::with_capacity(ID_LENGTH);
    for _ in 0..ID_LENGTH {
        let idx = (value % 62) as usize;
        let ch = BASE62_CHARS.get(idx).ok_or(IdError::Encoding)?;
        id.push(*ch);
        value /= 62;
    }

    // Reverse to get most-significant digit first (consistent ordering)
    id.reverse();

    String::from_utf8(id).map_err(|_| IdError::Encoding)
}

/// Generate an identifier with the given prefix, e.g. `session_3xK9...`.
pub fn generate_prefixed_id(prefix: &str) -> Result<String, IdError> {
    Ok(format!("{}_{}", prefix, generate_id()?))
}
