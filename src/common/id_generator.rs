// src/common/id_generator.rs
//! Crockford Base32 token generator
//!
//! Produces URL-safe random strings for OAuth state tokens and for the
//! collision-avoiding suffix of mirrored avatar filenames.
//!
//! Randomness comes from `rand::thread_rng`, a CSPRNG, so tokens are
//! unpredictable as well as unique.

use rand::Rng;

/// Crockford Base32 alphabet (excludes I, L, O, U to avoid confusion)
const CROCKFORD_ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// 26 characters * 5 bits = 130 bits of entropy
pub const STATE_TOKEN_LENGTH: usize = 26;

/// Length of the random part appended to mirrored file names
pub const FILE_SUFFIX_LENGTH: usize = 8;

/// Generate a random Crockford Base32 string of specified length
fn generate_crockford_string(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| {
            let idx = rng.gen_range(0..32);
            CROCKFORD_ALPHABET[idx] as char
        })
        .collect()
}

/// Generate a one-time OAuth state token
pub fn generate_state_token() -> String {
    generate_crockford_string(STATE_TOKEN_LENGTH)
}

/// Generate the random part of a mirrored file name
pub fn generate_file_suffix() -> String {
    generate_crockford_string(FILE_SUFFIX_LENGTH).to_lowercase()
}
