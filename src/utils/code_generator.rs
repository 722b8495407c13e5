//! Short code generation and format rules.
//!
//! Codes are drawn from a 64-symbol, path-segment-safe alphabet. Generated
//! codes are [`GENERATED_LENGTH`] characters, so the space holds
//! 64^8 = 2^48 (about 2.8e14) codes. With `n` codes already allocated, one
//! attempt collides with probability `n / 2^48`, and all
//! [`MAX_ATTEMPTS`](crate::application::services::code_allocator::MAX_ATTEMPTS)
//! attempts collide with probability `(n / 2^48)^10`. Even at a billion
//! stored links that is below 1e-24.

/// Permitted short code symbols.
pub const ALPHABET: &[u8; 64] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789_-";

pub const MIN_LENGTH: usize = 4;
pub const MAX_LENGTH: usize = 32;
pub const GENERATED_LENGTH: usize = 8;

/// Codes that collide with service routes or would read as system pages.
pub const RESERVED_CODES: &[&str] = &[
    "api", "admin", "healthz", "readyz", "docs", "swagger", "www", "app", "auth", "login",
    "logout", "register", "signup",
];

/// Why a code is not usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeRejection {
    Length,
    Alphabet,
    Reserved,
}

/// Generates a random code of [`GENERATED_LENGTH`] symbols.
///
/// Each random byte is masked to 6 bits; with a 64-symbol alphabet every
/// symbol is equally likely.
///
/// # Errors
///
/// Returns the entropy source error if the OS cannot supply random bytes.
pub fn generate_code() -> Result<String, getrandom::Error> {
    let mut buffer = [0u8; GENERATED_LENGTH];
    getrandom::fill(&mut buffer)?;

    Ok(buffer
        .iter()
        .map(|b| char::from(ALPHABET[usize::from(b & 0x3f)]))
        .collect())
}

pub fn is_reserved(code: &str) -> bool {
    RESERVED_CODES.contains(&code)
}

/// Checks length, alphabet and the reserved list, in that order.
pub fn check_code(code: &str) -> Result<(), CodeRejection> {
    if code.len() < MIN_LENGTH || code.len() > MAX_LENGTH {
        return Err(CodeRejection::Length);
    }

    if !code.bytes().all(|b| ALPHABET.contains(&b)) {
        return Err(CodeRejection::Alphabet);
    }

    if is_reserved(code) {
        return Err(CodeRejection::Reserved);
    }

    Ok(())
}
