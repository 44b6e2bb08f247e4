//! Room passwords.

use rand::rngs::OsRng;
use rand::Rng;

/// Characters room passwords are drawn from.
pub const PASSWORD_CHARSET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!@#$%^&*()_+";

/// Generate a room password from the OS random source.
pub fn generate_password(length: usize) -> String {
    let mut rng = OsRng;
    (0..length)
        .map(|_| PASSWORD_CHARSET[rng.gen_range(0..PASSWORD_CHARSET.len())] as char)
        .collect()
}

/// Whether `provided` opens a room protected by `expected`.
///
/// A room without a password admits everyone.
pub fn password_matches(expected: &str, provided: &str) -> bool {
    expected.is_empty() || constant_time_eq(expected.as_bytes(), provided.as_bytes())
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
