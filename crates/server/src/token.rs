//! Auth token issuance and validation.

/// Generates a fresh per-instance token (UUID v4, hyphenated).
pub fn generate_token() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Validates a received token against the expected value.
///
/// Uses constant-time comparison to prevent timing attacks.
pub fn validate_token(received: &str, expected: &str) -> bool {
    if received.len() != expected.len() {
        return false;
    }
    let mut diff = 0u8;
    for (a, b) in received.bytes().zip(expected.bytes()) {
        diff |= a ^ b;
    }
    diff == 0
}
