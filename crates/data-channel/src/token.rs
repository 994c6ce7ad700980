//! Session token generation and validation.

use fileput_protocol::constants::TOKEN_LEN;
use rand::Rng;

/// Generates a CSPRNG token as a lowercase hex string of [`TOKEN_LEN`] characters.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_LEN / 2];
    rand::thread_rng().fill(&mut bytes);
    hex::encode(bytes)
}

/// Returns `true` if `token` has the handshake length and is all hex.
pub fn is_well_formed(token: &str) -> bool {
    token.len() == TOKEN_LEN && token.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Validates a received token against the expected value.
///
/// Comparison time does not depend on where the tokens differ.
pub fn validate_token(received: &str, expected: &str) -> bool {
    if received.len() != expected.len() {
        return false;
    }
    received
        .bytes()
        .zip(expected.bytes())
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}
