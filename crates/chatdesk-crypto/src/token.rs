use rand::Rng;
use rand::distr::Alphanumeric;
use sha1::{Digest, Sha1};

/// Salt prefix length. The conversation id column holds 65 characters,
/// which caps this at 25.
pub const SALT_LENGTH: usize = 25;

/// Hex-encoded SHA-1 digest length.
pub const HASH_HEX_LENGTH: usize = 40;

pub const TOKEN_LENGTH: usize = SALT_LENGTH + HASH_HEX_LENGTH;

/// Shortest fingerprint a conversation may be started with.
pub const MIN_FINGERPRINT_LENGTH: usize = 7;

/// Build the string a token is bound to.
pub fn fingerprint(username: &str, client_address: &str, client_agent: &str) -> String {
    format!("{}{}{}", username, client_address, client_agent)
}

pub fn is_long_enough(fingerprint: &str) -> bool {
    fingerprint.chars().count() >= MIN_FINGERPRINT_LENGTH
}

/// Mint a fresh token bound to `fingerprint`.
pub fn generate(fingerprint: &str) -> String {
    let salt = generate_salt();
    let digest = hash(&salt, fingerprint);
    salt + &digest
}

/// Check that `token` was minted for `fingerprint`.
/// Malformed tokens simply fail to verify.
pub fn verify(token: &str, fingerprint: &str) -> bool {
    if token.len() != TOKEN_LENGTH || !token.is_ascii() {
        return false;
    }
    let (salt, digest) = token.split_at(SALT_LENGTH);
    hash(salt, fingerprint) == digest
}

fn generate_salt() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(SALT_LENGTH)
        .map(char::from)
        .collect()
}

fn hash(salt: &str, fingerprint: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(salt.as_bytes());
    hasher.update(fingerprint.as_bytes());
    hex::encode(hasher.finalize())
}
