// Common Crate - utils.rs
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use rand::{thread_rng, Rng};
use rand::distributions::Alphanumeric;
use sha2::{Sha256, Digest};
use chrono::Utc;

/// Length of the nonces attached to authenticated requests
pub const NONCE_LENGTH: usize = 16;

/// Setup tracing for consistent logging across binaries
pub fn setup_tracing() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Generate a random alphanumeric token of specified length
pub fn generate_secure_token(length: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Generate a per-request nonce
pub fn generate_nonce() -> String {
    generate_secure_token(NONCE_LENGTH)
}

/// Current time in Unix seconds
pub fn unix_timestamp() -> i64 {
    Utc::now().timestamp()
}

/// SHA-256 digest of the input, base64 encoded
pub fn sha256_base64(input: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input);
    base64::encode(hasher.finalize())
}
