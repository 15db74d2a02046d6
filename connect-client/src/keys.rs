// connect-client/src/keys.rs
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::error::AuthError;

/// The X25519 key pair identifying this client to the connect server.
///
/// The public key, base64 encoded, is the connect ID. The secret never leaves
/// this type except through [`ConnectKeyPair::to_record`] for persistence.
#[derive(Clone)]
pub struct ConnectKeyPair {
    secret: StaticSecret,
    public: PublicKey,
}

/// Persisted form of a [`ConnectKeyPair`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyPairRecord {
    /// Base64 encoded private key
    secret: String,
    /// Base64 encoded public key
    public: String,
}

impl ConnectKeyPair {
    /// Generate a new key pair from the OS random number generator
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Base64 encoded public key, which the server knows as the dApp ID
    pub fn connect_id(&self) -> String {
        base64::encode(self.public.as_bytes())
    }

    /// Short hex fingerprint of the public key, safe for logs
    pub fn fingerprint(&self) -> String {
        hex::encode(&self.public.as_bytes()[..8])
    }

    /// ECDH shared secret with the given base64 encoded public key.
    ///
    /// Low order peer keys are rejected, since they force a shared secret that
    /// does not depend on our private key.
    pub fn shared_secret(&self, peer_public_b64: &str) -> Result<[u8; 32], AuthError> {
        let peer = decode_public_key(peer_public_b64)?;
        let shared = self.secret.diffie_hellman(&peer);
        if !shared.was_contributory() {
            return Err(AuthError::InvalidCredentials(
                "peer public key is a low order point".to_string(),
            ));
        }
        Ok(shared.to_bytes())
    }

    pub fn to_record(&self) -> KeyPairRecord {
        KeyPairRecord {
            secret: base64::encode(self.secret.to_bytes()),
            public: self.connect_id(),
        }
    }

    pub fn from_record(record: &KeyPairRecord) -> Result<Self, String> {
        let bytes = decode_32(&record.secret).map_err(|e| format!("private key: {}", e))?;
        let secret = StaticSecret::from(bytes);
        let public = PublicKey::from(&secret);

        // The stored public key has to belong to the stored private key
        if base64::encode(public.as_bytes()) != record.public {
            return Err("public key does not match private key".to_string());
        }

        Ok(Self { secret, public })
    }
}

impl fmt::Debug for ConnectKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectKeyPair")
            .field("connect_id", &self.connect_id())
            .finish_non_exhaustive()
    }
}

/// Decode a base64 encoded X25519 public key
pub fn decode_public_key(b64: &str) -> Result<PublicKey, AuthError> {
    decode_32(b64)
        .map(PublicKey::from)
        .map_err(|e| AuthError::InvalidCredentials(format!("peer public key: {}", e)))
}

fn decode_32(b64: &str) -> Result<[u8; 32], String> {
    let bytes = base64::decode(b64).map_err(|e| e.to_string())?;
    <[u8; 32]>::try_from(bytes.as_slice())
        .map_err(|_| format!("expected 32 bytes, got {}", bytes.len()))
}
