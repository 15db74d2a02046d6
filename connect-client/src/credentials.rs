// connect-client/src/credentials.rs
use crate::error::AuthError;
use crate::keys::ConnectKeyPair;

/// MAC algorithm of a set of credentials
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacAlgorithm {
    Sha256,
}

impl MacAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            MacAlgorithm::Sha256 => "sha256",
        }
    }
}

/// Credentials used to authenticate requests to the connect server
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Identifies the credentials to the server
    pub id: String,
    /// MAC key
    pub key: String,
    pub algorithm: MacAlgorithm,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("id", &self.id)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// Turns the connect key pair and a server-issued ID into request credentials.
///
/// The ID is the confirmation ID from session initialization while confirming
/// a session, and the session ID afterwards.
pub trait CredentialResolver: Send + Sync {
    fn resolve(&self, key_pair: &ConnectKeyPair, peer_id: &str) -> Result<Credentials, AuthError>;
}

/// Derives the MAC key through X25519 ECDH between the connect key pair and
/// the public key the server issued as the ID. The key is the base64 text of
/// the shared secret, which is what the server uses as its key material.
#[derive(Debug, Clone, Copy, Default)]
pub struct EcdhCredentials;

impl CredentialResolver for EcdhCredentials {
    fn resolve(&self, key_pair: &ConnectKeyPair, peer_id: &str) -> Result<Credentials, AuthError> {
        let shared = key_pair.shared_secret(peer_id)?;
        Ok(Credentials {
            id: peer_id.to_string(),
            key: base64::encode(shared),
            algorithm: MacAlgorithm::Sha256,
        })
    }
}
