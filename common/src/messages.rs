// Common Crate - messages.rs
// Request and response bodies exchanged with the connect server
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::session::DappInfo;

/// Body of `POST /session/init`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInitRequest {
    /// Connect ID (base64 public key) of the client
    pub dapp_id: String,
    #[serde(flatten)]
    pub dapp: DappInfo,
}

/// Response to `POST /session/init`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInitResponse {
    /// ID of the pending confirmation
    pub id: String,
    /// Code the user has to enter in the wallet
    pub code: String,
    /// Opaque confirmation token
    pub token: String,
    /// When the confirmation token expires, in Unix seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

/// Body of `POST /session/confirm`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfirmRequest {
    pub token: String,
    pub dapp: DappInfo,
}

/// Response to `POST /session/confirm`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfirmResponse {
    /// Session ID
    pub id: String,
    /// Session expiration in Unix seconds
    pub exp: i64,
    /// Addresses the dApp is allowed to use in the session
    #[serde(default)]
    pub addrs: Vec<String>,
}

/// Body of `POST /transaction/sign`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionSignRequest {
    /// Base64 encoded unsigned transaction
    pub transaction: String,
    /// Address of the signer, when the session has more than one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signer: Option<String>,
}

/// Response to `POST /transaction/sign`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionSignResponse {
    /// Base64 encoded signed transaction
    pub signed_transaction: String,
}

/// Error payload returned by the connect server
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ApiError {
    /// Read an error payload from a response body. Bodies that are not an
    /// error object keep their raw text as the message.
    pub fn from_body(body: &[u8]) -> Self {
        match serde_json::from_slice::<ApiError>(body) {
            Ok(err) => err,
            Err(_) => {
                let text = String::from_utf8_lossy(body).trim().to_string();
                Self {
                    name: None,
                    message: if text.is_empty() { None } else { Some(text) },
                }
            }
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.name, &self.message) {
            (Some(name), Some(message)) => write!(f, "{}: {}", name, message),
            (Some(name), None) => write!(f, "{}", name),
            (None, Some(message)) => write!(f, "{}", message),
            (None, None) => write!(f, "no error details"),
        }
    }
}
