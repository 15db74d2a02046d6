// common/src/models/session.rs
use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

/// Information about the dApp that is connecting to the wallet
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DappInfo {
    /// Name of the dApp, shown to the wallet user
    pub name: String,
    /// URL of the dApp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    /// Short description of the dApp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    /// Icon as a base64 encoded JPEG, PNG or SVG data URI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl DappInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn with_desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = Some(desc.into());
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }
}

/// A session granted by the connect server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Session ID issued by the server
    pub id: String,
    /// Date-time the session expires
    #[serde(with = "chrono::serde::ts_seconds")]
    pub exp: DateTime<Utc>,
    /// Addresses the session is allowed to sign for, in the order the server gave them
    pub addrs: Vec<String>,
}

/// Everything persisted after a successful session handshake
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSessionInfo {
    /// Connect ID of the key pair the session was established with
    pub connect_id: String,
    pub session: SessionInfo,
    pub dapp: DappInfo,
    /// Base URL of the connect server the session belongs to
    #[serde(rename = "serverURL")]
    pub server_url: String,
}

impl StoredSessionInfo {
    /// Check if the session has passed its expiration date-time.
    ///
    /// The connect server is the one that enforces expiration. This is only a
    /// hint for callers deciding whether to establish a new session.
    pub fn is_expired(&self) -> bool {
        self.session.exp <= Utc::now()
    }

    /// Whether the session authorizes signing for the given address
    pub fn authorizes(&self, addr: &str) -> bool {
        self.session.addrs.iter().any(|a| a == addr)
    }
}
