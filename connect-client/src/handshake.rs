// connect-client/src/handshake.rs
use chrono::{DateTime, TimeZone, Utc};
use std::fmt;
use tokio::sync::watch;

use common::{
    DappInfo, SessionConfirmRequest, SessionConfirmResponse, SessionInfo, SessionInitRequest,
    SessionInitResponse, StoredSessionInfo,
};

use crate::api::ServerApi;
use crate::credentials::CredentialResolver;
use crate::error::{ConnectError, Endpoint, Result};
use crate::keys::ConnectKeyPair;
use crate::store::SessionStore;

/// Where a session handshake currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandshakeState {
    #[default]
    Unestablished,
    Initiating,
    AwaitingUserConfirmation,
    Confirming,
    Established,
    Failed,
    Ended,
}

impl HandshakeState {
    /// Whether the state machine allows moving from this state to `next`
    pub fn can_transition_to(&self, next: HandshakeState) -> bool {
        use HandshakeState::*;

        match (self, next) {
            (Unestablished, Initiating)
            | (Initiating, AwaitingUserConfirmation)
            | (AwaitingUserConfirmation, Confirming)
            | (Confirming, Established)
            | (Established, Ended) => true,
            (Unestablished | Initiating | AwaitingUserConfirmation | Confirming, Failed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HandshakeState::Unestablished => "unestablished",
            HandshakeState::Initiating => "initiating",
            HandshakeState::AwaitingUserConfirmation => "awaiting user confirmation",
            HandshakeState::Confirming => "confirming",
            HandshakeState::Established => "established",
            HandshakeState::Failed => "failed",
            HandshakeState::Ended => "ended",
        };
        f.write_str(name)
    }
}

/// Opaque bearer ticket issued by session initialization
#[derive(Clone, PartialEq, Eq)]
pub struct Ticket(String);

impl Ticket {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Ticket(..)")
    }
}

/// What the server hands back from session initialization. Lives only for the
/// duration of one handshake.
#[derive(Debug, Clone)]
pub struct HandshakeTicket {
    /// ID the confirm request is authenticated under
    pub confirm_id: String,
    /// Code the user compares with the one shown by the wallet
    pub code: String,
    pub ticket: Ticket,
    pub exp: Option<DateTime<Utc>>,
}

impl From<SessionInitResponse> for HandshakeTicket {
    fn from(resp: SessionInitResponse) -> Self {
        Self {
            confirm_id: resp.id,
            code: resp.code,
            ticket: Ticket::new(resp.token),
            exp: resp.exp.and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
        }
    }
}

/// Called with the confirmation code once session initialization succeeds
pub type ConfirmationCodeDisplay = dyn Fn(&str) + Send + Sync;

/// One run of the session handshake. Nothing is persisted until the
/// confirmed session has passed response authentication.
pub(crate) struct Handshake<'a> {
    state: &'a watch::Sender<HandshakeState>,
    api: &'a ServerApi,
    credentials: &'a dyn CredentialResolver,
    sessions: &'a SessionStore,
    dapp: &'a DappInfo,
}

impl<'a> Handshake<'a> {
    /// Restart the state machine and enter `Initiating`
    pub(crate) fn begin(
        state: &'a watch::Sender<HandshakeState>,
        api: &'a ServerApi,
        credentials: &'a dyn CredentialResolver,
        sessions: &'a SessionStore,
        dapp: &'a DappInfo,
    ) -> Self {
        state.send_replace(HandshakeState::Unestablished);
        let handshake = Self {
            state,
            api,
            credentials,
            sessions,
            dapp,
        };
        handshake.advance(HandshakeState::Initiating);
        handshake
    }

    fn advance(&self, next: HandshakeState) {
        let previous = self.state.send_replace(next);
        if previous.can_transition_to(next) {
            tracing::debug!("Handshake {} -> {}", previous, next);
        } else {
            tracing::warn!("Unexpected handshake transition {} -> {}", previous, next);
        }
    }

    /// Move to `Failed` and hand the error back
    pub(crate) fn fail(&self, err: ConnectError) -> ConnectError {
        tracing::debug!("Handshake failed: {}", err);
        self.advance(HandshakeState::Failed);
        err
    }

    pub(crate) async fn run(
        self,
        key_pair: &ConnectKeyPair,
        display_code: &ConfirmationCodeDisplay,
    ) -> Result<SessionInfo> {
        match self.drive(key_pair, display_code).await {
            Ok(session) => Ok(session),
            Err(e) => {
                let err = self.fail(e);
                self.restore_existing(key_pair).await;
                Err(err)
            }
        }
    }

    /// A failed attempt leaves a previously stored session for this key pair
    /// untouched, so the observable state goes back to reflecting it
    async fn restore_existing(&self, key_pair: &ConnectKeyPair) {
        match self.sessions.load().await {
            Ok(Some(info)) if info.connect_id == key_pair.connect_id() => {
                tracing::debug!("Handshake failed, keeping existing session {}", info.session.id);
                self.state.send_replace(HandshakeState::Established);
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Could not check for an existing session: {}", e),
        }
    }

    async fn drive(&self, key_pair: &ConnectKeyPair, display_code: &ConfirmationCodeDisplay) -> Result<SessionInfo> {
        let ticket = self.initiate(key_pair).await?;

        self.advance(HandshakeState::AwaitingUserConfirmation);
        display_code(&ticket.code);

        self.advance(HandshakeState::Confirming);
        let session = self.confirm(key_pair, &ticket).await?;

        let info = StoredSessionInfo {
            connect_id: key_pair.connect_id(),
            session: session.clone(),
            dapp: self.dapp.clone(),
            server_url: self.api.server_url(),
        };
        self.sessions.save(&info).await?;

        self.advance(HandshakeState::Established);
        tracing::info!(
            "Session established for {} address(es), expires {}",
            session.addrs.len(),
            session.exp
        );
        Ok(session)
    }

    async fn initiate(&self, key_pair: &ConnectKeyPair) -> Result<HandshakeTicket> {
        let request = SessionInitRequest {
            dapp_id: key_pair.connect_id(),
            dapp: self.dapp.clone(),
        };
        tracing::debug!("Initiating session for connect key {}", key_pair.fingerprint());

        let response: SessionInitResponse = self.api.post_json(Endpoint::SessionInit, &request).await?;
        Ok(HandshakeTicket::from(response))
    }

    async fn confirm(&self, key_pair: &ConnectKeyPair, ticket: &HandshakeTicket) -> Result<SessionInfo> {
        let credentials = self.credentials.resolve(key_pair, &ticket.confirm_id)?;
        let request = SessionConfirmRequest {
            token: ticket.ticket.as_str().to_string(),
            dapp: self.dapp.clone(),
        };

        let pending = self.api.sign(Endpoint::SessionConfirm, Some(&request), &credentials)?;
        let response: SessionConfirmResponse = self.api.send_signed(pending, &credentials).await?;

        let exp = Utc
            .timestamp_opt(response.exp, 0)
            .single()
            .ok_or_else(|| ConnectError::InvalidResponse(format!("session expiration {}", response.exp)))?;

        Ok(SessionInfo {
            id: response.id,
            exp,
            addrs: response.addrs,
        })
    }
}
