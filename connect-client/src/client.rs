// connect-client/src/client.rs
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, RwLock};

use common::{
    ConnectConfig, DappInfo, KeyPairBackend, SessionInfo, StoredSessionInfo, TransactionSignRequest,
    TransactionSignResponse,
};

use crate::api::ServerApi;
use crate::credentials::{CredentialResolver, EcdhCredentials};
use crate::error::{ConnectError, Endpoint, Result};
use crate::handshake::{ConfirmationCodeDisplay, Handshake, HandshakeState};
use crate::hawk::{Hawk, MacScheme};
use crate::keys::ConnectKeyPair;
use crate::store::{FileStore, KeyPairStore, KeyValueStore, KeyringStore, SessionStore};
use crate::transport::{ReqwestTransport, Transport};
use crate::txn::{DecodeSignedTransaction, EncodeTransaction};

/// Called once a signing request is sent and the wallet may be waiting on
/// the user's approval
pub type WaitingForApproval = dyn Fn() + Send + Sync;

/// Builder for a [`ConnectClient`]. Every collaborator not set explicitly
/// falls back to the one for talking to a real connect server.
pub struct ConnectClientBuilder {
    dapp: DappInfo,
    config: ConnectConfig,
    display_code: Option<Arc<ConfirmationCodeDisplay>>,
    transport: Option<Arc<dyn Transport>>,
    store: Option<Arc<dyn KeyValueStore>>,
    key_pair_store: Option<Arc<dyn KeyValueStore>>,
    mac: Option<Arc<dyn MacScheme>>,
    credentials: Option<Arc<dyn CredentialResolver>>,
}

impl ConnectClientBuilder {
    pub fn new(dapp: DappInfo) -> Self {
        Self {
            dapp,
            config: ConnectConfig::default(),
            display_code: None,
            transport: None,
            store: None,
            key_pair_store: None,
            mac: None,
            credentials: None,
        }
    }

    pub fn config(mut self, config: ConnectConfig) -> Self {
        self.config = config;
        self
    }

    pub fn server_url(mut self, server_url: impl Into<String>) -> Self {
        self.config.server_url = server_url.into();
        self
    }

    /// Function showing the confirmation code to the user
    pub fn on_confirmation_code<F>(mut self, display: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.display_code = Some(Arc::new(display));
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Store for the session. Also holds the key pair unless
    /// [`ConnectClientBuilder::key_pair_store`] says otherwise.
    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn key_pair_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.key_pair_store = Some(store);
        self
    }

    pub fn mac_scheme(mut self, mac: Arc<dyn MacScheme>) -> Self {
        self.mac = Some(mac);
        self
    }

    pub fn credential_resolver(mut self, credentials: Arc<dyn CredentialResolver>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn build(self) -> Result<ConnectClient> {
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(Duration::from_secs(
                self.config.request_timeout_secs,
            ))?),
        };
        let storage = &self.config.storage;
        let key_pair_kv: Arc<dyn KeyValueStore> = match (self.key_pair_store, &self.store) {
            (Some(store), _) => store,
            (None, Some(store)) => store.clone(),
            (None, None) => match storage.key_pair_backend {
                KeyPairBackend::Keyring => Arc::new(KeyringStore::new(storage.keyring_prefix.clone())),
                KeyPairBackend::File => Arc::new(FileStore::new(storage.resolve_data_dir())),
            },
        };
        let session_kv: Arc<dyn KeyValueStore> = match self.store {
            Some(store) => store,
            None => Arc::new(FileStore::new(storage.resolve_data_dir())),
        };
        let mac: Arc<dyn MacScheme> = match self.mac {
            Some(mac) => mac,
            None => Arc::new(Hawk),
        };
        let credentials: Arc<dyn CredentialResolver> = match self.credentials {
            Some(credentials) => credentials,
            None => Arc::new(EcdhCredentials),
        };
        // Without a display the code still reaches the logs
        let display_code: Arc<ConfirmationCodeDisplay> = match self.display_code {
            Some(display) => display,
            None => Arc::new(|code: &str| tracing::info!("Confirmation code: {}", code)),
        };

        let api = ServerApi::new(&self.config.server_url, transport, mac)?;
        let key_pairs = KeyPairStore::new(key_pair_kv, storage.key_pair_key.clone());
        let sessions = SessionStore::new(session_kv, storage.session_key.clone());
        let (state, _) = watch::channel(HandshakeState::Unestablished);

        tracing::debug!("Connect client for {} using {}", self.dapp.name, api.server_url());

        Ok(ConnectClient {
            dapp: self.dapp,
            api,
            credentials,
            key_pairs,
            sessions,
            display_code,
            key_pair: RwLock::new(None),
            handshake_lock: Mutex::new(()),
            state,
        })
    }
}

/// Client for establishing a session with a connect server and relaying
/// transactions to it for signing.
pub struct ConnectClient {
    dapp: DappInfo,
    api: ServerApi,
    credentials: Arc<dyn CredentialResolver>,
    key_pairs: KeyPairStore,
    sessions: SessionStore,
    display_code: Arc<ConfirmationCodeDisplay>,
    // Cached copy of the stored key pair
    key_pair: RwLock<Option<ConnectKeyPair>>,
    // One handshake or key rotation at a time
    handshake_lock: Mutex<()>,
    state: watch::Sender<HandshakeState>,
}

impl ConnectClient {
    pub fn builder(dapp: DappInfo) -> ConnectClientBuilder {
        ConnectClientBuilder::new(dapp)
    }

    pub fn dapp(&self) -> &DappInfo {
        &self.dapp
    }

    pub fn server_url(&self) -> String {
        self.api.server_url()
    }

    pub fn handshake_state(&self) -> HandshakeState {
        *self.state.borrow()
    }

    /// Receiver that sees every handshake state change
    pub fn watch_handshake(&self) -> watch::Receiver<HandshakeState> {
        self.state.subscribe()
    }

    /// Load the connect key pair, creating and storing one if there is none.
    /// Returns the connect ID.
    pub async fn setup(&self) -> Result<String> {
        Ok(self.ensure_key_pair().await?.connect_id())
    }

    /// Connect ID of the stored key pair, if there is one
    pub async fn connect_id(&self) -> Result<Option<String>> {
        Ok(self.stored_key_pair().await?.map(|kp| kp.connect_id()))
    }

    async fn stored_key_pair(&self) -> Result<Option<ConnectKeyPair>> {
        if let Some(key_pair) = self.key_pair.read().await.as_ref() {
            return Ok(Some(key_pair.clone()));
        }

        let mut cached = self.key_pair.write().await;
        if cached.is_none() {
            *cached = self.key_pairs.load().await?;
        }
        Ok(cached.clone())
    }

    async fn ensure_key_pair(&self) -> Result<ConnectKeyPair> {
        if let Some(key_pair) = self.stored_key_pair().await? {
            return Ok(key_pair);
        }

        let mut cached = self.key_pair.write().await;
        // Another task may have created it while the lock was released
        if let Some(key_pair) = cached.as_ref() {
            return Ok(key_pair.clone());
        }

        let key_pair = ConnectKeyPair::generate();
        self.key_pairs.save(&key_pair).await?;
        tracing::info!("Created connect key pair {}", key_pair.fingerprint());

        *cached = Some(key_pair.clone());
        Ok(key_pair)
    }

    /// Run the session handshake. The confirmation code is shown once the
    /// server has accepted the session initialization.
    pub async fn establish_session(&self) -> Result<SessionInfo> {
        let _guard = self.handshake_lock.lock().await;

        let handshake = Handshake::begin(
            &self.state,
            &self.api,
            self.credentials.as_ref(),
            &self.sessions,
            &self.dapp,
        );
        let key_pair = match self.ensure_key_pair().await {
            Ok(key_pair) => key_pair,
            Err(e) => return Err(handshake.fail(e)),
        };

        handshake.run(&key_pair, self.display_code.as_ref()).await
    }

    /// The stored session, if it belongs to the current connect key pair
    pub async fn retrieve_session(&self) -> Result<Option<StoredSessionInfo>> {
        let Some(info) = self.sessions.load().await? else {
            return Ok(None);
        };

        match self.stored_key_pair().await? {
            Some(key_pair) if key_pair.connect_id() == info.connect_id => Ok(Some(info)),
            _ => {
                tracing::debug!("Stored session belongs to another connect key pair");
                Ok(None)
            }
        }
    }

    /// Have the wallet sign a transaction through the active session.
    ///
    /// `on_waiting` is called once the request is about to go out, since the
    /// response may only come after the user approves the transaction.
    pub async fn sign_transaction<T, S>(
        &self,
        txn: &T,
        signer: Option<&str>,
        on_waiting: Option<&WaitingForApproval>,
    ) -> Result<S>
    where
        T: EncodeTransaction + ?Sized,
        S: DecodeSignedTransaction,
    {
        let Some(info) = self.retrieve_session().await? else {
            return Err(ConnectError::NoActiveSession);
        };
        let key_pair = self.stored_key_pair().await?.ok_or(ConnectError::NoActiveSession)?;
        if let Some(signer) = signer {
            if !info.authorizes(signer) {
                tracing::warn!("Signer {} is not one of the session's addresses", signer);
            }
        }

        let encoded = txn.encode().map_err(ConnectError::Codec)?;
        let credentials = self.credentials.resolve(&key_pair, &info.session.id)?;
        let request = TransactionSignRequest {
            transaction: base64::encode(encoded),
            signer: signer.map(str::to_string),
        };
        let pending = self.api.sign(Endpoint::TransactionSign, Some(&request), &credentials)?;

        if let Some(on_waiting) = on_waiting {
            on_waiting();
        }

        let response: TransactionSignResponse = self.api.send_signed(pending, &credentials).await?;
        let signed = base64::decode(&response.signed_transaction)
            .map_err(|e| ConnectError::InvalidResponse(format!("signed transaction: {}", e)))?;

        tracing::debug!("Received signed transaction of {} bytes", signed.len());
        S::decode(&signed).map_err(ConnectError::Codec)
    }

    /// End the stored session. The server is told when `notify_server` is set,
    /// but the local session is cleared whatever the server says.
    pub async fn end_session(&self, notify_server: bool) -> Result<()> {
        let Some(info) = self.sessions.load().await? else {
            tracing::debug!("No session to end");
            return Ok(());
        };

        if notify_server {
            self.notify_session_end(&info).await;
        }

        self.sessions.clear().await?;
        self.mark_ended();
        tracing::info!("Session ended");
        Ok(())
    }

    /// Replace the connect key pair. Any stored session is ended first, since
    /// it can't be used without the old key pair. Returns the new connect ID.
    pub async fn refresh_connect_key_pair(&self, notify_server: bool) -> Result<String> {
        let _guard = self.handshake_lock.lock().await;

        if notify_server {
            if let Some(info) = self.sessions.load().await? {
                self.notify_session_end(&info).await;
            }
        }

        let key_pair = ConnectKeyPair::generate();
        self.key_pairs.save(&key_pair).await?;
        let connect_id = key_pair.connect_id();
        tracing::info!("Rotated connect key pair, now {}", key_pair.fingerprint());
        *self.key_pair.write().await = Some(key_pair);

        self.sessions.clear().await?;
        self.mark_ended();
        Ok(connect_id)
    }

    /// Delete the connect key pair from storage, ending any stored session
    /// with it. The next [`ConnectClient::setup`] creates a new one.
    pub async fn remove_connect_key_pair(&self, notify_server: bool) -> Result<()> {
        let _guard = self.handshake_lock.lock().await;

        if notify_server {
            if let Some(info) = self.sessions.load().await? {
                self.notify_session_end(&info).await;
            }
        }

        self.sessions.clear().await?;
        self.key_pairs.clear().await?;
        *self.key_pair.write().await = None;
        self.mark_ended();
        tracing::info!("Removed connect key pair");
        Ok(())
    }

    // Best effort: failures are logged and never stop local cleanup
    async fn notify_session_end(&self, info: &StoredSessionInfo) {
        if let Err(e) = self.send_session_end(info).await {
            tracing::warn!("Failed to end session on the connect server: {}", e);
        }
    }

    async fn send_session_end(&self, info: &StoredSessionInfo) -> Result<()> {
        let key_pair = match self.stored_key_pair().await? {
            Some(key_pair) if key_pair.connect_id() == info.connect_id => key_pair,
            _ => return Err(ConnectError::NoActiveSession),
        };

        let credentials = self.credentials.resolve(&key_pair, &info.session.id)?;
        let pending = self.api.sign(Endpoint::SessionEnd, None::<&()>, &credentials)?;
        self.api.send_signed_status_only(pending).await
    }

    fn mark_ended(&self) {
        self.state.send_if_modified(|state| {
            if state.can_transition_to(HandshakeState::Ended) {
                tracing::debug!("Handshake {} -> {}", state, HandshakeState::Ended);
                *state = HandshakeState::Ended;
                true
            } else {
                false
            }
        });
    }
}
