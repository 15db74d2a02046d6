// connect-client/src/lib.rs
//! Client side of dApp Connect: pairs a dApp with a wallet's connect server
//! through a confirmed handshake, then relays transactions to the wallet for
//! signing over Hawk-authenticated requests.

pub mod api;
pub mod client;
pub mod credentials;
pub mod error;
pub mod handshake;
pub mod hawk;
pub mod keys;
pub mod provider;
pub mod store;
pub mod transport;
pub mod txn;

pub use api::ServerApi;
pub use client::{ConnectClient, ConnectClientBuilder, WaitingForApproval};
pub use credentials::{CredentialResolver, Credentials, EcdhCredentials, MacAlgorithm};
pub use error::{AuthError, ConnectError, Endpoint, Result, StorageError, TransportError};
pub use handshake::{ConfirmationCodeDisplay, HandshakeState, HandshakeTicket, Ticket};
pub use hawk::{Hawk, MacScheme, SignedRequest};
pub use keys::ConnectKeyPair;
pub use provider::{TxnEntry, WalletAccount, WalletProvider};
pub use store::{FileStore, KeyPairStore, KeyValueStore, KeyringStore, MemoryStore, SessionStore};
pub use transport::{HttpRequest, HttpResponse, Method, ReqwestTransport, Transport};
pub use txn::{DecodeSignedTransaction, EncodeTransaction, RawTransaction, SignedTransactionBytes};

pub use common::{ConnectConfig, DappInfo, SessionInfo, StoredSessionInfo};
