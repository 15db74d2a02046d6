// connect-client/src/provider.rs
//! Account-oriented wrapper over [`ConnectClient`] for wallet adapter
//! frameworks that deal in accounts and transaction lists.

use std::sync::Arc;

use crate::client::ConnectClient;
use crate::error::{ConnectError, Result};
use crate::txn::{DecodeSignedTransaction, EncodeTransaction};

/// Display name prefix for connected accounts
pub const ACCOUNT_NAME_PREFIX: &str = "Connect Account";

/// An address the wallet connected, with a name to show for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletAccount {
    pub name: String,
    pub address: String,
}

/// One entry of a transaction list handed in for signing
#[derive(Debug, Clone)]
pub enum TxnEntry<T> {
    Single(T),
    /// Atomic transaction group, which the connect server cannot sign
    Group(Vec<T>),
}

pub struct WalletProvider {
    client: Arc<ConnectClient>,
}

impl WalletProvider {
    pub fn new(client: Arc<ConnectClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ConnectClient {
        &self.client
    }

    /// Set up the key pair and run the handshake
    pub async fn connect(&self) -> Result<Vec<WalletAccount>> {
        self.client.setup().await?;
        let session = self.client.establish_session().await?;
        Ok(accounts(&session.addrs))
    }

    /// Accounts of the stored session, if there is one to pick up
    pub async fn resume_session(&self) -> Result<Option<Vec<WalletAccount>>> {
        self.client.setup().await?;
        Ok(self
            .client
            .retrieve_session()
            .await?
            .map(|info| accounts(&info.session.addrs)))
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.client.end_session(true).await
    }

    /// Sign the entries selected by `indexes_to_sign`, or all of them when
    /// it is `None`. The result lines up with `txns`, with `None` for every
    /// entry that wasn't selected.
    ///
    /// Transaction groups are refused before anything is sent.
    pub async fn sign_transactions<T, S>(
        &self,
        txns: &[TxnEntry<T>],
        indexes_to_sign: Option<&[usize]>,
    ) -> Result<Vec<Option<S>>>
    where
        T: EncodeTransaction,
        S: DecodeSignedTransaction,
    {
        let selected = |i: usize| indexes_to_sign.map_or(true, |indexes| indexes.contains(&i));

        let mut to_sign = Vec::with_capacity(txns.len());
        for (i, entry) in txns.iter().enumerate() {
            match entry {
                _ if !selected(i) => to_sign.push(None),
                TxnEntry::Single(txn) => to_sign.push(Some(txn)),
                TxnEntry::Group(_) => {
                    return Err(ConnectError::Unsupported(
                        "transaction groups are not supported by this wallet".to_string(),
                    ))
                }
            }
        }

        let mut signed = Vec::with_capacity(to_sign.len());
        for txn in to_sign {
            signed.push(match txn {
                Some(txn) => Some(self.client.sign_transaction(txn, None, None).await?),
                None => None,
            });
        }
        tracing::debug!("Signed {} of {} transactions", signed.iter().flatten().count(), txns.len());
        Ok(signed)
    }
}

fn accounts(addrs: &[String]) -> Vec<WalletAccount> {
    addrs
        .iter()
        .enumerate()
        .map(|(i, address)| WalletAccount {
            name: format!("{} {}", ACCOUNT_NAME_PREFIX, i + 1),
            address: address.clone(),
        })
        .collect()
}
