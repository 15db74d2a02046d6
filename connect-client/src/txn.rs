// connect-client/src/txn.rs
//! Seams to the transaction encoding, which lives outside this crate.

/// An unsigned transaction that can be put into its canonical wire form
pub trait EncodeTransaction {
    fn encode(&self) -> Result<Vec<u8>, String>;
}

/// A signed transaction that can be read from its canonical wire form
pub trait DecodeSignedTransaction: Sized {
    fn decode(bytes: &[u8]) -> Result<Self, String>;
}

/// Unsigned transaction that is already msgpack encoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTransaction(pub Vec<u8>);

impl EncodeTransaction for RawTransaction {
    fn encode(&self) -> Result<Vec<u8>, String> {
        if self.0.is_empty() {
            return Err("empty transaction".to_string());
        }
        Ok(self.0.clone())
    }
}

/// Msgpack encoded signed transaction as returned by the wallet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransactionBytes(pub Vec<u8>);

impl SignedTransactionBytes {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl DecodeSignedTransaction for SignedTransactionBytes {
    fn decode(bytes: &[u8]) -> Result<Self, String> {
        if bytes.is_empty() {
            return Err("empty signed transaction".to_string());
        }
        Ok(Self(bytes.to_vec()))
    }
}
