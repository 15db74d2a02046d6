// connect-client/tests/signing_test.rs
mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use connect_client::{
    AuthError, ConnectError, Endpoint, EncodeTransaction, MemoryStore, RawTransaction,
    SignedTransactionBytes,
};
use support::*;

fn unsigned_txn() -> RawTransaction {
    // {"type": "pay"} is enough for the server to relay
    RawTransaction(vec![0x81, 0xa4, 0x74, 0x79, 0x70, 0x65, 0xa3, 0x70, 0x61, 0x79])
}

#[tokio::test]
async fn test_sign_transaction() {
    let server = Arc::new(MockConnectServer::ecdh());
    let store = MemoryStore::new();
    let client = client_for(&server, &store, &CodeLog::default());
    client.establish_session().await.unwrap();

    let waiting = Arc::new(AtomicUsize::new(0));
    let counter = waiting.clone();
    let on_waiting = move || {
        counter.fetch_add(1, Ordering::SeqCst);
    };

    let signed: SignedTransactionBytes = client
        .sign_transaction(&unsigned_txn(), None, Some(&on_waiting))
        .await
        .unwrap();

    assert_eq!(signed.as_bytes(), base64::decode(SIGNED_TXN).unwrap().as_slice());
    assert!(!signed.is_empty());
    assert_eq!(waiting.load(Ordering::SeqCst), 1);

    // Exactly the given transaction went out, authenticated under the session ID
    let sign = server.calls_to("transaction/sign");
    assert_eq!(sign.len(), 1);
    assert!(sign[0].authenticated);
    assert!(sign[0]
        .authorization
        .as_deref()
        .unwrap()
        .contains(&format!("id=\"{}\"", server.session_id())));

    let body: serde_json::Value = serde_json::from_slice(&sign[0].body).unwrap();
    assert_eq!(body["transaction"], base64::encode(unsigned_txn().encode().unwrap()));
    assert!(body.get("signer").is_none());
}

#[tokio::test]
async fn test_sign_transaction_with_signer_hint() {
    let server = Arc::new(MockConnectServer::fixed());
    let store = MemoryStore::new();
    let client = fixed_client_for(&server, &store, &CodeLog::default());
    client.establish_session().await.unwrap();

    let _: SignedTransactionBytes = client
        .sign_transaction(&unsigned_txn(), Some(ADDRESS), None)
        .await
        .unwrap();

    let sign = &server.calls_to("transaction/sign")[0];
    let body: serde_json::Value = serde_json::from_slice(&sign.body).unwrap();
    assert_eq!(body["signer"], ADDRESS);
}

#[tokio::test]
async fn test_sign_without_session_makes_no_request() {
    let server = Arc::new(MockConnectServer::fixed());
    let store = MemoryStore::new();
    let client = fixed_client_for(&server, &store, &CodeLog::default());
    client.setup().await.unwrap();

    let called = Arc::new(AtomicUsize::new(0));
    let counter = called.clone();
    let on_waiting = move || {
        counter.fetch_add(1, Ordering::SeqCst);
    };

    let result = client
        .sign_transaction::<_, SignedTransactionBytes>(&unsigned_txn(), None, Some(&on_waiting))
        .await;
    assert!(matches!(result, Err(ConnectError::NoActiveSession)));
    assert!(server.calls().is_empty());
    assert_eq!(called.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_sign_response_without_server_auth_is_not_trusted() {
    let server = Arc::new(MockConnectServer::fixed());
    let store = MemoryStore::new();
    let client = fixed_client_for(&server, &store, &CodeLog::default());
    client.establish_session().await.unwrap();

    server.reply_to("transaction/sign", Reply::WithoutServerAuth);
    let result = client
        .sign_transaction::<_, SignedTransactionBytes>(&unsigned_txn(), None, None)
        .await;

    assert!(matches!(
        result,
        Err(ConnectError::Authentication(AuthError::ServerAuthMissing))
    ));
}

#[tokio::test]
async fn test_sign_response_with_forged_mac_is_not_trusted() {
    let server = Arc::new(MockConnectServer::ecdh());
    let store = MemoryStore::new();
    let client = client_for(&server, &store, &CodeLog::default());
    client.establish_session().await.unwrap();

    server.reply_to("transaction/sign", Reply::WithBadServerMac);
    let result = client
        .sign_transaction::<_, SignedTransactionBytes>(&unsigned_txn(), None, None)
        .await;

    assert!(matches!(
        result,
        Err(ConnectError::Authentication(AuthError::ServerAuthInvalid(_)))
    ));
}

#[tokio::test]
async fn test_sign_rejection_carries_server_error() {
    let server = Arc::new(MockConnectServer::fixed());
    let store = MemoryStore::new();
    let client = fixed_client_for(&server, &store, &CodeLog::default());
    client.establish_session().await.unwrap();

    server.reply_to(
        "transaction/sign",
        Reply::Status(403, serde_json::json!({"name": "rejected", "message": "User rejected the transaction"})),
    );
    let err = client
        .sign_transaction::<_, SignedTransactionBytes>(&unsigned_txn(), None, None)
        .await
        .unwrap_err();

    match err {
        ConnectError::ServerRejected { endpoint, status, error } => {
            assert_eq!(endpoint, Endpoint::TransactionSign);
            assert_eq!(status, 403);
            assert_eq!(error.name.as_deref(), Some("rejected"));
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn test_empty_transaction_is_a_codec_error() {
    let server = Arc::new(MockConnectServer::fixed());
    let store = MemoryStore::new();
    let client = fixed_client_for(&server, &store, &CodeLog::default());
    client.establish_session().await.unwrap();

    let result = client
        .sign_transaction::<_, SignedTransactionBytes>(&RawTransaction(Vec::new()), None, None)
        .await;
    assert!(matches!(result, Err(ConnectError::Codec(_))));
    assert!(server.calls_to("transaction/sign").is_empty());
}

#[tokio::test]
async fn test_session_survives_client_restart() {
    let server = Arc::new(MockConnectServer::ecdh());
    let store = MemoryStore::new();
    let first = client_for(&server, &store, &CodeLog::default());
    let session = first.establish_session().await.unwrap();
    drop(first);

    let second = client_for(&server, &store, &CodeLog::default());
    let stored = second.retrieve_session().await.unwrap().unwrap();
    assert_eq!(stored.session, session);

    let _: SignedTransactionBytes = second
        .sign_transaction(&unsigned_txn(), None, None)
        .await
        .unwrap();
    assert!(server.calls_to("transaction/sign")[0].authenticated);
}
